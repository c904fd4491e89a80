use std::sync::Arc;
use std::time::Duration;

use ps_core::summary::ChangeSummary;
use ps_core::types::{ChangeSet, FileChange, UpdateMode};
use ps_harness::clock::ManualClock;
use ps_harness::rate_limiter::{RateLimitConfig, RateLimiter};
use ps_intelligence::llm::{LlmError, LlmRole, MockProvider};
use ps_intelligence::{CommitMessageError, CommitMessageSynthesizer, FeedbackAnalyzer, FeedbackError};

fn limiter() -> (Arc<RateLimiter>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let limiter = Arc::new(RateLimiter::with_clock(
        RateLimitConfig::default(),
        clock.clone(),
    ));
    (limiter, clock)
}

fn summary() -> ChangeSummary {
    ChangeSummary::from_change_set(&ChangeSet::new(vec![
        FileChange::new_file("src/auth.rs", "fn login() {}\n"),
        FileChange::deleted("src/legacy.rs"),
    ]))
}

#[tokio::test]
async fn synthesizer_formats_long_first_line() {
    let provider = Arc::new(MockProvider::new().with_text(
        "This is a very long first line that exceeds fifty characters and should be truncated\n\nSecond paragraph\n\nThird paragraph",
    ));
    let (limiter, _) = limiter();
    let synth = CommitMessageSynthesizer::new(provider, limiter);

    let msg = synth.synthesize(&summary(), UpdateMode::Full).await.unwrap();
    assert_eq!(
        msg,
        "This is a very long first line that exceeds fifty...\n\nSecond paragraph\n\nThird paragraph"
    );
}

#[tokio::test]
async fn prompt_lists_every_file_with_counts() {
    let provider = Arc::new(MockProvider::new().with_text("Add auth"));
    let (limiter, _) = limiter();
    let synth = CommitMessageSynthesizer::new(provider.clone(), limiter);

    synth.synthesize(&summary(), UpdateMode::Partial).await.unwrap();

    let captured = provider.captured_requests();
    assert_eq!(captured.len(), 1);
    let (messages, _) = &captured[0];
    assert_eq!(messages[0].role, LlmRole::System);
    assert!(messages[0].content.contains("targeted changes"));
    assert!(messages[1].content.contains("src/auth.rs (new, +1, -0)"));
    assert!(messages[1].content.contains("src/legacy.rs (deleted, +0, -0)"));
}

#[tokio::test]
async fn throttled_completion_is_retried_after_a_window() {
    let provider = Arc::new(
        MockProvider::new()
            .with_error(LlmError::RateLimited {
                retry_after_secs: None,
            })
            .with_text("Add auth\nbody"),
    );
    let (limiter, clock) = limiter();
    let synth = CommitMessageSynthesizer::new(provider.clone(), limiter);

    let msg = synth.synthesize(&summary(), UpdateMode::Full).await.unwrap();
    assert_eq!(msg, "Add auth\n\nbody");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    assert_eq!(provider.captured_requests().len(), 2);
}

#[tokio::test]
async fn api_failure_is_wrapped_not_retried() {
    let provider = Arc::new(MockProvider::new().with_error(LlmError::ApiError {
        status: 500,
        message: "boom".into(),
    }));
    let (limiter, clock) = limiter();
    let synth = CommitMessageSynthesizer::new(provider.clone(), limiter);

    let err = synth.synthesize(&summary(), UpdateMode::Full).await.unwrap_err();
    assert!(matches!(
        err,
        CommitMessageError::Generation(LlmError::ApiError { status: 500, .. })
    ));
    assert!(err.to_string().contains("failed to generate commit message"));
    assert_eq!(provider.captured_requests().len(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn empty_completion_is_an_error() {
    let provider = Arc::new(MockProvider::new().with_text("   \n  "));
    let (limiter, _) = limiter();
    let synth = CommitMessageSynthesizer::new(provider, limiter);

    let err = synth.synthesize(&summary(), UpdateMode::Full).await.unwrap_err();
    assert!(matches!(err, CommitMessageError::EmptyResponse));
}

#[tokio::test]
async fn synthesizer_calls_share_the_limiter_window() {
    let provider = Arc::new(MockProvider::new());
    let (limiter, clock) = limiter();
    let synth = CommitMessageSynthesizer::new(provider, limiter.clone());
    let analyzer = FeedbackAnalyzer::new(Arc::new(MockProvider::new()), limiter);

    for _ in 0..3 {
        synth.synthesize(&summary(), UpdateMode::Full).await.unwrap();
    }
    for _ in 0..2 {
        analyzer.analyze("tighten error handling").await.unwrap();
    }
    assert!(clock.sleeps().is_empty());

    // Sixth call in the window has to wait for the reset.
    synth.synthesize(&summary(), UpdateMode::Full).await.unwrap();
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
}

#[tokio::test]
async fn feedback_analysis_returns_trimmed_text() {
    let provider = Arc::new(MockProvider::new().with_text("\n- Rename the handler\n"));
    let (limiter, _) = limiter();
    let analyzer = FeedbackAnalyzer::new(provider.clone(), limiter);

    let tasks = analyzer.analyze("  naming is confusing ").await.unwrap();
    assert_eq!(tasks, "- Rename the handler");

    let captured = provider.captured_requests();
    assert!(captured[0].0[0].content.contains("naming is confusing"));
}

#[tokio::test]
async fn blank_feedback_skips_the_ai_call() {
    let provider = Arc::new(MockProvider::new());
    let (limiter, _) = limiter();
    let analyzer = FeedbackAnalyzer::new(provider.clone(), limiter);

    assert!(matches!(
        analyzer.analyze("   ").await,
        Err(FeedbackError::EmptyFeedback)
    ));
    assert!(provider.captured_requests().is_empty());
}
