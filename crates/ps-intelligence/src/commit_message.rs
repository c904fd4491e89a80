//! Commit-message generation.
//!
//! The change summary becomes a prompt, the completion goes through the
//! shared rate limiter, and the raw text is normalised into
//! `summary + "\n\n" + body`.

use std::sync::Arc;

use ps_core::summary::ChangeSummary;
use ps_core::types::UpdateMode;
use ps_harness::rate_limiter::RateLimiter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{LlmConfig, LlmError, LlmMessage, LlmProvider};

/// Longest summary line kept before truncation.
pub const SUMMARY_MAX_CHARS: usize = 50;

const ELLIPSIS: &str = "...";

#[derive(Debug, Error)]
pub enum CommitMessageError {
    #[error("failed to generate commit message: {0}")]
    Generation(#[source] LlmError),

    #[error("failed to generate commit message: AI returned an empty response")]
    EmptyResponse,
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Normalise raw AI output into a commit message.
///
/// The first non-blank line is the summary, cut to [`SUMMARY_MAX_CHARS`] with
/// `...` appended when longer (whitespace left dangling at the cut is dropped).
/// Every later non-blank line becomes its own paragraph. Returns `None` when
/// the text has no non-blank line.
pub fn format_commit_message(raw: &str) -> Option<String> {
    let mut lines = raw
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let first = lines.next()?;
    let summary = if first.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = first.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}{}", cut.trim_end(), ELLIPSIS)
    } else {
        first.to_string()
    };

    let body = lines.collect::<Vec<_>>().join("\n\n");
    Some(format!("{summary}\n\n{body}"))
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub(crate) fn system_prompt(mode: UpdateMode) -> &'static str {
    match mode {
        UpdateMode::Full => {
            "You are a helpful assistant that can answer questions and help with tasks."
        }
        UpdateMode::Partial => {
            "You are a helpful assistant that can answer questions and help with tasks. \
             Focus on making targeted changes based on the given feedback."
        }
    }
}

/// User prompt asking for a conventional commit message over `summary`.
pub fn build_prompt(summary: &ChangeSummary) -> String {
    format!(
        "Generate a comprehensive commit message for the following changes:\n\n\
         {changes}\n\n\
         The commit message should include:\n\
         1. A brief summary of the overall change (at most 50 characters)\n\
         2. The reasoning behind the significant modifications and approaches taken\n\
         3. Any potential impacts on other parts of the codebase\n\n\
         Format it as a conventional commit message: a short summary line, a blank line, \
         then the detailed description. Reply with the commit message only, without any \
         introduction, code fences or closing remarks.",
        changes = summary.describe()
    )
}

// ---------------------------------------------------------------------------
// CommitMessageSynthesizer
// ---------------------------------------------------------------------------

pub struct CommitMessageSynthesizer {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    config: LlmConfig,
}

impl CommitMessageSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider,
            limiter,
            config: LlmConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate a commit message for `summary`.
    ///
    /// Remote throttling is retried by the limiter; any other failure, or a
    /// reply with no text, is returned as an error and no message is produced.
    pub async fn synthesize(
        &self,
        summary: &ChangeSummary,
        mode: UpdateMode,
    ) -> Result<String, CommitMessageError> {
        let messages = vec![
            LlmMessage::system(system_prompt(mode)),
            LlmMessage::user(build_prompt(summary)),
        ];

        let response = self
            .limiter
            .run(|| self.provider.complete(&messages, &self.config))
            .await
            .map_err(|e| {
                warn!(error = %e, "commit message generation failed");
                CommitMessageError::Generation(e)
            })?;

        debug!(
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "commit message completion received"
        );

        format_commit_message(&response.content).ok_or(CommitMessageError::EmptyResponse)
    }
}
