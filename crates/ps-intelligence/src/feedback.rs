//! Turns free-form reviewer feedback on a generated change into a list of
//! actionable tasks for the next iteration.

use std::sync::Arc;

use ps_harness::rate_limiter::RateLimiter;
use thiserror::Error;
use tracing::warn;

use crate::llm::{LlmConfig, LlmError, LlmMessage, LlmProvider};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback is empty")]
    EmptyFeedback,

    #[error("failed to analyze feedback: {0}")]
    Generation(#[source] LlmError),

    #[error("failed to analyze feedback: AI returned an empty response")]
    EmptyResponse,
}

pub fn build_feedback_prompt(feedback: &str) -> String {
    format!(
        "Analyze the following feedback for an AI-generated code change:\n\n\
         {feedback}\n\n\
         Provide a concise summary of the key points, followed by a list of specific, \
         actionable tasks that address each aspect of the feedback."
    )
}

pub struct FeedbackAnalyzer {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    config: LlmConfig,
}

impl FeedbackAnalyzer {
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

    pub async fn analyze(&self, feedback: &str) -> Result<String, FeedbackError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(FeedbackError::EmptyFeedback);
        }

        let messages = vec![LlmMessage::user(build_feedback_prompt(feedback))];
        let response = self
            .limiter
            .run(|| self.provider.complete(&messages, &self.config))
            .await
            .map_err(|e| {
                warn!(error = %e, "feedback analysis failed");
                FeedbackError::Generation(e)
            })?;

        let analysis = response.content.trim();
        if analysis.is_empty() {
            return Err(FeedbackError::EmptyResponse);
        }
        Ok(analysis.to_string())
    }
}
