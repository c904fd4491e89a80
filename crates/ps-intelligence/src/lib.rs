//! AI-side of pull-request synthesis: the completion-provider seam and the
//! prompts built on top of it.

pub mod commit_message;
pub mod feedback;
pub mod llm;

// Re-export canonical LLM types for convenience.
pub use llm::{
    provider_from_settings, AnthropicProvider, LlmConfig, LlmError, LlmMessage, LlmProvider,
    LlmResponse, LlmRole, MockProvider as LlmMockProvider, OpenAiProvider,
};

pub use commit_message::{format_commit_message, CommitMessageError, CommitMessageSynthesizer};
pub use feedback::{FeedbackAnalyzer, FeedbackError};
