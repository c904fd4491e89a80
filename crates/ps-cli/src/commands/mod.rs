pub mod commit_message;
pub mod feedback;
pub mod issue;
pub mod synthesize;

use std::sync::Arc;

use anyhow::Context;
use ps_core::config::{Config, CredentialProvider};
use ps_core::issue_store::{IssueStore, JsonIssueStore};
use ps_harness::rate_limiter::{RateLimitConfig, RateLimiter};
use ps_intelligence::{provider_from_settings, LlmProvider};

/// Issue records under `storage.issues_dir`.
pub fn issue_store(config: &Config) -> Arc<JsonIssueStore> {
    Arc::new(JsonIssueStore::new(config.storage.issues_dir.clone()))
}

pub fn shared_store(config: &Config) -> Arc<dyn IssueStore> {
    issue_store(config)
}

/// One limiter per process; every AI call made by a command shares it.
pub fn rate_limiter(config: &Config) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig::new(
        config.rate_limit.max_requests,
        config.rate_limit.window(),
    )))
}

/// The configured completion provider, keyed from the environment.
pub fn llm_provider(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let key = CredentialProvider::llm_api_key(&config.llm).with_context(|| {
        format!(
            "no API key for {}: set {}",
            config.llm.provider, config.llm.api_key_env
        )
    })?;
    Ok(provider_from_settings(&config.llm, key)?)
}
