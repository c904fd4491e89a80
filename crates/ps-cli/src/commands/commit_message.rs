use std::path::Path;

use anyhow::Context;
use ps_core::config::Config;
use ps_core::diff::parse_diff;
use ps_core::summary::ChangeSummary;
use ps_core::types::UpdateMode;
use ps_intelligence::{CommitMessageSynthesizer, LlmConfig};

use super::{llm_provider, rate_limiter};

/// Summarize a `git diff` file for the commit-message prompt.
pub fn summarize_diff(path: &Path) -> anyhow::Result<ChangeSummary> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let summary = ChangeSummary::from_parsed_diff(&parse_diff(&text));
    if summary.is_empty() {
        anyhow::bail!("{} contains no `diff --git` sections", path.display());
    }
    Ok(summary)
}

/// Run the `commit-message` subcommand and print the generated message.
pub async fn run(config: &Config, diff: &Path, mode: UpdateMode) -> anyhow::Result<()> {
    let summary = summarize_diff(diff)?;
    let synthesizer = CommitMessageSynthesizer::new(llm_provider(config)?, rate_limiter(config))
        .with_config(LlmConfig::from(&config.llm));
    let message = synthesizer.synthesize(&summary, mode).await?;
    println!("{message}");
    Ok(())
}
