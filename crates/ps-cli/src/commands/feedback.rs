use ps_core::config::Config;
use ps_intelligence::{FeedbackAnalyzer, LlmConfig};

use super::{llm_provider, rate_limiter};

/// Run the `analyze-feedback` subcommand and print the AI's action items.
pub async fn run(config: &Config, text: &str) -> anyhow::Result<()> {
    let analyzer = FeedbackAnalyzer::new(llm_provider(config)?, rate_limiter(config))
        .with_config(LlmConfig::from(&config.llm));
    let analysis = analyzer.analyze(text).await?;
    println!("{analysis}");
    Ok(())
}
