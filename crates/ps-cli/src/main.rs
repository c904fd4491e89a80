//! prsynth -- turn AI-proposed file changes into commits and pull requests.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ps_core::config::Config;
use ps_core::types::{ChangeType, UpdateMode};
use ps_telemetry::logging::{self, LogFormat};
use uuid::Uuid;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// prsynth CLI -- synthesize and track pull requests for issues.
#[derive(Debug, Parser)]
#[command(name = "prsynth", version, about)]
struct Cli {
    /// Config file to use instead of `~/.prsynth/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines regardless of `general.log_format`.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a local issue record to synthesize against.
    NewIssue {
        /// Issue title.
        #[arg(long)]
        title: String,
    },

    /// List stored issues with their status and pull request.
    Issues {
        /// Print the issues as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Commit a change file to a branch and open or update its pull request.
    Synthesize {
        #[arg(long)]
        issue: Uuid,
        /// JSON file holding `{"files": [...], "prTitle": "..."}`.
        #[arg(long)]
        changes: PathBuf,
        #[arg(long)]
        project: String,
        #[arg(long)]
        feature: String,
        /// `full` opens a fresh PR; `partial` amends the issue's existing one.
        #[arg(long, default_value = "full")]
        mode: UpdateMode,
        /// Appended to the negotiated branch name.
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Append an iteration record to an issue by hand.
    Record {
        #[arg(long)]
        issue: Uuid,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        sha: String,
        #[arg(long)]
        change_type: ChangeType,
    },

    /// Show an issue's PR history, newest first.
    History {
        #[arg(long)]
        issue: Uuid,
        /// Print the entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a commit message for a `git diff` file.
    CommitMessage {
        #[arg(long)]
        diff: PathBuf,
        #[arg(long, default_value = "full")]
        mode: UpdateMode,
    },

    /// Summarize reviewer feedback into actionable items.
    AnalyzeFeedback {
        #[arg(long)]
        text: String,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn log_format(cli: &Cli, config: &Config) -> LogFormat {
    if cli.json_logs {
        LogFormat::Json
    } else {
        config.general.log_format.parse().unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    logging::init("prsynth", &config.general.log_level, log_format(&cli, &config));

    match cli.command {
        Commands::NewIssue { title } => commands::issue::create(&config, &title).await?,
        Commands::Issues { json } => commands::issue::list(&config, json).await?,
        Commands::Synthesize {
            issue,
            changes,
            project,
            feature,
            mode,
            suffix,
        } => {
            let args = commands::synthesize::Args {
                issue,
                changes,
                project,
                feature,
                mode,
                suffix,
            };
            commands::synthesize::run(&config, args).await?;
        }
        Commands::Record {
            issue,
            branch,
            sha,
            change_type,
        } => commands::issue::record(&config, issue, &branch, &sha, change_type).await?,
        Commands::History { issue, json } => commands::issue::history(&config, issue, json).await?,
        Commands::CommitMessage { diff, mode } => {
            commands::commit_message::run(&config, &diff, mode).await?
        }
        Commands::AnalyzeFeedback { text } => commands::feedback::run(&config, &text).await?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("prsynth").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn synthesize_defaults_to_full_mode() {
        let id = Uuid::new_v4().to_string();
        let cli = parse(&[
            "synthesize", "--issue", &id, "--changes", "c.json", "--project", "acme", "--feature",
            "login",
        ]);
        match cli.command {
            Commands::Synthesize { mode, suffix, .. } => {
                assert_eq!(mode, UpdateMode::Full);
                assert!(suffix.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn synthesize_accepts_partial_mode() {
        let id = Uuid::new_v4().to_string();
        let cli = parse(&[
            "synthesize", "--issue", &id, "--changes", "c.json", "--project", "acme", "--feature",
            "login", "--mode", "Partial",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Synthesize { mode: UpdateMode::Partial, .. }
        ));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = parse(&["config", "--config", "/tmp/p.toml", "--json-logs"]);
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert_eq!(log_format(&cli, &Config::default()), LogFormat::Json);
    }

    #[test]
    fn record_parses_change_type() {
        let id = Uuid::new_v4().to_string();
        let cli = parse(&[
            "record", "--issue", &id, "--branch", "acme/x", "--sha", "abc", "--change-type",
            "update",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Record { change_type: ChangeType::Update, .. }
        ));
    }

    #[test]
    fn bad_issue_id_is_rejected() {
        let err = Cli::try_parse_from(["prsynth", "history", "--issue", "nope"]);
        assert!(err.is_err());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let id = Uuid::new_v4().to_string();
        let err = Cli::try_parse_from([
            "prsynth", "synthesize", "--issue", &id, "--changes", "c.json", "--project", "a",
            "--feature", "b", "--mode", "sideways",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn config_file_log_format_is_used_without_flag() {
        let cli = parse(&["config"]);
        let mut config = Config::default();
        config.general.log_format = "json".into();
        assert_eq!(log_format(&cli, &config), LogFormat::Json);
        config.general.log_format = "pretty".into();
        assert_eq!(log_format(&cli, &config), LogFormat::Pretty);
    }
}
