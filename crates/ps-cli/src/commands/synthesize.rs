use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ps_core::config::{Config, CredentialProvider};
use ps_core::types::{AiParsedResponse, UpdateMode};
use ps_engine::{PrLifecycleCoordinator, SynthesisOutcome, SynthesisRequest};
use ps_integrations::github::client::GitHubClient;
use ps_intelligence::{CommitMessageSynthesizer, LlmConfig};
use tracing::info;
use uuid::Uuid;

use super::{llm_provider, rate_limiter, shared_store};

pub struct Args {
    pub issue: Uuid,
    pub changes: PathBuf,
    pub project: String,
    pub feature: String,
    pub mode: UpdateMode,
    pub suffix: Option<String>,
}

/// Read a parsed AI response (`files` plus optional `prTitle`) from disk.
pub fn read_changes(path: &PathBuf) -> anyhow::Result<AiParsedResponse> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let response: AiParsedResponse = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid change file", path.display()))?;
    Ok(response)
}

pub fn build_request(config: &Config, args: &Args, response: AiParsedResponse) -> SynthesisRequest {
    let mut request =
        SynthesisRequest::from_response(response, args.project.clone(), args.feature.clone())
            .with_mode(args.mode)
            .with_base_branch(config.github.base_branch.clone());
    if let Some(suffix) = &args.suffix {
        request = request.with_branch_suffix(suffix.clone());
    }
    request
}

/// Run the `synthesize` subcommand against the configured GitHub repository.
pub async fn run(config: &Config, args: Args) -> anyhow::Result<()> {
    let response = read_changes(&args.changes)?;
    let request = build_request(config, &args, response);

    let token = CredentialProvider::github_token(&config.github);
    let host = GitHubClient::from_settings(&config.github, token)
        .context("failed to build GitHub client")?;
    let synthesizer = CommitMessageSynthesizer::new(llm_provider(config)?, rate_limiter(config))
        .with_config(LlmConfig::from(&config.llm));
    let coordinator = PrLifecycleCoordinator::new(Arc::new(host), synthesizer, shared_store(config));

    info!(issue = %args.issue, files = request.change_set.len(), mode = %args.mode, "synthesizing");
    let result = coordinator.synthesize_for_issue(args.issue, request).await?;
    report(result.outcome)?;
    if let Some(err) = result.bookkeeping_error {
        return Err(anyhow::Error::new(err)
            .context(format!("issue {} was not updated with the result above", args.issue)));
    }
    Ok(())
}

fn report(outcome: SynthesisOutcome) -> anyhow::Result<()> {
    match outcome {
        SynthesisOutcome::Published {
            reference,
            commit_sha,
            change_type,
        } => {
            println!("branch:  {}", reference.branch_name);
            println!("commit:  {commit_sha} ({change_type})");
            if let Some(link) = &reference.link {
                println!("pr:      {link}");
            }
            Ok(())
        }
        SynthesisOutcome::NoChanges { branch_name } => {
            println!("no changes to commit on {branch_name}");
            Ok(())
        }
        SynthesisOutcome::Failed {
            branch_name,
            stage,
            error,
        } => {
            if let Some(branch) = branch_name {
                eprintln!("branch {branch} was left on the host");
            }
            Err(anyhow::Error::new(error).context(format!("synthesis failed during {stage}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ps_core::types::FileStatus;

    use super::*;

    fn args(changes: PathBuf) -> Args {
        Args {
            issue: Uuid::new_v4(),
            changes,
            project: "acme".into(),
            feature: "login".into(),
            mode: UpdateMode::Partial,
            suffix: Some("7".into()),
        }
    }

    #[test]
    fn change_file_becomes_request() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"files":[{{"path":"a.rs","status":"new","content":"x"}},{{"path":"b.rs","status":"deleted"}}],"prTitle":"Add login"}}"#
        )
        .unwrap();
        let args = args(file.path().to_path_buf());
        let mut config = Config::default();
        config.github.base_branch = "develop".into();

        let response = read_changes(&args.changes).unwrap();
        let request = build_request(&config, &args, response);

        assert_eq!(request.change_set.len(), 2);
        assert_eq!(request.change_set.files()[1].status, FileStatus::Deleted);
        assert_eq!(request.pr_title.as_deref(), Some("Add login"));
        assert_eq!(request.base_branch, "develop");
        assert_eq!(request.update_mode, UpdateMode::Partial);
        assert_eq!(request.branch_suffix.as_deref(), Some("7"));
    }

    #[test]
    fn malformed_change_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = read_changes(&file.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("not a valid change file"));
    }
}
