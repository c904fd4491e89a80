use ps_core::config::Config;
use ps_core::issue_store::IssueStore;
use ps_core::types::{ChangeType, IssueState};
use ps_engine::IterationTracker;
use uuid::Uuid;

use super::{issue_store, shared_store};

/// Run the `new-issue` subcommand: store an empty issue and print its id.
pub async fn create(config: &Config, title: &str) -> anyhow::Result<()> {
    let issue = IssueState::new(title);
    issue_store(config).save(&issue).await?;
    println!("{}", issue.id);
    Ok(())
}

/// Run the `issues` subcommand.
pub async fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let issues = issue_store(config).list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }
    for issue in &issues {
        println!(
            "{}  {:<12} {}",
            issue.id,
            issue.status.to_string(),
            pr_column(issue)
        );
        println!("    {}", issue.title);
    }
    Ok(())
}

fn pr_column(issue: &IssueState) -> String {
    match issue.pr_reference() {
        Some(pr) if pr.is_published() => format!(
            "#{} {}",
            pr.number.unwrap_or_default(),
            pr.link.unwrap_or_default()
        ),
        Some(pr) => pr.branch_name,
        None => "-".to_string(),
    }
}

/// Run the `record` subcommand.
pub async fn record(
    config: &Config,
    issue: Uuid,
    branch: &str,
    sha: &str,
    change_type: ChangeType,
) -> anyhow::Result<()> {
    let tracker = IterationTracker::new(shared_store(config));
    let record = tracker.record(issue, branch, sha, change_type).await?;
    println!(
        "recorded {} {} on {} at {}",
        record.change_type,
        record.commit_sha,
        record.branch_name,
        record.timestamp.to_rfc3339()
    );
    Ok(())
}

/// Run the `history` subcommand.
pub async fn history(config: &Config, issue: Uuid, json: bool) -> anyhow::Result<()> {
    let tracker = IterationTracker::new(shared_store(config));
    let entries = tracker.pr_history(issue).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no iterations recorded for {issue}");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:<8} {}  {:<40} {} ({})",
            entry.label,
            entry.record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.record.branch_name,
            entry.record.commit_sha,
            entry.record.change_type,
        );
    }
    Ok(())
}
