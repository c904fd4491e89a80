//! Per-issue audit trail of synthesized commits.

use std::fmt;
use std::sync::Arc;

use ps_core::issue_store::IssueStore;
use ps_core::types::{ChangeType, IssueState, IterationRecord};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, SynthesisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryLabel {
    Initial,
    Update,
}

impl fmt::Display for HistoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryLabel::Initial => write!(f, "initial"),
            HistoryLabel::Update => write!(f, "update"),
        }
    }
}

/// One row of an issue's PR history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub label: HistoryLabel,
    #[serde(flatten)]
    pub record: IterationRecord,
}

pub struct IterationTracker {
    store: Arc<dyn IssueStore>,
}

impl IterationTracker {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn load(&self, issue_id: Uuid) -> Result<IssueState> {
        self.store
            .load(issue_id)
            .await?
            .ok_or(SynthesisError::IssueNotFound(issue_id))
    }

    pub(crate) async fn save(&self, issue: &IssueState) -> Result<()> {
        self.store.save(issue).await?;
        Ok(())
    }

    /// Append an iteration record stamped now and bump the issue's counter.
    ///
    /// Unknown issues fail with [`SynthesisError::IssueNotFound`] and nothing
    /// is written.
    pub async fn record(
        &self,
        issue_id: Uuid,
        branch_name: &str,
        commit_sha: &str,
        change_type: ChangeType,
    ) -> Result<IterationRecord> {
        let mut issue = self.load(issue_id).await?;
        let record = IterationRecord::now(branch_name, commit_sha, change_type);
        issue.append_iteration(record.clone());
        self.save(&issue).await?;

        info!(
            issue = %issue_id,
            branch = branch_name,
            commit = commit_sha,
            change_type = %change_type,
            iteration = issue.iteration_count(),
            "iteration recorded"
        );
        Ok(record)
    }

    /// The issue's history, newest first. The oldest record is `initial`.
    pub async fn pr_history(&self, issue_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let issue = self.load(issue_id).await?;
        Ok(history_entries(&issue))
    }
}

pub fn history_entries(issue: &IssueState) -> Vec<HistoryEntry> {
    issue
        .change_history()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, record)| HistoryEntry {
            label: if i == 0 {
                HistoryLabel::Initial
            } else {
                HistoryLabel::Update
            },
            record: record.clone(),
        })
        .collect()
}
