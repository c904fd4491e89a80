use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Violations of the data-model invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("file `{path}` has status {status} but no content")]
    MissingContent { path: String, status: FileStatus },

    #[error("file `{path}` is deleted but carries content")]
    UnexpectedContent { path: String },

    #[error("pull request reference for `{branch}` has number {number} but no link")]
    NumberWithoutLink { branch: String, number: u64 },

    #[error("unknown {kind}: `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// FileStatus / FileChange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::New => "new",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
        };
        write!(f, "{}", label)
    }
}

/// One AI-proposed edit to a single path.
///
/// `content` is present iff the status is not [`FileStatus::Deleted`]. Values
/// built through the constructors always hold; deserialized values should be
/// checked with [`FileChange::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileChange {
    pub fn new_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::New,
            content: Some(content.into()),
        }
    }

    pub fn modified(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Modified,
            content: Some(content.into()),
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Deleted,
            content: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match (self.status, &self.content) {
            (FileStatus::Deleted, Some(_)) => Err(ModelError::UnexpectedContent {
                path: self.path.clone(),
            }),
            (FileStatus::Deleted, None) => Ok(()),
            (status, None) => Err(ModelError::MissingContent {
                path: self.path.clone(),
                status,
            }),
            (_, Some(_)) => Ok(()),
        }
    }

    /// Content as a string slice, empty for deletions.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Ordered list of file changes produced by the AI response parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    files: Vec<FileChange>,
}

impl ChangeSet {
    pub fn new(files: Vec<FileChange>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileChange> {
        self.files.iter()
    }

    /// Check the content/status invariant on every entry.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.files.iter().try_for_each(FileChange::validate)
    }
}

impl From<Vec<FileChange>> for ChangeSet {
    fn from(files: Vec<FileChange>) -> Self {
        Self::new(files)
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FileChange;
    type IntoIter = std::slice::Iter<'a, FileChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// The structured output of the AI response parser: the proposed files plus
/// an optional explicit pull-request title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiParsedResponse {
    pub files: ChangeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,
}

// ---------------------------------------------------------------------------
// TreeOperation
// ---------------------------------------------------------------------------

/// Git file mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEntryMode {
    #[serde(rename = "100644")]
    Blob,
}

impl TreeEntryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeEntryMode::Blob => "100644",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    Blob,
}

impl TreeEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeEntryKind::Blob => "blob",
        }
    }
}

/// What a tree entry does at its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeAction {
    /// Write the literal content as a new blob.
    Write(String),
    /// Remove whatever is at the path (`sha: null` on the host).
    Remove,
}

/// Host-level tree entry emitted for exactly one [`FileChange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOperation {
    pub path: String,
    pub mode: TreeEntryMode,
    pub kind: TreeEntryKind,
    pub action: TreeAction,
}

impl TreeOperation {
    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: TreeEntryMode::Blob,
            kind: TreeEntryKind::Blob,
            action: TreeAction::Write(content.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: TreeEntryMode::Blob,
            kind: TreeEntryKind::Blob,
            action: TreeAction::Remove,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.action {
            TreeAction::Write(content) => Some(content),
            TreeAction::Remove => None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.action, TreeAction::Remove)
    }
}

// ---------------------------------------------------------------------------
// BranchRef
// ---------------------------------------------------------------------------

/// A feature branch created (or adopted) for one synthesis attempt.
///
/// The name and base sha never change; only the head advances as commits land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    name: String,
    base_sha: String,
    head_sha: String,
}

impl BranchRef {
    /// A branch that currently points at `base_sha`.
    pub fn new(name: impl Into<String>, base_sha: impl Into<String>) -> Self {
        let base_sha = base_sha.into();
        Self {
            name: name.into(),
            head_sha: base_sha.clone(),
            base_sha,
        }
    }

    /// An existing branch whose head has already moved past its base.
    pub fn existing(
        name: impl Into<String>,
        base_sha: impl Into<String>,
        head_sha: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_sha: base_sha.into(),
            head_sha: head_sha.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_sha(&self) -> &str {
        &self.base_sha
    }

    pub fn head_sha(&self) -> &str {
        &self.head_sha
    }

    pub fn advance(&mut self, sha: impl Into<String>) {
        self.head_sha = sha.into();
    }
}

// ---------------------------------------------------------------------------
// PrReference
// ---------------------------------------------------------------------------

/// Where a synthesized pull request lives.
///
/// `number == None` means the PR was not created. A number without a link is
/// invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrReference {
    pub number: Option<u64>,
    pub link: Option<String>,
    pub branch_name: String,
}

impl PrReference {
    /// A branch with no pull request (yet).
    pub fn unpublished(branch_name: impl Into<String>) -> Self {
        Self {
            number: None,
            link: None,
            branch_name: branch_name.into(),
        }
    }

    pub fn published(number: u64, link: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self {
            number: Some(number),
            link: Some(link.into()),
            branch_name: branch_name.into(),
        }
    }

    /// Build a reference from a PR link, taking the number from the last path
    /// segment (`.../pull/42` -> 42). Any query or fragment is ignored. A
    /// non-numeric tail leaves the number empty.
    pub fn from_link(link: impl Into<String>, branch_name: impl Into<String>) -> Self {
        let link = link.into();
        let path = link.split(['?', '#']).next().unwrap_or_default();
        let number = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|tail| tail.parse::<u64>().ok());
        Self {
            number,
            link: Some(link),
            branch_name: branch_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match (self.number, &self.link) {
            (Some(number), None) => Err(ModelError::NumberWithoutLink {
                branch: self.branch_name.clone(),
                number,
            }),
            _ => Ok(()),
        }
    }

    pub fn is_published(&self) -> bool {
        self.number.is_some()
    }
}

// ---------------------------------------------------------------------------
// UpdateMode / ChangeType
// ---------------------------------------------------------------------------

/// How a synthesis request relates to earlier iterations of the same issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Discard any prior PR; fresh branch, commit and PR.
    #[default]
    Full,
    /// Amend the existing PR's branch with a targeted commit.
    Partial,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Full => write!(f, "full"),
            UpdateMode::Partial => write!(f, "partial"),
        }
    }
}

impl FromStr for UpdateMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(UpdateMode::Full),
            "partial" => Ok(UpdateMode::Partial),
            other => Err(ModelError::UnknownVariant {
                kind: "update mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Update => write!(f, "update"),
        }
    }
}

impl FromStr for ChangeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(ChangeType::Create),
            "update" => Ok(ChangeType::Update),
            other => Err(ModelError::UnknownVariant {
                kind: "change type",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// IterationRecord / IssueState
// ---------------------------------------------------------------------------

/// One immutable entry of an issue's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub timestamp: DateTime<Utc>,
    pub branch_name: String,
    pub commit_sha: String,
    pub change_type: ChangeType,
}

impl IterationRecord {
    pub fn now(
        branch_name: impl Into<String>,
        commit_sha: impl Into<String>,
        change_type: ChangeType,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            branch_name: branch_name.into(),
            commit_sha: commit_sha.into(),
            change_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueStatus::Pending => "pending",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Completed => "completed",
            IssueStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// The slice of an issue record this engine reads and writes.
///
/// The history is append-only and `iteration_count` always equals its length;
/// both are only reachable through [`IssueState::append_iteration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueState {
    pub id: Uuid,
    pub title: String,
    pub status: IssueStatus,
    pub pr_link: Option<String>,
    pub pr_branch: Option<String>,
    iteration_count: u32,
    change_history: Vec<IterationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueState {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: IssueStatus::Pending,
            pr_link: None,
            pr_branch: None,
            iteration_count: 0,
            change_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn change_history(&self) -> &[IterationRecord] {
        &self.change_history
    }

    /// Append one audit record and bump the iteration counter.
    pub fn append_iteration(&mut self, record: IterationRecord) {
        self.updated_at = record.timestamp;
        self.change_history.push(record);
        self.iteration_count = self.change_history.len() as u32;
    }

    /// The PR reference currently attached to this issue, if any.
    pub fn pr_reference(&self) -> Option<PrReference> {
        match (&self.pr_link, &self.pr_branch) {
            (Some(link), Some(branch)) => Some(PrReference::from_link(link.clone(), branch.clone())),
            (None, Some(branch)) => Some(PrReference::unpublished(branch.clone())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_with_content_is_rejected() {
        let change = FileChange {
            path: "a.rs".into(),
            status: FileStatus::Deleted,
            content: Some("x".into()),
        };
        assert!(matches!(
            change.validate(),
            Err(ModelError::UnexpectedContent { .. })
        ));
    }

    #[test]
    fn modified_without_content_is_rejected() {
        let change = FileChange {
            path: "a.rs".into(),
            status: FileStatus::Modified,
            content: None,
        };
        assert!(matches!(
            change.validate(),
            Err(ModelError::MissingContent { status: FileStatus::Modified, .. })
        ));
    }

    #[test]
    fn branch_ref_advance_keeps_base() {
        let mut branch = BranchRef::new("proj/feat", "abc");
        branch.advance("def");
        assert_eq!(branch.base_sha(), "abc");
        assert_eq!(branch.head_sha(), "def");
    }

    #[test]
    fn append_iteration_keeps_count_in_sync() {
        let mut issue = IssueState::new("Add login");
        issue.append_iteration(IterationRecord::now("p/f", "sha1", ChangeType::Create));
        issue.append_iteration(IterationRecord::now("p/f", "sha2", ChangeType::Update));
        assert_eq!(issue.iteration_count(), 2);
        assert_eq!(issue.change_history().len(), 2);
        assert_eq!(issue.change_history()[1].commit_sha, "sha2");
    }
}
