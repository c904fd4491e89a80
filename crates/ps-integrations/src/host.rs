//! The version-control host capability.
//!
//! Everything the engine needs from a host (refs, trees, commits, contents,
//! compare/merge and pull requests) sits behind [`VcsHost`]. Adapters decide
//! the [`HostErrorKind`] once, at the boundary, so callers branch on the kind
//! instead of probing status codes.

use std::fmt;

use async_trait::async_trait;
use ps_core::types::TreeOperation;
use thiserror::Error;

use crate::types::{
    CommitInfo, Comparison, ContentKind, MergeOutcome, NewPullRequest, PullCommit, PullRequest,
    PullRequestUpdate,
};

// ---------------------------------------------------------------------------
// HostError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    NotFound,
    AlreadyExists,
    MergeConflict,
    Validation,
    RateLimited,
    Unauthorized,
    Transport,
    Api,
}

impl HostErrorKind {
    /// Classify an HTTP status returned by the host.
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            404 => HostErrorKind::NotFound,
            409 => HostErrorKind::MergeConflict,
            422 if message.to_ascii_lowercase().contains("already exists") => {
                HostErrorKind::AlreadyExists
            }
            422 => HostErrorKind::Validation,
            401 | 403 => HostErrorKind::Unauthorized,
            429 => HostErrorKind::RateLimited,
            _ => HostErrorKind::Api,
        }
    }
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostErrorKind::NotFound => "not found",
            HostErrorKind::AlreadyExists => "already exists",
            HostErrorKind::MergeConflict => "merge conflict",
            HostErrorKind::Validation => "validation failed",
            HostErrorKind::RateLimited => "rate limited",
            HostErrorKind::Unauthorized => "unauthorized",
            HostErrorKind::Transport => "transport error",
            HostErrorKind::Api => "api error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host {kind} (status {status:?}): {message}")]
pub struct HostError {
    pub kind: HostErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl HostError {
    pub fn new(kind: HostErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(HostErrorKind::from_status(status, &message), Some(status), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::NotFound, Some(404), message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::AlreadyExists, Some(422), message)
    }

    pub fn merge_conflict(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::MergeConflict, Some(409), message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Transport, None, message)
    }

    pub fn is(&self, kind: HostErrorKind) -> bool {
        self.kind == kind
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

// ---------------------------------------------------------------------------
// VcsHost
// ---------------------------------------------------------------------------

/// Operations against one repository on a version-control host.
///
/// Branch arguments are plain names (`feature/x`), never `refs/heads/...`.
#[async_trait]
pub trait VcsHost: Send + Sync {
    /// Current head sha of `branch`.
    async fn get_branch_sha(&self, branch: &str) -> HostResult<String>;

    /// Create `branch` pointing at `sha`. A taken name fails with
    /// [`HostErrorKind::AlreadyExists`].
    async fn create_branch(&self, branch: &str, sha: &str) -> HostResult<()>;

    /// Fast-forward `branch` to `sha`.
    async fn update_branch(&self, branch: &str, sha: &str) -> HostResult<()>;

    async fn get_commit(&self, sha: &str) -> HostResult<CommitInfo>;

    /// Create a tree on top of `base_tree`; returns the new tree sha.
    async fn create_tree(&self, base_tree: &str, operations: &[TreeOperation]) -> HostResult<String>;

    /// Create a commit; returns its sha.
    async fn create_commit(&self, message: &str, tree: &str, parents: &[String])
        -> HostResult<String>;

    /// Look up what exists at `path` on `branch`.
    async fn get_content(&self, path: &str, branch: &str) -> HostResult<ContentKind>;

    async fn compare(&self, base: &str, head: &str) -> HostResult<Comparison>;

    /// Merge `head` into `base`. A merge the host cannot perform automatically
    /// fails with [`HostErrorKind::MergeConflict`].
    async fn merge(&self, base: &str, head: &str, message: &str) -> HostResult<MergeOutcome>;

    async fn create_pull(&self, pull: &NewPullRequest) -> HostResult<PullRequest>;

    async fn update_pull(&self, number: u64, update: &PullRequestUpdate)
        -> HostResult<PullRequest>;

    async fn get_pull(&self, number: u64) -> HostResult<PullRequest>;

    async fn list_pull_commits(&self, number: u64) -> HostResult<Vec<PullCommit>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(HostErrorKind::from_status(404, ""), HostErrorKind::NotFound);
        assert_eq!(
            HostErrorKind::from_status(422, "Reference already exists"),
            HostErrorKind::AlreadyExists
        );
        assert_eq!(
            HostErrorKind::from_status(422, "Validation Failed"),
            HostErrorKind::Validation
        );
        assert_eq!(HostErrorKind::from_status(409, "Merge conflict"), HostErrorKind::MergeConflict);
        assert_eq!(HostErrorKind::from_status(403, ""), HostErrorKind::Unauthorized);
        assert_eq!(HostErrorKind::from_status(429, ""), HostErrorKind::RateLimited);
        assert_eq!(HostErrorKind::from_status(502, ""), HostErrorKind::Api);
    }

    #[test]
    fn display_includes_kind_and_status() {
        let err = HostError::not_found("no such ref");
        assert_eq!(err.to_string(), "host not found (status Some(404)): no such ref");
        assert!(err.is(HostErrorKind::NotFound));
    }
}
