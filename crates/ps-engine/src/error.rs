use ps_core::issue_store::IssueStoreError;
use ps_core::types::ModelError;
use ps_integrations::HostError;
use ps_intelligence::CommitMessageError;
use thiserror::Error;
use uuid::Uuid;

use crate::state::StageError;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("failed to create branch `{branch}`: {source}")]
    BranchCreation {
        branch: String,
        #[source]
        source: HostError,
    },

    #[error("branch `{branch}` cannot be merged with `{base}` automatically; resolve the conflict manually")]
    MergeConflict { branch: String, base: String },

    #[error("expected a file at `{path}` but found a directory")]
    PathConflict { path: String },

    #[error(transparent)]
    CommitMessageGeneration(#[from] CommitMessageError),

    #[error("issue {0} not found")]
    IssueNotFound(Uuid),

    #[error("invalid pull request reference: {0}")]
    InvalidReference(#[source] ModelError),

    #[error("invalid change set: {0}")]
    InvalidChangeSet(#[source] ModelError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("issue store error: {0}")]
    Store(#[from] IssueStoreError),

    #[error(transparent)]
    Stage(#[from] StageError),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
