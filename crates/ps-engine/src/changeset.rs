//! Turns a [`ChangeSet`] into host tree operations.

use std::sync::Arc;

use ps_core::types::{ChangeSet, FileChange, FileStatus, TreeOperation};
use ps_integrations::types::ContentKind;
use ps_integrations::{HostErrorKind, VcsHost};
use tracing::{debug, warn};

use crate::error::{Result, SynthesisError};

/// Tree operations plus the change set with statuses as the host saw them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltChanges {
    /// One operation per input file, in input order.
    pub operations: Vec<TreeOperation>,
    /// The input with `modified` entries downgraded to `new` where the host
    /// had no file.
    pub resolved: ChangeSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Ready(BuiltChanges),
    /// Nothing to commit. Not an error.
    NoChanges,
}

pub struct ChangeSetBuilder {
    host: Arc<dyn VcsHost>,
}

impl ChangeSetBuilder {
    pub fn new(host: Arc<dyn VcsHost>) -> Self {
        Self { host }
    }

    /// Build tree operations for `change_set` against `branch`.
    ///
    /// A `modified` file the host does not know becomes `new`. A path that
    /// is a directory on the host fails with [`SynthesisError::PathConflict`].
    pub async fn build(&self, change_set: &ChangeSet, branch: &str) -> Result<BuildOutcome> {
        change_set
            .validate()
            .map_err(SynthesisError::InvalidChangeSet)?;

        let mut operations = Vec::with_capacity(change_set.len());
        let mut resolved = Vec::with_capacity(change_set.len());

        for change in change_set {
            let mut change = change.clone();
            match change.status {
                FileStatus::Modified => {
                    match self.host.get_content(&change.path, branch).await {
                        Ok(ContentKind::File { sha }) => {
                            debug!(path = %change.path, sha = %sha, "existing file found");
                        }
                        Ok(ContentKind::Directory) => {
                            return Err(SynthesisError::PathConflict { path: change.path });
                        }
                        Err(err) if err.is(HostErrorKind::NotFound) => {
                            warn!(path = %change.path, "file not found, treating as new");
                            change.status = FileStatus::New;
                        }
                        Err(err) => return Err(err.into()),
                    }
                    operations.push(write_operation(&change));
                }
                FileStatus::New => operations.push(write_operation(&change)),
                FileStatus::Deleted => operations.push(TreeOperation::remove(&change.path)),
            }
            resolved.push(change);
        }

        if operations.is_empty() {
            return Ok(BuildOutcome::NoChanges);
        }

        Ok(BuildOutcome::Ready(BuiltChanges {
            operations,
            resolved: ChangeSet::new(resolved),
        }))
    }
}

fn write_operation(change: &FileChange) -> TreeOperation {
    TreeOperation::write(&change.path, change.content_str())
}
