use std::sync::Arc;

use ps_core::types::BranchRef;
use ps_integrations::types::MergeOutcome;
use ps_integrations::{HostErrorKind, VcsHost};
use tracing::{error, info};

use crate::error::{Result, SynthesisError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The branch already contained the base head.
    UpToDate,
    /// The base was merged in; the branch head moved to `sha`.
    Merged { sha: String, behind_by: u64 },
}

/// Brings a feature branch up to date with its base before new changes land.
pub struct ConflictResolver {
    host: Arc<dyn VcsHost>,
}

impl ConflictResolver {
    pub fn new(host: Arc<dyn VcsHost>) -> Self {
        Self { host }
    }

    /// Merge `base_branch` into `branch` when the branch is behind it.
    ///
    /// A merge the host cannot do automatically is a
    /// [`SynthesisError::MergeConflict`] and is never retried.
    pub async fn resolve(&self, branch: &mut BranchRef, base_branch: &str) -> Result<Resolution> {
        let comparison = self.host.compare(base_branch, branch.name()).await?;
        if comparison.behind_by == 0 {
            return Ok(Resolution::UpToDate);
        }

        info!(
            branch = branch.name(),
            base = base_branch,
            behind_by = comparison.behind_by,
            "branch is behind base, merging"
        );

        let message = format!("Merge {} into {}", base_branch, branch.name());
        match self.host.merge(branch.name(), base_branch, &message).await {
            Ok(MergeOutcome::Merged { sha }) => {
                branch.advance(sha.clone());
                Ok(Resolution::Merged {
                    sha,
                    behind_by: comparison.behind_by,
                })
            }
            Ok(MergeOutcome::UpToDate) => Ok(Resolution::UpToDate),
            Err(err) if err.is(HostErrorKind::MergeConflict) => {
                error!(branch = branch.name(), base = base_branch, "merge conflict");
                Err(SynthesisError::MergeConflict {
                    branch: branch.name().to_string(),
                    base: base_branch.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
