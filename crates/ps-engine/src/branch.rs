//! Branch naming and creation.

use std::sync::Arc;

use chrono::Utc;
use ps_core::types::BranchRef;
use ps_integrations::{HostErrorKind, VcsHost};
use tracing::{info, warn};

use crate::error::{Result, SynthesisError};

/// Longest project or feature component kept in a branch name.
pub const BRANCH_PART_MAX_CHARS: usize = 30;

fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut in_run = false;
    for c in part.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out.chars().take(BRANCH_PART_MAX_CHARS).collect()
}

/// Derive `"{project}/{feature}"` (plus `-{suffix}`) from free-form names.
///
/// Both parts are lowercased, every run of characters outside `[a-z0-9]`
/// becomes a single `-`, and each part is cut to
/// [`BRANCH_PART_MAX_CHARS`]. Pure: equal inputs give equal names.
pub fn generate_branch_name(project: &str, feature: &str, suffix: Option<&str>) -> String {
    let mut name = format!("{}/{}", sanitize(project), sanitize(feature));
    if let Some(suffix) = suffix {
        name.push('-');
        name.push_str(suffix);
    }
    name
}

/// Suffix used for the single retry after a name collision.
fn retry_suffix() -> String {
    format!("{}-retry", Utc::now().timestamp_millis())
}

// ---------------------------------------------------------------------------
// BranchNegotiator
// ---------------------------------------------------------------------------

pub struct BranchNegotiator {
    host: Arc<dyn VcsHost>,
}

impl BranchNegotiator {
    pub fn new(host: Arc<dyn VcsHost>) -> Self {
        Self { host }
    }

    /// Create a feature branch off the current head of `base_branch`.
    ///
    /// A name collision is retried exactly once under a timestamped `-retry`
    /// name. Any other failure, or a second failure, is a
    /// [`SynthesisError::BranchCreation`].
    pub async fn create(
        &self,
        project: &str,
        feature: &str,
        suffix: Option<&str>,
        base_branch: &str,
    ) -> Result<BranchRef> {
        let base_sha = self.host.get_branch_sha(base_branch).await?;
        let name = generate_branch_name(project, feature, suffix);

        match self.host.create_branch(&name, &base_sha).await {
            Ok(()) => {
                info!(branch = %name, base = base_branch, sha = %base_sha, "branch created");
                Ok(BranchRef::new(name, base_sha))
            }
            Err(err) if err.is(HostErrorKind::AlreadyExists) => {
                let retry = generate_branch_name(project, feature, Some(&retry_suffix()));
                warn!(branch = %name, retry = %retry, "branch name taken, retrying");
                self.host
                    .create_branch(&retry, &base_sha)
                    .await
                    .map_err(|source| SynthesisError::BranchCreation {
                        branch: retry.clone(),
                        source,
                    })?;
                info!(branch = %retry, base = base_branch, sha = %base_sha, "branch created");
                Ok(BranchRef::new(retry, base_sha))
            }
            Err(source) => Err(SynthesisError::BranchCreation {
                branch: name,
                source,
            }),
        }
    }

    /// Adopt an existing branch, reading its head and the base head.
    pub async fn adopt(&self, branch: &str, base_branch: &str) -> Result<BranchRef> {
        let base_sha = self.host.get_branch_sha(base_branch).await?;
        let head_sha = self.host.get_branch_sha(branch).await?;
        info!(branch, head = %head_sha, "reusing existing branch");
        Ok(BranchRef::existing(branch, base_sha, head_sha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_runs_collapse_to_single_dash() {
        assert_eq!(
            generate_branch_name("My Project!", "Fix Bug", Some("123")),
            "my-project-/fix-bug-123"
        );
    }

    #[test]
    fn no_suffix_means_no_trailing_dash() {
        assert_eq!(generate_branch_name("Acme", "Login Form", None), "acme/login-form");
    }

    #[test]
    fn each_part_is_cut_to_thirty_chars() {
        let name = generate_branch_name(&"a".repeat(45), &"Feature ".repeat(10), None);
        let (project, feature) = name.split_once('/').unwrap();
        assert_eq!(project.len(), 30);
        assert_eq!(feature.len(), 30);
        assert!(feature.starts_with("feature-feature-"));
    }

    #[test]
    fn non_ascii_letters_are_replaced() {
        assert_eq!(generate_branch_name("Café", "Über  cool", None), "caf-/-ber-cool");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = generate_branch_name("Proj", "Feat", Some("7"));
        let b = generate_branch_name("Proj", "Feat", Some("7"));
        assert_eq!(a, b);
    }

    #[test]
    fn retry_suffix_is_marked() {
        assert!(retry_suffix().ends_with("-retry"));
    }
}
