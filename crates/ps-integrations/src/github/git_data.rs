//! Git data API (refs, trees, commits, contents) plus compare and merge,
//! wired into [`VcsHost`] for [`GitHubClient`].

use async_trait::async_trait;
use ps_core::types::{TreeAction, TreeOperation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{HostError, HostResult, VcsHost};
use crate::types::{
    CommitInfo, Comparison, ContentKind, MergeOutcome, NewPullRequest, PullCommit, PullRequest,
    PullRequestUpdate,
};

use super::client::{encode_path, host_error, GitHubClient};
use super::pull_requests;

// ---- wire types -------------------------------------------------------------

#[derive(Deserialize)]
struct RefObject {
    object: RefTarget,
}

#[derive(Deserialize)]
struct RefTarget {
    sha: String,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct GitCommit {
    sha: String,
    tree: ShaOnly,
}

#[derive(Deserialize)]
struct CompareResponse {
    ahead_by: u64,
    behind_by: u64,
}

#[derive(Serialize)]
struct RefParam<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

/// Tree entry as the trees endpoint expects it. Removal is `sha: null` with no
/// content.
fn tree_entry(op: &TreeOperation) -> serde_json::Value {
    match &op.action {
        TreeAction::Write(content) => serde_json::json!({
            "path": op.path,
            "mode": op.mode.as_str(),
            "type": op.kind.as_str(),
            "content": content,
        }),
        TreeAction::Remove => serde_json::json!({
            "path": op.path,
            "mode": op.mode.as_str(),
            "type": op.kind.as_str(),
            "sha": serde_json::Value::Null,
        }),
    }
}

fn content_kind(value: &serde_json::Value) -> HostResult<ContentKind> {
    if value.is_array() {
        return Ok(ContentKind::Directory);
    }
    match value.get("type").and_then(|t| t.as_str()) {
        Some("dir") => Ok(ContentKind::Directory),
        _ => value
            .get("sha")
            .and_then(|s| s.as_str())
            .map(|sha| ContentKind::File {
                sha: sha.to_string(),
            })
            .ok_or_else(|| HostError::transport("contents response without sha")),
    }
}

// ---- VcsHost ----------------------------------------------------------------

#[async_trait]
impl VcsHost for GitHubClient {
    async fn get_branch_sha(&self, branch: &str) -> HostResult<String> {
        let route = self.route(&format!("/git/ref/heads/{}", encode_path(branch)));
        let reference: RefObject = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(host_error)?;
        Ok(reference.object.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> HostResult<()> {
        let body = serde_json::json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": sha,
        });
        let _: serde_json::Value = self
            .octocrab
            .post(self.route("/git/refs"), Some(&body))
            .await
            .map_err(host_error)?;
        debug!(branch, sha, "created branch");
        Ok(())
    }

    async fn update_branch(&self, branch: &str, sha: &str) -> HostResult<()> {
        let route = self.route(&format!("/git/refs/heads/{}", encode_path(branch)));
        let body = serde_json::json!({ "sha": sha, "force": false });
        let _: serde_json::Value = self
            .octocrab
            .patch(route, Some(&body))
            .await
            .map_err(host_error)?;
        Ok(())
    }

    async fn get_commit(&self, sha: &str) -> HostResult<CommitInfo> {
        let commit: GitCommit = self
            .octocrab
            .get(self.route(&format!("/git/commits/{sha}")), None::<&()>)
            .await
            .map_err(host_error)?;
        Ok(CommitInfo {
            sha: commit.sha,
            tree_sha: commit.tree.sha,
        })
    }

    async fn create_tree(&self, base_tree: &str, operations: &[TreeOperation]) -> HostResult<String> {
        let body = serde_json::json!({
            "base_tree": base_tree,
            "tree": operations.iter().map(tree_entry).collect::<Vec<_>>(),
        });
        let tree: ShaOnly = self
            .octocrab
            .post(self.route("/git/trees"), Some(&body))
            .await
            .map_err(host_error)?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> HostResult<String> {
        let body = serde_json::json!({
            "message": message,
            "tree": tree,
            "parents": parents,
        });
        let commit: ShaOnly = self
            .octocrab
            .post(self.route("/git/commits"), Some(&body))
            .await
            .map_err(host_error)?;
        Ok(commit.sha)
    }

    async fn get_content(&self, path: &str, branch: &str) -> HostResult<ContentKind> {
        let route = self.route(&format!("/contents/{}", encode_path(path)));
        let value: serde_json::Value = self
            .octocrab
            .get(route, Some(&RefParam { git_ref: branch }))
            .await
            .map_err(host_error)?;
        content_kind(&value)
    }

    async fn compare(&self, base: &str, head: &str) -> HostResult<Comparison> {
        let route = self.route(&format!(
            "/compare/{}...{}",
            encode_path(base),
            encode_path(head)
        ));
        let cmp: CompareResponse = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(host_error)?;
        Ok(Comparison {
            ahead_by: cmp.ahead_by,
            behind_by: cmp.behind_by,
        })
    }

    async fn merge(&self, base: &str, head: &str, message: &str) -> HostResult<MergeOutcome> {
        let body = serde_json::json!({
            "base": base,
            "head": head,
            "commit_message": message,
        });
        let result: Result<ShaOnly, octocrab::Error> =
            self.octocrab.post(self.route("/merges"), Some(&body)).await;
        match result {
            Ok(commit) => Ok(MergeOutcome::Merged { sha: commit.sha }),
            // 204 No Content: nothing to merge, so there is no body to decode.
            Err(octocrab::Error::Json { .. }) => Ok(MergeOutcome::UpToDate),
            Err(err) => Err(host_error(err)),
        }
    }

    async fn create_pull(&self, pull: &NewPullRequest) -> HostResult<PullRequest> {
        pull_requests::create_pull_request(self, pull)
            .await
            .map_err(host_error)
    }

    async fn update_pull(
        &self,
        number: u64,
        update: &PullRequestUpdate,
    ) -> HostResult<PullRequest> {
        pull_requests::update_pull_request(self, number, update)
            .await
            .map_err(host_error)
    }

    async fn get_pull(&self, number: u64) -> HostResult<PullRequest> {
        pull_requests::get_pull_request(self, number)
            .await
            .map_err(host_error)
    }

    async fn list_pull_commits(&self, number: u64) -> HostResult<Vec<PullCommit>> {
        pull_requests::list_pull_commits(self, number)
            .await
            .map_err(host_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_entry_carries_content() {
        let entry = tree_entry(&TreeOperation::write("src/a.rs", "fn a() {}"));
        assert_eq!(entry["path"], "src/a.rs");
        assert_eq!(entry["mode"], "100644");
        assert_eq!(entry["type"], "blob");
        assert_eq!(entry["content"], "fn a() {}");
        assert!(entry.get("sha").is_none());
    }

    #[test]
    fn removal_entry_has_null_sha_and_no_content() {
        let entry = tree_entry(&TreeOperation::remove("old.txt"));
        assert!(entry["sha"].is_null());
        assert!(entry.get("content").is_none());
    }

    #[test]
    fn contents_array_is_a_directory() {
        let value = serde_json::json!([{ "name": "a.rs", "type": "file" }]);
        assert_eq!(content_kind(&value).unwrap(), ContentKind::Directory);
    }

    #[test]
    fn contents_object_is_a_file() {
        let value = serde_json::json!({ "type": "file", "sha": "abc123" });
        assert_eq!(
            content_kind(&value).unwrap(),
            ContentKind::File {
                sha: "abc123".into()
            }
        );
    }
}
