//! In-memory [`VcsHost`] for tests.
//!
//! Branches, commits, files and pull requests live in a mutex-guarded map.
//! Failures are scripted per operation with [`MockHost::fail_next`] and every
//! call is appended to a log that tests can assert on.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ps_core::types::TreeOperation;

use crate::host::{HostError, HostResult, VcsHost};
use crate::types::{
    CommitInfo, Comparison, ContentKind, MergeOutcome, NewPullRequest, PullCommit, PullRequest,
    PullRequestUpdate,
};

/// One [`VcsHost`] operation, used to script failures and read the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    GetBranchSha,
    CreateBranch,
    UpdateBranch,
    GetCommit,
    CreateTree,
    CreateCommit,
    GetContent,
    Compare,
    Merge,
    CreatePull,
    UpdatePull,
    GetPull,
    ListPullCommits,
}

/// A tree the mock was asked to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTree {
    pub sha: String,
    pub base_tree: String,
    pub operations: Vec<TreeOperation>,
}

/// A commit the mock was asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub sha: String,
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
}

#[derive(Default)]
struct MockState {
    branches: HashMap<String, String>,
    /// commit sha -> tree sha
    commits: HashMap<String, String>,
    /// Content lookups ignore the ref.
    files: HashMap<String, ContentKind>,
    comparisons: HashMap<(String, String), Comparison>,
    pulls: BTreeMap<u64, PullRequest>,
    pull_commits: HashMap<u64, Vec<PullCommit>>,
    failures: HashMap<HostOp, VecDeque<HostError>>,
    calls: Vec<HostOp>,
    trees: Vec<RecordedTree>,
    created_commits: Vec<RecordedCommit>,
    merges: Vec<(String, String)>,
    next_id: u64,
}

impl MockState {
    fn sha(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }
}

pub struct MockHost {
    owner: String,
    repo: String,
    state: Mutex<MockState>,
}

impl MockHost {
    /// A repository whose `base_branch` points at `base_sha` (with tree
    /// `tree-{base_sha}`).
    pub fn new(base_branch: &str, base_sha: &str) -> Self {
        let mut state = MockState::default();
        state
            .branches
            .insert(base_branch.to_string(), base_sha.to_string());
        state
            .commits
            .insert(base_sha.to_string(), format!("tree-{base_sha}"));
        Self {
            owner: "octo".to_string(),
            repo: "demo".to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn with_branch(self, branch: &str, sha: &str) -> Self {
        {
            let mut state = self.lock();
            state.branches.insert(branch.to_string(), sha.to_string());
            state
                .commits
                .entry(sha.to_string())
                .or_insert_with(|| format!("tree-{sha}"));
        }
        self
    }

    pub fn with_file(self, path: &str, sha: &str) -> Self {
        self.lock().files.insert(
            path.to_string(),
            ContentKind::File {
                sha: sha.to_string(),
            },
        );
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.lock()
            .files
            .insert(path.to_string(), ContentKind::Directory);
        self
    }

    pub fn with_comparison(self, base: &str, head: &str, ahead_by: u64, behind_by: u64) -> Self {
        self.lock().comparisons.insert(
            (base.to_string(), head.to_string()),
            Comparison { ahead_by, behind_by },
        );
        self
    }

    pub fn with_pull(self, number: u64, head: &str, base: &str) -> Self {
        {
            let mut state = self.lock();
            let pull = PullRequest {
                number,
                html_url: self.pull_url(number),
                title: format!("PR {number}"),
                body: None,
                head: head.to_string(),
                base: base.to_string(),
            };
            state.pulls.insert(number, pull);
        }
        self
    }

    pub fn with_pull_commits(self, number: u64, commits: Vec<PullCommit>) -> Self {
        self.lock().pull_commits.insert(number, commits);
        self
    }

    /// Fail the next call to `op` with `error`. Queued failures are consumed
    /// in order.
    pub fn fail_next(&self, op: HostOp, error: HostError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    pub fn calls(&self) -> Vec<HostOp> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: HostOp) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn branch_sha(&self, branch: &str) -> Option<String> {
        self.lock().branches.get(branch).cloned()
    }

    pub fn trees(&self) -> Vec<RecordedTree> {
        self.lock().trees.clone()
    }

    pub fn created_commits(&self) -> Vec<RecordedCommit> {
        self.lock().created_commits.clone()
    }

    /// `(base, head)` pairs passed to `merge`.
    pub fn merges(&self) -> Vec<(String, String)> {
        self.lock().merges.clone()
    }

    pub fn pull(&self, number: u64) -> Option<PullRequest> {
        self.lock().pulls.get(&number).cloned()
    }

    fn pull_url(&self, number: u64) -> String {
        format!("https://github.com/{}/{}/pull/{number}", self.owner, self.repo)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and pop a scripted failure, if any.
    fn enter(&self, op: HostOp) -> HostResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(op);
        if let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }
}

#[async_trait]
impl VcsHost for MockHost {
    async fn get_branch_sha(&self, branch: &str) -> HostResult<String> {
        let state = self.enter(HostOp::GetBranchSha)?;
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("branch {branch} not found")))
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> HostResult<()> {
        let mut state = self.enter(HostOp::CreateBranch)?;
        if state.branches.contains_key(branch) {
            return Err(HostError::already_exists("Reference already exists"));
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn update_branch(&self, branch: &str, sha: &str) -> HostResult<()> {
        let mut state = self.enter(HostOp::UpdateBranch)?;
        match state.branches.get_mut(branch) {
            Some(head) => {
                *head = sha.to_string();
                Ok(())
            }
            None => Err(HostError::not_found(format!("branch {branch} not found"))),
        }
    }

    async fn get_commit(&self, sha: &str) -> HostResult<CommitInfo> {
        let state = self.enter(HostOp::GetCommit)?;
        state
            .commits
            .get(sha)
            .map(|tree| CommitInfo {
                sha: sha.to_string(),
                tree_sha: tree.clone(),
            })
            .ok_or_else(|| HostError::not_found(format!("commit {sha} not found")))
    }

    async fn create_tree(&self, base_tree: &str, operations: &[TreeOperation]) -> HostResult<String> {
        let mut state = self.enter(HostOp::CreateTree)?;
        let sha = state.sha("tree-");
        state.trees.push(RecordedTree {
            sha: sha.clone(),
            base_tree: base_tree.to_string(),
            operations: operations.to_vec(),
        });
        Ok(sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> HostResult<String> {
        let mut state = self.enter(HostOp::CreateCommit)?;
        let sha = state.sha("commit-");
        state.commits.insert(sha.clone(), tree.to_string());
        state.created_commits.push(RecordedCommit {
            sha: sha.clone(),
            message: message.to_string(),
            tree: tree.to_string(),
            parents: parents.to_vec(),
        });
        Ok(sha)
    }

    async fn get_content(&self, path: &str, _branch: &str) -> HostResult<ContentKind> {
        let state = self.enter(HostOp::GetContent)?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::not_found("Not Found"))
    }

    async fn compare(&self, base: &str, head: &str) -> HostResult<Comparison> {
        let state = self.enter(HostOp::Compare)?;
        Ok(state
            .comparisons
            .get(&(base.to_string(), head.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn merge(&self, base: &str, head: &str, _message: &str) -> HostResult<MergeOutcome> {
        let mut state = self.enter(HostOp::Merge)?;
        state.merges.push((base.to_string(), head.to_string()));
        if !state.branches.contains_key(base) {
            return Err(HostError::not_found(format!("branch {base} not found")));
        }
        let sha = state.sha("merge-");
        state.commits.insert(sha.clone(), format!("tree-{sha}"));
        state.branches.insert(base.to_string(), sha.clone());
        Ok(MergeOutcome::Merged { sha })
    }

    async fn create_pull(&self, pull: &NewPullRequest) -> HostResult<PullRequest> {
        let mut state = self.enter(HostOp::CreatePull)?;
        let number = state.pulls.keys().next_back().copied().unwrap_or(0) + 1;
        let created = PullRequest {
            number,
            html_url: self.pull_url(number),
            title: pull.title.clone(),
            body: Some(pull.body.clone()),
            head: pull.head.clone(),
            base: pull.base.clone(),
        };
        state.pulls.insert(number, created.clone());
        Ok(created)
    }

    async fn update_pull(
        &self,
        number: u64,
        update: &PullRequestUpdate,
    ) -> HostResult<PullRequest> {
        let mut state = self.enter(HostOp::UpdatePull)?;
        let pull = state
            .pulls
            .get_mut(&number)
            .ok_or_else(|| HostError::not_found(format!("pull {number} not found")))?;
        pull.title = update.title.clone();
        pull.body = Some(update.body.clone());
        pull.head = update.head.clone();
        pull.base = update.base.clone();
        Ok(pull.clone())
    }

    async fn get_pull(&self, number: u64) -> HostResult<PullRequest> {
        let state = self.enter(HostOp::GetPull)?;
        state
            .pulls
            .get(&number)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("pull {number} not found")))
    }

    async fn list_pull_commits(&self, number: u64) -> HostResult<Vec<PullCommit>> {
        let state = self.enter(HostOp::ListPullCommits)?;
        if !state.pulls.contains_key(&number) {
            return Err(HostError::not_found(format!("pull {number} not found")));
        }
        Ok(state.pull_commits.get(&number).cloned().unwrap_or_default())
    }
}
