//! PrLifecycleCoordinator -- runs one synthesis attempt from change set to
//! published pull request.
//!
//! Stages run strictly in order (see [`SynthesisStage`]). The coordinator is
//! the only place that turns errors into a structured
//! [`SynthesisOutcome::Failed`]; every component below it propagates.
//!
//! Nothing here serializes attempts: two concurrent runs against the same
//! issue or branch can overwrite each other's commits, so callers keep one
//! active run per issue.

use std::sync::Arc;

use chrono::Utc;
use ps_core::issue_store::IssueStore;
use ps_core::summary::ChangeSummary;
use ps_core::types::{
    AiParsedResponse, BranchRef, ChangeSet, ChangeType, IssueStatus, PrReference, UpdateMode,
};
use ps_integrations::types::{NewPullRequest, PullCommit, PullRequestUpdate};
use ps_integrations::VcsHost;
use ps_intelligence::CommitMessageSynthesizer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::branch::BranchNegotiator;
use crate::changeset::{BuildOutcome, ChangeSetBuilder};
use crate::conflict::{ConflictResolver, Resolution};
use crate::error::{Result, SynthesisError};
use crate::state::{SynthesisStage, SynthesisStateMachine};
use crate::title::pr_title;
use crate::tracker::IterationTracker;

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub change_set: ChangeSet,
    /// Used verbatim as the PR title when present.
    pub pr_title: Option<String>,
    pub project: String,
    pub feature: String,
    pub update_mode: UpdateMode,
    /// Only consulted in [`UpdateMode::Partial`].
    pub existing_pr: Option<PrReference>,
    pub base_branch: String,
    /// Disambiguator appended to a freshly negotiated branch name.
    pub branch_suffix: Option<String>,
}

impl SynthesisRequest {
    pub fn new(change_set: ChangeSet, project: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            change_set,
            pr_title: None,
            project: project.into(),
            feature: feature.into(),
            update_mode: UpdateMode::Full,
            existing_pr: None,
            base_branch: "main".to_string(),
            branch_suffix: None,
        }
    }

    /// Request built from a parsed AI response (files plus optional title).
    pub fn from_response(
        response: AiParsedResponse,
        project: impl Into<String>,
        feature: impl Into<String>,
    ) -> Self {
        let mut request = Self::new(response.files, project, feature);
        request.pr_title = response.pr_title;
        request
    }

    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn with_existing_pr(mut self, reference: PrReference) -> Self {
        self.existing_pr = Some(reference);
        self
    }

    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = base_branch.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.pr_title = Some(title.into());
        self
    }

    pub fn with_branch_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.branch_suffix = Some(suffix.into());
        self
    }

    /// The reference to amend, if this request reuses an existing branch.
    fn reused_reference(&self) -> Option<&PrReference> {
        match self.update_mode {
            UpdateMode::Partial => self.existing_pr.as_ref(),
            UpdateMode::Full => None,
        }
    }
}

#[derive(Debug)]
pub enum SynthesisOutcome {
    Published {
        reference: PrReference,
        commit_sha: String,
        change_type: ChangeType,
    },
    /// The change set built to nothing; no tree, commit or PR was made.
    NoChanges { branch_name: String },
    Failed {
        /// Set when a branch exists on the host, so it can be found later.
        branch_name: Option<String>,
        stage: SynthesisStage,
        error: SynthesisError,
    },
}

impl SynthesisOutcome {
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            SynthesisOutcome::Published { reference, .. } => Some(&reference.branch_name),
            SynthesisOutcome::NoChanges { branch_name } => Some(branch_name),
            SynthesisOutcome::Failed { branch_name, .. } => branch_name.as_deref(),
        }
    }

    /// Only a published outcome carries a link.
    pub fn pr_link(&self) -> Option<&str> {
        match self {
            SynthesisOutcome::Published { reference, .. } => reference.link.as_deref(),
            _ => None,
        }
    }

    pub fn pr_reference(&self) -> Option<PrReference> {
        match self {
            SynthesisOutcome::Published { reference, .. } => Some(reference.clone()),
            other => other.branch_name().map(PrReference::unpublished),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SynthesisOutcome::Failed { .. })
    }
}

/// Result of [`PrLifecycleCoordinator::synthesize_for_issue`].
#[derive(Debug)]
pub struct IssueSynthesis {
    pub outcome: SynthesisOutcome,
    /// Set when the outcome could not be written back to the issue record.
    pub bookkeeping_error: Option<SynthesisError>,
}

// ---------------------------------------------------------------------------
// Attempt bookkeeping
// ---------------------------------------------------------------------------

struct Attempt {
    machine: SynthesisStateMachine,
    branch_name: Option<String>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            machine: SynthesisStateMachine::new(),
            branch_name: None,
        }
    }

    fn enter(&mut self, stage: SynthesisStage) -> Result<()> {
        self.machine.transition(stage)?;
        info!(stage = %stage, branch = ?self.branch_name, "synthesis stage");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PrLifecycleCoordinator
// ---------------------------------------------------------------------------

pub struct PrLifecycleCoordinator {
    host: Arc<dyn VcsHost>,
    negotiator: BranchNegotiator,
    resolver: ConflictResolver,
    builder: ChangeSetBuilder,
    synthesizer: CommitMessageSynthesizer,
    tracker: IterationTracker,
}

impl PrLifecycleCoordinator {
    pub fn new(
        host: Arc<dyn VcsHost>,
        synthesizer: CommitMessageSynthesizer,
        store: Arc<dyn IssueStore>,
    ) -> Self {
        Self {
            negotiator: BranchNegotiator::new(host.clone()),
            resolver: ConflictResolver::new(host.clone()),
            builder: ChangeSetBuilder::new(host.clone()),
            host,
            synthesizer,
            tracker: IterationTracker::new(store),
        }
    }

    pub fn tracker(&self) -> &IterationTracker {
        &self.tracker
    }

    /// Run one synthesis attempt. Failures come back as
    /// [`SynthesisOutcome::Failed`], never as an `Err`.
    pub async fn synthesize_pr(&self, request: &SynthesisRequest) -> SynthesisOutcome {
        let mut attempt = Attempt::new();
        match self.run(request, &mut attempt).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let stage = attempt.machine.state();
                error!(
                    stage = %stage,
                    branch = ?attempt.branch_name,
                    error = %err,
                    "synthesis failed"
                );
                // A failed transition only means we were already terminal.
                let _ = attempt.machine.transition(SynthesisStage::Failed);
                SynthesisOutcome::Failed {
                    branch_name: attempt.branch_name,
                    stage,
                    error: err,
                }
            }
        }
    }

    async fn run(&self, request: &SynthesisRequest, attempt: &mut Attempt) -> Result<SynthesisOutcome> {
        info!(
            stage = %attempt.machine.state(),
            project = %request.project,
            feature = %request.feature,
            mode = %request.update_mode,
            "synthesis stage"
        );
        let reused = request.reused_reference();
        if let Some(reference) = reused {
            reference
                .validate()
                .map_err(SynthesisError::InvalidReference)?;
        } else if request.existing_pr.is_some() {
            debug!(mode = %request.update_mode, "full regeneration ignores the existing reference");
        }

        let mut branch: BranchRef = match reused {
            Some(reference) => {
                self.negotiator
                    .adopt(&reference.branch_name, &request.base_branch)
                    .await?
            }
            None => {
                self.negotiator
                    .create(
                        &request.project,
                        &request.feature,
                        request.branch_suffix.as_deref(),
                        &request.base_branch,
                    )
                    .await?
            }
        };
        attempt.branch_name = Some(branch.name().to_string());

        // Resolving
        if reused.is_some() {
            attempt.enter(SynthesisStage::Resolving)?;
            if let Resolution::Merged { sha, behind_by } =
                self.resolver.resolve(&mut branch, &request.base_branch).await?
            {
                info!(branch = branch.name(), sha = %sha, behind_by, "base merged into branch");
            }
        }

        // Building
        attempt.enter(SynthesisStage::Building)?;
        let built = match self.builder.build(&request.change_set, branch.name()).await? {
            BuildOutcome::Ready(built) => built,
            BuildOutcome::NoChanges => {
                attempt.enter(SynthesisStage::Done)?;
                info!(branch = branch.name(), "no changes to commit, skipping PR");
                return Ok(SynthesisOutcome::NoChanges {
                    branch_name: branch.name().to_string(),
                });
            }
        };

        // Synthesizing
        attempt.enter(SynthesisStage::Synthesizing)?;
        let summary = ChangeSummary::from_change_set(&built.resolved);
        let message = self
            .synthesizer
            .synthesize(&summary, request.update_mode)
            .await?;

        // Committing
        attempt.enter(SynthesisStage::Committing)?;
        let parent = branch.head_sha().to_string();
        let parent_commit = self.host.get_commit(&parent).await?;
        let tree = self
            .host
            .create_tree(&parent_commit.tree_sha, &built.operations)
            .await?;
        let commit_sha = self
            .host
            .create_commit(&message, &tree, std::slice::from_ref(&parent))
            .await?;
        self.host.update_branch(branch.name(), &commit_sha).await?;
        branch.advance(commit_sha.clone());
        info!(branch = branch.name(), commit = %commit_sha, files = built.operations.len(), "commit created");

        // Publishing
        attempt.enter(SynthesisStage::Publishing)?;
        let title = pr_title(request.pr_title.as_deref(), &request.change_set, branch.name());
        let existing = reused.and_then(|r| r.number.map(|n| (n, r)));

        let (reference, change_type) = match existing {
            Some((number, previous)) => {
                let pull = self
                    .host
                    .update_pull(
                        number,
                        &PullRequestUpdate {
                            title,
                            body: message,
                            head: branch.name().to_string(),
                            base: request.base_branch.clone(),
                        },
                    )
                    .await?;
                let link = if pull.html_url.is_empty() {
                    previous.link.clone().unwrap_or_default()
                } else {
                    pull.html_url
                };
                info!(number, branch = branch.name(), "pull request updated");
                (
                    PrReference::published(number, link, branch.name()),
                    ChangeType::Update,
                )
            }
            None => {
                let pull = self
                    .host
                    .create_pull(&NewPullRequest {
                        title,
                        body: message,
                        head: branch.name().to_string(),
                        base: request.base_branch.clone(),
                    })
                    .await?;
                info!(number = pull.number, branch = branch.name(), "pull request created");
                (
                    PrReference::published(pull.number, pull.html_url, branch.name()),
                    ChangeType::Create,
                )
            }
        };

        attempt.enter(SynthesisStage::Done)?;
        Ok(SynthesisOutcome::Published {
            reference,
            commit_sha,
            change_type,
        })
    }

    /// Run a synthesis on behalf of an issue and keep its record in step.
    ///
    /// The issue is `in_progress` while the pipeline runs. A published PR is
    /// recorded as an iteration and stored on the issue; no changes leaves
    /// the PR fields alone; a failure marks the issue `failed`. A partial
    /// request without a reference amends the PR already stored on the issue.
    ///
    /// Only a missing issue or a store failure before the pipeline starts is
    /// an `Err`. Once the pipeline has run its outcome is always returned;
    /// a failure to write it back is carried in
    /// [`IssueSynthesis::bookkeeping_error`] and the issue is marked `failed`
    /// on a best-effort basis, keeping any published PR link.
    pub async fn synthesize_for_issue(
        &self,
        issue_id: Uuid,
        mut request: SynthesisRequest,
    ) -> Result<IssueSynthesis> {
        let mut issue = self.tracker.load(issue_id).await?;
        if request.existing_pr.is_none() && request.update_mode == UpdateMode::Partial {
            request.existing_pr = issue.pr_reference();
        }
        issue.status = IssueStatus::InProgress;
        issue.updated_at = Utc::now();
        self.tracker.save(&issue).await?;

        let outcome = self.synthesize_pr(&request).await;

        let bookkeeping_error = match self.write_back(issue_id, &outcome).await {
            Ok(()) => None,
            Err(err) => {
                error!(
                    issue = %issue_id,
                    branch = ?outcome.branch_name(),
                    pr = ?outcome.pr_link(),
                    error = %err,
                    "failed to store synthesis result on issue"
                );
                self.mark_failed(issue_id, &outcome).await;
                Some(err)
            }
        };

        Ok(IssueSynthesis {
            outcome,
            bookkeeping_error,
        })
    }

    async fn write_back(&self, issue_id: Uuid, outcome: &SynthesisOutcome) -> Result<()> {
        if let SynthesisOutcome::Published {
            reference,
            commit_sha,
            change_type,
        } = outcome
        {
            self.tracker
                .record(issue_id, &reference.branch_name, commit_sha, *change_type)
                .await?;
        }

        let mut issue = self.tracker.load(issue_id).await?;
        match outcome {
            SynthesisOutcome::Published { reference, .. } => {
                issue.pr_link = reference.link.clone();
                issue.pr_branch = Some(reference.branch_name.clone());
                issue.status = IssueStatus::Completed;
            }
            SynthesisOutcome::NoChanges { .. } => issue.status = IssueStatus::Completed,
            SynthesisOutcome::Failed { .. } => issue.status = IssueStatus::Failed,
        }
        issue.updated_at = Utc::now();
        self.tracker.save(&issue).await?;
        info!(issue = %issue_id, status = %issue.status, "issue updated");
        Ok(())
    }

    /// Best-effort `failed` status after a write-back error. A published PR
    /// is still attached so a later partial run can find it.
    async fn mark_failed(&self, issue_id: Uuid, outcome: &SynthesisOutcome) {
        let result: Result<()> = async {
            let mut issue = self.tracker.load(issue_id).await?;
            if let SynthesisOutcome::Published { reference, .. } = outcome {
                issue.pr_link = reference.link.clone();
                issue.pr_branch = Some(reference.branch_name.clone());
            }
            issue.status = IssueStatus::Failed;
            issue.updated_at = Utc::now();
            self.tracker.save(&issue).await
        }
        .await;
        if let Err(err) = result {
            warn!(issue = %issue_id, error = %err, "could not mark issue failed");
        }
    }

    /// Commits of a pull request, oldest first.
    pub async fn pull_request_commits(&self, number: u64) -> Result<Vec<PullCommit>> {
        Ok(self.host.list_pull_commits(number).await?)
    }
}
