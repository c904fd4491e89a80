use std::sync::Arc;

use ps_core::types::{BranchRef, ChangeSet, FileChange, FileStatus, TreeOperation};
use ps_engine::branch::BranchNegotiator;
use ps_engine::changeset::{BuildOutcome, ChangeSetBuilder};
use ps_engine::conflict::{ConflictResolver, Resolution};
use ps_engine::SynthesisError;
use ps_integrations::{HostError, HostErrorKind, HostOp, MockHost};

// ===========================================================================
// BranchNegotiator
// ===========================================================================

#[tokio::test]
async fn negotiator_creates_branch_at_base_head() {
    let host = Arc::new(MockHost::new("main", "base"));
    let negotiator = BranchNegotiator::new(host.clone());

    let branch = negotiator
        .create("Acme Web", "Login Form", Some("42"), "main")
        .await
        .unwrap();

    assert_eq!(branch.name(), "acme-web/login-form-42");
    assert_eq!(branch.base_sha(), "base");
    assert_eq!(branch.head_sha(), "base");
    assert_eq!(host.branch_sha("acme-web/login-form-42").as_deref(), Some("base"));
}

#[tokio::test]
async fn negotiator_retries_collision_once_with_timestamped_name() {
    let host = Arc::new(MockHost::new("main", "base").with_branch("acme/login", "old"));
    let negotiator = BranchNegotiator::new(host.clone());

    let branch = negotiator.create("acme", "login", None, "main").await.unwrap();

    assert!(branch.name().starts_with("acme/login-"));
    assert!(branch.name().ends_with("-retry"));
    assert_eq!(host.call_count(HostOp::CreateBranch), 2);
    assert_eq!(host.branch_sha(branch.name()).as_deref(), Some("base"));
}

#[tokio::test]
async fn negotiator_second_collision_is_fatal() {
    let host = Arc::new(MockHost::new("main", "base"));
    host.fail_next(HostOp::CreateBranch, HostError::already_exists("Reference already exists"));
    host.fail_next(HostOp::CreateBranch, HostError::already_exists("Reference already exists"));
    let negotiator = BranchNegotiator::new(host.clone());

    let err = negotiator.create("acme", "login", None, "main").await.unwrap_err();

    match err {
        SynthesisError::BranchCreation { branch, source } => {
            assert!(branch.ends_with("-retry"));
            assert!(source.is(HostErrorKind::AlreadyExists));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(host.call_count(HostOp::CreateBranch), 2);
}

#[tokio::test]
async fn negotiator_does_not_retry_other_failures() {
    let host = Arc::new(MockHost::new("main", "base"));
    host.fail_next(
        HostOp::CreateBranch,
        HostError::from_status(403, "Resource not accessible by integration"),
    );
    let negotiator = BranchNegotiator::new(host.clone());

    let err = negotiator.create("acme", "login", None, "main").await.unwrap_err();

    assert!(matches!(err, SynthesisError::BranchCreation { .. }));
    assert_eq!(host.call_count(HostOp::CreateBranch), 1);
}

#[tokio::test]
async fn negotiator_missing_base_is_a_host_error() {
    let host = Arc::new(MockHost::new("main", "base"));
    let negotiator = BranchNegotiator::new(host.clone());

    let err = negotiator.create("acme", "login", None, "develop").await.unwrap_err();

    assert!(matches!(err, SynthesisError::Host(e) if e.is(HostErrorKind::NotFound)));
    assert_eq!(host.call_count(HostOp::CreateBranch), 0);
}

// ===========================================================================
// ChangeSetBuilder
// ===========================================================================

#[tokio::test]
async fn builder_downgrades_missing_modified_file_to_new() {
    let host = Arc::new(MockHost::new("main", "base"));
    let builder = ChangeSetBuilder::new(host.clone());
    let cs = ChangeSet::new(vec![FileChange::modified("a.ts", "x")]);

    let BuildOutcome::Ready(built) = builder.build(&cs, "acme/x").await.unwrap() else {
        panic!("expected operations");
    };

    assert_eq!(built.operations, vec![TreeOperation::write("a.ts", "x")]);
    assert_eq!(built.resolved.files()[0].status, FileStatus::New);
    assert_eq!(host.call_count(HostOp::GetContent), 1);
}

#[tokio::test]
async fn builder_emits_one_operation_per_file_in_order() {
    let host = Arc::new(MockHost::new("main", "base").with_file("src/lib.rs", "blob1"));
    let builder = ChangeSetBuilder::new(host.clone());
    let cs = ChangeSet::new(vec![
        FileChange::deleted("old.rs"),
        FileChange::modified("src/lib.rs", "pub mod a;\n"),
        FileChange::new_file("src/a.rs", "pub fn a() {}\n"),
    ]);

    let BuildOutcome::Ready(built) = builder.build(&cs, "acme/x").await.unwrap() else {
        panic!("expected operations");
    };

    assert_eq!(built.operations.len(), cs.len());
    assert_eq!(built.operations[0], TreeOperation::remove("old.rs"));
    assert!(built.operations[0].is_removal());
    assert_eq!(built.operations[1].content(), Some("pub mod a;\n"));
    assert_eq!(built.operations[2].path, "src/a.rs");
    assert_eq!(built.resolved.files()[1].status, FileStatus::Modified);
    // Only the modified entry is looked up.
    assert_eq!(host.call_count(HostOp::GetContent), 1);
}

#[tokio::test]
async fn builder_rejects_directory_paths() {
    let host = Arc::new(MockHost::new("main", "base").with_directory("src"));
    let builder = ChangeSetBuilder::new(host);
    let cs = ChangeSet::new(vec![FileChange::modified("src", "x")]);

    let err = builder.build(&cs, "acme/x").await.unwrap_err();
    assert!(matches!(err, SynthesisError::PathConflict { path } if path == "src"));
}

#[tokio::test]
async fn builder_propagates_other_lookup_errors() {
    let host = Arc::new(MockHost::new("main", "base"));
    host.fail_next(HostOp::GetContent, HostError::from_status(500, "boom"));
    let builder = ChangeSetBuilder::new(host);
    let cs = ChangeSet::new(vec![FileChange::modified("a.rs", "x")]);

    let err = builder.build(&cs, "acme/x").await.unwrap_err();
    assert!(matches!(err, SynthesisError::Host(e) if e.status == Some(500)));
}

#[tokio::test]
async fn builder_empty_set_is_no_changes() {
    let host = Arc::new(MockHost::new("main", "base"));
    let builder = ChangeSetBuilder::new(host.clone());

    let outcome = builder.build(&ChangeSet::default(), "acme/x").await.unwrap();
    assert_eq!(outcome, BuildOutcome::NoChanges);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn builder_rejects_content_on_deletion() {
    let host = Arc::new(MockHost::new("main", "base"));
    let builder = ChangeSetBuilder::new(host);
    let cs = ChangeSet::new(vec![FileChange {
        path: "a.rs".into(),
        status: FileStatus::Deleted,
        content: Some("x".into()),
    }]);

    let err = builder.build(&cs, "acme/x").await.unwrap_err();
    assert!(matches!(err, SynthesisError::InvalidChangeSet(_)));
}

// ===========================================================================
// ConflictResolver
// ===========================================================================

#[tokio::test]
async fn resolver_leaves_current_branch_alone() {
    let host = Arc::new(MockHost::new("main", "base").with_branch("acme/x", "feat"));
    let resolver = ConflictResolver::new(host.clone());
    let mut branch = BranchRef::existing("acme/x", "base", "feat");

    let resolution = resolver.resolve(&mut branch, "main").await.unwrap();

    assert_eq!(resolution, Resolution::UpToDate);
    assert_eq!(host.call_count(HostOp::Merge), 0);
    assert_eq!(branch.head_sha(), "feat");
}

#[tokio::test]
async fn resolver_merges_base_when_behind() {
    let host = Arc::new(
        MockHost::new("main", "base")
            .with_branch("acme/x", "feat")
            .with_comparison("main", "acme/x", 1, 3),
    );
    let resolver = ConflictResolver::new(host.clone());
    let mut branch = BranchRef::existing("acme/x", "base", "feat");

    let resolution = resolver.resolve(&mut branch, "main").await.unwrap();

    let Resolution::Merged { sha, behind_by } = resolution else {
        panic!("expected a merge");
    };
    assert_eq!(behind_by, 3);
    assert_eq!(branch.head_sha(), sha);
    assert_eq!(host.merges(), vec![("acme/x".to_string(), "main".to_string())]);
}

#[tokio::test]
async fn resolver_reports_merge_conflict() {
    let host = Arc::new(
        MockHost::new("main", "base")
            .with_branch("acme/x", "feat")
            .with_comparison("main", "acme/x", 0, 1),
    );
    host.fail_next(HostOp::Merge, HostError::merge_conflict("Merge conflict"));
    let resolver = ConflictResolver::new(host.clone());
    let mut branch = BranchRef::existing("acme/x", "base", "feat");

    let err = resolver.resolve(&mut branch, "main").await.unwrap_err();

    assert!(matches!(
        err,
        SynthesisError::MergeConflict { ref branch, ref base } if branch == "acme/x" && base == "main"
    ));
    assert_eq!(host.call_count(HostOp::Merge), 1);
    assert_eq!(branch.head_sha(), "feat");
}
