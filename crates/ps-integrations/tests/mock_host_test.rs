use ps_core::types::TreeOperation;
use ps_integrations::types::{ContentKind, MergeOutcome, NewPullRequest, PullRequestUpdate};
use ps_integrations::{HostError, HostErrorKind, HostOp, MockHost, VcsHost};

#[tokio::test]
async fn creating_a_taken_branch_reports_already_exists() {
    let host = MockHost::new("main", "base").with_branch("acme/login", "abc");

    let err = host.create_branch("acme/login", "base").await.unwrap_err();
    assert!(err.is(HostErrorKind::AlreadyExists));
    assert_eq!(err.status, Some(422));

    host.create_branch("acme/signup", "base").await.unwrap();
    assert_eq!(host.branch_sha("acme/signup").as_deref(), Some("base"));
}

#[tokio::test]
async fn scripted_failures_are_consumed_in_order() {
    let host = MockHost::new("main", "base");
    host.fail_next(HostOp::GetBranchSha, HostError::transport("reset by peer"));

    assert!(host.get_branch_sha("main").await.unwrap_err().is(HostErrorKind::Transport));
    assert_eq!(host.get_branch_sha("main").await.unwrap(), "base");
    assert_eq!(host.call_count(HostOp::GetBranchSha), 2);
}

#[tokio::test]
async fn content_lookup_distinguishes_files_directories_and_missing() {
    let host = MockHost::new("main", "base")
        .with_file("src/lib.rs", "blob1")
        .with_directory("docs");

    assert_eq!(
        host.get_content("src/lib.rs", "main").await.unwrap(),
        ContentKind::File { sha: "blob1".into() }
    );
    assert_eq!(host.get_content("docs", "main").await.unwrap(), ContentKind::Directory);
    assert!(host
        .get_content("missing.rs", "main")
        .await
        .unwrap_err()
        .is(HostErrorKind::NotFound));
}

#[tokio::test]
async fn commit_chain_is_recorded() {
    let host = MockHost::new("main", "base");

    let info = host.get_commit("base").await.unwrap();
    assert_eq!(info.tree_sha, "tree-base");

    let tree = host
        .create_tree(&info.tree_sha, &[TreeOperation::write("a.txt", "x")])
        .await
        .unwrap();
    let commit = host
        .create_commit("Add a\n\n", &tree, &["base".to_string()])
        .await
        .unwrap();
    host.update_branch("main", &commit).await.unwrap();

    assert_eq!(host.branch_sha("main"), Some(commit.clone()));
    let commits = host.created_commits();
    assert_eq!(commits[0].parents, vec!["base".to_string()]);
    assert_eq!(host.trees()[0].base_tree, "tree-base");
    assert_eq!(host.get_commit(&commit).await.unwrap().tree_sha, tree);
}

#[tokio::test]
async fn merge_moves_the_target_branch() {
    let host = MockHost::new("main", "base").with_branch("acme/x", "feat");

    let outcome = host.merge("acme/x", "main", "sync").await.unwrap();
    let MergeOutcome::Merged { sha } = outcome else {
        panic!("expected a merge commit");
    };
    assert_eq!(host.branch_sha("acme/x"), Some(sha));
    assert_eq!(host.merges(), vec![("acme/x".to_string(), "main".to_string())]);
}

#[tokio::test]
async fn pulls_are_numbered_and_updatable() {
    let host = MockHost::new("main", "base").with_pull(7, "acme/old", "main");

    let created = host
        .create_pull(&NewPullRequest {
            title: "feature: Update for acme/x".into(),
            body: "body".into(),
            head: "acme/x".into(),
            base: "main".into(),
        })
        .await
        .unwrap();
    assert_eq!(created.number, 8);
    assert_eq!(created.html_url, "https://github.com/octo/demo/pull/8");

    let updated = host
        .update_pull(
            7,
            &PullRequestUpdate {
                title: "new title".into(),
                body: "new body".into(),
                head: "acme/old".into(),
                base: "main".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "new title");
    assert_eq!(host.get_pull(7).await.unwrap().body.as_deref(), Some("new body"));
    assert!(host.list_pull_commits(99).await.is_err());
    assert!(host.list_pull_commits(7).await.unwrap().is_empty());
}
