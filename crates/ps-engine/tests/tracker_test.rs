use std::sync::Arc;

use ps_core::issue_store::{IssueStore, JsonIssueStore, MemoryIssueStore};
use ps_core::types::{ChangeType, IssueState};
use ps_engine::tracker::history_entries;
use ps_engine::{HistoryLabel, IterationTracker, SynthesisError};
use uuid::Uuid;

#[tokio::test]
async fn record_appends_and_keeps_count_in_sync() {
    let issue = IssueState::new("Add search");
    let id = issue.id;
    let store = Arc::new(MemoryIssueStore::new().with_issue(issue));
    let tracker = IterationTracker::new(store.clone());

    for (i, sha) in ["c1", "c2", "c3"].iter().enumerate() {
        let change_type = if i == 0 {
            ChangeType::Create
        } else {
            ChangeType::Update
        };
        let record = tracker
            .record(id, "acme/search", sha, change_type)
            .await
            .unwrap();
        assert_eq!(record.commit_sha, *sha);
    }

    let stored = store.load(id).await.unwrap().unwrap();
    assert_eq!(stored.iteration_count(), 3);
    assert_eq!(stored.change_history().len(), 3);
    let shas: Vec<_> = stored
        .change_history()
        .iter()
        .map(|r| r.commit_sha.as_str())
        .collect();
    assert_eq!(shas, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn record_on_unknown_issue_writes_nothing() {
    let store = Arc::new(MemoryIssueStore::new());
    let tracker = IterationTracker::new(store.clone());
    let id = Uuid::new_v4();

    let err = tracker
        .record(id, "acme/x", "c1", ChangeType::Create)
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::IssueNotFound(missing) if missing == id));
    assert!(store.load(id).await.unwrap().is_none());
}

#[tokio::test]
async fn history_is_newest_first_with_initial_last() {
    let mut issue = IssueState::new("Add search");
    for (sha, ct) in [
        ("c1", ChangeType::Create),
        ("c2", ChangeType::Update),
        ("c3", ChangeType::Update),
    ] {
        issue.append_iteration(ps_core::types::IterationRecord::now("acme/s", sha, ct));
    }

    let entries = history_entries(&issue);
    let labels: Vec<_> = entries.iter().map(|e| e.label).collect();
    assert_eq!(
        labels,
        vec![HistoryLabel::Update, HistoryLabel::Update, HistoryLabel::Initial]
    );
    assert_eq!(entries[0].record.commit_sha, "c3");
    assert_eq!(entries[2].record.commit_sha, "c1");
}

#[tokio::test]
async fn history_of_fresh_issue_is_empty() {
    let issue = IssueState::new("Nothing yet");
    let id = issue.id;
    let tracker = IterationTracker::new(Arc::new(MemoryIssueStore::new().with_issue(issue)));

    assert!(tracker.pr_history(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn records_survive_a_file_backed_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonIssueStore::new(dir.path()));
    let issue = IssueState::new("Persisted");
    let id = issue.id;
    store.save(&issue).await.unwrap();

    let tracker = IterationTracker::new(store.clone());
    tracker
        .record(id, "acme/p", "c1", ChangeType::Create)
        .await
        .unwrap();

    // A fresh store over the same directory sees the record.
    let reopened = IterationTracker::new(Arc::new(JsonIssueStore::new(dir.path())));
    let history = reopened.pr_history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].label, HistoryLabel::Initial);
    assert_eq!(history[0].record.branch_name, "acme/p");

    let json = serde_json::to_value(&history[0]).unwrap();
    assert_eq!(json["label"], "initial");
    assert_eq!(json["change_type"], "create");
}
