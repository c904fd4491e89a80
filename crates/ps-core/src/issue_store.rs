//! Issue persistence seam.
//!
//! The engine only needs to read an issue by id and write it back; schema and
//! querying belong to whoever owns the issue records. Two implementations are
//! provided: a JSON-file store (one file per issue) and an in-memory store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::types::IssueState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IssueStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Load an issue. `Ok(None)` when it does not exist.
    async fn load(&self, id: Uuid) -> Result<Option<IssueState>, IssueStoreError>;

    /// Persist an issue, replacing any previous version (last write wins).
    async fn save(&self, issue: &IssueState) -> Result<(), IssueStoreError>;
}

// ---------------------------------------------------------------------------
// JsonIssueStore
// ---------------------------------------------------------------------------

/// File-system-backed issue persistence.
///
/// Issues are stored as individual JSON files under a configurable directory
/// (defaults to `~/.prsynth/issues/`). Writes go through a temp file and a
/// rename so a reader never observes a half-written record.
pub struct JsonIssueStore {
    base_dir: PathBuf,
}

impl JsonIssueStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn issue_path(&self, id: &Uuid) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }

    /// All stored issues, oldest first. A missing directory holds no issues.
    pub async fn list(&self) -> Result<Vec<IssueState>, IssueStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut issues: Vec<IssueState> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let data = tokio::fs::read_to_string(&path).await?;
                issues.push(serde_json::from_str(&data)?);
            }
        }
        issues.sort_by_key(|issue| issue.created_at);
        Ok(issues)
    }
}

#[async_trait]
impl IssueStore for JsonIssueStore {
    async fn load(&self, id: Uuid) -> Result<Option<IssueState>, IssueStoreError> {
        let data = match tokio::fs::read_to_string(self.issue_path(&id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn save(&self, issue: &IssueState) -> Result<(), IssueStoreError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let path = self.issue_path(&issue.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(issue)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(issue = %issue.id, path = %path.display(), "issue saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryIssueStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryIssueStore {
    issues: Mutex<HashMap<Uuid, IssueState>>,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, issue: IssueState) -> Self {
        self.lock().insert(issue.id, issue);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, IssueState>> {
        self.issues.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn load(&self, id: Uuid) -> Result<Option<IssueState>, IssueStoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn save(&self, issue: &IssueState) -> Result<(), IssueStoreError> {
        self.lock().insert(issue.id, issue.clone());
        Ok(())
    }
}
