use serde::{Deserialize, Serialize};

use crate::diff::ParsedDiff;
use crate::types::{ChangeSet, FileStatus};

/// Per-file line counts fed to the commit-message prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub files: Vec<FileSummary>,
}

impl ChangeSummary {
    /// Summarise a change set. Without a prior version to diff against, every
    /// content line counts as an addition.
    pub fn from_change_set(change_set: &ChangeSet) -> Self {
        let files = change_set
            .iter()
            .map(|change| FileSummary {
                path: change.path.clone(),
                status: change.status,
                additions: change.content_str().lines().count(),
                deletions: 0,
            })
            .collect();
        Self { files }
    }

    pub fn from_parsed_diff(diff: &ParsedDiff) -> Self {
        let files = diff
            .files
            .iter()
            .map(|file| {
                let additions = file.additions();
                let deletions = file.deletions();
                let status = match (additions, deletions) {
                    (a, 0) if a > 0 => FileStatus::New,
                    (0, d) if d > 0 => FileStatus::Deleted,
                    _ => FileStatus::Modified,
                };
                FileSummary {
                    path: file.path.clone(),
                    status,
                    additions,
                    deletions,
                }
            })
            .collect();
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One `path (status, +A, -D)` line per file.
    pub fn describe(&self) -> String {
        self.files
            .iter()
            .map(|f| format!("{} ({}, +{}, -{})", f.path, f.status, f.additions, f.deletions))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
