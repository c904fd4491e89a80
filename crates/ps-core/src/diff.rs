//! Minimal unified-diff reader used to summarise changes for commit messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Addition,
    Deletion,
    Hunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    pub path: String,
    pub changes: Vec<DiffLine>,
}

impl DiffFile {
    pub fn additions(&self) -> usize {
        self.count(DiffLineKind::Addition)
    }

    pub fn deletions(&self) -> usize {
        self.count(DiffLineKind::Deletion)
    }

    fn count(&self, kind: DiffLineKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    pub files: Vec<DiffFile>,
}

/// Parse `git diff` output into per-file addition/deletion/hunk lines.
///
/// Lines before the first `diff --git` header and context lines are ignored.
pub fn parse_diff(diff: &str) -> ParsedDiff {
    let mut files = Vec::new();
    let mut current: Option<DiffFile> = None;

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            let path = line.split(" b/").nth(1).unwrap_or_default().to_string();
            current = Some(DiffFile {
                path,
                changes: Vec::new(),
            });
            continue;
        }

        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            file.changes.push(DiffLine {
                kind: DiffLineKind::Addition,
                content: rest.to_string(),
            });
        } else if let Some(rest) = line.strip_prefix('-') {
            file.changes.push(DiffLine {
                kind: DiffLineKind::Deletion,
                content: rest.to_string(),
            });
        } else if line.starts_with("@@ ") {
            file.changes.push(DiffLine {
                kind: DiffLineKind::Hunk,
                content: line.to_string(),
            });
        }
    }

    if let Some(file) = current {
        files.push(file);
    }

    ParsedDiff { files }
}
