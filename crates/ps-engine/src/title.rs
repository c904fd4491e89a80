//! Pull-request title derivation.

use ps_core::types::ChangeSet;

fn any_content(change_set: &ChangeSet, needles: &[&str]) -> bool {
    change_set.iter().any(|f| {
        let content = f.content_str().to_lowercase();
        needles.iter().any(|n| content.contains(n))
    })
}

fn any_path(change_set: &ChangeSet, needle: &str) -> bool {
    change_set
        .iter()
        .any(|f| f.path.to_lowercase().contains(needle))
}

/// Conventional prefix for a change set.
///
/// First match wins: feature > bug > docs > refactor > test > update.
pub fn classify(change_set: &ChangeSet) -> &'static str {
    if any_content(change_set, &["new feature", "enhancement"]) {
        "feature:"
    } else if any_content(change_set, &["bug fix", "fixes issue"]) {
        "bug:"
    } else if any_path(change_set, "docs") {
        "docs:"
    } else if any_content(change_set, &["refactor"]) {
        "refactor:"
    } else if any_path(change_set, "test") {
        "test:"
    } else {
        "update:"
    }
}

/// The explicit title when there is one, else `"{prefix} Update for {branch}"`.
pub fn pr_title(explicit: Option<&str>, change_set: &ChangeSet, branch: &str) -> String {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => format!("{} Update for {}", classify(change_set), branch),
    }
}
