use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{NewPullRequest, PullCommit, PullRequest, PullRequestUpdate};

use super::client::GitHubClient;

type OctoResult<T> = std::result::Result<T, octocrab::Error>;

/// Get a single pull request by number.
pub async fn get_pull_request(client: &GitHubClient, number: u64) -> OctoResult<PullRequest> {
    let pr = client
        .octocrab
        .pulls(&client.owner, &client.repo)
        .get(number)
        .await?;

    Ok(octocrab_pr_to_pull_request(pr))
}

/// Create a new pull request.
pub async fn create_pull_request(
    client: &GitHubClient,
    pull: &NewPullRequest,
) -> OctoResult<PullRequest> {
    let pr = client
        .octocrab
        .pulls(&client.owner, &client.repo)
        .create(&pull.title, &pull.head, &pull.base)
        .body(&pull.body)
        .send()
        .await?;

    Ok(octocrab_pr_to_pull_request(pr))
}

/// Update title, body and base of an open pull request.
///
/// GitHub does not allow moving a pull request to another head branch, so
/// `update.head` is only checked against the current head by callers.
pub async fn update_pull_request(
    client: &GitHubClient,
    number: u64,
    update: &PullRequestUpdate,
) -> OctoResult<PullRequest> {
    let route = client.route(&format!("/pulls/{number}"));
    let body = serde_json::json!({
        "title": update.title,
        "body": update.body,
        "base": update.base,
    });

    let pr: octocrab::models::pulls::PullRequest =
        client.octocrab.patch(route, Some(&body)).await?;

    Ok(octocrab_pr_to_pull_request(pr))
}

#[derive(Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

/// List the commits on a pull request, oldest first.
pub async fn list_pull_commits(client: &GitHubClient, number: u64) -> OctoResult<Vec<PullCommit>> {
    let route = client.route(&format!("/pulls/{number}/commits"));
    let entries: Vec<CommitEntry> = client.octocrab.get(route, None::<&()>).await?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let (author, date) = match entry.commit.author {
                Some(a) => (a.name, a.date),
                None => (None, None),
            };
            PullCommit {
                sha: entry.sha,
                message: entry.commit.message,
                author,
                date,
            }
        })
        .collect())
}

// ---- internal helpers -------------------------------------------------------

fn octocrab_pr_to_pull_request(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        title: pr.title.unwrap_or_default(),
        body: pr.body,
        head: pr.head.ref_field,
        base: pr.base.ref_field,
    }
}
