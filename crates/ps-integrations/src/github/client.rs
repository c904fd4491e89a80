use octocrab::Octocrab;
use ps_core::config::GitHubSettings;
use thiserror::Error;

use crate::host::HostError;
use crate::types::GitHubConfig;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("missing GitHub token: set the variable named by github.token_env")]
    MissingToken,

    #[error("missing GitHub repository: set github.owner and github.repo")]
    MissingRepository,
}

pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub(crate) octocrab: Octocrab,
    pub(crate) owner: String,
    pub(crate) repo: String,
}

impl GitHubClient {
    /// Create a new `GitHubClient` from an explicit [`GitHubConfig`].
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let token = config.token.ok_or(GitHubError::MissingToken)?;

        let octocrab = Octocrab::builder().personal_token(token).build()?;

        Ok(Self {
            octocrab,
            owner: config.owner,
            repo: config.repo,
        })
    }

    /// Create a client for the repository named in `settings`, authenticated
    /// with `token` (usually resolved through `CredentialProvider`).
    pub fn from_settings(settings: &GitHubSettings, token: Option<String>) -> Result<Self> {
        let (Some(owner), Some(repo)) = (settings.owner.clone(), settings.repo.clone()) else {
            return Err(GitHubError::MissingRepository);
        };
        Self::new(GitHubConfig { token, owner, repo })
    }

    /// Returns the configured owner (org or user).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the configured repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `/repos/{owner}/{repo}` followed by `tail`.
    pub(crate) fn route(&self, tail: &str) -> String {
        format!("/repos/{}/{}{}", self.owner, self.repo, tail)
    }
}

/// Percent-encode each segment of a branch name or file path, keeping `/`.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decide the [`HostError`] kind for an octocrab failure.
pub(crate) fn host_error(err: octocrab::Error) -> HostError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            HostError::from_status(source.status_code.as_u16(), source.message.clone())
        }
        other => HostError::transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_creation_with_config() {
        let config = GitHubConfig {
            token: Some("ghp_test_token".to_string()),
            owner: "testowner".to_string(),
            repo: "testrepo".to_string(),
        };

        let client = GitHubClient::new(config).unwrap();
        assert_eq!(client.owner(), "testowner");
        assert_eq!(client.repo(), "testrepo");
        assert_eq!(client.route("/git/refs"), "/repos/testowner/testrepo/git/refs");
    }

    #[test]
    fn client_creation_missing_token() {
        let config = GitHubConfig {
            token: None,
            owner: "testowner".to_string(),
            repo: "testrepo".to_string(),
        };
        assert!(matches!(
            GitHubClient::new(config),
            Err(GitHubError::MissingToken)
        ));
    }

    #[test]
    fn settings_without_repository_are_rejected() {
        let settings = GitHubSettings::default();
        assert!(matches!(
            GitHubClient::from_settings(&settings, Some("t".into())),
            Err(GitHubError::MissingRepository)
        ));
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_path("docs/my file.md"), "docs/my%20file.md");
        assert_eq!(encode_path("acme/fix-bug"), "acme/fix-bug");
    }
}
