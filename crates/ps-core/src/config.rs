use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration loaded from `~/.prsynth/config.toml`.
///
/// **Security**: This struct NEVER stores API keys or tokens. Only the *names*
/// of the environment variables holding them are configured; see
/// [`CredentialProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub github: GitHubSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from `~/.prsynth/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            debug!(path = %path.display(), "config file missing, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.github.validate()?;
        self.llm.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        base_dir().join("config.toml")
    }
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".prsynth")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `"pretty"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "general.log_format must be \"pretty\" or \"json\", got {other:?}"
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

/// Repository coordinates for the version-control host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch that feature branches fork from and PRs target.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Env var name for the GitHub token (default: `GITHUB_TOKEN`).
    #[serde(default = "default_github_env")]
    pub token_env: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            base_branch: default_base_branch(),
            token_env: default_github_env(),
        }
    }
}

impl GitHubSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("github.owner", &self.owner), ("github.repo", &self.repo)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
        }
        if self.base_branch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "github.base_branch must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_base_branch() -> String {
    "main".into()
}
fn default_github_env() -> String {
    "GITHUB_TOKEN".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// `"anthropic"` or `"openai"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key_env: default_llm_env(),
            base_url: None,
        }
    }
}

impl LlmSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.provider.as_str(), "anthropic" | "openai") {
            return Err(ConfigError::Validation(format!(
                "llm.provider must be \"anthropic\" or \"openai\", got {:?}",
                self.provider
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Validation("llm.max_tokens must be > 0".into()));
        }
        Ok(())
    }
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-3-5-sonnet-20240620".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_env() -> String {
    "ANTHROPIC_API_KEY".into()
}

/// Window limits for outbound AI completion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.window_secs must be > 0".into(),
            ));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.max_requests must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_window_secs() -> u64 {
    60
}
fn default_max_requests() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_issues_dir")]
    pub issues_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            issues_dir: default_issues_dir(),
        }
    }
}

fn default_issues_dir() -> PathBuf {
    base_dir().join("issues")
}

// ---------------------------------------------------------------------------
// CredentialProvider
// ---------------------------------------------------------------------------

/// Reads credentials from environment variables at runtime.
///
/// Config stores env var *names*; this provider resolves them on demand.
pub struct CredentialProvider;

impl CredentialProvider {
    /// Read a credential from the named env var. Empty values count as unset.
    pub fn from_env(var_name: &str) -> Option<String> {
        std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
    }

    pub fn github_token(settings: &GitHubSettings) -> Option<String> {
        Self::from_env(&settings.token_env)
    }

    pub fn llm_api_key(settings: &LlmSettings) -> Option<String> {
        Self::from_env(&settings.api_key_env)
    }
}
