//! Runtime configuration for the night cycle.
//!
//! Settings are layered: `night-cycle.toml` → environment → CLI flags.
//! Credentials and the repository identifier are only ever read from the
//! environment (a `.env` file is honoured by the binary through `dotenvy`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [cycle]
//! extension = ".py"
//! commits = 50
//! delay_secs = 5
//! dry_run = false
//!
//! [completion]
//! model = "gpt-4"
//! base_url = "https://api.openai.com/v1"
//! timeout_secs = 120
//!
//! [github]
//! api_url = "https://api.github.com"
//! local_root = "/srv/checkouts/project"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "night-cycle.toml";

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_REPO_NAME: &str = "REPO_NAME";

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_EXTENSION: &str = ".py";
const DEFAULT_COMMITS: usize = 50;
const DEFAULT_DELAY_SECS: u64 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// `owner/name` identifier of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Parse `owner/name`. Exactly two non-empty segments are accepted.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Ok(Self {
                owner: parts[0].to_string(),
                name: parts[1].to_string(),
            })
        } else {
            Err(ConfigError::InvalidRepoSlug(raw.to_string()))
        }
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// `[cycle]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSection {
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub commits: Option<usize>,
    #[serde(default)]
    pub delay_secs: Option<u64>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

/// `[completion]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionSection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `[github]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubSection {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

/// Parsed contents of `night-cycle.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub cycle: CycleSection,
    #[serde(default)]
    pub completion: CompletionSection,
    #[serde(default)]
    pub github: GithubSection,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File {
            path: PathBuf::from(CONFIG_FILE_NAME),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Template written by `night-cycle config init`.
    pub fn template() -> String {
        format!(
            "[cycle]\nextension = \"{DEFAULT_EXTENSION}\"\ncommits = {DEFAULT_COMMITS}\ndelay_secs = {DEFAULT_DELAY_SECS}\ndry_run = false\n\n\
             [completion]\nmodel = \"{DEFAULT_MODEL}\"\nbase_url = \"{DEFAULT_OPENAI_BASE_URL}\"\ntimeout_secs = {DEFAULT_TIMEOUT_SECS}\n\n\
             [github]\napi_url = \"{DEFAULT_GITHUB_API_URL}\"\n# local_root = \"/path/to/checkout\"\n"
        )
    }
}

/// Effective configuration for one run. Built once at startup and passed by
/// reference to every stage.
#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub openai_key: String,
    pub repo: RepoSlug,
    pub model: String,
    pub extension: String,
    pub max_commits: usize,
    pub delay: Duration,
    pub dry_run: bool,
    pub local_root: Option<PathBuf>,
    pub github_api_url: String,
    pub openai_base_url: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &redact(&self.github_token))
            .field("openai_key", &redact(&self.openai_key))
            .field("repo", &self.repo.to_string())
            .field("model", &self.model)
            .field("extension", &self.extension)
            .field("max_commits", &self.max_commits)
            .field("delay", &self.delay)
            .field("dry_run", &self.dry_run)
            .field("local_root", &self.local_root)
            .field("github_api_url", &self.github_api_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Keep the first four characters of a secret and mask the rest. Secrets of
/// eight characters or fewer are masked entirely.
pub fn redact(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

impl Config {
    /// Build from the process environment layered over `file`.
    pub fn from_env(file: &FileConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(file, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup layered over `file`.
    ///
    /// Blank values count as absent. Required variables are checked before
    /// anything else is parsed so a missing credential is always the error
    /// reported.
    pub fn from_lookup<F>(file: &FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let github_token = require(ENV_GITHUB_TOKEN)?;
        let openai_key = require(ENV_OPENAI_KEY)?;
        let repo = RepoSlug::parse(&require(ENV_REPO_NAME)?)?;

        let model = get("NIGHT_CYCLE_MODEL")
            .or_else(|| file.completion.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let extension = get("NIGHT_CYCLE_EXTENSION")
            .or_else(|| file.cycle.extension.clone())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        if extension.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "extension".into(),
                message: "must not be empty".into(),
            });
        }

        let max_commits = match get("NIGHT_CYCLE_COMMITS") {
            Some(raw) => parse_number("NIGHT_CYCLE_COMMITS", &raw)?,
            None => file.cycle.commits.unwrap_or(DEFAULT_COMMITS),
        };
        let delay_secs = match get("NIGHT_CYCLE_DELAY_SECS") {
            Some(raw) => parse_number("NIGHT_CYCLE_DELAY_SECS", &raw)?,
            None => file.cycle.delay_secs.unwrap_or(DEFAULT_DELAY_SECS),
        };
        let timeout_secs = match get("NIGHT_CYCLE_TIMEOUT_SECS") {
            Some(raw) => parse_number("NIGHT_CYCLE_TIMEOUT_SECS", &raw)?,
            None => file.completion.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let local_root = get("NIGHT_CYCLE_LOCAL_ROOT")
            .map(PathBuf::from)
            .or_else(|| file.github.local_root.clone());
        let github_api_url = get("GITHUB_API_URL")
            .or_else(|| file.github.api_url.clone())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());
        let openai_base_url = get("OPENAI_BASE_URL")
            .or_else(|| file.completion.base_url.clone())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        Ok(Self {
            github_token,
            openai_key,
            repo,
            model,
            extension,
            max_commits,
            delay: Duration::from_secs(delay_secs),
            dry_run: file.cycle.dry_run.unwrap_or(false),
            local_root,
            github_api_url: github_api_url.trim_end_matches('/').to_string(),
            openai_base_url: openai_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Non-fatal problems worth logging before the run starts.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !crate::github::is_valid_github_token(&self.github_token) {
            warnings.push(format!(
                "{ENV_GITHUB_TOKEN} does not look like a GitHub token (unrecognised prefix)"
            ));
        }
        if self.max_commits == 0 {
            warnings.push("commits = 0: style sampling will be empty".to_string());
        }
        if let Some(root) = &self.local_root
            && !root.is_dir()
        {
            warnings.push(format!(
                "local_root {} is not a directory; content will be fetched remotely",
                root.display()
            ));
        }
        warnings
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a non-negative integer"),
    })
}
