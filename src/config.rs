//! Shepherd configuration.
//!
//! Resolved through a chain, first hit wins:
//!
//! 1. `--config <path>`: explicit per-invocation file
//! 2. `./shepherd.toml`: project-local file
//! 3. `~/.shepherd/config.toml`: global default
//!
//! Dry-run is resolved separately: `--dry-run` flag, then the `DRY_RUN`
//! environment variable. It is read once at startup and passed down
//! explicitly; nothing below the CLI consults the environment for it.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

/// Project-local config file name.
pub const LOCAL_CONFIG: &str = "shepherd.toml";

/// Environment variable that enables dry-run mode.
pub const DRY_RUN_ENV: &str = "DRY_RUN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file found (looked in: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Where run directories are created.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// The login shepherd acts as. Its own comments are ignored when
    /// looking for objections.
    #[serde(default)]
    pub identity: Option<String>,

    /// Dedicated `GH_CONFIG_DIR` for the `gh` CLI.
    #[serde(default)]
    pub gh_config_dir: Option<PathBuf>,

    /// IANA time zone for business-day arithmetic. UTC when unset.
    #[serde(default)]
    pub timezone: Option<String>,

    pub review: ReviewConfig,

    pub project: ProjectConfig,

    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

/// Which items to pick up and how to read their comments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReviewConfig {
    /// Repositories to scan, `owner/name`, processed in this order.
    pub repos: Vec<String>,

    /// Label that marks an issue as a work item.
    pub label: String,

    /// Designated reviewer login.
    pub reviewer: String,

    /// Label that signals the reviewer is done.
    #[serde(default = "default_ready_label")]
    pub ready_label: String,

    #[serde(default = "default_approval_patterns")]
    pub approval_patterns: Vec<String>,

    #[serde(default = "default_objection_patterns")]
    pub objection_patterns: Vec<String>,

    /// Treat comments that match neither list as a potential objection.
    #[serde(default = "default_true")]
    pub unrecognized_comments_block_close: bool,

    /// Length of the objection window in business days.
    #[serde(default = "default_waiting_business_days")]
    pub waiting_business_days: i64,

    /// Strings that must appear in the issue body before assignment.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// Tracking board settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Organization or user that owns the project.
    pub owner: String,

    pub number: u64,

    #[serde(default = "default_status_field")]
    pub status_field: String,

    /// Status option that marks the objection window.
    #[serde(default = "default_watching_status")]
    pub watching_status: String,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotifyConfig {
    /// Endpoint that accepts notification requests.
    pub webhook: String,

    /// Addresses emailed when an item is escalated.
    pub escalation_recipients: Vec<String>,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_ready_label() -> String {
    "ready-for-review".to_string()
}

fn default_status_field() -> String {
    "Status".to_string()
}

fn default_watching_status() -> String {
    "Watching".to_string()
}

fn default_true() -> bool {
    true
}

fn default_waiting_business_days() -> i64 {
    3
}

fn default_approval_patterns() -> Vec<String> {
    [r"\blgtm\b", r"\bapproved?\b", r"\bsigned[- ]off\b", r":shipit:"]
        .map(String::from)
        .to_vec()
}

fn default_objection_patterns() -> Vec<String> {
    [
        r"\bobject(s|ed|ion|ions)?\b",
        r"\bconcerns?\b",
        r"\bblock(s|ed|er|ing)?\b",
        r"\bdisagree\b",
        r"\bnot (yet )?approved\b",
        r"\bhold\b",
        r"\bwait\b",
    ]
    .map(String::from)
    .to_vec()
}

impl Config {
    /// Resolve and load the config through the lookup chain.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let mut searched = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(global) = Self::global_path() {
            searched.push(global);
        }

        for path in &searched {
            if path.is_file() {
                return Self::load(path);
            }
        }

        Err(ConfigError::NotFound { searched })
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(msg) => ConfigError::Invalid(format!("{}: {msg}", path.display())),
        })
    }

    /// The global config path: `~/.shepherd/config.toml`.
    pub fn global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".shepherd").join("config.toml"))
    }

    fn parse(contents: &str) -> Result<Self, ParseFailure> {
        let config: Self = toml::from_str(contents).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.review.repos.is_empty() {
            return Err("review.repos must list at least one repository".into());
        }
        if let Some(bad) = self.review.repos.iter().find(|r| r.split('/').count() != 2) {
            return Err(format!("review.repos entry '{bad}' is not owner/name"));
        }
        if self.review.label.trim().is_empty() {
            return Err("review.label is empty".into());
        }
        if self.review.reviewer.trim().is_empty() {
            return Err("review.reviewer is empty".into());
        }
        if self.review.waiting_business_days < 0 {
            return Err("review.waiting-business-days must not be negative".into());
        }
        Ok(())
    }
}

#[derive(Debug)]
enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

/// Resolve dry-run mode from the CLI flag, then `DRY_RUN`.
pub fn resolve_dry_run(flag: bool) -> bool {
    dry_run_from(flag, env::var(DRY_RUN_ENV).ok().as_deref())
}

fn dry_run_from(flag: bool, env_value: Option<&str>) -> bool {
    if flag {
        return true;
    }
    env_value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}
