//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tl_core::{OwnerId, SyncConfig, ValidationError};
use tl_jira::JiraConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Owner that entries, projects and credentials are recorded under.
    pub owner_id: String,
    pub jira: JiraSettings,
    pub sync: SyncSettings,
}

/// Jira connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraSettings {
    /// Atlassian API gateway, used for tenant discovery and worklog calls.
    pub base_url: String,
    /// HTTP timeout per request.
    pub timeout_secs: u64,
}

/// Worklog sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Upper bound for each tracker call made while saving an entry.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("timelog.db"),
            owner_id: "local".to_string(),
            jira: JiraSettings {
                base_url: tl_jira::ATLASSIAN_API_URL.to_string(),
                timeout_secs: tl_jira::DEFAULT_TIMEOUT.as_secs(),
            },
            sync: SyncSettings {
                timeout_secs: tl_core::sync::DEFAULT_SYNC_TIMEOUT.as_secs(),
            },
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `config.toml` in the config directory,
    /// `config_path`, then `TL_*` environment variables (`__` separates
    /// nested keys, e.g. `TL_JIRA__BASE_URL`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TL_").split("__"));

        figment.extract()
    }

    pub fn owner(&self) -> Result<OwnerId, ValidationError> {
        OwnerId::new(self.owner_id.clone())
    }

    pub fn jira_config(&self) -> JiraConfig {
        JiraConfig {
            base_url: self.jira.base_url.clone(),
            timeout: Duration::from_secs(self.jira.timeout_secs),
        }
    }

    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            timeout: Duration::from_secs(self.sync.timeout_secs),
        }
    }
}

/// Returns the platform-specific config directory for timelog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("timelog"))
}

/// Returns the platform-specific data directory for timelog.
///
/// On Linux: `~/.local/share/timelog`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("timelog"))
}
