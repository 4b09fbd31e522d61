//! Configuration management for a harvester
//!
//! One TOML file describes one harvester: its identity, the catalog it reads,
//! where records are stored, and the adapter-specific options.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::HarvestIdentity;
use crate::sources::{SourceKind, SourceOptions};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Harvester configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvesterConfig {
    /// Identity stored on every record; also names the pid lock
    pub harvester_name: String,

    /// Name of the upstream catalog
    pub source_name: String,

    /// Adapter to use; older configs name it by `harvester_class`
    #[serde(alias = "harvester_class")]
    pub source: SourceKind,

    /// SQLite database path
    pub database: PathBuf,

    /// Adapter-specific URL template
    pub url_template: String,

    /// Resumption date used when the store has nothing for this harvester
    pub start_date: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// `{end_date}` template value (dhus, probav)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    /// Coverage name (gome2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,

    /// Stop after this many pages in one run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Directory of the pid lock file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// HTTP basic authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// HTTP basic authentication credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,
}

// Keeps passwords out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl HarvesterConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.harvester_name.trim().is_empty() {
            anyhow::bail!("harvester_name must not be empty");
        }

        if self.source_name.trim().is_empty() {
            anyhow::bail!("source_name must not be empty");
        }

        if self.url_template.trim().is_empty() {
            anyhow::bail!("url_template must not be empty");
        }

        if self.start_date.trim().is_empty() {
            anyhow::bail!("start_date must not be empty");
        }

        if self.timeout == 0 {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.max_pages == Some(0) {
            anyhow::bail!("max_pages must be greater than 0");
        }

        if self.source == SourceKind::Gome2
            && self.coverage.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            anyhow::bail!("coverage is required for source `{}`", self.source);
        }

        if let Some(auth) = &self.auth {
            if auth.username.is_empty() {
                anyhow::bail!("auth.username must not be empty");
            }
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn identity(&self) -> HarvestIdentity {
        HarvestIdentity::new(&self.harvester_name, &self.source_name)
    }

    /// Adapter options derived from this configuration
    #[must_use]
    pub fn source_options(&self) -> SourceOptions {
        let mut options = SourceOptions::new(&self.url_template);
        options.end_date = self.end_date.clone();
        options.coverage = self.coverage.clone();
        options
    }

    /// Directory of the pid lock: `lock_dir`, else the database directory
    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        match &self.lock_dir {
            Some(dir) => dir.clone(),
            None => self
                .database
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }
}
