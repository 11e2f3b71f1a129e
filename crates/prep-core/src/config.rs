//! Configuration management for prep.
//!
//! Loads configuration from ${PREP_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `backend_url`.
pub const BACKEND_URL_ENV: &str = "PREP_BACKEND_URL";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for prep configuration and data directories.
    //!
    //! PREP_HOME resolution order:
    //! 1. PREP_HOME environment variable (if set)
    //! 2. ~/.config/prep (default)
    //! 3. ./.prep when no home directory can be determined

    use std::path::PathBuf;

    pub fn prep_home() -> PathBuf {
        if let Ok(home) = std::env::var("PREP_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".prep"),
            |h| h.join(".config").join("prep"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        prep_home().join("config.toml")
    }

    /// Returns the path to the stored credentials.
    pub fn session_path() -> PathBuf {
        prep_home().join("session.json")
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        prep_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend (chat and auth endpoints hang off it)
    pub backend_url: String,

    /// Connect timeout in seconds (0 disables)
    pub request_timeout_secs: u32,

    /// Session re-validation interval in seconds (0 disables)
    pub session_check_secs: u32,

    /// Queries allowed per chat session
    pub daily_query_limit: u32,
}

impl Config {
    pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8765/api";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;
    const DEFAULT_SESSION_CHECK_SECS: u32 = 30;
    const DEFAULT_DAILY_QUERY_LIMIT: u32 = 10;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend URL with precedence: env > config > default.
    pub fn effective_backend_url(&self) -> Result<String> {
        if let Ok(env_url) = std::env::var(BACKEND_URL_ENV) {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                validate_url(trimmed)?;
                return Ok(trimmed.trim_end_matches('/').to_string());
            }
        }

        let trimmed = self.backend_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }

        Ok(Self::DEFAULT_BACKEND_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.request_timeout_secs)))
    }

    pub fn session_check_interval(&self) -> Option<Duration> {
        (self.session_check_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.session_check_secs)))
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the `backend_url` field to a specific config file path.
    ///
    /// Creates the file from the commented template if it doesn't exist,
    /// otherwise edits the existing document in place so comments survive.
    pub fn save_backend_url_to(path: &Path, backend_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        validate_url(backend_url)?;

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["backend_url"] = value(backend_url);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Self::DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            session_check_secs: Self::DEFAULT_SESSION_CHECK_SECS,
            daily_query_limit: Self::DEFAULT_DAILY_QUERY_LIMIT,
        }
    }
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend URL: {url}"))?;
    Ok(())
}
