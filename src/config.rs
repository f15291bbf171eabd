//! Configuration file support for intake
//!
//! Reads from .intake/config.toml (or the file named by INTAKE_CONFIG_PATH)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading an explicitly named config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Who may sign in and who administers the board
    #[serde(default)]
    pub access: AccessConfig,

    /// Attachment blob storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Vote transaction tuning
    #[serde(default)]
    pub voting: VotingConfig,
}

/// Sign-in policy
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccessConfig {
    /// Email domains allowed to sign in
    /// Default: ["example.com"]
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    /// Email addresses with administrative privileges
    /// Default: ["admin@example.com"]
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,
}

/// Blob storage settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Blob root; relative paths resolve against the database directory
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,

    /// Prefix for attachment retrieval URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Largest accepted upload
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Staged blobs without an owning idea are swept after this many hours
    #[serde(default = "default_orphan_max_age_hours")]
    pub orphan_max_age_hours: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VotingConfig {
    /// Transaction restarts after a busy/locked database
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// How long a connection waits on a lock before reporting busy
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

fn default_allowed_domains() -> Vec<String> {
    vec!["example.com".to_string()]
}

fn default_admin_emails() -> Vec<String> {
    vec!["admin@example.com".to_string()]
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("blobs")
}

fn default_public_base_url() -> String {
    "/files".to_string()
}

fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_orphan_max_age_hours() -> u64 {
    24
}

fn default_port() -> u16 {
    3000
}

fn default_workers() -> usize {
    4
}

fn default_retries() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u32 {
    5_000
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            admin_emails: default_admin_emails(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            attachments_dir: default_attachments_dir(),
            public_base_url: default_public_base_url(),
            max_attachment_bytes: default_max_attachment_bytes(),
            orphan_max_age_hours: default_orphan_max_age_hours(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            workers: default_workers(),
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Load config from INTAKE_CONFIG_PATH or .intake/config.toml
    /// Returns default config if no file is found or it cannot be parsed
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("{}; using defaults", e),
            }
        }
        Self::default()
    }

    /// Load a specific config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find config.toml by env var or by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("INTAKE_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".intake").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Render as TOML, for `intake init`
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.access.allowed_domains, vec!["example.com"]);
        assert_eq!(config.access.admin_emails, vec!["admin@example.com"]);
        assert_eq!(config.storage.public_base_url, "/files");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.voting.retries, 5);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[access]
allowed_domains = ["corp.example", "example.com"]

[server]
port = 8080
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.access.allowed_domains.len(), 2);
        // Missing keys fall back to defaults
        assert_eq!(config.access.admin_emails, vec!["admin@example.com"]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.storage.max_attachment_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let rendered = Config::default().to_toml_string();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.storage.attachments_dir, PathBuf::from("blobs"));
        assert_eq!(parsed.voting.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
