//! Application configuration
//!
//! `AppConfig` is read from an optional YAML file, then environment
//! overrides are applied. Command-line flags are applied last by the CLI.

use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `database`
pub const ENV_DATABASE: &str = "GOVSYNC_DATABASE";

/// Overrides `temp_dir`
pub const ENV_TEMP_DIR: &str = "GOVSYNC_TEMP_DIR";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Runtime configuration for the `govsync` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// DuckDB database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Scratch directory for downloads
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory of extra dataset definitions (`*.yaml`)
    #[serde(default)]
    pub datasets_dir: Option<PathBuf>,

    /// Fetcher settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Daemon mode settings
    #[serde(default)]
    pub daemon: DaemonSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            temp_dir: default_temp_dir(),
            datasets_dir: None,
            http: HttpSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("govsync.duckdb")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("govsync")
}

impl AppConfig {
    /// Parse a config from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("config: read {}", path.display()))?;
        Self::from_yaml(&yaml)
    }

    /// Defaults or the given file, then process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `GOVSYNC_*` overrides read through `lookup`
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(temp_dir) = lookup(ENV_TEMP_DIR).filter(|v| !v.is_empty()) {
            self.temp_dir = PathBuf::from(temp_dir);
        }
        self
    }

    /// Reject values that would leave the fetcher or daemon unusable
    pub fn validate(&self) -> Result<()> {
        if self.database.as_os_str().is_empty() {
            return Err(Error::invalid_value("database", "must not be empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value("http.timeout_secs", "must be at least 1"));
        }
        if self.daemon.interval_minutes == 0 {
            return Err(Error::invalid_value(
                "daemon.interval_minutes",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// Fetcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Shared request pace; 0 disables rate limiting
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Overrides the default `govsync/<version>` user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            requests_per_second: default_rps(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_rps() -> u32 {
    5
}

impl HttpSettings {
    /// Fetcher configuration for these settings
    pub fn client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries);

        builder = if self.requests_per_second == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::per_second(self.requests_per_second))
        };

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }
}

// ============================================================================
// Daemon Settings
// ============================================================================

/// Daemon mode settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonSettings {
    /// Minutes between engine runs
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    60
}

impl DaemonSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database, PathBuf::from("govsync.duckdb"));
        assert!(config.temp_dir.ends_with("govsync"));
        assert_eq!(config.datasets_dir, None);
        assert_eq!(config.http.timeout_secs, 300);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.requests_per_second, 5);
        assert_eq!(config.daemon.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
database: /var/lib/govsync/data.duckdb
datasets_dir: ./datasets.d
http:
  max_retries: 5
  user_agent: "govsync-test"
daemon:
  interval_minutes: 15
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.database,
            PathBuf::from("/var/lib/govsync/data.duckdb")
        );
        assert_eq!(config.datasets_dir, Some(PathBuf::from("./datasets.d")));
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 300);
        assert_eq!(config.http.user_agent.as_deref(), Some("govsync-test"));
        assert_eq!(config.daemon.interval_minutes, 15);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(AppConfig::from_yaml("databse: x.duckdb").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = AppConfig::from_yaml("daemon:\n  interval_minutes: 0").unwrap_err();
        assert!(err.to_string().contains("daemon.interval_minutes"));

        let err = AppConfig::from_yaml("http:\n  timeout_secs: 0").unwrap_err();
        assert!(err.to_string().contains("http.timeout_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE, "/data/override.duckdb"),
            (ENV_TEMP_DIR, ""),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .with_env_overrides(|name| env.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.database, PathBuf::from("/data/override.duckdb"));
        // Empty values are ignored
        assert_eq!(config.temp_dir, default_temp_dir());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("govsync.yaml");
        std::fs::write(&path, "temp_dir: /scratch/govsync\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.temp_dir, PathBuf::from("/scratch/govsync"));

        let missing = AppConfig::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(missing.to_string().contains("config: read"));
    }

    #[test]
    fn test_client_config() {
        let settings = HttpSettings {
            timeout_secs: 10,
            max_retries: 1,
            requests_per_second: 2,
            user_agent: Some("agent/1".to_string()),
        };
        let client = settings.client_config();
        assert_eq!(client.timeout, Duration::from_secs(10));
        assert_eq!(client.max_retries, 1);
        assert_eq!(client.rate_limit, Some(RateLimiterConfig::per_second(2)));
        assert_eq!(client.user_agent, "agent/1");

        let unlimited = HttpSettings {
            requests_per_second: 0,
            ..HttpSettings::default()
        };
        assert_eq!(unlimited.client_config().rate_limit, None);
        assert!(unlimited.client_config().user_agent.starts_with("govsync/"));
    }
}
