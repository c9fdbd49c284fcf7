use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::comparison::{CompareOptions, FailurePolicy, SweepOptions, ValueEquality};
use crate::executor::retry::DEFAULT_MAX_ATTEMPTS;
use crate::executor::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default)]
    pub concurrent_pair: bool,
    #[serde(default)]
    pub trim_whitespace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_tolerance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<String>,
    pub max_attempts: Option<u32>,
    pub failure_policy: Option<FailurePolicy>,
    pub max_in_flight: Option<usize>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/sql-comparer/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.database_path {
            self.database.path = path;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(policy) = overrides.failure_policy {
            self.sweep.failure_policy = policy;
        }
        if let Some(max_in_flight) = overrides.max_in_flight {
            self.sweep.max_in_flight = max_in_flight;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        let raw = self.database.path.trim();
        if raw.is_empty() {
            None
        } else {
            Some(expand_tilde(raw))
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts)
            .with_backoff(Duration::from_millis(self.retry.backoff_ms))
    }

    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            equality: ValueEquality {
                trim_whitespace: self.comparison.trim_whitespace,
                numeric_tolerance: self.comparison.numeric_tolerance,
            },
            concurrent_pair: self.comparison.concurrent_pair,
        }
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            failure_policy: self.sweep.failure_policy,
            max_in_flight: self.sweep.max_in_flight.max(1),
        }
    }

    pub fn default_template() -> String {
        let template = r#"[database]
path = "~/.local/share/sql-comparer/reporting.db"
busy_timeout_ms = 5000

[retry]
max_attempts = 5
backoff_ms = 0

[comparison]
concurrent_pair = false
trim_whitespace = false
# numeric_tolerance = 0.0001

[sweep]
failure_policy = "abort"
max_in_flight = 1
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_in_flight() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::comparison::FailurePolicy;
    use crate::config::{Config, ConfigOverrides};

    #[test]
    fn template_parses_to_defaults() {
        let parsed = Config::parse(&Config::default_template()).expect("template parses");
        assert_eq!(parsed.retry.max_attempts, 5);
        assert_eq!(parsed.sweep.failure_policy, FailurePolicy::Abort);
        assert_eq!(parsed.sweep.max_in_flight, 1);
        assert!(parsed.compare_options().equality.is_textual());
        assert!(parsed.resolved_database_path().is_some());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed = Config::parse("[retry]\nbackoff_ms = 250\n").expect("partial config parses");
        assert_eq!(parsed.retry.max_attempts, 5);
        assert_eq!(
            parsed.retry_policy().backoff,
            Duration::from_millis(250)
        );
        assert!(parsed.resolved_database_path().is_none());
        assert_eq!(parsed.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(Some(&dir.path().join("absent.toml"))).expect("defaults");
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn written_template_round_trips_through_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        Config::write_template(&path).expect("template written");
        let config = Config::load(Some(&path)).expect("template loads");
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::parse(
            "[sweep]\nfailure_policy = \"continue\"\nmax_in_flight = 0\n[comparison]\nnumeric_tolerance = 0.5\n",
        )
        .expect("config parses");
        assert_eq!(config.sweep_options().max_in_flight, 1);
        assert_eq!(config.compare_options().equality.numeric_tolerance, Some(0.5));

        config.apply_overrides(ConfigOverrides {
            database_path: Some("/tmp/x.db".to_string()),
            max_attempts: Some(2),
            failure_policy: Some(FailurePolicy::Abort),
            max_in_flight: Some(8),
        });
        assert_eq!(config.retry_policy().max_attempts, 2);
        assert_eq!(config.sweep_options().failure_policy, FailurePolicy::Abort);
        assert_eq!(config.sweep_options().max_in_flight, 8);
        assert_eq!(
            config.resolved_database_path().as_deref(),
            Some(std::path::Path::new("/tmp/x.db"))
        );
    }
}
