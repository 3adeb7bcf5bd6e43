//! Configuration module for Siteline.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, and defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for Siteline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub deadlines: DeadlineConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between polling cycles over sync-enabled projects.
    pub poll_interval: u64,
    /// Maximum items fetched per listing page from the platform.
    pub page_size: u32,
}

/// Internal deadline windows, as a percentage of the time remaining until
/// the external due date.
///
/// With the defaults, a record assigned 10 days before its due date gets a
/// review deadline 5 days out and a QC deadline 8 days out. Projects may
/// override both percentages individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// Review deadline as a percentage of the remaining window (1-100).
    pub review_window_percent: u8,
    /// QC deadline as a percentage of the remaining window (1-100).
    pub qc_window_percent: u8,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            page_size: 100,
        }
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            review_window_percent: 50,
            qc_window_percent: 80,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("siteline.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.poll_interval == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.page_size == 0 {
            errors.push(ValidationError {
                field: "sync.page_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- deadlines ---
        if self.deadlines.review_window_percent == 0 || self.deadlines.review_window_percent > 100
        {
            errors.push(ValidationError {
                field: "deadlines.review_window_percent".into(),
                message: "must be in range 1..=100".into(),
            });
        }
        if self.deadlines.qc_window_percent == 0 || self.deadlines.qc_window_percent > 100 {
            errors.push(ValidationError {
                field: "deadlines.qc_window_percent".into(),
                message: "must be in range 1..=100".into(),
            });
        }
        if self.deadlines.review_window_percent > self.deadlines.qc_window_percent {
            errors.push(ValidationError {
                field: "deadlines.review_window_percent".into(),
                message: format!(
                    "review_window_percent ({}) must not exceed qc_window_percent ({})",
                    self.deadlines.review_window_percent, self.deadlines.qc_window_percent
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.poll_interval, 300);
        assert_eq!(cfg.sync.page_size, 100);
        assert_eq!(cfg.deadlines.review_window_percent, 50);
        assert_eq!(cfg.deadlines.qc_window_percent, 80);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  poll_interval: 600
  page_size: 50
deadlines:
  review_window_percent: 40
  qc_window_percent: 70
database:
  path: /var/lib/siteline/siteline.db
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.poll_interval, 600);
        assert_eq!(cfg.sync.page_size, 50);
        assert_eq!(cfg.deadlines.review_window_percent, 40);
        assert_eq!(cfg.deadlines.qc_window_percent, 70);
        assert_eq!(cfg.database.path, PathBuf::from("/var/lib/siteline/siteline.db"));
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.poll_interval, 300);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn validate_catches_zero_poll_interval() {
        let mut cfg = Config::default();
        cfg.sync.poll_interval = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.poll_interval"));
    }

    #[test]
    fn validate_catches_out_of_range_windows() {
        let mut cfg = Config::default();
        cfg.deadlines.review_window_percent = 0;
        cfg.deadlines.qc_window_percent = 101;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"deadlines.review_window_percent"));
        assert!(fields.contains(&"deadlines.qc_window_percent"));
    }

    #[test]
    fn validate_catches_review_window_after_qc_window() {
        let mut cfg = Config::default();
        cfg.deadlines.review_window_percent = 90;
        cfg.deadlines.qc_window_percent = 60;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "deadlines.review_window_percent"
            && e.message.contains("must not exceed")));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }
}
