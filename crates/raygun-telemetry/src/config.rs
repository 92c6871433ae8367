//! Telemetry configuration

use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::Directive;

/// Main telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Global enable/disable toggle for console output
    pub enabled: bool,

    /// Console log level
    pub level: LogLevel,

    /// Output format (JSON, Pretty, Compact)
    pub format: LogFormat,

    /// Include source location in logs
    pub include_location: bool,

    /// Least severe level forwarded to Raygun by the reporting layer
    pub report_level: LogLevel,

    /// Extra filter directives, e.g. `hyper=warn`
    pub directives: Vec<String>,
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(Error::Config {
                message: format!("Unknown log level '{}'", other),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Level::from(*self), f)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON format
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config {
                message: format!("Unknown log format '{}'", other),
            }),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            format: LogFormat::Compact,
            include_location: false,
            report_level: LogLevel::Error,
            directives: vec![
                "hyper=warn".to_string(),
                "reqwest=warn".to_string(),
                "rustls=warn".to_string(),
            ],
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from file or create default, then apply
    /// environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)?;
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("Failed to parse telemetry config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize telemetry config: {}", e),
        })?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Load environment variable overrides. Unparseable values are ignored.
    pub fn load_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("RAYGUN_TELEMETRY_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(self.enabled);
        }

        if let Ok(level) = std::env::var("RAYGUN_LOG_LEVEL") {
            self.level = level.parse().unwrap_or(self.level);
        }

        if let Ok(format) = std::env::var("RAYGUN_LOG_FORMAT") {
            self.format = format.parse().unwrap_or(self.format);
        }
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("io", "raygun", "raygun4rs").ok_or_else(|| Error::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("telemetry.toml"))
    }

    /// Parsed filter directives.
    pub fn parsed_directives(&self) -> Result<Vec<Directive>> {
        self.directives
            .iter()
            .map(|directive| {
                directive.parse::<Directive>().map_err(|e| Error::Config {
                    message: format!("Invalid filter directive '{}': {}", directive, e),
                })
            })
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.parsed_directives()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = TelemetryConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: TelemetryConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.enabled, deserialized.enabled);
        assert_eq!(config.level, deserialized.level);
        assert_eq!(config.report_level, deserialized.report_level);
    }

    #[test]
    #[serial]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("telemetry.toml");

        let mut original = TelemetryConfig::default();
        original.format = LogFormat::Json;
        original.save(&config_path).unwrap();

        let loaded = TelemetryConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("telemetry.toml");
        std::fs::write(&config_path, "level = \"debug\"\n").unwrap();

        let loaded = TelemetryConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.level, LogLevel::Debug);
        assert_eq!(loaded.report_level, LogLevel::Error);
        assert_eq!(loaded.directives.len(), 3);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("RAYGUN_LOG_LEVEL", "DEBUG");
        std::env::set_var("RAYGUN_LOG_FORMAT", "json");

        let mut config = TelemetryConfig::default();
        config.load_env_overrides();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);

        std::env::set_var("RAYGUN_LOG_LEVEL", "loud");
        config.load_env_overrides();
        assert_eq!(config.level, LogLevel::Debug);

        std::env::remove_var("RAYGUN_LOG_LEVEL");
        std::env::remove_var("RAYGUN_LOG_FORMAT");
    }

    #[test]
    fn test_config_validation() {
        let mut config = TelemetryConfig::default();
        assert!(config.validate().is_ok());

        config.directives.push("reqwest=notalevel".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Info.to_string(), "INFO");
    }
}
