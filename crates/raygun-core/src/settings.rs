use crate::config::ConfigOptions;
use crate::{RaygunError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk client settings: the API key plus sender options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(flatten)]
    pub options: ConfigOptions,
}

impl Settings {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut settings = if config_file.exists() {
            info!("Loading settings from: {}", config_file.display());
            let content = std::fs::read_to_string(&config_file)?;
            toml::from_str(&content).map_err(|e| RaygunError::SettingsLoad {
                path: config_file.display().to_string(),
                source: Box::new(e),
            })?
        } else {
            info!("No settings file found, using defaults");
            Self::default()
        };

        settings.load_env_overrides();
        Ok(settings)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| RaygunError::Config {
            message: format!("Failed to serialize settings: {}", e),
        })?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn load_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("RAYGUN_API_KEY") {
            self.api_key = Some(api_key);
        }

        if let Ok(version) = std::env::var("RAYGUN_VERSION") {
            self.options.userversion = Some(version);
        }

        if let Ok(timeout) = std::env::var("RAYGUN_HTTP_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<f64>() {
                self.options.http_timeout = Some(seconds);
            }
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("io", "raygun", "raygun4rs").ok_or_else(|| RaygunError::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }
}
