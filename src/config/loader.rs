//! Configuration Loader
//!
//! Loads settings from built-in defaults, config files and the environment.

use crate::config::settings::{Settings, SettingsOverlay};
use crate::error::{GateError, Result};
use std::path::{Path, PathBuf};

/// Environment variables recognised as overrides
pub const ENV_CONFIG_PATH: &str = "GATECHAT_CONFIG";
pub const ENV_APP_URL: &str = "GATECHAT_APP_URL";
pub const ENV_FLOW_ID: &str = "GATECHAT_FLOW_ID";
pub const ENV_WEBHOOK_URL: &str = "GATECHAT_WEBHOOK_URL";
pub const ENV_SESSION_ID: &str = "GATECHAT_SESSION_ID";
pub const ENV_FLOWISE_API_KEY: &str = "GATECHAT_FLOWISE_API_KEY";

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    settings: Settings,
}

impl ConfigLoader {
    /// Load from built-in defaults, default file locations and the environment
    pub fn new() -> Result<Self> {
        let mut loader = Self::builtin()?;

        // Files can override built-ins
        loader.load_from_default_paths()?;

        // Environment wins over files
        loader.apply_env(|key| std::env::var(key).ok());

        Ok(loader)
    }

    /// Load with a specific config file instead of the default locations
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::builtin()?;
        loader.load_from_file(path)?;
        loader.apply_env(|key| std::env::var(key).ok());
        Ok(loader)
    }

    /// Built-in defaults only
    fn builtin() -> Result<Self> {
        let defaults = include_str!("../../gatechat.default.json");
        let settings: Settings = serde_json::from_str(defaults).map_err(|e| {
            GateError::Config(format!("Failed to parse built-in gatechat.default.json: {}", e))
        })?;

        Ok(Self { settings })
    }

    /// Load configuration from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Get list of config paths to check, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".gatechat").join("config.json"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gatechat").join("config.json"));
        }

        paths.push(PathBuf::from("gatechat.json"));

        if let Ok(custom_path) = std::env::var(ENV_CONFIG_PATH) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let overlay: SettingsOverlay = serde_json::from_str(&content).map_err(|e| {
            GateError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "loaded config file");
        self.settings.apply(overlay);
        Ok(())
    }

    /// Apply environment overrides read through `lookup`
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.settings.apply(SettingsOverlay {
            app_url: read(ENV_APP_URL),
            flow_id: read(ENV_FLOW_ID),
            webhook_url: read(ENV_WEBHOOK_URL),
            session_id: read(ENV_SESSION_ID),
            flowise_api_key: read(ENV_FLOWISE_API_KEY),
            timeouts: None,
        });
    }

    /// Get the loaded settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take ownership of the settings
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_builtin_defaults() {
        let loader = ConfigLoader::builtin().unwrap();
        assert_eq!(loader.settings().app_url, "http://localhost:3000");
        assert_eq!(loader.settings().timeouts.prediction_secs, 300);
        // Defaults alone are not usable: the webhook must be configured
        assert!(loader.settings().validate().is_err());
    }

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "flow_id": "flow-42",
                "webhook_url": "https://hooks.example.com/api-call",
                "timeouts": {{ "connect_secs": 3 }}
            }}"#
        )
        .unwrap();

        let mut loader = ConfigLoader::builtin().unwrap();
        loader.load_from_file(file.path()).unwrap();

        let settings = loader.settings();
        assert_eq!(settings.flow_id, "flow-42");
        assert_eq!(settings.app_url, "http://localhost:3000");
        assert_eq!(settings.timeouts.connect_secs, 3);
        assert_eq!(settings.timeouts.webhook_secs, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let mut loader = ConfigLoader::builtin().unwrap();
        let err = loader.load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_FLOW_ID, "from-env"),
            (ENV_SESSION_ID, "session-env"),
            (ENV_WEBHOOK_URL, "   "),
        ]
        .into_iter()
        .collect();

        let mut loader = ConfigLoader::builtin().unwrap();
        loader.settings.webhook_url = "https://hook".to_string();
        loader.apply_env(|key| env.get(key).map(|v| v.to_string()));

        let settings = loader.into_settings();
        assert_eq!(settings.flow_id, "from-env");
        assert_eq!(settings.session_id.as_deref(), Some("session-env"));
        // Blank values do not clobber
        assert_eq!(settings.webhook_url, "https://hook");
    }
}
