//! Chat Settings
//!
//! Defines the configuration schema: where the webhook lives, which
//! chatflow to talk to, and how long to wait for either.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolved configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the Flowise instance
    pub app_url: String,

    /// Chatflow / agentflow identifier
    pub flow_id: String,

    /// Authorization webhook URL
    pub webhook_url: String,

    /// Session identifier forwarded to the chatflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Bearer token for the Flowise instance itself (not the user's key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flowise_api_key: Option<String>,

    /// Transport timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Transport timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// TCP/TLS connect timeout for both endpoints
    pub connect_secs: u64,

    /// Whole-request timeout for the webhook call
    pub webhook_secs: u64,

    /// Whole-request timeout for the prediction stream, body included
    pub prediction_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            webhook_secs: 30,
            prediction_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn webhook(&self) -> Duration {
        Duration::from_secs(self.webhook_secs)
    }

    pub fn prediction(&self) -> Duration {
        Duration::from_secs(self.prediction_secs)
    }
}

/// A partial configuration as found in a file or the environment.
///
/// Every field is optional; present fields replace the corresponding
/// value of the settings they are applied to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsOverlay {
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub flowise_api_key: Option<String>,
    #[serde(default)]
    pub timeouts: Option<TimeoutOverlay>,
}

/// Partial timeout configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutOverlay {
    #[serde(default)]
    pub connect_secs: Option<u64>,
    #[serde(default)]
    pub webhook_secs: Option<u64>,
    #[serde(default)]
    pub prediction_secs: Option<u64>,
}

impl Settings {
    /// Create settings with default timeouts
    pub fn new(
        app_url: impl Into<String>,
        flow_id: impl Into<String>,
        webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            app_url: app_url.into(),
            flow_id: flow_id.into(),
            webhook_url: webhook_url.into(),
            session_id: None,
            flowise_api_key: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Set the session identifier
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the Flowise bearer token
    pub fn with_flowise_api_key(mut self, key: impl Into<String>) -> Self {
        self.flowise_api_key = Some(key.into());
        self
    }

    /// Apply an overlay on top of these settings (overlay wins)
    pub fn apply(&mut self, overlay: SettingsOverlay) {
        if let Some(v) = overlay.app_url {
            self.app_url = v;
        }
        if let Some(v) = overlay.flow_id {
            self.flow_id = v;
        }
        if let Some(v) = overlay.webhook_url {
            self.webhook_url = v;
        }
        if let Some(v) = overlay.session_id {
            self.session_id = Some(v);
        }
        if let Some(v) = overlay.flowise_api_key {
            self.flowise_api_key = Some(v);
        }
        if let Some(t) = overlay.timeouts {
            if let Some(v) = t.connect_secs {
                self.timeouts.connect_secs = v;
            }
            if let Some(v) = t.webhook_secs {
                self.timeouts.webhook_secs = v;
            }
            if let Some(v) = t.prediction_secs {
                self.timeouts.prediction_secs = v;
            }
        }
    }

    /// Check that the settings can actually reach both endpoints
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("app_url", &self.app_url),
            ("flow_id", &self.flow_id),
            ("webhook_url", &self.webhook_url),
        ] {
            if value.trim().is_empty() {
                return Err(GateError::Config(format!("'{}' must not be empty", name)));
            }
        }

        for (name, value) in [("app_url", &self.app_url), ("webhook_url", &self.webhook_url)] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(GateError::Config(format!(
                    "'{}' must be an http(s) URL, got '{}'",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Full URL of the streaming prediction endpoint for the configured flow
    pub fn prediction_url(&self) -> String {
        format!(
            "{}/api/v1/prediction/{}",
            self.app_url.trim_end_matches('/'),
            self.flow_id
        )
    }
}
