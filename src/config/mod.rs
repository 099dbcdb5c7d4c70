//! Configuration Module
//!
//! Settings for the webhook, the chatflow endpoint and transport timeouts.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{Settings, SettingsOverlay, TimeoutConfig};
