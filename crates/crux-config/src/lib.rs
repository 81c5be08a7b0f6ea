//! Configuration for the Crux image compositor.
//!
//! Supports a TOML configuration file with defaults that match the
//! compositor's built-in behavior. The file is optional: the compositor
//! works with zero config.
//!
//! # Config file locations
//!
//! Priority order:
//! 1. `$CRUX_CONFIG` environment variable
//! 2. macOS: `~/Library/Application Support/crux/config.toml`
//! 3. XDG: `~/.config/crux/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default per-image cap: 64 MiB of RGBA pixel data.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 64 * 1024 * 1024;

/// Smallest accepted `graphics.max_image_bytes`.
const MIN_IMAGE_BYTES_LIMIT: usize = 1024;

/// Largest accepted `graphics.max_image_bytes`.
const MAX_IMAGE_BYTES_LIMIT: usize = 1024 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CruxConfig {
    pub graphics: GraphicsConfig,
}

impl CruxConfig {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if no config file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "No config file found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: CruxConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the config file path based on environment and platform.
    pub fn config_path() -> PathBuf {
        // 1. Check $CRUX_CONFIG environment variable
        if let Ok(path) = std::env::var("CRUX_CONFIG") {
            return PathBuf::from(path);
        }

        // 2. macOS primary location
        #[cfg(target_os = "macos")]
        {
            if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "crux") {
                return proj_dirs.config_dir().join("config.toml");
            }
        }

        // 3. XDG fallback
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/crux/config.toml")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.graphics.max_image_bytes;
        if !(MIN_IMAGE_BYTES_LIMIT..=MAX_IMAGE_BYTES_LIMIT).contains(&max) {
            return Err(ConfigError::ValidationError(format!(
                "graphics.max_image_bytes must be between {MIN_IMAGE_BYTES_LIMIT} and {MAX_IMAGE_BYTES_LIMIT}, got {max}"
            )));
        }

        Ok(())
    }
}

/// Inline image rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GraphicsConfig {
    /// Render images placed through the Kitty graphics protocol.
    pub kitty_images: bool,
    /// Render virtual placements driven by Unicode placeholder cells.
    pub virtual_placements: bool,
    /// Allow the debug/status overlay image to be shown.
    pub debug_overlay: bool,
    /// Largest RGBA payload (in bytes) a single image may occupy.
    pub max_image_bytes: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            kitty_images: true,
            virtual_placements: true,
            debug_overlay: false,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}
