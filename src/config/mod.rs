//! Configuration management for Kanso
//!
//! Settings are read from a TOML file. Every section and field is optional;
//! anything left out takes its default value.

use crate::buffer::{DEFAULT_BUFFER_COUNT, STD_HEIGHT, STD_WIDTH};
use crate::input::DEFAULT_SPEED;
use crate::renderer::DEFAULT_STEP;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/kanso/kanso.toml";

/// Main configuration struct containing all Kanso settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KansoConfig {
    /// Toplevel window settings
    #[serde(default)]
    pub window: WindowConfig,

    /// Pixel buffer rotation
    #[serde(default)]
    pub buffers: BuffersConfig,

    /// Gradient animation
    #[serde(default)]
    pub render: RenderConfig,

    /// Pointer input handling
    #[serde(default)]
    pub input: InputConfig,
}

/// Toplevel window configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title shown by the compositor
    pub title: String,

    /// Width used until the compositor suggests one (pixels)
    pub default_width: i32,

    /// Height used until the compositor suggests one (pixels)
    pub default_height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuffersConfig {
    /// Number of rotating pixel buffers (at least 2)
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Gradient offset advance per frame
    pub step: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Animation speed magnitude while a pointer button is held
    pub speed: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "kanso".to_string(),
            default_width: STD_WIDTH,
            default_height: STD_HEIGHT,
        }
    }
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { step: DEFAULT_STEP }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
        }
    }
}

/// Expands a leading `~` to `$HOME`.
pub fn expand_home<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

impl KansoConfig {
    /// Load configuration from a TOML file
    ///
    /// The result is not validated; command line overrides are applied first.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path)?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: KansoConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.window.default_width <= 0 || self.window.default_height <= 0 {
            anyhow::bail!(
                "Invalid default size {}x{}: both dimensions must be positive",
                self.window.default_width,
                self.window.default_height
            );
        }

        if self.buffers.count < 2 {
            anyhow::bail!(
                "Invalid buffer count {}: at least 2 buffers are required",
                self.buffers.count
            );
        }

        if self.render.step == 0 {
            anyhow::bail!("Invalid render step: must be nonzero");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
