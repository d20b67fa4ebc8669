//! Settings file
//!
//! Settings live in `<config dir>/streaminput/config.toml`. A missing file is
//! replaced by the defaults so the client always starts. Values are read once
//! per session; editing the file mid-stream has no effect until the next
//! session.

use crate::controller::keymap::KeyCode;
use crate::controller::state::Rotation;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "streaminput";
const CONFIG_FILE: &str = "config.toml";

/// Settings consumed by the controller-state aggregator
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Swap the confirm and cancel face buttons
    pub swap_cross_moon: bool,
    /// Key code that clicks the touchpad
    pub touchpad_key: Option<KeyCode>,
    /// Forward accelerometer and gyroscope readings. Honored by hosts that
    /// provide a `SensorSource` through `MotionSensorObserver::from_config`;
    /// the desktop binary has no motion sensors and ignores it.
    pub motion_enabled: bool,
    /// Rotation assumed when the host cannot report one
    pub display_rotation: Rotation,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            swap_cross_moon: false,
            touchpad_key: None,
            motion_enabled: true,
            display_rotation: Rotation::Deg0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Analog stick deadzone as a fraction (0.0-1.0)
    pub joystick_deadzone: f32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Host address of the console
    pub host: String,
    /// Log every engine message instead of warnings and errors only
    pub log_verbose: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub collector: CollectorConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| eyre!("No config directory available"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let deadzone = self.collector.joystick_deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(eyre!(
                "joystick_deadzone must be in [0, 1), got {}",
                deadzone
            ));
        }
        Ok(())
    }

    /// Loads `path`, writing the defaults there first if it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!("Config file {} does not exist, using default", path.display());
            let config = Config::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config = Self::parse(&content)?;
        info!("Loaded config from {}", path.display());
        debug!("{:?}", config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        info!("Config saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.input.motion_enabled);
        assert_eq!(config.input.touchpad_key, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [input]
            swap_cross_moon = true
            touchpad_key = 109
            display_rotation = "deg90"

            [session]
            host = "192.168.1.20"
            "#,
        )
        .unwrap();

        assert!(config.input.swap_cross_moon);
        assert_eq!(config.input.touchpad_key, Some(109));
        assert_eq!(config.input.display_rotation, Rotation::Deg90);
        assert!(config.input.motion_enabled);
        assert_eq!(config.collector, CollectorConfig::default());
        assert_eq!(config.session.host, "192.168.1.20");
    }

    #[test]
    fn rejects_bad_deadzone() {
        let err = Config::parse("[collector]\njoystick_deadzone = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("joystick_deadzone"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::parse("[input\nswap_cross_moon = ").is_err());
    }

    #[tokio::test]
    async fn load_creates_missing_file() {
        let dir = std::env::temp_dir().join(format!("streaminput-test-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let _ = tokio::fs::remove_dir_all(&dir).await;

        let config = Config::load_or_create(&path).await.unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let mut changed = config.clone();
        changed.input.swap_cross_moon = true;
        changed.save(&path).await.unwrap();
        let reloaded = Config::load_or_create(&path).await.unwrap();
        assert_eq!(reloaded, changed);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
