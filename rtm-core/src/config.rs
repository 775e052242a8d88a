use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gap::DEFAULT_MATCH_THRESHOLD;
use crate::navigation::BrokenPathPolicy;
use crate::service::ServiceConfig;
use crate::table::DEFAULT_MIN_COLUMN_WIDTH;

/// Dashboard settings, stored as YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtmConfig {
    /// Fixture file loaded when no other source is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<String>,
    /// Delay before a simulated service call resolves
    pub service_delay_ms: u64,
    /// Delay between upload progress ticks
    pub upload_step_ms: u64,
    /// Score at which a recommendation is pre-accepted
    pub match_threshold: u8,
    /// Table expansion level applied on load
    pub default_expand_level: usize,
    pub min_column_width: f32,
    pub broken_path_policy: BrokenPathPolicy,
    /// Maximum number of finder hits
    pub finder_limit: usize,
}

impl Default for RtmConfig {
    fn default() -> Self {
        Self {
            fixtures_path: None,
            service_delay_ms: 400,
            upload_step_ms: 100,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            default_expand_level: 1,
            min_column_width: DEFAULT_MIN_COLUMN_WIDTH,
            broken_path_policy: BrokenPathPolicy::default(),
            finder_limit: 20,
        }
    }
}

impl RtmConfig {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config, falling back to defaults when the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            log::debug!("no config at {:?}, using defaults", path.as_ref());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Creates a default config file if it doesn't exist
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        if path.as_ref().exists() {
            return Ok(());
        }
        Self::default()
            .save(&path)
            .with_context(|| format!("Failed to write default config to {:?}", path.as_ref()))
    }

    /// Service timing derived from this config
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            delay: Duration::from_millis(self.service_delay_ms),
            upload_step: Duration::from_millis(self.upload_step_ms),
            ..ServiceConfig::default()
        }
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("RTM_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;

    Ok(config_dir.join("rtm").join("config.yaml"))
}
