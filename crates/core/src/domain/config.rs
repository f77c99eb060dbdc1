//! Configuration management for sndplug
//!
//! Paths of the kernel interfaces, the node wait bound and the re-selection
//! policy, loaded from `~/.config/sndplug/config.toml`. Every field has a
//! default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Device node settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the ALSA device nodes
    pub dir: PathBuf,

    /// How long a selection waits for a node to appear, in milliseconds
    pub wait_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/dev/snd"),
            wait_timeout_ms: 2500,
        }
    }
}

impl NodeConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Card metadata settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// procfs directory with the `cards` and `devices` files
    pub proc_dir: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            proc_dir: PathBuf::from("/proc/asound"),
        }
    }
}

/// What to do with the selection after a USB audio device is detached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReselectPolicy {
    /// Always fall back to the default card, even when another device was active
    #[default]
    Always,

    /// Fall back only when the detached device was the active one
    WhenActive,
}

/// Selection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub reselect: ReselectPolicy,
}

/// Complete sndplug configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SndplugConfig {
    pub nodes: NodeConfig,
    pub metadata: MetadataConfig,
    pub selection: SelectionConfig,
}

impl SndplugConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "nodes.wait_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.nodes.dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("nodes.dir must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Locates and loads the main configuration file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for `<config_dir>/config.toml`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
        }
    }

    /// Manager for an explicit file path
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `~/.config/sndplug` on Linux
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("sndplug"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields the defaults. A corrupt file is copied to
    /// `config.toml.corrupt` and the defaults are used.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SndplugConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            return SndplugConfig::default();
        }

        match SndplugConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                SndplugConfig::default()
            }
        }
    }

    /// Write the defaults unless a config file already exists
    pub async fn init(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        SndplugConfig::default().save_to_file(&self.config_path).await?;
        Ok(true)
    }
}
