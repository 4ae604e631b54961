// TOML config adapter - Layered application configuration

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapters::tracing_log::LoggingConfig;
use crate::error::{EncodeError, EncodeResult};
use crate::output::OverwritePolicy;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "vidsink.toml";

/// Environment variables and the settings they override
pub const ENV_FFMPEG_PATH: &str = "VIDSINK_FFMPEG_PATH";
pub const ENV_GIFSKI_PATH: &str = "VIDSINK_GIFSKI_PATH";
pub const ENV_FORMATS_DIR: &str = "VIDSINK_FORMATS_DIR";
pub const ENV_TEMP_DIR: &str = "VIDSINK_TEMP_DIR";
pub const ENV_LOG_LEVEL: &str = "VIDSINK_LOG_LEVEL";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// ffmpeg executable; searched on `PATH` when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// gifski executable for chained formats
    pub gifski_path: Option<PathBuf>,
    /// Directory holding `<format>.json` descriptors
    pub formats_dir: Option<PathBuf>,
    /// Directory for metadata sidecars
    pub temp_dir: Option<PathBuf>,
    pub overwrite: OverwritePolicy,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> EncodeResult<Self> {
        toml::from_str(content).map_err(|e| EncodeError::Config {
            message: format!("Failed to parse TOML config: {}", e),
        })
    }

    /// Load the file layer
    ///
    /// An explicit path must exist. Without one, `vidsink.toml` in the
    /// working directory is used if present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> EncodeResult<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(EncodeError::Config {
                        message: format!("Config file does not exist: {}", path.display()),
                    });
                }
                path.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        info!("Loading configuration from: {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| EncodeError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any variable source
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overrides = 0;
        let mut var = |key: &str| {
            let value = lookup(key).filter(|value| !value.is_empty());
            if let Some(value) = &value {
                debug!("Found environment override: {} = {}", key, value);
                overrides += 1;
            }
            value
        };

        if let Some(value) = var(ENV_FFMPEG_PATH) {
            self.ffmpeg_path = Some(value.into());
        }
        if let Some(value) = var(ENV_GIFSKI_PATH) {
            self.gifski_path = Some(value.into());
        }
        if let Some(value) = var(ENV_FORMATS_DIR) {
            self.formats_dir = Some(value.into());
        }
        if let Some(value) = var(ENV_TEMP_DIR) {
            self.temp_dir = Some(value.into());
        }
        if let Some(value) = var(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }

        if overrides > 0 {
            debug!("Applied {} environment variable overrides", overrides);
        }
    }

    /// Resolved ffmpeg executable
    pub fn ffmpeg_program(&self) -> EncodeResult<PathBuf> {
        resolve_tool("ffmpeg", self.ffmpeg_path.as_deref(), ENV_FFMPEG_PATH)
    }

    /// Resolved gifski executable
    pub fn gifski_program(&self) -> EncodeResult<PathBuf> {
        resolve_tool("gifski", self.gifski_path.as_deref(), ENV_GIFSKI_PATH)
    }

    pub fn formats_dir(&self) -> PathBuf {
        self.formats_dir.clone().unwrap_or_else(|| PathBuf::from("formats"))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("vidsink"))
    }
}

fn resolve_tool(name: &str, configured: Option<&Path>, env_key: &str) -> EncodeResult<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    find_executable(name).ok_or_else(|| EncodeError::EncoderLaunchFailure {
        program: name.to_string(),
        message: format!(
            "not found on PATH; install it or set {} (or `{}_path` in {})",
            env_key, name, DEFAULT_CONFIG_FILE
        ),
    })
}

/// Search `PATH` for an executable called `name`
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = dir.join(format!("{}.exe", name));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    })
}
