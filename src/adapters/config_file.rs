//! JSON config file adapter.
//!
//! Implements [`ConfigPort`]. Fields absent from the file keep their
//! defaults; the result is validated before it is returned.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::DaemonConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write `config` to the file, validating first.
    pub fn save(&self, config: &DaemonConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        fs::write(&self.path, json).map_err(|e| {
            warn!("Config: cannot write {}: {}", self.path.display(), e);
            ConfigError::IoError
        })
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<DaemonConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => {
                warn!("Config: cannot read {}: {}", self.path.display(), e);
                ConfigError::IoError
            }
        })?;
        let config: DaemonConfig = serde_json::from_str(&text).map_err(|e| {
            warn!("Config: {} is not valid: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("Config: loaded from {}", self.path.display());
        Ok(config)
    }
}
