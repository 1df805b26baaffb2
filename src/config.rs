//! Daemon configuration parameters
//!
//! All tunable parameters for the provisioning daemon.
//! Values can be overridden from a JSON config file (see
//! [`JsonConfigFile`](crate::adapters::config_file::JsonConfigFile)).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    // --- Bus ---
    /// Bus socket path; `None` uses the bus library default.
    pub bus_path: Option<String>,
    /// Name under which the RPC object is registered.
    pub object_name: String,
    /// Name of the credential-issuance service.
    pub credential_service: String,
    /// Register the RPC object at startup.
    pub remote_control: bool,

    // --- Local controls ---
    /// Bind the two physical buttons.
    pub enable_buttons: bool,

    // --- Indication ---
    /// Blink half-period while the selected clicker is idle (ms).
    pub slow_blink_ms: u64,
    /// Blink half-period while the selected clicker is provisioning (ms).
    pub fast_blink_ms: u64,
    /// Delay between credential delivery and forced disconnect (ms).
    pub disconnect_after_provision_ms: u64,

    // --- IPC loop timing ---
    /// Helper-timer period bounding how long one bus pass can run (ms).
    pub loop_timer_ms: u64,
    /// Upper bound on one parked wait of the loop thread (ms).
    pub park_poll_ms: u64,
    /// Upper bound on one confirmation wait of a requester (ms).
    pub confirm_poll_ms: u64,

    // --- Main loop ---
    /// Controller tick cadence (ms).
    pub tick_interval_ms: u64,

    // --- Storage ---
    /// History file; `None` keeps history in memory only.
    pub history_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            // Bus
            bus_path: None,
            object_name: "provisioning-daemon".into(),
            credential_service: "creator".into(),
            remote_control: true,

            // Local controls
            enable_buttons: true,

            // Indication
            slow_blink_ms: 500,
            fast_blink_ms: 100,
            disconnect_after_provision_ms: 3000,

            // IPC loop timing
            loop_timer_ms: 500,
            park_poll_ms: 1000,
            confirm_poll_ms: 200,

            // Main loop
            tick_interval_ms: 50, // 20 Hz

            // Storage
            history_path: None,
        }
    }
}

impl DaemonConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object_name.is_empty() {
            return Err(ConfigError::ValidationFailed("object_name is empty"));
        }
        if self.credential_service.is_empty() {
            return Err(ConfigError::ValidationFailed("credential_service is empty"));
        }
        if self.fast_blink_ms == 0 || self.slow_blink_ms == 0 {
            return Err(ConfigError::ValidationFailed("blink intervals must be > 0"));
        }
        if self.fast_blink_ms >= self.slow_blink_ms {
            return Err(ConfigError::ValidationFailed(
                "fast_blink_ms must be below slow_blink_ms",
            ));
        }
        if self.loop_timer_ms == 0 || self.park_poll_ms == 0 || self.confirm_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("IPC loop periods must be > 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        Ok(())
    }

    pub fn indication(&self) -> IndicationTiming {
        IndicationTiming {
            slow_blink_ms: self.slow_blink_ms,
            fast_blink_ms: self.fast_blink_ms,
            disconnect_after_provision_ms: self.disconnect_after_provision_ms,
        }
    }

    pub fn ipc(&self) -> IpcConfig {
        IpcConfig {
            object_name: self.object_name.clone(),
            credential_service: self.credential_service.clone(),
            bus_path: self.bus_path.clone(),
            loop_timer: Duration::from_millis(self.loop_timer_ms),
            park_poll: Duration::from_millis(self.park_poll_ms),
            confirm_poll: Duration::from_millis(self.confirm_poll_ms),
        }
    }
}

/// Timing used by the selection controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicationTiming {
    pub slow_blink_ms: u64,
    pub fast_blink_ms: u64,
    pub disconnect_after_provision_ms: u64,
}

impl Default for IndicationTiming {
    fn default() -> Self {
        DaemonConfig::default().indication()
    }
}

/// Settings for the IPC agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcConfig {
    pub object_name: String,
    pub credential_service: String,
    pub bus_path: Option<String>,
    pub loop_timer: Duration,
    pub park_poll: Duration,
    pub confirm_poll: Duration,
}

impl Default for IpcConfig {
    fn default() -> Self {
        DaemonConfig::default().ipc()
    }
}
