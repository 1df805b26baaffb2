//! Clicker records as stored in the device registry.
//!
//! The registry owns these; the controller and the IPC agent only touch
//! them while holding the record's ownership (see
//! [`DeviceRegistry`](super::ports::DeviceRegistry)).

use serde::{Deserialize, Serialize};

/// Identifier of a clicker, as carried on the bus (`clickerID`).
pub type DeviceId = u32;

/// Maximum display-name length in bytes.
pub const NAME_MAX_LEN: usize = 24;

/// Maximum PSK identity / secret length in bytes.
pub const PSK_MAX_LEN: usize = 128;

/// Bounded display name.
pub type ClickerName = heapless::String<NAME_MAX_LEN>;

/// A connected clicker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clicker {
    pub id: DeviceId,
    pub name: ClickerName,
    /// Set when provisioning starts, cleared once the attempt concludes.
    pub provisioning_in_progress: bool,
    /// Millisecond timestamp at which the credential was delivered.
    /// Read by the controller watchdog to decide when to disconnect.
    pub provision_time: Option<u64>,
    pub error: bool,
}

impl Clicker {
    pub fn new(id: DeviceId, name: &str) -> Self {
        Self {
            id,
            name: bounded(name),
            provisioning_in_progress: false,
            provision_time: None,
            error: false,
        }
    }

    /// Replace the display name, truncating to [`NAME_MAX_LEN`].
    pub fn rename(&mut self, name: &str) {
        self.name = bounded(name);
    }
}

/// An entry of the provisioning history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: DeviceId,
    pub name: ClickerName,
    pub is_error: bool,
}

/// Copy `s` into a fixed-capacity string, truncating on a char boundary.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    // Cannot fail: `end <= N`.
    let _ = out.push_str(&s[..end]);
    out
}
