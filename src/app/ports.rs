//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / IpcAgent (domain)
//! ```
//!
//! Driven adapters (registry, history, indicator, buttons, connections)
//! implement these traits. The controller takes them at call sites and the
//! IPC agent holds shared handles, so the domain core never touches
//! hardware or storage directly.
//!
//! Ports used from both the main thread and the IPC loop thread take `&self`
//! and must be `Send + Sync`; the implementations carry their own locking.

use crate::app::clicker::{Clicker, DeviceId, HistoryItem};
use crate::config::DaemonConfig;
use crate::error::HwError;
use crate::events::{Event, NetworkCommand, PreSharedKey};

// ───────────────────────────────────────────────────────────────
// Device registry (collaborator: keyed store with per-record ownership)
// ───────────────────────────────────────────────────────────────

/// Keyed store of clicker records with exclusive per-record ownership.
///
/// Ownership is scoped to the closure: it is acquired before `f` runs and
/// released when `f` returns. A lookup miss returns `false` immediately and
/// never blocks. Acquiring a record held elsewhere waits without a timeout.
pub trait DeviceRegistry: Send + Sync {
    /// Run `f` with exclusive ownership of the record for `id`.
    /// Returns `false` (without calling `f`) if the id is unknown.
    fn acquire(&self, id: DeviceId, f: &mut dyn FnMut(&mut Clicker)) -> bool;
}

/// Value-returning convenience over [`DeviceRegistry::acquire`].
pub trait RegistryExt {
    fn with_clicker<T>(&self, id: DeviceId, f: impl FnOnce(&mut Clicker) -> T) -> Option<T>;
}

impl<R: DeviceRegistry + ?Sized> RegistryExt for R {
    fn with_clicker<T>(&self, id: DeviceId, f: impl FnOnce(&mut Clicker) -> T) -> Option<T> {
        let mut f = Some(f);
        let mut out = None;
        self.acquire(id, &mut |clicker| {
            if let Some(f) = f.take() {
                out = Some(f(clicker));
            }
        });
        out
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink (collaborator: process-wide event queue)
// ───────────────────────────────────────────────────────────────

/// Push side of the internal event queue. Ownership of the event moves
/// into the queue. Returns `false` if the event was dropped.
pub trait EventSink: Send + Sync {
    fn push(&self, event: Event) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Provisioning history (collaborator: persisted store)
// ───────────────────────────────────────────────────────────────

/// Record of clickers that already went through provisioning.
pub trait HistoryPort: Send + Sync {
    /// All provisioned entries, oldest first.
    fn provisioned(&self) -> Vec<HistoryItem>;

    /// Add or replace the entry for `item.id`.
    fn add(&self, item: HistoryItem);

    /// Remove the entry for `id`. Returns `true` if one existed.
    fn remove(&self, id: DeviceId) -> bool;

    fn contains(&self, id: DeviceId) -> bool {
        self.provisioned().iter().any(|h| h.id == id)
    }
}

// ───────────────────────────────────────────────────────────────
// Indicator (driven adapter: domain → LED bank)
// ───────────────────────────────────────────────────────────────

/// The bank of indicator LEDs, one bit per position.
pub trait IndicatorPort {
    /// Light the LEDs whose bits are set, turn off the others.
    /// Implementations initialise the hardware on first use.
    fn set_mask(&mut self, mask: u8);

    /// Turn everything off and release the hardware.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Buttons (driving adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Physical switches on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Switch1,
    Switch2,
}

/// What a button press asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    SelectNext,
    StartProvision,
}

/// Button input with per-switch action bindings.
pub trait ButtonPort {
    /// Acquire the switches.
    fn init(&mut self) -> Result<(), HwError>;

    /// Bind a switch press to an action.
    fn bind(&mut self, button: Button, action: ButtonAction) -> Result<(), HwError>;

    /// Sample the switches; returns the action of a newly completed press.
    fn poll(&mut self, now_ms: u64) -> Option<ButtonAction>;

    /// Release the switches and drop all bindings.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Connection manager (collaborator: domain → clicker links)
// ───────────────────────────────────────────────────────────────

/// Network link to the clickers.
pub trait ConnectionPort {
    /// Send a command to one clicker.
    fn send_command(&mut self, clicker: DeviceId, command: NetworkCommand);

    /// Deliver an issued credential to its clicker. Returns `false` if the
    /// clicker is no longer reachable.
    fn send_psk(&mut self, psk: &PreSharedKey) -> bool;

    /// Drop the connection. Idempotent for unknown ids.
    fn disconnect(&mut self, clicker: DeviceId);
}

// ───────────────────────────────────────────────────────────────
// Credential issuance (domain → IPC agent)
// ───────────────────────────────────────────────────────────────

/// Asynchronous credential requests; the reply arrives later as
/// [`Event::PskObtained`].
pub trait CredentialPort {
    fn request_credentials(&self, clicker: DeviceId) -> crate::error::Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads daemon configuration.
///
/// Implementations MUST validate before returning; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<DaemonConfig, ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found (first start).
    NotFound,
    /// Stored config could not be parsed.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
