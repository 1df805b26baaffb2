//! Unified error types for the provisioning daemon.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's error handling uniform. Variants are `Copy` so they can be
//! passed between the main thread and the IPC loop thread without
//! allocation.

use core::fmt;

use crate::app::clicker::DeviceId;

// ---------------------------------------------------------------------------
// Top-level daemon error
// ---------------------------------------------------------------------------

/// Every fallible operation in the daemon funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A device id is not present in the registry.
    Lookup(DeviceId),
    /// A required RPC argument was absent.
    MissingField(&'static str),
    /// The credential-issuance service is not advertised on the bus.
    PeerUnavailable,
    /// The IPC bus refused an operation.
    Bus(BusError),
    /// Startup of a subsystem failed.
    Init(&'static str),
    /// A handshake operation was invoked from the IPC loop thread itself.
    WrongThread,
    /// The IPC loop has already stopped.
    NotRunning,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup(id) => write!(f, "no clicker with id {id}"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::PeerUnavailable => write!(f, "credential service not available"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::WrongThread => write!(f, "operation not allowed on the IPC loop thread"),
            Self::NotRunning => write!(f, "IPC loop is not running"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The named object or service does not exist.
    NotFound,
    /// An object with the same name is already registered.
    AlreadyExists,
    /// The bus connection went away.
    Disconnected,
    /// The remote side did not answer in time.
    Timeout,
    /// An asynchronous invocation could not be dispatched.
    InvokeFailed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Timeout => write!(f, "timed out"),
            Self::InvokeFailed => write!(f, "invoke failed"),
        }
    }
}

impl std::error::Error for BusError {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Errors from the indicator and button drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// A GPIO read or write failed.
    Gpio,
    /// The driver was used before `init`.
    NotInitialised,
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio => write!(f, "GPIO access failed"),
            Self::NotInitialised => write!(f, "driver not initialised"),
        }
    }
}

impl std::error::Error for HwError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Daemon-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
