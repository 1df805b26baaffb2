//! IPC bus abstraction.
//!
//! The agent is generic over [`BusPort`], so a different bus backend only
//! needs a new adapter. Messages are `serde_json::Value` documents; the
//! wire encoding belongs to the adapter.
//!
//! Concrete implementations:
//! - [`LocalBus`](crate::adapters::local_bus::LocalBus): in-process hub for
//!   the simulation daemon and tests

use std::time::Duration;

use serde_json::Value;

use crate::error::BusError;

/// Correlates an asynchronous invocation with its reply.
pub type RequestId = u64;

/// Bus-assigned handle of a remote object.
pub type ObjectId = u32;

/// Status returned to a remote caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStatus {
    Ok,
    InvalidArgument,
    MethodNotFound,
    NoData,
}

impl core::fmt::Display for MethodStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::MethodNotFound => write!(f, "method not found"),
            Self::NoData => write!(f, "no data"),
        }
    }
}

/// An object to publish on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpec {
    pub name: String,
    pub methods: Vec<&'static str>,
}

/// Callbacks run on the thread driving [`BusPort::run`].
pub trait BusHandler {
    /// A remote caller invoked one of our methods. `Ok(None)` means success
    /// without a reply document.
    fn on_call(&mut self, method: &str, args: &Value) -> Result<Option<Value>, MethodStatus>;

    /// A reply to [`BusPort::invoke_async`] arrived.
    fn on_reply(&mut self, request: RequestId, reply: &Value);
}

/// An open bus connection.
pub trait BusPort: Send {
    /// Run one dispatch pass.
    ///
    /// Incoming calls and replies go to `handler`. Every `timer_period`
    /// the pass calls `on_timer`; returning `false` ends the pass.
    fn run(
        &mut self,
        handler: &mut dyn BusHandler,
        timer_period: Duration,
        on_timer: &mut dyn FnMut() -> bool,
    ) -> Result<(), BusError>;

    /// Publish an object. Calls for its methods reach the handler of the
    /// next [`run`](Self::run) pass.
    fn add_object(&mut self, object: &ObjectSpec) -> Result<(), BusError>;

    /// Resolve an object name.
    fn lookup_id(&mut self, name: &str) -> Result<ObjectId, BusError>;

    /// Dispatch a call without waiting; the reply is delivered later
    /// through [`BusHandler::on_reply`] with the same `request`.
    fn invoke_async(
        &mut self,
        object: ObjectId,
        method: &str,
        body: &Value,
        request: RequestId,
    ) -> Result<(), BusError>;

    /// Close the connection. Further calls fail with
    /// [`BusError::Disconnected`].
    fn shutdown(&mut self);
}

/// Opens bus connections.
pub trait BusConnector {
    type Bus: BusPort + 'static;

    /// Connect to the bus at `path`, or the default socket when `None`.
    fn connect(&self, path: Option<&str>) -> Result<Self::Bus, BusError>;
}
