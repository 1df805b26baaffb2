//! Internal event queue.
//!
//! Events are produced by:
//! - the selection controller (highlight commands, provisioning start)
//! - RPC handlers on the IPC loop thread (select, start provisioning)
//! - the credential response handler (PSK obtained)
//! - the connection manager (clicker created / destroyed)
//!
//! Events are consumed by the main loop, which drains the queue and offers
//! each event to every consumer in turn.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Controller   │────▶│              │     │              │
//! │ IPC loop     │────▶│  EventQueue  │────▶│  Main Loop   │
//! │ Connections  │────▶│  (lossless)  │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::debug;

use crate::app::clicker::{DeviceId, PSK_MAX_LEN, bounded};
use crate::app::ports::EventSink;
use crate::app::selection::lock;

/// Events held in the channel before new ones spill to the overflow list.
pub const EVENT_QUEUE_CAP: usize = 64;

/// Commands sent to a clicker over its network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCommand {
    EnableHighlight,
    DisableHighlight,
}

/// A pre-shared credential issued for one clicker.
///
/// An empty identity or secret means issuance failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreSharedKey {
    pub clicker_id: DeviceId,
    pub identity: heapless::String<PSK_MAX_LEN>,
    pub secret: heapless::String<PSK_MAX_LEN>,
}

impl PreSharedKey {
    /// Credential carrying no identity or secret.
    pub fn failed(clicker_id: DeviceId) -> Self {
        Self {
            clicker_id,
            identity: heapless::String::new(),
            secret: heapless::String::new(),
        }
    }

    /// Credential with identity and secret capped at [`PSK_MAX_LEN`].
    pub fn new(clicker_id: DeviceId, identity: &str, secret: &str) -> Self {
        Self {
            clicker_id,
            identity: bounded(identity),
            secret: bounded(secret),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_empty() || self.secret.is_empty()
    }
}

/// Daemon event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ── Connection manager ────────────────────────────────
    /// A clicker connected and has a registry record.
    ClickerCreated(DeviceId),
    /// A clicker disconnected; its record is gone.
    ClickerDestroyed(DeviceId),

    // ── Selection / provisioning ──────────────────────────
    /// Move the selection to this clicker.
    ClickerSelected(DeviceId),
    /// Begin provisioning. `None` is passed through from a remote request
    /// made while nothing was selected; consumers must treat it as a no-op.
    StartProvision(Option<DeviceId>),
    /// Drop the clicker from the provisioning history.
    HistoryRemove(DeviceId),
    /// A credential-issuance reply arrived (possibly empty).
    PskObtained(PreSharedKey),

    // ── Outbound ──────────────────────────────────────────
    /// Send a command to one clicker.
    SendCommand {
        clicker: DeviceId,
        command: NetworkCommand,
    },
}

/// Lossless multi-producer event queue shared by the main and IPC threads.
///
/// The channel holds the first [`EVENT_QUEUE_CAP`] pending events. Once it
/// is full, further events go to an overflow list and are delivered after
/// the channel drains, so order is kept and nothing is dropped. Every push
/// and pop takes the overflow lock, which keeps the two stages consistent.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
    overflow: Mutex<VecDeque<Event>>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            channel: Channel::new(),
            overflow: Mutex::new(VecDeque::new()),
        }
    }

    /// Pop the next event, if any.
    pub fn pop(&self) -> Option<Event> {
        let mut overflow = lock(&self.overflow);
        match self.channel.try_receive() {
            Ok(event) => Some(event),
            Err(_) => overflow.pop_front(),
        }
    }

    /// Drain all pending events into a callback, in FIFO order.
    ///
    /// Events pushed by the callback itself are delivered in the same drain.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        let overflow = lock(&self.overflow);
        self.channel.is_empty() && overflow.is_empty()
    }

    pub fn len(&self) -> usize {
        let overflow = lock(&self.overflow);
        self.channel.len() + overflow.len()
    }
}

impl EventSink for EventQueue {
    fn push(&self, event: Event) -> bool {
        let mut overflow = lock(&self.overflow);
        if overflow.is_empty() {
            match self.channel.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(event)) => {
                    debug!("Events: queue past {} entries, spilling", EVENT_QUEUE_CAP);
                    overflow.push_back(event);
                }
            }
        } else {
            overflow.push_back(event);
        }
        true
    }
}
