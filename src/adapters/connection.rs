//! Simulated connection manager.
//!
//! Stands in for the clicker network link: connecting a clicker creates
//! its registry record and announces it, disconnecting removes it. Commands
//! and credentials are recorded instead of transmitted.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::app::clicker::{Clicker, DeviceId};
use crate::app::ports::{ConnectionPort, EventSink};
use crate::events::{Event, NetworkCommand, PreSharedKey};

use super::registry::ClickerRegistry;

pub struct SimConnections {
    registry: Arc<ClickerRegistry>,
    events: Arc<dyn EventSink>,
    /// Last command sent to each clicker.
    highlight: HashMap<DeviceId, NetworkCommand>,
    delivered: Vec<PreSharedKey>,
}

impl SimConnections {
    pub fn new(registry: Arc<ClickerRegistry>, events: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            events,
            highlight: HashMap::new(),
            delivered: Vec::new(),
        }
    }

    /// A clicker came online.
    pub fn connect(&mut self, id: DeviceId, name: &str) -> bool {
        if !self.registry.insert(Clicker::new(id, name)) {
            warn!("Link: clicker {} already connected", id);
            return false;
        }
        info!("Link: clicker {} connected", id);
        self.events.push(Event::ClickerCreated(id))
    }

    /// Last command received by `id`.
    pub fn last_command(&self, id: DeviceId) -> Option<NetworkCommand> {
        self.highlight.get(&id).copied()
    }

    /// Credentials delivered so far, oldest first.
    pub fn delivered(&self) -> &[PreSharedKey] {
        &self.delivered
    }
}

impl ConnectionPort for SimConnections {
    fn send_command(&mut self, clicker: DeviceId, command: NetworkCommand) {
        if !self.registry.contains(clicker) {
            warn!("Link: command for unknown clicker {}", clicker);
            return;
        }
        debug!("Link: {:?} -> clicker {}", command, clicker);
        self.highlight.insert(clicker, command);
    }

    fn send_psk(&mut self, psk: &PreSharedKey) -> bool {
        if !self.registry.contains(psk.clicker_id) {
            warn!("Link: clicker {} gone before credential delivery", psk.clicker_id);
            return false;
        }
        info!("Link: credential delivered to clicker {}", psk.clicker_id);
        self.delivered.push(psk.clone());
        true
    }

    fn disconnect(&mut self, clicker: DeviceId) {
        self.highlight.remove(&clicker);
        if self.registry.remove(clicker).is_some() {
            info!("Link: clicker {} disconnected", clicker);
            self.events.push(Event::ClickerDestroyed(clicker));
        }
    }
}
