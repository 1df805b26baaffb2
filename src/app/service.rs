//! Provisioning service: the main loop's event dispatch chain.
//!
//! [`ProvisioningService`] owns the controller and the shared handles. Each
//! drained event is offered to the controller first; what it declines goes
//! to the history store and the provisioning workflow. All I/O flows
//! through port traits injected at call sites.
//!
//! ```text
//!  EventQueue ──▶ ┌──────────────────────────────┐ ──▶ CredentialPort
//!                 │     ProvisioningService      │
//!  ButtonPort ──▶ │  Controller · History · PSK  │ ──▶ ConnectionPort
//!                 └──────────────────────────────┘ ──▶ IndicatorPort
//! ```

use std::sync::Arc;

use log::{error, info, warn};

use crate::events::{Event, EventQueue, PreSharedKey};

use super::clicker::{DeviceId, HistoryItem};
use super::controller::Controller;
use super::ports::{
    ButtonAction, Clock, ConnectionPort, CredentialPort, DeviceRegistry, HistoryPort,
    IndicatorPort, RegistryExt,
};

pub struct ProvisioningService {
    controller: Controller,
    registry: Arc<dyn DeviceRegistry>,
    history: Arc<dyn HistoryPort>,
    events: Arc<EventQueue>,
    clock: Arc<dyn Clock>,
}

impl ProvisioningService {
    pub fn new(
        controller: Controller,
        registry: Arc<dyn DeviceRegistry>,
        history: Arc<dyn HistoryPort>,
        events: Arc<EventQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            controller,
            registry,
            history,
            events,
            clock,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Drain the event queue through the dispatch chain.
    /// Returns the number of events handled.
    pub fn process_events(
        &mut self,
        credentials: &impl CredentialPort,
        connections: &mut impl ConnectionPort,
    ) -> usize {
        let mut n = 0;
        while let Some(event) = self.events.pop() {
            self.dispatch(event, credentials, connections);
            n += 1;
        }
        n
    }

    /// Route a button press to the controller.
    pub fn handle_button(&mut self, action: ButtonAction) {
        self.controller
            .handle_button(action, &*self.registry, &*self.events);
    }

    /// Run the controller's indication and watchdog step.
    pub fn tick(&mut self, indicator: &mut impl IndicatorPort, connections: &mut impl ConnectionPort) {
        let now = self.clock.now_ms();
        self.controller
            .tick(now, &*self.registry, indicator, connections);
    }

    /// Offer one event to every consumer in turn.
    pub fn dispatch(
        &mut self,
        event: Event,
        credentials: &impl CredentialPort,
        connections: &mut impl ConnectionPort,
    ) {
        if self.controller.consume_event(&event, &*self.events) {
            return;
        }
        match event {
            Event::HistoryRemove(id) => {
                if self.history.remove(id) {
                    info!("Provision: clicker {} removed from history", id);
                }
            }
            Event::StartProvision(None) => {
                error!("Provision: start requested with no clicker selected");
            }
            Event::StartProvision(Some(id)) => self.start(id, credentials),
            Event::PskObtained(psk) => self.complete(&psk, connections),
            Event::SendCommand { clicker, command } => {
                connections.send_command(clicker, command);
            }
            other => warn!("Provision: unhandled event {:?}", other),
        }
    }

    fn start(&mut self, id: DeviceId, credentials: &impl CredentialPort) {
        let known = self
            .registry
            .with_clicker(id, |c| {
                c.provisioning_in_progress = true;
                c.error = false;
                c.provision_time = None;
            })
            .is_some();
        if !known {
            error!("Provision: clicker {} not found", id);
            return;
        }

        if let Err(e) = credentials.request_credentials(id) {
            error!("Provision: credential request for clicker {} failed: {}", id, e);
            self.registry.with_clicker(id, |c| {
                c.provisioning_in_progress = false;
                c.error = true;
            });
        }
    }

    fn complete(&mut self, psk: &PreSharedKey, connections: &mut impl ConnectionPort) {
        let id = psk.clicker_id;
        let name = self.registry.with_clicker(id, |c| c.name.clone());
        let Some(name) = name else {
            warn!("Provision: credential for vanished clicker {}", id);
            return;
        };

        let delivered = !psk.is_empty() && connections.send_psk(psk);
        let now = self.clock.now_ms();
        self.registry.with_clicker(id, |c| {
            c.provisioning_in_progress = false;
            c.error = !delivered;
            if delivered {
                c.provision_time = Some(now);
            }
        });

        if delivered {
            info!("Provision: clicker {} provisioned", id);
        } else {
            error!("Provision: clicker {} failed to provision", id);
        }
        self.history.add(HistoryItem {
            id,
            name,
            is_error: !delivered,
        });
    }
}
