//! Selection & indication controller.
//!
//! Tracks which clickers are connected and which one is selected, drives
//! the LED bank with a blinking cursor, and disconnects clickers once their
//! credential has been delivered for long enough.
//!
//! ```text
//!   Event (created/destroyed/selected) ──▶ ┌─────────────┐ ──▶ SendCommand (highlight)
//!   ButtonAction ─────────────────────────▶ │ Controller  │ ──▶ StartProvision / HistoryRemove
//!   tick(now) ────────────────────────────▶ └─────────────┘ ──▶ IndicatorPort / disconnect
//! ```
//!
//! All ports are passed at the call site. The selection is shared with the
//! IPC loop thread through a [`SelectionView`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::config::IndicationTiming;
use crate::events::Event;

use super::clicker::DeviceId;
use super::ports::{
    Button, ButtonAction, ButtonPort, ConnectionPort, DeviceRegistry, EventSink, IndicatorPort,
    RegistryExt,
};
use super::selection::{Selection, SelectionView, lock};

/// Blink phase of the selected clicker's LED.
#[derive(Debug, Clone, Copy)]
struct Blink {
    /// `true` while the selected LED is inverted.
    on: bool,
    last_flip_ms: u64,
}

pub struct Controller {
    selection: Arc<Mutex<Selection>>,
    blink: Blink,
    /// Clickers already told to disconnect; cleared on destroy.
    disconnect_issued: HashSet<DeviceId>,
    buttons_enabled: bool,
    timing: IndicationTiming,
}

impl Controller {
    pub fn new(timing: IndicationTiming) -> Self {
        Self {
            selection: Arc::new(Mutex::new(Selection::new())),
            blink: Blink {
                on: true,
                last_flip_ms: 0,
            },
            disconnect_issued: HashSet::new(),
            buttons_enabled: false,
            timing,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Reset the selection and, if enabled, bind the two switches.
    ///
    /// Button failures are logged and otherwise ignored; the daemon keeps
    /// running with remote control only.
    pub fn initialize(&mut self, buttons_enabled: bool, buttons: &mut impl ButtonPort) {
        lock(&self.selection).clear();
        self.disconnect_issued.clear();
        self.buttons_enabled = buttons_enabled;

        if !buttons_enabled {
            info!("Controls: buttons disabled");
            return;
        }

        let bound = buttons.init().and_then(|()| {
            buttons.bind(Button::Switch1, ButtonAction::SelectNext)?;
            buttons.bind(Button::Switch2, ButtonAction::StartProvision)
        });
        match bound {
            Ok(()) => info!("Controls: buttons bound"),
            Err(e) => error!("Controls: button setup failed: {}", e),
        }
    }

    /// Drop all state and release the hardware.
    pub fn shutdown(&mut self, buttons: &mut impl ButtonPort, indicator: &mut impl IndicatorPort) {
        lock(&self.selection).clear();
        self.disconnect_issued.clear();
        if self.buttons_enabled {
            buttons.release();
            self.buttons_enabled = false;
        }
        indicator.release();
        info!("Controls: shut down");
    }

    /// Read handle for other threads.
    pub fn view(&self) -> SelectionView {
        SelectionView::new(self.selection.clone())
    }

    pub fn selected(&self) -> Option<DeviceId> {
        lock(&self.selection).selected()
    }

    pub fn connected(&self) -> Vec<DeviceId> {
        lock(&self.selection).devices().to_vec()
    }

    // ── Events ────────────────────────────────────────────────

    /// Offer an event. Returns `true` if the controller handled it.
    pub fn consume_event(&mut self, event: &Event, sink: &(impl EventSink + ?Sized)) -> bool {
        match *event {
            Event::ClickerCreated(id) => {
                if lock(&self.selection).insert(id) {
                    debug!("Controls: clicker {} connected", id);
                }
            }
            Event::ClickerDestroyed(id) => {
                if lock(&self.selection).remove(id) {
                    debug!("Controls: clicker {} gone", id);
                }
                self.disconnect_issued.remove(&id);
            }
            Event::ClickerSelected(id) => {
                if lock(&self.selection).select(id) {
                    info!("Controls: Selected clicker id {}", id);
                } else {
                    warn!("Controls: cannot select unknown clicker {}", id);
                }
            }
            _ => return false,
        }
        self.emit_highlights(sink);
        true
    }

    /// Move the cursor one step forward, stopping at the last clicker.
    pub fn select_next(&mut self, sink: &(impl EventSink + ?Sized)) {
        let selected = {
            let mut sel = lock(&self.selection);
            sel.select_next();
            sel.selected()
        };
        if let Some(id) = selected {
            info!("Controls: Selected clicker id {}", id);
        }
        self.emit_highlights(sink);
    }

    /// Mark the selected clicker as provisioning and ask for its credential.
    pub fn start_provision(
        &mut self,
        registry: &(impl DeviceRegistry + ?Sized),
        sink: &(impl EventSink + ?Sized),
    ) {
        let Some(id) = self.selected() else {
            error!("Controls: no clicker selected, cannot start provisioning");
            return;
        };

        if registry
            .with_clicker(id, |c| c.provisioning_in_progress = true)
            .is_none()
        {
            error!("Controls: selected clicker {} not in registry", id);
            return;
        }

        info!("Controls: provisioning clicker {}", id);
        sink.push(Event::StartProvision(Some(id)));
        sink.push(Event::HistoryRemove(id));
    }

    /// Route a bound button press.
    pub fn handle_button(
        &mut self,
        action: ButtonAction,
        registry: &(impl DeviceRegistry + ?Sized),
        sink: &(impl EventSink + ?Sized),
    ) {
        match action {
            ButtonAction::SelectNext => self.select_next(sink),
            ButtonAction::StartProvision => self.start_provision(registry, sink),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Advance the blink, refresh the LEDs and run the disconnect watchdog.
    pub fn tick(
        &mut self,
        now_ms: u64,
        registry: &(impl DeviceRegistry + ?Sized),
        indicator: &mut impl IndicatorPort,
        connections: &mut impl ConnectionPort,
    ) {
        // 1. Is the selected clicker provisioning?
        let selected = self.selected();
        let provisioning = match selected {
            None => false,
            Some(id) => registry
                .with_clicker(id, |c| c.provisioning_in_progress)
                .unwrap_or_else(|| {
                    error!("Controls: selected clicker {} not in registry", id);
                    false
                }),
        };

        // 2. Blink phase
        let interval = if provisioning {
            self.timing.fast_blink_ms
        } else {
            self.timing.slow_blink_ms
        };
        if now_ms.saturating_sub(self.blink.last_flip_ms) > interval {
            self.blink.on = !self.blink.on;
            self.blink.last_flip_ms = now_ms;
        }

        // 3. LEDs
        let (mask, connected) = {
            let sel = lock(&self.selection);
            (sel.indicator_mask(self.blink.on), sel.devices().to_vec())
        };
        match mask {
            Some(mask) => indicator.set_mask(mask),
            None => indicator.release(),
        }

        // 4. Watchdog
        let mut expired = Vec::new();
        for id in connected {
            if self.disconnect_issued.contains(&id) {
                continue;
            }
            let provisioned_at = registry.with_clicker(id, |c| c.provision_time).flatten();
            if let Some(t) = provisioned_at {
                if now_ms.saturating_sub(t) > self.timing.disconnect_after_provision_ms {
                    expired.push(id);
                }
            }
        }
        for id in expired {
            info!("Controls: disconnecting provisioned clicker {}", id);
            self.disconnect_issued.insert(id);
            connections.disconnect(id);
        }
    }

    fn emit_highlights(&self, sink: &(impl EventSink + ?Sized)) {
        let commands = lock(&self.selection).highlight_commands();
        for (clicker, command) in commands {
            sink.push(Event::SendCommand { clicker, command });
        }
    }
}
