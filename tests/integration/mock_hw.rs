//! Mock adapters for integration tests.
//!
//! Record every call so tests can assert on the full history without real
//! LEDs, switches or clicker links.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use provisiond::app::clicker::DeviceId;
use provisiond::app::ports::{Button, ButtonAction, ButtonPort, ConnectionPort, IndicatorPort};
use provisiond::error::HwError;
use provisiond::events::{Event, EventQueue, NetworkCommand, PreSharedKey};

// ── Indicator ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCall {
    SetMask(u8),
    Release,
}

#[derive(Default)]
pub struct MockIndicator {
    pub calls: Vec<IndicatorCall>,
}

#[allow(dead_code)]
impl MockIndicator {
    pub fn last(&self) -> Option<IndicatorCall> {
        self.calls.last().copied()
    }
}

impl IndicatorPort for MockIndicator {
    fn set_mask(&mut self, mask: u8) {
        self.calls.push(IndicatorCall::SetMask(mask));
    }

    fn release(&mut self) {
        self.calls.push(IndicatorCall::Release);
    }
}

// ── Buttons ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockButtons {
    pub fail_init: bool,
    pub bound: Vec<(Button, ButtonAction)>,
    pub released: bool,
    pub script: VecDeque<ButtonAction>,
}

impl ButtonPort for MockButtons {
    fn init(&mut self) -> Result<(), HwError> {
        if self.fail_init {
            Err(HwError::Gpio)
        } else {
            Ok(())
        }
    }

    fn bind(&mut self, button: Button, action: ButtonAction) -> Result<(), HwError> {
        self.bound.push((button, action));
        Ok(())
    }

    fn poll(&mut self, _now_ms: u64) -> Option<ButtonAction> {
        self.script.pop_front()
    }

    fn release(&mut self) {
        self.released = true;
        self.bound.clear();
    }
}

// ── Clicker links ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockLinks {
    pub commands: Vec<(DeviceId, NetworkCommand)>,
    pub psks: Vec<PreSharedKey>,
    pub disconnected: Vec<DeviceId>,
}

impl ConnectionPort for MockLinks {
    fn send_command(&mut self, clicker: DeviceId, command: NetworkCommand) {
        self.commands.push((clicker, command));
    }

    fn send_psk(&mut self, psk: &PreSharedKey) -> bool {
        self.psks.push(psk.clone());
        true
    }

    fn disconnect(&mut self, clicker: DeviceId) {
        self.disconnected.push(clicker);
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Every event currently queued, in order.
pub fn drain(events: &EventQueue) -> Vec<Event> {
    let mut out = Vec::new();
    events.drain(|e| out.push(e));
    out
}

/// Poll the queue until an event matching `pred` shows up, collecting the
/// events seen on the way. Gives up after `timeout`.
#[allow(dead_code)]
pub fn wait_for_event(
    events: &Arc<EventQueue>,
    timeout: Duration,
    pred: impl Fn(&Event) -> bool,
) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        while let Some(e) = events.pop() {
            if pred(&e) {
                return Some(e);
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    None
}
