//! Fuzz target: RPC method dispatch
//!
//! The first byte picks a method, the rest is parsed as the JSON argument
//! document, mimicking what a bus client can send.
//!
//! Invariants checked:
//! - No panics for any method/argument combination
//! - `getState` always answers with a document
//! - At most one event is queued per call
//!
//! cargo fuzz run fuzz_rpc_dispatch

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use provisiond::adapters::history::HistoryStore;
use provisiond::adapters::registry::ClickerRegistry;
use provisiond::app::clicker::Clicker;
use provisiond::app::controller::Controller;
use provisiond::config::IndicationTiming;
use provisiond::events::{Event, EventQueue};
use provisiond::ipc::AgentDeps;
use provisiond::ipc::methods::{self, METHODS};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let args = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let method = METHODS
        .get(usize::from(selector) % (METHODS.len() + 1))
        .copied()
        .unwrap_or("bogus");

    let registry = Arc::new(ClickerRegistry::new());
    registry.insert(Clicker::new(1, "one"));
    let events = Arc::new(EventQueue::new());
    let mut controller = Controller::new(IndicationTiming::default());
    controller.consume_event(&Event::ClickerCreated(1), &*events);
    while events.pop().is_some() {}

    let deps = AgentDeps {
        registry,
        history: Arc::new(HistoryStore::in_memory()),
        selection: controller.view(),
        events: events.clone(),
    };

    let result = methods::dispatch(&deps, method, &args);
    if method == methods::GET_STATE {
        assert!(matches!(result, Ok(Some(_))));
    }
    assert!(events.len() <= 1);
});
