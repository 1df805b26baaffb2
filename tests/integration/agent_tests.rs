//! IPC agent against the in-process bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use provisiond::adapters::history::HistoryStore;
use provisiond::adapters::local_bus::{LocalBus, LocalBusHub};
use provisiond::adapters::registry::ClickerRegistry;
use provisiond::app::clicker::{Clicker, HistoryItem, NAME_MAX_LEN, bounded};
use provisiond::app::controller::Controller;
use provisiond::app::ports::{HistoryPort, RegistryExt};
use provisiond::config::{IndicationTiming, IpcConfig};
use provisiond::error::Error;
use provisiond::events::{Event, EventQueue};
use provisiond::ipc::bus::MethodStatus;
use provisiond::ipc::methods::{ClickerState, StateReply};
use provisiond::ipc::{AgentDeps, IpcAgent};

use crate::mock_hw::{drain, wait_for_event};

const CALL_TIMEOUT: Duration = Duration::from_secs(2);
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

struct Rig {
    hub: LocalBusHub,
    agent: IpcAgent<LocalBus>,
    ctrl: Controller,
    registry: Arc<ClickerRegistry>,
    history: Arc<HistoryStore>,
    events: Arc<EventQueue>,
}

fn fast_config() -> IpcConfig {
    IpcConfig {
        loop_timer: Duration::from_millis(20),
        park_poll: Duration::from_millis(50),
        confirm_poll: Duration::from_millis(10),
        ..IpcConfig::default()
    }
}

fn rig(hub: LocalBusHub) -> Rig {
    let registry = Arc::new(ClickerRegistry::new());
    let history = Arc::new(HistoryStore::in_memory());
    let events = Arc::new(EventQueue::new());
    let ctrl = Controller::new(IndicationTiming::default());
    let deps = AgentDeps {
        registry: registry.clone(),
        history: history.clone(),
        selection: ctrl.view(),
        events: events.clone(),
    };
    let agent = IpcAgent::init(&hub, deps, fast_config()).unwrap();
    Rig {
        hub,
        agent,
        ctrl,
        registry,
        history,
        events,
    }
}

fn remote_rig() -> Rig {
    let r = rig(LocalBusHub::new());
    r.agent.enable_remote_control().unwrap();
    r
}

impl Rig {
    fn connect(&mut self, id: u32, name: &str) {
        self.registry.insert(Clicker::new(id, name));
        self.ctrl
            .consume_event(&Event::ClickerCreated(id), &*self.events);
        drain(&self.events);
    }

    fn call(&self, method: &str, args: Value) -> Result<Option<Value>, MethodStatus> {
        self.hub
            .call("provisioning-daemon", method, args, CALL_TIMEOUT)
            .unwrap()
    }

    fn state(&self) -> Vec<ClickerState> {
        let reply = self.call("getState", Value::Null).unwrap().unwrap();
        serde_json::from_value::<StateReply>(reply).unwrap().clickers
    }
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn object_is_published_only_on_request() {
    let r = rig(LocalBusHub::new());
    assert!(r.agent.is_running());
    assert!(!r.hub.has_object("provisioning-daemon"));
    r.agent.enable_remote_control().unwrap();
    assert!(r.hub.has_object("provisioning-daemon"));
}

#[test]
fn second_registration_fails_and_loop_keeps_serving() {
    let r = remote_rig();
    assert!(matches!(r.agent.enable_remote_control(), Err(Error::Bus(_))));
    assert!(r.call("getState", Value::Null).is_ok());
}

#[test]
fn destroy_stops_loop_and_unpublishes() {
    let mut r = remote_rig();
    r.agent.destroy();
    assert!(!r.agent.is_running());
    assert!(!r.hub.has_object("provisioning-daemon"));
    assert_eq!(r.agent.send_credential_request(1), Err(Error::NotRunning));
    // Idempotent.
    r.agent.destroy();
}

// ── RPC methods ───────────────────────────────────────────────

#[test]
fn get_state_lists_history_first_without_duplicates() {
    let mut r = remote_rig();
    r.connect(1, "one");
    r.connect(2, "two");
    r.history.add(HistoryItem {
        id: 2,
        name: bounded("two"),
        is_error: true,
    });
    r.history.add(HistoryItem {
        id: 9,
        name: bounded("gone"),
        is_error: false,
    });

    let state = r.state();
    let ids: Vec<_> = state.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 9, 1]);

    assert!(state[0].is_provisioned);
    assert!(state[0].is_error);
    assert!(!state[0].selected);
    assert!(!state[2].is_provisioned);
    assert!(state[2].selected);
}

#[test]
fn get_state_reports_live_flags() {
    let mut r = remote_rig();
    r.connect(1, "one");
    r.registry
        .with_clicker(1, |c| c.provisioning_in_progress = true);
    let state = r.state();
    assert_eq!(
        state,
        vec![ClickerState {
            id: 1,
            name: "one".into(),
            selected: true,
            in_provision_state: true,
            is_provisioned: false,
            is_error: false,
        }]
    );
}

#[test]
fn get_state_uses_wire_field_names() {
    let mut r = remote_rig();
    r.connect(1, "one");
    let reply = r.call("getState", Value::Null).unwrap().unwrap();
    let row = &reply["clickers"][0];
    for key in ["id", "name", "selected", "inProvisionState", "isProvisioned", "isError"] {
        assert!(row.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn get_state_skips_clickers_missing_from_registry() {
    let mut r = remote_rig();
    r.connect(1, "one");
    r.connect(2, "two");
    r.registry.remove(1);
    let ids: Vec<_> = r.state().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn select_pushes_event() {
    let r = remote_rig();
    assert_eq!(r.call("select", json!({"clickerID": 7})), Ok(None));
    assert_eq!(drain(&r.events), vec![Event::ClickerSelected(7)]);
}

#[test]
fn select_without_id_is_no_data() {
    let r = remote_rig();
    assert_eq!(r.call("select", json!({})), Err(MethodStatus::NoData));
    assert!(r.events.is_empty());
}

#[test]
fn start_provision_prefers_explicit_id() {
    let mut r = remote_rig();
    r.connect(1, "one");
    r.call("startProvision", json!({"clickerID": 5})).unwrap();
    r.call("startProvision", json!({})).unwrap();
    assert_eq!(
        drain(&r.events),
        vec![Event::StartProvision(Some(5)), Event::StartProvision(Some(1))]
    );
}

#[test]
fn start_provision_passes_empty_selection_through() {
    let r = remote_rig();
    r.call("startProvision", Value::Null).unwrap();
    assert_eq!(drain(&r.events), vec![Event::StartProvision(None)]);
}

#[test]
fn set_clicker_name_renames_and_truncates() {
    let mut r = remote_rig();
    r.connect(3, "old");
    let long = "n".repeat(NAME_MAX_LEN + 10);
    assert_eq!(
        r.call("setClickerName", json!({"clickerID": 3, "clickerName": long})),
        Ok(None)
    );
    let name = r.registry.with_clicker(3, |c| c.name.as_str().to_owned()).unwrap();
    assert_eq!(name.len(), NAME_MAX_LEN);
}

#[test]
fn set_clicker_name_failures_are_no_data() {
    let mut r = remote_rig();
    r.connect(3, "old");
    assert_eq!(
        r.call("setClickerName", json!({"clickerName": "x"})),
        Err(MethodStatus::NoData)
    );
    assert_eq!(
        r.call("setClickerName", json!({"clickerID": 3})),
        Err(MethodStatus::NoData)
    );
    assert_eq!(
        r.call("setClickerName", json!({"clickerID": 99, "clickerName": "x"})),
        Err(MethodStatus::NoData)
    );
    assert_eq!(
        r.registry.with_clicker(3, |c| c.name.as_str().to_owned()).as_deref(),
        Some("old")
    );
}

#[test]
fn badly_typed_arguments_are_invalid() {
    let r = remote_rig();
    assert_eq!(
        r.call("select", json!({"clickerID": "seven"})),
        Err(MethodStatus::InvalidArgument)
    );
}

// ── Credential requests ───────────────────────────────────────

#[test]
fn missing_credential_service_allocates_nothing() {
    let r = rig(LocalBusHub::new());
    assert_eq!(r.agent.send_credential_request(1), Err(Error::PeerUnavailable));
    assert_eq!(r.agent.pending_requests(), 0);
    // Let a few loop passes run: nothing may come back for the clicker.
    std::thread::sleep(Duration::from_millis(100));
    assert!(r.events.is_empty());
}

#[test]
fn credential_reply_becomes_psk_event_and_slot_is_reclaimed() {
    let hub = LocalBusHub::new();
    hub.register_service(
        "creator",
        Box::new(|_: &str, _: &Value| {
            Ok(Some(json!({"id": 1, "pskIdentity": "ident", "pskSecret": "secret"})))
        }),
    )
    .unwrap();
    let r = rig(hub);

    r.agent.send_credential_request(4).unwrap();
    let event = wait_for_event(&r.events, EVENT_TIMEOUT, |e| {
        matches!(e, Event::PskObtained(_))
    });
    let Some(Event::PskObtained(psk)) = event else {
        panic!("no credential event");
    };
    assert_eq!(psk.clicker_id, 4);
    assert_eq!(psk.identity.as_str(), "ident");
    assert_eq!(psk.secret.as_str(), "secret");

    // Reclaimed by the loop on a later iteration.
    let deadline = std::time::Instant::now() + EVENT_TIMEOUT;
    while r.agent.pending_requests() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(r.agent.pending_requests(), 0);
}

#[test]
fn credential_error_reply_yields_empty_psk() {
    let hub = LocalBusHub::new();
    hub.register_service(
        "creator",
        Box::new(|_: &str, _: &Value| Ok(Some(json!({"error": "no entropy"})))),
    )
    .unwrap();
    let r = rig(hub);

    r.agent.send_credential_request(6).unwrap();
    let event = wait_for_event(&r.events, EVENT_TIMEOUT, |e| {
        matches!(e, Event::PskObtained(_))
    });
    let Some(Event::PskObtained(psk)) = event else {
        panic!("no credential event");
    };
    assert_eq!(psk.clicker_id, 6);
    assert!(psk.is_empty());

    // Exactly one outcome per request.
    std::thread::sleep(Duration::from_millis(100));
    let extra: Vec<_> = drain(&r.events)
        .into_iter()
        .filter(|e| matches!(e, Event::PskObtained(_)))
        .collect();
    assert!(extra.is_empty(), "duplicate credential events: {:?}", extra);
}

#[test]
fn unanswered_requests_are_swept_on_destroy() {
    let hub = LocalBusHub::new();
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = asked.clone();
    hub.register_service(
        "creator",
        Box::new(move |_: &str, _: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }),
    )
    .unwrap();
    let mut r = rig(hub);

    r.agent.send_credential_request(1).unwrap();
    r.agent.send_credential_request(2).unwrap();
    assert_eq!(asked.load(Ordering::SeqCst), 2);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(r.agent.pending_requests(), 2);

    r.agent.destroy();
    assert_eq!(r.agent.pending_requests(), 0);
}

#[test]
fn rpc_and_requests_interleave_from_many_threads() {
    let hub = LocalBusHub::new();
    hub.register_service(
        "creator",
        Box::new(|_: &str, _: &Value| Ok(Some(json!({"pskIdentity": "i", "pskSecret": "s"})))),
    )
    .unwrap();
    let r = Arc::new(rig(hub));
    r.agent.enable_remote_control().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let r = r.clone();
            std::thread::spawn(move || {
                for i in 0..5 {
                    r.agent.send_credential_request(t * 10 + i).unwrap();
                    assert!(r.call("getState", Value::Null).is_ok());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut psks = 0;
    while psks < 20 {
        match wait_for_event(&r.events, EVENT_TIMEOUT, |e| matches!(e, Event::PskObtained(_))) {
            Some(_) => psks += 1,
            None => break,
        }
    }
    assert_eq!(psks, 20);
}
