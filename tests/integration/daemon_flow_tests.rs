//! End-to-end provisioning flow: buttons → credential service → clicker →
//! watchdog disconnect, wired the way the daemon binary wires it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use provisiond::adapters::connection::SimConnections;
use provisiond::adapters::history::HistoryStore;
use provisiond::adapters::local_bus::{LocalBus, LocalBusHub};
use provisiond::adapters::registry::ClickerRegistry;
use provisiond::adapters::time::ManualClock;
use provisiond::app::controller::Controller;
use provisiond::app::ports::{ButtonAction, ConnectionPort, HistoryPort, RegistryExt};
use provisiond::app::service::ProvisioningService;
use provisiond::config::DaemonConfig;
use provisiond::events::{EventQueue, NetworkCommand};
use provisiond::ipc::methods::StateReply;
use provisiond::ipc::{AgentDeps, IpcAgent};

use crate::mock_hw::{IndicatorCall, MockIndicator};

struct Daemon {
    hub: LocalBusHub,
    agent: IpcAgent<LocalBus>,
    service: ProvisioningService,
    links: SimConnections,
    leds: MockIndicator,
    registry: Arc<ClickerRegistry>,
    history: Arc<HistoryStore>,
    clock: ManualClock,
}

fn daemon(credential_reply: Value) -> Daemon {
    let config = DaemonConfig {
        loop_timer_ms: 20,
        park_poll_ms: 50,
        confirm_poll_ms: 10,
        ..DaemonConfig::default()
    };

    let hub = LocalBusHub::new();
    hub.register_service(
        &config.credential_service,
        Box::new(move |_: &str, _: &Value| Ok(Some(credential_reply.clone()))),
    )
    .unwrap();

    let events = Arc::new(EventQueue::new());
    let registry = Arc::new(ClickerRegistry::new());
    let history = Arc::new(HistoryStore::in_memory());
    let clock = ManualClock::new(0);

    let mut controller = Controller::new(config.indication());
    controller.initialize(false, &mut crate::mock_hw::MockButtons::default());

    let agent = IpcAgent::init(
        &hub,
        AgentDeps {
            registry: registry.clone(),
            history: history.clone(),
            selection: controller.view(),
            events: events.clone(),
        },
        config.ipc(),
    )
    .unwrap();
    agent.enable_remote_control().unwrap();

    let links = SimConnections::new(registry.clone(), events.clone());
    let service = ProvisioningService::new(
        controller,
        registry.clone(),
        history.clone(),
        events,
        Arc::new(clock.clone()),
    );

    Daemon {
        hub,
        agent,
        service,
        links,
        leds: MockIndicator::default(),
        registry,
        history,
        clock,
    }
}

impl Daemon {
    /// One main-loop iteration.
    fn step(&mut self) {
        self.service.process_events(&self.agent, &mut self.links);
        self.service.tick(&mut self.leds, &mut self.links);
    }

    /// Step until `cond` holds or two seconds pass.
    fn step_until(&mut self, cond: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            self.step();
            if cond(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn state(&self) -> StateReply {
        let reply = self
            .hub
            .call("provisioning-daemon", "getState", Value::Null, Duration::from_secs(2))
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_value(reply).unwrap()
    }
}

#[test]
fn button_driven_provisioning_runs_to_disconnect() {
    let mut d = daemon(json!({"id": 1, "pskIdentity": "clicker-2", "pskSecret": "0badc0de"}));
    d.links.connect(1, "one");
    d.links.connect(2, "two");
    d.step();
    assert_eq!(d.links.last_command(1), Some(NetworkCommand::EnableHighlight));
    assert_eq!(d.links.last_command(2), Some(NetworkCommand::DisableHighlight));

    d.service.handle_button(ButtonAction::SelectNext);
    d.step();
    assert_eq!(d.links.last_command(2), Some(NetworkCommand::EnableHighlight));

    d.clock.set(1_000);
    d.service.handle_button(ButtonAction::StartProvision);
    assert!(d.step_until(|d| !d.links.delivered().is_empty()));

    let psk = &d.links.delivered()[0];
    assert_eq!(psk.clicker_id, 2);
    assert_eq!(psk.identity.as_str(), "clicker-2");
    assert_eq!(
        d.registry
            .with_clicker(2, |c| (c.provisioning_in_progress, c.provision_time, c.error)),
        Some((false, Some(1_000), false))
    );
    assert_eq!(d.history.provisioned().len(), 1);

    // Still connected right at the deadline, gone just after.
    d.clock.set(4_000);
    d.step();
    assert!(d.registry.contains(2));
    d.clock.set(4_001);
    d.step();
    d.step();
    assert!(!d.registry.contains(2));
    assert_eq!(d.service.controller().connected(), vec![1]);
    assert_eq!(d.service.controller().selected(), Some(1));

    // History first, then the clicker still connected.
    let state = d.state();
    let rows: Vec<_> = state
        .clickers
        .iter()
        .map(|c| (c.id, c.is_provisioned, c.selected))
        .collect();
    assert_eq!(rows, vec![(2, true, false), (1, false, true)]);
}

#[test]
fn remote_start_with_failed_issuance_marks_error() {
    let mut d = daemon(json!({"error": "service busy"}));
    d.links.connect(5, "five");
    d.step();

    d.hub
        .call(
            "provisioning-daemon",
            "startProvision",
            json!({"clickerID": 5}),
            Duration::from_secs(2),
        )
        .unwrap()
        .unwrap();
    assert!(d.step_until(|d| d.registry.with_clicker(5, |c| c.error) == Some(true)));

    assert!(d.links.delivered().is_empty());
    assert_eq!(
        d.registry.with_clicker(5, |c| c.provisioning_in_progress),
        Some(false)
    );
    let state = d.state();
    assert!(state.clickers[0].is_error);
    assert!(state.clickers[0].is_provisioned);
}

#[test]
fn leds_follow_connections() {
    let mut d = daemon(json!({}));
    d.step();
    assert_eq!(d.leds.last(), Some(IndicatorCall::Release));

    d.links.connect(1, "one");
    d.links.connect(2, "two");
    d.links.connect(3, "three");
    d.step();
    // Selected (first) bit inverted while the blink phase is on.
    assert_eq!(d.leds.last(), Some(IndicatorCall::SetMask(0b110)));

    d.links.disconnect(1);
    d.links.disconnect(2);
    d.links.disconnect(3);
    d.step();
    d.step();
    assert_eq!(d.leds.last(), Some(IndicatorCall::Release));
}

#[test]
fn large_connect_batch_highlights_every_clicker() {
    let mut d = daemon(json!({}));
    let ids: Vec<u32> = (1..=16).collect();
    for id in &ids {
        d.links.connect(*id, "batch");
    }
    d.step();

    let unlit: Vec<_> = ids
        .iter()
        .filter(|id| d.links.last_command(**id).is_none())
        .collect();
    assert!(unlit.is_empty(), "no highlight command for {:?}", unlit);
    assert_eq!(d.links.last_command(1), Some(NetworkCommand::EnableHighlight));
    for id in &ids[1..] {
        assert_eq!(d.links.last_command(*id), Some(NetworkCommand::DisableHighlight));
    }
    assert_eq!(d.service.controller().connected(), ids);
}

#[test]
fn remote_rename_shows_in_state() {
    let mut d = daemon(json!({}));
    d.links.connect(8, "before");
    d.step();
    d.hub
        .call(
            "provisioning-daemon",
            "setClickerName",
            json!({"clickerID": 8, "clickerName": "after"}),
            Duration::from_secs(2),
        )
        .unwrap()
        .unwrap();
    assert_eq!(d.state().clickers[0].name, "after");
}
