//! IPC agent: owns the bus connection and its background loop thread.
//!
//! ```text
//!            main thread                          ipc-loop thread
//!  ┌──────────────────────────┐          ┌───────────────────────────────┐
//!  │ enable_remote_control()  │          │ loop {                        │
//!  │ send_credential_request()│─interrupt│   park while interrupted      │
//!  │        │                 │─────────▶│   reclaim one request         │
//!  │        ▼                 │          │   bus.run(timer)              │
//!  │   bus (Arc<Mutex<B>>)    │◀─────────│     ├─ on_call → methods      │
//!  └──────────────────────────┘          │     └─ on_reply → PskObtained │
//!                                        │ }                             │
//!                                        └───────────────────────────────┘
//! ```
//!
//! The main thread only touches the bus while the loop is parked.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, error, info, warn};
use serde_json::{Value, json};

use crate::app::clicker::DeviceId;
use crate::app::ports::{CredentialPort, DeviceRegistry, EventSink, HistoryPort};
use crate::app::selection::{SelectionView, lock};
use crate::config::IpcConfig;
use crate::error::{BusError, Error, Result};
use crate::events::Event;

use super::bus::{BusConnector, BusHandler, BusPort, MethodStatus, RequestId};
use super::control::LoopControl;
use super::methods;
use super::psk::{GENERATE_PSK, credential_from_reply};

/// Shared handles the RPC handlers work with.
#[derive(Clone)]
pub struct AgentDeps {
    pub registry: Arc<dyn DeviceRegistry>,
    pub history: Arc<dyn HistoryPort>,
    pub selection: SelectionView,
    pub events: Arc<dyn EventSink>,
}

pub struct IpcAgent<B: BusPort + 'static> {
    bus: Arc<Mutex<B>>,
    control: Arc<LoopControl>,
    thread: Option<JoinHandle<()>>,
    loop_thread: ThreadId,
    config: IpcConfig,
}

impl<B: BusPort + 'static> IpcAgent<B> {
    /// Connect to the bus and start the loop thread.
    pub fn init<C>(connector: &C, deps: AgentDeps, config: IpcConfig) -> Result<Self>
    where
        C: BusConnector<Bus = B>,
    {
        let bus = connector.connect(config.bus_path.as_deref()).map_err(|e| {
            error!("IPC: failed to connect to bus: {}", e);
            Error::Bus(e)
        })?;
        let bus = Arc::new(Mutex::new(bus));

        let control = Arc::new(LoopControl::new());
        control.start();

        let worker = LoopWorker {
            bus: bus.clone(),
            control: control.clone(),
            handler: AgentHandler {
                deps,
                control: control.clone(),
            },
            config: config.clone(),
        };
        let spawned = thread::Builder::new()
            .name("ipc-loop".into())
            .spawn(move || worker.run());

        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                error!("IPC: failed to spawn loop thread: {}", e);
                control.stop();
                lock(&bus).shutdown();
                return Err(Error::Init("ipc loop thread"));
            }
        };

        info!("IPC: agent started");
        Ok(Self {
            loop_thread: handle.thread().id(),
            thread: Some(handle),
            bus,
            control,
            config,
        })
    }

    /// Publish the daemon object with its four methods.
    pub fn enable_remote_control(&self) -> Result<()> {
        self.check_thread()?;
        let _interruption = self.control.interrupt(self.config.confirm_poll)?;

        let spec = methods::object_spec(&self.config.object_name);
        lock(&self.bus).add_object(&spec).map_err(|e| {
            error!("IPC: failed to add object '{}': {}", spec.name, e);
            Error::Bus(e)
        })?;
        info!("IPC: remote control enabled as '{}'", spec.name);
        Ok(())
    }

    /// Ask the credential service for a PSK for `clicker`.
    ///
    /// Returns once the request is dispatched; the outcome arrives as
    /// [`Event::PskObtained`].
    pub fn send_credential_request(&self, clicker: DeviceId) -> Result<()> {
        self.check_thread()?;
        let _interruption = self.control.interrupt(self.config.confirm_poll)?;
        let mut bus = lock(&self.bus);

        let service = &self.config.credential_service;
        let object = match bus.lookup_id(service) {
            Ok(id) => id,
            Err(BusError::NotFound) => {
                error!("IPC: credential service '{}' not available", service);
                return Err(Error::PeerUnavailable);
            }
            Err(e) => {
                error!("IPC: lookup of '{}' failed: {}", service, e);
                return Err(Error::Bus(e));
            }
        };

        let request = self.control.with_requests(|t| t.allocate(clicker));
        if let Err(e) = bus.invoke_async(object, GENERATE_PSK, &json!({}), request) {
            error!("IPC: generatePsk for clicker {} failed: {}", clicker, e);
            self.control.with_requests(|t| t.abandon(request));
            return Err(Error::Bus(e));
        }
        debug!("IPC: request {} sent for clicker {}", request, clicker);
        Ok(())
    }

    /// Number of request slots not yet reclaimed.
    pub fn pending_requests(&self) -> usize {
        self.control.with_requests(|t| t.len())
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Stop the loop, close the bus and free every request. Idempotent.
    pub fn destroy(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.control.stop();
        if handle.join().is_err() {
            error!("IPC: loop thread panicked");
        }
        lock(&self.bus).shutdown();
        let freed = self.control.with_requests(|t| t.sweep());
        info!("IPC: agent stopped ({} requests freed)", freed);
    }

    fn check_thread(&self) -> Result<()> {
        if thread::current().id() == self.loop_thread {
            error!("IPC: handshake requested from the loop thread");
            return Err(Error::WrongThread);
        }
        Ok(())
    }
}

impl<B: BusPort + 'static> CredentialPort for IpcAgent<B> {
    fn request_credentials(&self, clicker: DeviceId) -> Result<()> {
        self.send_credential_request(clicker)
    }
}

impl<B: BusPort + 'static> Drop for IpcAgent<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ───────────────────────────────────────────────────────────────
// Loop thread
// ───────────────────────────────────────────────────────────────

struct LoopWorker<B> {
    bus: Arc<Mutex<B>>,
    control: Arc<LoopControl>,
    handler: AgentHandler,
    config: IpcConfig,
}

impl<B: BusPort> LoopWorker<B> {
    fn run(mut self) {
        debug!("IPC: loop thread running");
        while self.control.is_running() {
            self.control.park_while_interrupted(self.config.park_poll);
            if !self.control.is_running() {
                break;
            }

            if let Some(req) = self.control.with_requests(|t| t.reclaim_one()) {
                debug!("IPC: reclaimed request {}", req.id);
            }

            let control = &self.control;
            let result = lock(&self.bus).run(
                &mut self.handler,
                self.config.loop_timer,
                &mut || !control.should_yield(),
            );
            match result {
                Ok(()) => {}
                Err(BusError::Disconnected) => {
                    error!("IPC: bus connection lost, loop exiting");
                    self.control.stop();
                    break;
                }
                Err(e) => warn!("IPC: bus pass failed: {}", e),
            }
        }
        debug!("IPC: loop thread exited");
    }
}

struct AgentHandler {
    deps: AgentDeps,
    control: Arc<LoopControl>,
}

impl BusHandler for AgentHandler {
    fn on_call(&mut self, method: &str, args: &Value) -> core::result::Result<Option<Value>, MethodStatus> {
        methods::dispatch(&self.deps, method, args)
    }

    fn on_reply(&mut self, request: RequestId, reply: &Value) {
        let clicker = self
            .control
            .with_requests(|t| t.complete(request, reply.clone()));
        let Some(clicker) = clicker else {
            warn!("IPC: reply for unknown request {}", request);
            return;
        };
        let psk = credential_from_reply(clicker, reply);
        if !self.deps.events.push(Event::PskObtained(psk)) {
            error!("IPC: credential for clicker {} lost, event queue refused it", clicker);
        }
    }
}
