//! In-process IPC bus.
//!
//! A [`LocalBusHub`] plays the bus daemon: it keeps the object directory and
//! routes messages. Each [`LocalBus`] connection owns an inbox; its
//! [`run`](BusPort::run) pass drains the inbox into the handler and fires
//! the helper timer between messages.
//!
//! Two kinds of objects exist:
//! - objects published by a connection through `add_object`, reachable with
//!   [`LocalBusHub::call`] (blocking, for clients and tests);
//! - services registered on the hub with a closure, reachable with
//!   `invoke_async` (the credential service in the simulation daemon).

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::{Value, json};

use crate::app::selection::lock;
use crate::error::BusError;
use crate::ipc::bus::{
    BusConnector, BusHandler, BusPort, MethodStatus, ObjectId, ObjectSpec, RequestId,
};

/// Outcome of a call: reply document (if any) or failure status.
pub type CallResult = Result<Option<Value>, MethodStatus>;

/// Hub-side service implementation.
///
/// `Ok(None)` leaves the invocation unanswered.
///
/// `invoke_async` runs the closure on the requesting thread while that
/// connection is locked for the call. A service must not call back into an
/// object owned by the requesting connection (for example
/// `hub.call("provisioning-daemon", ..)` from the credential service). That
/// connection's loop stays parked until the closure returns, so such a call
/// can never be served and blocks for its whole timeout.
pub type ServiceFn = Box<dyn FnMut(&str, &Value) -> CallResult + Send>;

enum Inbound {
    Call {
        method: String,
        args: Value,
        reply: Sender<CallResult>,
    },
    Reply {
        request: RequestId,
        body: Value,
    },
}

enum Owner {
    Connection {
        methods: Vec<&'static str>,
        inbox: Sender<Inbound>,
    },
    Service(Arc<Mutex<ServiceFn>>),
}

enum Route {
    Inbox(Sender<Inbound>),
    Service(Arc<Mutex<ServiceFn>>),
}

#[derive(Default)]
struct Directory {
    names: HashMap<String, ObjectId>,
    owners: HashMap<ObjectId, Owner>,
    next_id: ObjectId,
}

impl Directory {
    fn publish(&mut self, name: &str, owner: Owner) -> Result<ObjectId, BusError> {
        if self.names.contains_key(name) {
            return Err(BusError::AlreadyExists);
        }
        self.next_id += 1;
        let id = self.next_id;
        self.names.insert(name.to_owned(), id);
        self.owners.insert(id, owner);
        Ok(id)
    }

    fn unpublish(&mut self, name: &str) -> bool {
        match self.names.remove(name) {
            Some(id) => {
                self.owners.remove(&id);
                true
            }
            None => false,
        }
    }
}

/// The bus itself. Clones share the same directory.
#[derive(Clone, Default)]
pub struct LocalBusHub {
    directory: Arc<Mutex<Directory>>,
}

impl LocalBusHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a closure-backed service.
    pub fn register_service(&self, name: &str, service: ServiceFn) -> Result<ObjectId, BusError> {
        let id = lock(&self.directory).publish(name, Owner::Service(Arc::new(Mutex::new(service))))?;
        debug!("Bus: service '{}' registered as {}", name, id);
        Ok(id)
    }

    pub fn has_object(&self, name: &str) -> bool {
        lock(&self.directory).names.contains_key(name)
    }

    /// Call a method on a connection-owned object and wait for the answer.
    pub fn call(
        &self,
        object: &str,
        method: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<CallResult, BusError> {
        let route = {
            let dir = lock(&self.directory);
            let id = *dir.names.get(object).ok_or(BusError::NotFound)?;
            match dir.owners.get(&id) {
                Some(Owner::Connection { methods, inbox }) => {
                    if !methods.iter().any(|m| *m == method) {
                        return Ok(Err(MethodStatus::MethodNotFound));
                    }
                    Route::Inbox(inbox.clone())
                }
                Some(Owner::Service(service)) => Route::Service(service.clone()),
                None => return Err(BusError::NotFound),
            }
        };
        let inbox = match route {
            Route::Inbox(inbox) => inbox,
            Route::Service(service) => {
                let mut f = lock(&service);
                return Ok((*f)(method, &args));
            }
        };

        let (tx, rx) = mpsc::channel();
        inbox
            .send(Inbound::Call {
                method: method.to_owned(),
                args,
                reply: tx,
            })
            .map_err(|_| BusError::Disconnected)?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => BusError::Timeout,
            RecvTimeoutError::Disconnected => BusError::Disconnected,
        })
    }
}

impl BusConnector for LocalBusHub {
    type Bus = LocalBus;

    fn connect(&self, path: Option<&str>) -> Result<LocalBus, BusError> {
        if let Some(path) = path {
            debug!("Bus: in-process hub ignores socket path {}", path);
        }
        let (tx, rx) = mpsc::channel();
        Ok(LocalBus {
            hub: self.clone(),
            inbox_tx: tx,
            inbox: rx,
            published: Vec::new(),
            closed: false,
        })
    }
}

/// One connection to a [`LocalBusHub`].
pub struct LocalBus {
    hub: LocalBusHub,
    inbox_tx: Sender<Inbound>,
    inbox: Receiver<Inbound>,
    published: Vec<String>,
    closed: bool,
}

impl LocalBus {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed {
            Err(BusError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn deliver(handler: &mut dyn BusHandler, message: Inbound) {
        match message {
            Inbound::Call {
                method,
                args,
                reply,
            } => {
                let result = handler.on_call(&method, &args);
                // Caller may have timed out already.
                let _ = reply.send(result);
            }
            Inbound::Reply { request, body } => handler.on_reply(request, &body),
        }
    }
}

impl BusPort for LocalBus {
    fn run(
        &mut self,
        handler: &mut dyn BusHandler,
        timer_period: Duration,
        on_timer: &mut dyn FnMut() -> bool,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut deadline = Instant::now() + timer_period;
        loop {
            let now = Instant::now();
            if now >= deadline {
                if !on_timer() {
                    return Ok(());
                }
                deadline = now + timer_period;
                continue;
            }
            match self.inbox.recv_timeout(deadline - now) {
                Ok(message) => Self::deliver(handler, message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(BusError::Disconnected),
            }
        }
    }

    fn add_object(&mut self, object: &ObjectSpec) -> Result<(), BusError> {
        self.ensure_open()?;
        let owner = Owner::Connection {
            methods: object.methods.clone(),
            inbox: self.inbox_tx.clone(),
        };
        let id = lock(&self.hub.directory).publish(&object.name, owner)?;
        self.published.push(object.name.clone());
        debug!("Bus: object '{}' published as {}", object.name, id);
        Ok(())
    }

    fn lookup_id(&mut self, name: &str) -> Result<ObjectId, BusError> {
        self.ensure_open()?;
        lock(&self.hub.directory)
            .names
            .get(name)
            .copied()
            .ok_or(BusError::NotFound)
    }

    fn invoke_async(
        &mut self,
        object: ObjectId,
        method: &str,
        body: &Value,
        request: RequestId,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let service = match lock(&self.hub.directory).owners.get(&object) {
            Some(Owner::Service(s)) => s.clone(),
            Some(Owner::Connection { .. }) => {
                warn!("Bus: async invoke on connection object {} unsupported", object);
                return Err(BusError::InvokeFailed);
            }
            None => return Err(BusError::NotFound),
        };

        let outcome = {
            let mut f = lock(&service);
            (*f)(method, body)
        };
        let reply = match outcome {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(()),
            Err(status) => json!({ "error": status.to_string() }),
        };
        self.inbox_tx
            .send(Inbound::Reply {
                request,
                body: reply,
            })
            .map_err(|_| BusError::InvokeFailed)
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        let mut dir = lock(&self.hub.directory);
        for name in self.published.drain(..) {
            dir.unpublish(&name);
        }
        self.closed = true;
        debug!("Bus: connection closed");
    }
}
