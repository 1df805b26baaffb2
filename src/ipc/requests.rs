//! Outstanding credential requests.
//!
//! Slots are created before the invocation is dispatched and are only
//! flagged by the reply callback. The loop thread frees one flagged slot per
//! iteration; shutdown frees everything.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::app::clicker::DeviceId;

use super::bus::RequestId;

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRequest {
    pub id: RequestId,
    /// Clicker the credential is for.
    pub clicker: DeviceId,
    pub ready_for_reclaim: bool,
    pub reply: Option<Value>,
}

#[derive(Debug, Default)]
pub struct RequestTable {
    slots: BTreeMap<RequestId, AsyncRequest>,
    next_id: RequestId,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot for `clicker` and return its id.
    pub fn allocate(&mut self, clicker: DeviceId) -> RequestId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.slots.insert(
            id,
            AsyncRequest {
                id,
                clicker,
                ready_for_reclaim: false,
                reply: None,
            },
        );
        id
    }

    pub fn get(&self, id: RequestId) -> Option<&AsyncRequest> {
        self.slots.get(&id)
    }

    /// Store the reply and flag the slot. Returns the target clicker, or
    /// `None` for an unknown id.
    pub fn complete(&mut self, id: RequestId, reply: Value) -> Option<DeviceId> {
        let req = self.slots.get_mut(&id)?;
        req.reply = Some(reply);
        req.ready_for_reclaim = true;
        Some(req.clicker)
    }

    /// Flag a slot whose reply will never come.
    pub fn abandon(&mut self, id: RequestId) {
        if let Some(req) = self.slots.get_mut(&id) {
            req.ready_for_reclaim = true;
        }
    }

    pub fn has_reclaimable(&self) -> bool {
        self.slots.values().any(|r| r.ready_for_reclaim)
    }

    /// Free the oldest flagged slot, if any.
    pub fn reclaim_one(&mut self) -> Option<AsyncRequest> {
        let id = self
            .slots
            .values()
            .find(|r| r.ready_for_reclaim)
            .map(|r| r.id)?;
        self.slots.remove(&id)
    }

    /// Free every slot regardless of state. Returns how many were freed.
    pub fn sweep(&mut self) -> usize {
        let n = self.slots.len();
        self.slots.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
