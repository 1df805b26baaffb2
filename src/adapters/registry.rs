//! In-process device registry.
//!
//! Records live behind their own mutex so two threads can work on different
//! clickers at once. The map lock is held only long enough to clone the
//! record handle; a miss returns immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::debug;

use crate::app::clicker::{Clicker, DeviceId};
use crate::app::ports::DeviceRegistry;
use crate::app::selection::lock;

#[derive(Debug, Default)]
pub struct ClickerRegistry {
    records: RwLock<HashMap<DeviceId, Arc<Mutex<Clicker>>>>,
}

impl ClickerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Returns `false` if the id is taken.
    pub fn insert(&self, clicker: Clicker) -> bool {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&clicker.id) {
            return false;
        }
        debug!("Registry: added clicker {}", clicker.id);
        map.insert(clicker.id, Arc::new(Mutex::new(clicker)));
        true
    }

    /// Remove a record, waiting for any current owner to release it.
    pub fn remove(&self, id: DeviceId) -> Option<Clicker> {
        let record = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)?;
        debug!("Registry: removed clicker {}", id);
        let clicker = lock(&record).clone();
        Some(clicker)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Ids currently registered, ascending.
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, id: DeviceId) -> Option<Arc<Mutex<Clicker>>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl DeviceRegistry for ClickerRegistry {
    fn acquire(&self, id: DeviceId, f: &mut dyn FnMut(&mut Clicker)) -> bool {
        let Some(record) = self.handle(id) else {
            return false;
        };
        f(&mut lock(&record));
        true
    }
}
