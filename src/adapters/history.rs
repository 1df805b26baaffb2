//! Provisioning history store.
//!
//! Implements [`HistoryPort`]. Entries are kept in memory and, when a path
//! is configured, written to disk as a postcard-encoded list after every
//! change. A missing or unreadable file starts an empty history.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};

use crate::app::clicker::{DeviceId, HistoryItem};
use crate::app::ports::HistoryPort;
use crate::app::selection::lock;

#[derive(Debug, Default)]
pub struct HistoryStore {
    items: Mutex<Vec<HistoryItem>>,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// History that is lost on exit.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// History backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read(&path) {
            Ok(bytes) => postcard::from_bytes::<Vec<HistoryItem>>(&bytes).unwrap_or_else(|e| {
                warn!("History: {} unreadable ({}), starting empty", path.display(), e);
                Vec::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("History: cannot read {}: {}", path.display(), e);
                Vec::new()
            }
        };
        info!("History: {} entries loaded from {}", items.len(), path.display());
        Self {
            items: Mutex::new(items),
            path: Some(path),
        }
    }

    fn persist(&self, items: &[HistoryItem]) {
        let Some(path) = &self.path else {
            return;
        };
        let bytes = match postcard::to_allocvec(items) {
            Ok(b) => b,
            Err(e) => {
                warn!("History: encode failed: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(path, bytes) {
            warn!("History: cannot write {}: {}", path.display(), e);
        }
    }
}

impl HistoryPort for HistoryStore {
    fn provisioned(&self) -> Vec<HistoryItem> {
        lock(&self.items).clone()
    }

    fn add(&self, item: HistoryItem) {
        let mut items = lock(&self.items);
        items.retain(|h| h.id != item.id);
        items.push(item);
        self.persist(&items);
    }

    fn remove(&self, id: DeviceId) -> bool {
        let mut items = lock(&self.items);
        let before = items.len();
        items.retain(|h| h.id != id);
        let removed = items.len() != before;
        if removed {
            self.persist(&items);
        }
        removed
    }
}
