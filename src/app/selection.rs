//! Connected-clicker sequence and selection cursor.
//!
//! Pure data, no I/O. The sequence is insertion-ordered and duplicate-free;
//! its order defines both the LED bit positions and what the cursor means.
//!
//! Invariant: `cursor` is `None` iff the sequence is empty, otherwise it
//! indexes a valid entry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::NetworkCommand;

use super::clicker::DeviceId;

/// Number of indicator LEDs.
pub const LED_COUNT: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    devices: Vec<DeviceId>,
    cursor: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`. Selects it if nothing was selected.
    /// Returns `false` if it was already present.
    pub fn insert(&mut self, id: DeviceId) -> bool {
        if self.devices.contains(&id) {
            return false;
        }
        self.devices.push(id);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
        true
    }

    /// Remove `id` if present.
    ///
    /// The cursor keeps its index; it is only clamped to the new last entry
    /// when it falls out of range, and cleared once the sequence is empty.
    pub fn remove(&mut self, id: DeviceId) -> bool {
        let Some(pos) = self.devices.iter().position(|d| *d == id) else {
            return false;
        };
        self.devices.remove(pos);
        self.cursor = match self.devices.len() {
            0 => None,
            len => Some(self.cursor.unwrap_or(0).min(len - 1)),
        };
        true
    }

    /// Move the cursor to `id`. Returns `false` if it is not connected.
    pub fn select(&mut self, id: DeviceId) -> bool {
        match self.devices.iter().position(|d| *d == id) {
            Some(pos) => {
                self.cursor = Some(pos);
                true
            }
            None => false,
        }
    }

    /// Advance the cursor by one, stopping at the last entry (no wrap).
    pub fn select_next(&mut self) {
        if let Some(c) = self.cursor {
            self.cursor = Some((c + 1).min(self.devices.len() - 1));
        }
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn selected(&self) -> Option<DeviceId> {
        self.cursor.and_then(|c| self.devices.get(c).copied())
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Highlight command for every connected clicker: enable for the
    /// selected one, disable for the rest.
    pub fn highlight_commands(&self) -> Vec<(DeviceId, NetworkCommand)> {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let cmd = if Some(i) == self.cursor {
                    NetworkCommand::EnableHighlight
                } else {
                    NetworkCommand::DisableHighlight
                };
                (*id, cmd)
            })
            .collect()
    }

    /// LED mask: one bit per connected clicker (first [`LED_COUNT`]), with
    /// the selected clicker's bit inverted while `blink_on`.
    /// `None` when nothing is connected.
    pub fn indicator_mask(&self, blink_on: bool) -> Option<u8> {
        if self.devices.is_empty() {
            return None;
        }
        let mut mask = 0u8;
        for i in 0..self.devices.len().min(LED_COUNT) {
            mask |= 1 << i;
        }
        if let Some(c) = self.cursor {
            if c < LED_COUNT && blink_on {
                mask ^= 1 << c;
            }
        }
        Some(mask)
    }
}

// ───────────────────────────────────────────────────────────────
// Shared view
// ───────────────────────────────────────────────────────────────

/// Cloneable, thread-safe read handle on the controller's selection.
///
/// The IPC loop thread uses it to answer `getState` and `startProvision`.
#[derive(Debug, Clone, Default)]
pub struct SelectionView {
    inner: Arc<Mutex<Selection>>,
}

impl SelectionView {
    pub(crate) fn new(inner: Arc<Mutex<Selection>>) -> Self {
        Self { inner }
    }

    pub fn selected_id(&self) -> Option<DeviceId> {
        lock(&self.inner).selected()
    }

    /// Copy of the connected sequence.
    pub fn connected_ids(&self) -> Vec<DeviceId> {
        lock(&self.inner).devices().to_vec()
    }
}

/// Lock, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
