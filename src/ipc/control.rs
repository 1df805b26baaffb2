//! Loop lifecycle flags and the interruption handshake.
//!
//! ```text
//!  requester                         loop thread
//!  ─────────                         ───────────
//!  interrupt() ── requested=true ──▶ pass ends at next timer
//!       │                            confirmed=true, park
//!       ◀──────── confirmed ───────── (waits while requested)
//!  mutate bus
//!  drop guard ── clear ────────────▶ resume
//! ```
//!
//! One mutex guards the flags and the request table. Waits are bounded by
//! the configured poll periods, so a lost wakeup costs one period at most.
//! A second mutex serialises requesters: one cycle at a time.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::app::selection::lock;
use crate::error::{Error, Result};

use super::requests::RequestTable;

#[derive(Debug, Default)]
struct Shared {
    running: bool,
    interruption_requested: bool,
    interruption_confirmed: bool,
    requests: RequestTable,
}

#[derive(Debug, Default)]
pub struct LoopControl {
    shared: Mutex<Shared>,
    cond: Condvar,
    cycle: Mutex<()>,
}

impl LoopControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        lock(&self.shared).running = true;
    }

    /// Stop the loop: drop any pending interruption and wake every waiter.
    pub fn stop(&self) {
        {
            let mut s = lock(&self.shared);
            s.running = false;
            s.interruption_requested = false;
            s.interruption_confirmed = false;
        }
        self.cond.notify_all();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    pub fn interruption_requested(&self) -> bool {
        lock(&self.shared).interruption_requested
    }

    /// `true` when the current bus pass should end: an interruption is
    /// pending, the loop is stopping, or a request slot awaits reclamation.
    pub fn should_yield(&self) -> bool {
        let s = lock(&self.shared);
        s.interruption_requested || !s.running || s.requests.has_reclaimable()
    }

    /// Run `f` on the request table under the shared lock.
    pub fn with_requests<T>(&self, f: impl FnOnce(&mut RequestTable) -> T) -> T {
        f(&mut lock(&self.shared).requests)
    }

    // ── Loop thread side ──────────────────────────────────────

    /// While an interruption is requested, confirm it and wait.
    /// Returns once it is cleared or the loop is stopping.
    pub fn park_while_interrupted(&self, park_poll: Duration) {
        let mut s = lock(&self.shared);
        if !s.interruption_requested {
            return;
        }
        debug!("IPC: loop parked");
        while s.interruption_requested && s.running {
            s.interruption_confirmed = true;
            self.cond.notify_all();
            s = self
                .cond
                .wait_timeout(s, park_poll)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        debug!("IPC: loop resumed");
    }

    // ── Requester side ────────────────────────────────────────

    /// Ask the loop to park and wait until it confirms.
    ///
    /// The interruption lasts as long as the returned guard.
    /// Fails with [`Error::NotRunning`] if the loop is or becomes stopped.
    pub fn interrupt(&self, confirm_poll: Duration) -> Result<Interruption<'_>> {
        let cycle = lock(&self.cycle);
        let mut s = lock(&self.shared);
        if !s.running {
            return Err(Error::NotRunning);
        }
        s.interruption_requested = true;
        s.interruption_confirmed = false;
        self.cond.notify_all();

        while !s.interruption_confirmed {
            if !s.running {
                s.interruption_requested = false;
                return Err(Error::NotRunning);
            }
            s = self
                .cond
                .wait_timeout(s, confirm_poll)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        drop(s);

        Ok(Interruption {
            control: self,
            _cycle: cycle,
        })
    }

    fn clear(&self) {
        {
            let mut s = lock(&self.shared);
            s.interruption_requested = false;
            s.interruption_confirmed = false;
        }
        self.cond.notify_all();
    }
}

/// An active interruption; the loop stays parked until this is dropped.
#[must_use]
pub struct Interruption<'a> {
    control: &'a LoopControl,
    _cycle: MutexGuard<'a, ()>,
}

impl Drop for Interruption<'_> {
    fn drop(&mut self) {
        self.control.clear();
    }
}
