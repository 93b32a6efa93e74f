//! Cooperative scheduler: awaited events and delayed tasks.
//!
//! Both primitives are single-threaded and cooperative. A suspended
//! unit is identified by `(plugin index, token)`; the engine resumes it
//! through [`crate::plugins::Plugin::resume`], with the event for
//! awaited resumptions and with nothing for timer expirations. The
//! scheduler never interrupts a running unit.

use crate::event::EventType;
use std::collections::HashMap;

/// Opaque identifier for one suspended unit.
pub type Token = u64;

/// What a resumed unit wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Keep the registration; resume again on the next match.
    Continue,
    /// Unregister this unit.
    Done,
}

/// A suspended unit registered against future events or a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwaitEntry {
    /// Index of the owning plugin.
    pub plugin: usize,
    /// The unit's token within that plugin.
    pub token: Token,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    plugin: usize,
    token: Token,
    fire_at: i64,
}

/// Owner of all suspended work.
#[derive(Debug, Default)]
pub struct Scheduler {
    awaits: HashMap<EventType, Vec<AwaitEntry>>,
    tasks: Vec<ScheduledTask>,
    next_fire: Option<i64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit against one or more event types.
    pub fn register_await(&mut self, kinds: &[EventType], plugin: usize, token: Token) {
        for kind in kinds {
            self.awaits
                .entry(*kind)
                .or_default()
                .push(AwaitEntry { plugin, token });
        }
    }

    /// Schedule a one-shot resumption at `fire_at` (UNIX seconds).
    pub fn schedule(&mut self, plugin: usize, token: Token, fire_at: i64) {
        self.tasks.push(ScheduledTask {
            plugin,
            token,
            fire_at,
        });
        self.next_fire = Some(self.next_fire.map_or(fire_at, |n| n.min(fire_at)));
    }

    /// Remove a token from every table. Stale units become no-ops.
    pub fn cancel(&mut self, token: Token) {
        for entries in self.awaits.values_mut() {
            entries.retain(|e| e.token != token);
        }
        self.awaits.retain(|_, v| !v.is_empty());
        self.tasks.retain(|t| t.token != token);
        self.recompute_next_fire();
    }

    /// Snapshot of the units awaiting `kind`.
    pub fn awaiting(&self, kind: EventType) -> Vec<AwaitEntry> {
        self.awaits.get(&kind).cloned().unwrap_or_default()
    }

    /// Remove and return every task whose deadline has passed. A due
    /// task resumes at most once; re-running requires re-scheduling.
    pub fn due(&mut self, now: i64) -> Vec<AwaitEntry> {
        if self.next_fire.is_none_or(|n| n > now) {
            return Vec::new();
        }
        let mut fired = Vec::new();
        self.tasks.retain(|t| {
            if t.fire_at <= now {
                fired.push(AwaitEntry {
                    plugin: t.plugin,
                    token: t.token,
                });
                false
            } else {
                true
            }
        });
        self.recompute_next_fire();
        fired
    }

    /// Earliest pending deadline, recomputed on every mutation.
    pub fn next_fire(&self) -> Option<i64> {
        self.next_fire
    }

    /// Whether any unit (await or task) is suspended.
    pub fn is_idle(&self) -> bool {
        self.awaits.is_empty() && self.tasks.is_empty()
    }

    fn recompute_next_fire(&mut self) {
        self.next_fire = self.tasks.iter().map(|t| t.fire_at).min();
    }
}
