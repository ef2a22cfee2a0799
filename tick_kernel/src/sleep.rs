//! Sleep scheduling
//!
//! At most one entry per PID; scheduling again replaces the previous wake
//! tick. Wake-up is resolved once per tick, before any process runs.

use core_types::{Pid, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sleeping PIDs and the tick each one wakes on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SleepScheduler {
    entries: BTreeMap<Pid, Tick>,
}

impl SleepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wake tick of `pid`, replacing any earlier entry
    pub fn schedule(&mut self, pid: Pid, wake_tick: Tick) {
        self.entries.insert(pid, wake_tick);
    }

    /// Removes and returns every PID due at `tick`, in PID order
    pub fn wake_due(&mut self, tick: Tick) -> Vec<Pid> {
        let due: Vec<Pid> = self
            .entries
            .iter()
            .filter(|(_, &wake)| wake <= tick)
            .map(|(&pid, _)| pid)
            .collect();
        for pid in &due {
            self.entries.remove(pid);
        }
        due
    }

    /// Drops the entry of `pid`; false if it had none
    pub fn cancel(&mut self, pid: Pid) -> bool {
        self.entries.remove(&pid).is_some()
    }

    pub fn wake_tick(&self, pid: Pid) -> Option<Tick> {
        self.entries.get(&pid).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pid, Tick)> + '_ {
        self.entries.iter().map(|(&pid, &tick)| (pid, tick))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
