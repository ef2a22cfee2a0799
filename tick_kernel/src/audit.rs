//! Scheduling audit trail
//!
//! Every decision the tick loop makes is recorded as a [`ScheduleEvent`],
//! so tests can assert on ordering without instrumenting processes.

use core_types::{Pid, ProcessStatus, Tick};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Scheduling event for audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// A process was created
    Started {
        pid: Pid,
        parent: Option<Pid>,
        tick: Tick,
    },
    /// A sleeping process became runnable
    Woke { pid: Pid, tick: Tick },
    /// A process ran; `status` is what it was left in
    Ran {
        pid: Pid,
        tick: Tick,
        cpu: f64,
        status: ProcessStatus,
    },
    /// The tick-wide CPU limit was exhausted before the process got a turn
    Deferred { pid: Pid, tick: Tick },
    /// A process faulted or panicked
    Faulted {
        pid: Pid,
        tick: Tick,
        message: String,
    },
    /// A process was killed, directly or as a descendant
    Killed { pid: Pid, tick: Tick },
    /// A terminal record was garbage-collected
    Collected { pid: Pid, tick: Tick },
}

impl ScheduleEvent {
    /// The process the event is about
    pub fn pid(&self) -> Pid {
        match self {
            ScheduleEvent::Started { pid, .. }
            | ScheduleEvent::Woke { pid, .. }
            | ScheduleEvent::Ran { pid, .. }
            | ScheduleEvent::Deferred { pid, .. }
            | ScheduleEvent::Faulted { pid, .. }
            | ScheduleEvent::Killed { pid, .. }
            | ScheduleEvent::Collected { pid, .. } => *pid,
        }
    }
}

/// Bounded audit log; the oldest events are dropped first
#[derive(Debug, Clone)]
pub struct AuditLog {
    events: VecDeque<ScheduleEvent>,
    capacity: usize,
}

impl AuditLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
        }
    }

    pub fn record(&mut self, event: ScheduleEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &ScheduleEvent> {
        self.events.iter()
    }

    /// PIDs that ran during `tick`, in execution order
    pub fn ran_in(&self, tick: Tick) -> Vec<Pid> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScheduleEvent::Ran { pid, tick: t, .. } if *t == tick => Some(*pid),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Summary of one call to `Kernel::tick`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub woken: Vec<Pid>,
    /// Processes that ran, in execution order
    pub ran: Vec<Pid>,
    pub deferred: Vec<Pid>,
    pub faulted: Vec<Pid>,
    /// Records removed by garbage collection
    pub collected: Vec<Pid>,
    pub cpu_used: f64,
}
