//! Lifecycle states for processes and spawn requests

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a process
///
/// `Done`, `Killed` and `Error` are terminal: the kernel never runs a
/// process in one of those states again and never restarts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// Waiting for its wake tick
    Sleeping,
    /// Created, has not run yet
    Starting,
    /// Eligible to run on the next scheduling pass
    Running,
    /// Returned normally and requested no further work
    Done,
    /// Killed explicitly or by an ancestor's kill cascade
    Killed,
    /// A fault escaped the process's `run`
    Error,
}

impl ProcessStatus {
    /// Checks if the process will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Done | ProcessStatus::Killed | ProcessStatus::Error
        )
    }

    /// Checks if the process belongs in this tick's runnable set
    pub fn is_runnable(&self) -> bool {
        matches!(self, ProcessStatus::Starting | ProcessStatus::Running)
    }

    /// Returns a short display name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Done => "done",
            ProcessStatus::Killed => "killed",
            ProcessStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an asynchronous spawn request
///
/// Transitions only move forward: `Queued -> Spawning -> Spawned`.
/// `Error` is reachable from either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnStatus {
    Error,
    Queued,
    Spawning,
    Spawned,
}

impl SpawnStatus {
    /// Checks if the request has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpawnStatus::Spawned | SpawnStatus::Error)
    }

    /// Checks whether moving to `next` is a legal forward transition
    pub fn can_transition_to(&self, next: SpawnStatus) -> bool {
        use SpawnStatus::*;
        matches!(
            (self, next),
            (Queued, Spawning) | (Spawning, Spawned) | (Queued, Error) | (Spawning, Error)
        )
    }

    /// Returns a short display name
    pub fn as_str(&self) -> &'static str {
        match self {
            SpawnStatus::Error => "error",
            SpawnStatus::Queued => "queued",
            SpawnStatus::Spawning => "spawning",
            SpawnStatus::Spawned => "spawned",
        }
    }
}

impl fmt::Display for SpawnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
