//! Spawn request types shared by processes and the host

use crate::KernelError;
use core_types::{Pid, SpawnStatus};
use serde::{Deserialize, Serialize};

/// Highest spawn priority (spawned first)
pub const PRIORITY_HIGHEST: i32 = -1000;
/// Lowest spawn priority
pub const PRIORITY_LOWEST: i32 = 1000;

/// Parameters of a spawn request
///
/// `rooms` must name at least one room; the host picks the spawner and may
/// treat extra rooms as hints. `body` lists body templates in order of
/// decreasing desirability; the host guarantees the unit gets one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOptions {
    pub rooms: Vec<String>,
    pub body: Vec<Vec<String>>,
    /// Hint in `PRIORITY_HIGHEST..=PRIORITY_LOWEST`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Process the unit belongs to; defaults to the requesting process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
}

impl SpawnOptions {
    /// Creates options for the given rooms and body templates
    pub fn new<R, B, P>(rooms: R, body: B) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        B: IntoIterator<Item = P>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            rooms: rooms.into_iter().map(Into::into).collect(),
            body: body
                .into_iter()
                .map(|template| template.into_iter().map(Into::into).collect())
                .collect(),
            priority: None,
            pid: None,
        }
    }

    /// Sets the priority hint
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Associates the request with a process
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Rejects requests the host could never fulfil
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.rooms.is_empty() {
            return Err(KernelError::InvalidSpawnRequest(
                "at least one room is required".to_string(),
            ));
        }
        if self.body.is_empty() {
            return Err(KernelError::InvalidSpawnRequest(
                "at least one body template is required".to_string(),
            ));
        }
        if let Some(index) = self.body.iter().position(|template| template.is_empty()) {
            return Err(KernelError::InvalidSpawnRequest(format!(
                "body template {} is empty",
                index
            )));
        }
        Ok(())
    }

    /// Priority hint clamped into the documented range
    pub fn effective_priority(&self) -> i32 {
        self.priority
            .unwrap_or(0)
            .clamp(PRIORITY_HIGHEST, PRIORITY_LOWEST)
    }
}

/// Result of polling a spawn request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnStatusReport {
    pub status: SpawnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpawnStatusReport {
    /// Creates a report with no message
    pub fn new(status: SpawnStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    /// Creates an `Error` report
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SpawnStatus::Error,
            message: Some(message.into()),
        }
    }
}
