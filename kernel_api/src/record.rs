//! Durable per-process metadata

use crate::Mailbox;
use core_types::{Pid, ProcessMemory, ProcessStatus, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the process table
///
/// Records outlive their process: a terminal record stays queryable until
/// the kernel garbage-collects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Assigned at creation, never changes
    pub id: Pid,
    /// `None` for root processes
    pub parent_id: Option<Pid>,
    /// Image the process was constructed from
    pub image_name: String,
    pub status: ProcessStatus,
    /// Set only when `status` is `Error`
    pub error: Option<String>,
    pub start_tick: Tick,
    pub wake_tick: Option<Tick>,
    pub ended_tick: Option<Tick>,
    /// Process-private state
    pub memory: ProcessMemory,
    /// Pending notifications
    #[serde(default)]
    pub inbox: Mailbox,
    /// CPU charged on the most recent run
    #[serde(default)]
    pub cpu_last_run: f64,
}

impl ProcessRecord {
    /// Creates a record in the `Starting` state
    pub fn new(
        id: Pid,
        parent_id: Option<Pid>,
        image_name: String,
        start_tick: Tick,
        memory: ProcessMemory,
        mailbox_capacity: usize,
    ) -> Self {
        Self {
            id,
            parent_id,
            image_name,
            status: ProcessStatus::Starting,
            error: None,
            start_tick,
            wake_tick: None,
            ended_tick: None,
            memory,
            inbox: Mailbox::with_capacity(mailbox_capacity),
            cpu_last_run: 0.0,
        }
    }

    /// Checks whether this is a root process
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Moves the record into a terminal state
    pub fn terminate(&mut self, status: ProcessStatus, tick: Tick, error: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.ended_tick = Some(tick);
        self.wake_tick = None;
        self.error = if status == ProcessStatus::Error {
            error
        } else {
            None
        };
        self.inbox.clear();
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self
            .parent_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<10} {:<10} {:<24} {:<10}",
            self.id.to_string(),
            parent,
            self.image_name,
            self.status.as_str()
        )?;
        if let Some(error) = &self.error {
            write!(f, " {}", error)?;
        }
        Ok(())
    }
}
