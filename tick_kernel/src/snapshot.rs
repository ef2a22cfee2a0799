//! Persisted kernel state
//!
//! Everything the kernel needs to continue on the next tick, and nothing
//! else: process instances are rebuilt from the registry on demand, and
//! the child index is derived from the records' parent links.

use crate::sleep::SleepScheduler;
use core_types::{Pid, ProcessStatus, Tick};
use kernel_api::{KernelError, ProcessRecord};
use serde::{Deserialize, Serialize};
use services_spawn::SpawnQueue;

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSnapshot {
    pub version: u32,
    pub tick: Tick,
    pub next_pid: Pid,
    /// Records in PID order
    pub processes: Vec<ProcessRecord>,
    pub sleep: SleepScheduler,
    pub spawn: SpawnQueue,
}

impl KernelSnapshot {
    pub fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and checks a snapshot
    pub fn from_json(blob: &str) -> Result<Self, KernelError> {
        let snapshot: KernelSnapshot = serde_json::from_str(blob)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Checks that sleep entries and sleeping records agree
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(KernelError::Persistence(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }

        for (pid, wake_tick) in self.sleep.iter() {
            let record = self
                .processes
                .iter()
                .find(|r| r.id == pid)
                .ok_or_else(|| {
                    KernelError::Persistence(format!("sleep entry for missing process {}", pid))
                })?;
            if record.status != ProcessStatus::Sleeping || record.wake_tick != Some(wake_tick) {
                return Err(KernelError::Persistence(format!(
                    "sleep entry for {} does not match its record",
                    pid
                )));
            }
        }

        let sleeping = self
            .processes
            .iter()
            .filter(|r| r.status == ProcessStatus::Sleeping)
            .count();
        if sleeping != self.sleep.len() {
            return Err(KernelError::Persistence(
                "sleeping process without a sleep entry".to_string(),
            ));
        }
        Ok(())
    }
}
