//! Mutable kernel state shared by the tick loop and process handles

use crate::audit::{AuditLog, ScheduleEvent};
use crate::config::KernelConfig;
use crate::sleep::SleepScheduler;
use crate::table::ProcessTable;
use core_types::{Pid, ProcessMemory, ProcessStatus, SpawnRequestId, Tick};
use kernel_api::{
    KernelError, Message, Process, ProcessInit, ProcessRecord, SpawnOptions, StartedProcess,
};
use serde_json::Value;
use services_registry::ProcessRegistry;
use services_spawn::SpawnQueue;
use std::collections::HashMap;

/// Live process instances, keyed by PID
///
/// An instance is missing while its process runs, and after a restore
/// until the process is scheduled again.
pub(crate) type InstanceCache = HashMap<Pid, Box<dyn Process>>;

pub(crate) struct KernelState {
    pub(crate) table: ProcessTable,
    pub(crate) sleep: SleepScheduler,
    pub(crate) spawn: SpawnQueue,
    pub(crate) tick: Tick,
    pub(crate) config: KernelConfig,
    pub(crate) audit: AuditLog,
}

impl KernelState {
    pub(crate) fn new(config: KernelConfig) -> Self {
        Self {
            table: ProcessTable::new(),
            sleep: SleepScheduler::new(),
            spawn: SpawnQueue::new(),
            tick: 0,
            audit: AuditLog::with_capacity(config.audit_capacity),
            config,
        }
    }

    pub(crate) fn start_process(
        &mut self,
        registry: &ProcessRegistry,
        instances: &mut InstanceCache,
        parent: Option<Pid>,
        image_name: &str,
        start_context: Value,
    ) -> Result<StartedProcess, KernelError> {
        if let Some(parent) = parent {
            let alive = self
                .table
                .get(parent)
                .is_some_and(|r| !r.status.is_terminal());
            if !alive {
                return Err(KernelError::UnknownPid(parent));
            }
        }

        // Construct before allocating so a missing image consumes no PID
        let init = ProcessInit {
            pid: self.table.peek_next_pid(),
            parent_id: parent,
            image_name: image_name.to_string(),
        };
        let instance = registry
            .get_new_process(&init)
            .ok_or_else(|| KernelError::UnknownImage(image_name.to_string()))?;

        let pid = self.table.allocate_pid()?;
        let record = ProcessRecord::new(
            pid,
            parent,
            init.image_name,
            self.tick,
            ProcessMemory::new(start_context),
            self.config.mailbox_capacity,
        );
        self.table.insert(record.clone());
        instances.insert(pid, instance);

        log::debug!(
            "started {} ({}) under {:?} at tick {}",
            pid,
            image_name,
            parent,
            self.tick
        );
        self.audit.record(ScheduleEvent::Started {
            pid,
            parent,
            tick: self.tick,
        });

        Ok(StartedProcess { pid, record })
    }

    /// Kills `pid` and its whole subtree; returns the PIDs that changed
    /// status
    ///
    /// Records that already finished as `Done` or `Error` are relabelled
    /// `Killed` too. Records killed earlier keep their first ended tick.
    pub(crate) fn kill(&mut self, instances: &mut InstanceCache, pid: Pid) -> Vec<Pid> {
        let mut killed = Vec::new();

        for target in self.table.subtree(pid) {
            let Some(record) = self.table.get_mut(target) else {
                continue;
            };
            if record.status != ProcessStatus::Killed {
                record.terminate(ProcessStatus::Killed, self.tick, None);
                killed.push(target);
                self.audit.record(ScheduleEvent::Killed {
                    pid: target,
                    tick: self.tick,
                });
            }
            self.sleep.cancel(target);
            self.spawn.detach_pid(target);
            instances.remove(&target);
        }

        if !killed.is_empty() {
            log::info!(
                "killed {} and {} descendant(s) at tick {}",
                pid,
                killed.len().saturating_sub(1),
                self.tick
            );
        }
        killed
    }

    /// Moves a process into `Done` or `Error`
    ///
    /// The caller owns the instance at this point and drops it.
    pub(crate) fn retire(&mut self, pid: Pid, status: ProcessStatus, error: Option<String>) {
        if let Some(record) = self.table.get_mut(pid) {
            record.terminate(status, self.tick, error);
        }
        self.sleep.cancel(pid);
        self.spawn.detach_pid(pid);
    }

    pub(crate) fn sleep(&mut self, pid: Pid, ticks: u64) -> Result<(), KernelError> {
        let record = self.table.get_mut(pid).ok_or(KernelError::UnknownPid(pid))?;
        if record.status.is_terminal() {
            return Ok(());
        }

        let wake_tick = self.tick.saturating_add(ticks);
        record.status = ProcessStatus::Sleeping;
        record.wake_tick = Some(wake_tick);
        self.sleep.schedule(pid, wake_tick);
        Ok(())
    }

    pub(crate) fn notify(&mut self, pid: Pid, message: Message) -> Result<(), KernelError> {
        let record = self
            .table
            .get_mut(pid)
            .filter(|r| !r.status.is_terminal())
            .ok_or(KernelError::UnknownPid(pid))?;

        let wakes = message.wakes_sleeper();
        record
            .inbox
            .push(message)
            .map_err(|_| KernelError::MailboxFull(pid))?;

        if wakes && record.status == ProcessStatus::Sleeping {
            record.wake_tick = Some(self.tick);
            self.sleep.schedule(pid, self.tick);
        }
        Ok(())
    }

    pub(crate) fn spawn_creep(
        &mut self,
        actor: Option<Pid>,
        mut opts: SpawnOptions,
    ) -> Result<SpawnRequestId, KernelError> {
        opts.pid = opts.pid.or(actor);
        if let Some(pid) = opts.pid {
            if !self.table.contains(pid) {
                return Err(KernelError::UnknownPid(pid));
            }
        }
        self.spawn.submit(opts, self.tick)
    }

    /// Makes every sleeper due at the current tick runnable again
    pub(crate) fn wake_due(&mut self) -> Vec<Pid> {
        let mut woken = Vec::new();
        for pid in self.sleep.wake_due(self.tick) {
            let Some(record) = self.table.get_mut(pid) else {
                continue;
            };
            if record.status == ProcessStatus::Sleeping {
                record.status = ProcessStatus::Running;
                record.wake_tick = None;
                woken.push(pid);
                self.audit.record(ScheduleEvent::Woke {
                    pid,
                    tick: self.tick,
                });
            }
        }
        woken
    }
}
