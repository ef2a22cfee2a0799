//! Kernel handle bound to one acting process
//!
//! A process never touches the kernel directly. Each run gets a handle
//! that carries the acting PID explicitly, so defaults like "sleep the
//! caller" and "parent of the new process" come from the handle rather
//! than from ambient kernel state.

use crate::state::{InstanceCache, KernelState};
use core_types::{Pid, SpawnRequestId, UnitRef};
use kernel_api::{
    KernelError, Message, ProcessKernel, ProcessRecord, SleepExtension, SpawnExtension,
    SpawnOptions, SpawnStatusReport, StartedProcess,
};
use serde_json::Value;
use services_registry::ProcessRegistry;

pub(crate) struct KernelHandle<'k> {
    actor: Option<Pid>,
    state: &'k mut KernelState,
    registry: &'k ProcessRegistry,
    instances: &'k mut InstanceCache,
    queued_spawn: bool,
}

impl<'k> KernelHandle<'k> {
    pub(crate) fn new(
        actor: Option<Pid>,
        state: &'k mut KernelState,
        registry: &'k ProcessRegistry,
        instances: &'k mut InstanceCache,
    ) -> Self {
        Self {
            actor,
            state,
            registry,
            instances,
            queued_spawn: false,
        }
    }

    /// Whether the acting process queued a spawn request through this
    /// handle
    pub(crate) fn queued_spawn(&self) -> bool {
        self.queued_spawn
    }
}

impl ProcessKernel for KernelHandle<'_> {
    fn start_process(
        &mut self,
        image_name: &str,
        start_context: Value,
    ) -> Result<StartedProcess, KernelError> {
        self.state.start_process(
            self.registry,
            self.instances,
            self.actor,
            image_name,
            start_context,
        )
    }

    fn kill_process(&mut self, pid: Pid) {
        self.state.kill(self.instances, pid);
    }

    fn get_process_by_id(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.state.table.get(pid)
    }

    fn set_parent(&mut self, pid: Pid, parent_id: Option<Pid>) -> bool {
        match self.state.table.set_parent(pid, parent_id) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("set_parent rejected: {}", err);
                false
            }
        }
    }

    fn notify(&mut self, pid: Pid, message: Message) -> Result<(), KernelError> {
        self.state.notify(pid, message)
    }
}

impl SleepExtension for KernelHandle<'_> {
    fn sleep(&mut self, ticks: u64, pid: Option<Pid>) -> Result<(), KernelError> {
        let target = pid.or(self.actor).ok_or(KernelError::NoActingProcess)?;
        self.state.sleep(target, ticks)
    }
}

impl SpawnExtension for KernelHandle<'_> {
    fn spawn_creep(&mut self, opts: SpawnOptions) -> Result<SpawnRequestId, KernelError> {
        let id = self.state.spawn_creep(self.actor, opts)?;
        if self.actor.is_some() {
            self.queued_spawn = true;
        }
        Ok(id)
    }

    fn get_status(&self, id: SpawnRequestId) -> SpawnStatusReport {
        self.state.spawn.status(id)
    }

    fn get_creep(&self, id: SpawnRequestId) -> Option<UnitRef> {
        self.state.spawn.unit(id)
    }
}
