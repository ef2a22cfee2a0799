//! Process execution context
//!
//! The kernel builds one [`ProcessContext`] per process run. It carries
//! the process's identity, its memory, a logger, and the capability-gated
//! handles back into the kernel. The acting PID lives here, so every call a
//! process makes through the context is attributed to it explicitly.

use crate::{
    CapabilitySet, CoopBudget, CooperativeScheduling, InterfaceId, Message, ProcessFault,
    ProcessInit, ProcessKernel, SleepExtension, SpawnExtension, Step, StepProgram, WrapOutcome,
};
use core_types::{Pid, ProcessMemory};
use services_logger::ProcessLogger;
use std::any::Any;
use std::rc::Rc;

/// Everything the kernel exposes to a running process
///
/// Blanket-implemented for any type providing all three extensions.
pub trait KernelServices: ProcessKernel + SleepExtension + SpawnExtension {
    fn as_kernel(&mut self) -> &mut dyn ProcessKernel;
    fn as_sleep(&mut self) -> &mut dyn SleepExtension;
    fn as_spawn(&mut self) -> &mut dyn SpawnExtension;
}

impl<T> KernelServices for T
where
    T: ProcessKernel + SleepExtension + SpawnExtension,
{
    fn as_kernel(&mut self) -> &mut dyn ProcessKernel {
        self
    }

    fn as_sleep(&mut self) -> &mut dyn SleepExtension {
        self
    }

    fn as_spawn(&mut self) -> &mut dyn SpawnExtension {
        self
    }
}

/// Requests a process made during its run that the kernel acts on once
/// `run` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// The process asked to stay resident
    pub keep_running: bool,
    /// A wrapped program ran out of budget
    pub suspended: bool,
}

/// Per-run view of the kernel for one process
pub struct ProcessContext<'a> {
    init: ProcessInit,
    memory: &'a mut ProcessMemory,
    services: &'a mut dyn KernelServices,
    capabilities: &'a CapabilitySet,
    log: ProcessLogger,
    coop: CoopBudget<'a>,
    messages: Vec<Message>,
    max_steps: Option<u64>,
    flags: RunFlags,
}

impl<'a> ProcessContext<'a> {
    /// Creates a context; called by the kernel for every run
    pub fn new(
        init: ProcessInit,
        memory: &'a mut ProcessMemory,
        services: &'a mut dyn KernelServices,
        capabilities: &'a CapabilitySet,
        log: ProcessLogger,
        coop: CoopBudget<'a>,
    ) -> Self {
        Self {
            init,
            memory,
            services,
            capabilities,
            log,
            coop,
            messages: Vec::new(),
            max_steps: None,
            flags: RunFlags::default(),
        }
    }

    /// Hands over the messages drained from the process's mailbox
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Caps the number of steps `wrap` runs in one tick
    pub fn with_step_limit(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Consumes the context and returns what the process requested
    pub fn finish(self) -> RunFlags {
        self.flags
    }

    pub fn id(&self) -> Pid {
        self.init.pid
    }

    pub fn parent_id(&self) -> Option<Pid> {
        self.init.parent_id
    }

    pub fn image_name(&self) -> &str {
        &self.init.image_name
    }

    /// Private memory
    pub fn memory(&self) -> &ProcessMemory {
        &*self.memory
    }

    /// Mutable private memory
    pub fn memory_mut(&mut self) -> &mut ProcessMemory {
        &mut *self.memory
    }

    pub fn log(&self) -> &ProcessLogger {
        &self.log
    }

    /// Interfaces this context was granted
    pub fn capabilities(&self) -> &CapabilitySet {
        self.capabilities
    }

    /// Process tree control, if granted
    pub fn kernel(&mut self) -> Option<&mut dyn ProcessKernel> {
        if self.capabilities.has(&InterfaceId::Kernel) {
            Some(self.services.as_kernel())
        } else {
            None
        }
    }

    /// Sleep scheduling, if granted
    pub fn sleep(&mut self) -> Option<&mut dyn SleepExtension> {
        if self.capabilities.has(&InterfaceId::Sleep) {
            Some(self.services.as_sleep())
        } else {
            None
        }
    }

    /// Spawn queue, if granted
    pub fn spawn(&mut self) -> Option<&mut dyn SpawnExtension> {
        if self.capabilities.has(&InterfaceId::Spawn) {
            Some(self.services.as_spawn())
        } else {
            None
        }
    }

    /// Cooperative budget view, if granted
    pub fn coop(&self) -> Option<&dyn CooperativeScheduling> {
        if self.capabilities.has(&InterfaceId::Coop) {
            Some(&self.coop)
        } else {
            None
        }
    }

    /// Host extension registered under `name`, downcast to `T`
    pub fn extension<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.capabilities.custom::<T>(name)
    }

    /// Takes the messages delivered since the last run
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Keeps the process `Running` after this run instead of `Done`
    pub fn keep_running(&mut self) {
        self.flags.keep_running = true;
    }

    /// Drives a step program until it finishes or the budget runs out
    ///
    /// Resume state left in memory by an earlier suspension is picked up
    /// first. On suspension the program's `shutdown` runs, its state is
    /// written to memory and the process stays `Running` for the next tick.
    pub fn wrap<P: StepProgram>(&mut self, program: &mut P) -> Result<WrapOutcome, ProcessFault> {
        let mut state: P::State = match self.memory.take_resume_state() {
            Some(raw) => serde_json::from_value(raw)?,
            None => Default::default(),
        };
        let mut steps = 0u64;

        loop {
            match program.step(state, self)? {
                Step::Done => return Ok(WrapOutcome::Completed),
                Step::Continue(next) => {
                    state = next;
                    steps += 1;
                }
            }

            let step_limit_hit = self.max_steps.is_some_and(|max| steps >= max);
            if self.coop.exhausted() || step_limit_hit {
                program.shutdown(&state, self);
                self.memory
                    .set_resume_state(Some(serde_json::to_value(&state)?));
                self.flags.suspended = true;
                return Ok(WrapOutcome::Suspended { steps });
            }
        }
    }
}
