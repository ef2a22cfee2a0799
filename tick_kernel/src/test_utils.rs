//! Test utilities for kernel scenarios
//!
//! [`TestBench`] registers scripted images whose behaviour is a closure,
//! records every run, and shares a [`SimCpuMeter`] with the kernel so a
//! script can charge CPU from inside a run.

use crate::{Kernel, KernelConfig, SimCpuMeter};
use core_types::Pid;
use kernel_api::{InterfaceId, KernelError, ProcessContext, ProcessFault};
use kernel_api::{Process, SleepExtension};
use services_registry::ProcessRegistry;
use std::cell::RefCell;
use std::rc::Rc;

/// Per-run behaviour of a scripted process
pub type Behavior = Rc<dyn Fn(&mut ProcessContext<'_>) -> Result<(), ProcessFault>>;

/// Shared record of which processes ran, in order
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    runs: Rc<RefCell<Vec<Pid>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, pid: Pid) {
        self.runs.borrow_mut().push(pid);
    }

    /// Returns and clears the runs recorded so far
    pub fn take(&self) -> Vec<Pid> {
        std::mem::take(&mut *self.runs.borrow_mut())
    }

    /// Number of recorded runs of `pid`
    pub fn count(&self, pid: Pid) -> usize {
        self.runs.borrow().iter().filter(|&&p| p == pid).count()
    }
}

/// A process whose run is a closure
pub struct Scripted {
    behavior: Behavior,
    runs: RunLog,
}

impl Process for Scripted {
    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessFault> {
        self.runs.record(ctx.id());
        (self.behavior)(ctx)
    }
}

/// Registry, run log and meter for one test
pub struct TestBench {
    pub registry: ProcessRegistry,
    pub runs: RunLog,
    pub meter: SimCpuMeter,
}

impl TestBench {
    pub fn new() -> Self {
        Self {
            registry: ProcessRegistry::new(),
            runs: RunLog::new(),
            meter: SimCpuMeter::new(),
        }
    }

    /// Registers an image whose every run calls `behavior`
    pub fn image<F>(mut self, name: &str, behavior: F) -> Self
    where
        F: Fn(&mut ProcessContext<'_>) -> Result<(), ProcessFault> + 'static,
    {
        let behavior: Behavior = Rc::new(behavior);
        let runs = self.runs.clone();
        self.registry.register(name, move |_| {
            Box::new(Scripted {
                behavior: behavior.clone(),
                runs: runs.clone(),
            })
        });
        self
    }

    /// Registers an image that finishes on its first run
    pub fn once(self, name: &str) -> Self {
        self.image(name, |_| Ok(()))
    }

    /// Registers an image that stays resident and runs every tick
    pub fn resident(self, name: &str) -> Self {
        self.image(name, |ctx| {
            ctx.keep_running();
            Ok(())
        })
    }

    /// Registers an image that sleeps `ticks` after every run
    pub fn sleeper(self, name: &str, ticks: u64) -> Self {
        self.image(name, move |ctx| {
            sleep_self(ctx, ticks)?;
            Ok(())
        })
    }

    /// Registers an image that charges `cpu` per run and stays resident
    pub fn burner(self, name: &str, cpu: f64) -> Self {
        let meter = self.meter.clone();
        self.image(name, move |ctx| {
            meter.charge(cpu);
            ctx.keep_running();
            Ok(())
        })
    }

    /// Builds a kernel over this bench's registry and meter
    pub fn kernel(self, config: KernelConfig) -> (Kernel, RunLog, SimCpuMeter) {
        let kernel = Kernel::with_config(self.registry, config).with_cpu_meter(self.meter.clone());
        (kernel, self.runs, self.meter)
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Puts the acting process to sleep through its context
pub fn sleep_self(ctx: &mut ProcessContext<'_>, ticks: u64) -> Result<(), KernelError> {
    ctx.sleep()
        .ok_or(KernelError::CapabilityUnavailable(InterfaceId::Sleep))?
        .sleep(ticks, None)
}

/// Runs `count` ticks
pub fn run_ticks(kernel: &mut Kernel, count: u64) {
    for _ in 0..count {
        kernel.tick();
    }
}
