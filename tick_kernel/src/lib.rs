//! # Tick Kernel
//!
//! A cooperative, tick-driven process kernel.
//!
//! ## Purpose
//!
//! The host calls [`Kernel::tick`] once per tick. Within that call the
//! kernel:
//! - wakes sleepers that are due
//! - runs every runnable process once, in PID order, under a CPU budget
//! - records how each run ended (done, sleeping, still running, error)
//! - lets the host fulfil spawn requests
//! - garbage-collects old terminal records
//!
//! Between ticks the whole state can be written out with
//! [`Kernel::snapshot`] and read back with [`Kernel::restore`].
//!
//! ## Philosophy
//!
//! **Deterministic by construction.**
//!
//! There are no threads and no wall clock. The same registry, the same
//! snapshot and the same CPU readings always produce the same schedule.
//! Faults are contained: a process that returns an error or panics is
//! marked `Error` and nothing else is affected.
//!
//! ## Example
//!
//! ```
//! use kernel_api::{Process, ProcessContext, ProcessFault, ProcessKernel};
//! use services_registry::ProcessRegistry;
//! use tick_kernel::Kernel;
//! use core_types::ProcessStatus;
//!
//! struct Hello;
//!
//! impl Process for Hello {
//!     fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessFault> {
//!         ctx.log().info("hello");
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = ProcessRegistry::new();
//! registry.register("ANI/Hello", |_| Box::new(Hello));
//!
//! let mut kernel = Kernel::new(registry);
//! let pid = kernel.start_process("ANI/Hello", serde_json::Value::Null).unwrap().pid;
//! kernel.tick();
//!
//! assert_eq!(kernel.get_process_by_id(pid).unwrap().status, ProcessStatus::Done);
//! ```

pub mod audit;
pub mod budget;
pub mod config;
mod handle;
pub mod sleep;
pub mod snapshot;
mod state;
pub mod table;
pub mod test_utils;

pub use audit::{AuditLog, ScheduleEvent, TickReport};
pub use budget::{BudgetPolicy, FixedBudget, NullCpuMeter, SimCpuMeter};
pub use config::KernelConfig;
pub use sleep::SleepScheduler;
pub use snapshot::{KernelSnapshot, SNAPSHOT_VERSION};
pub use table::ProcessTable;

use core_types::{Pid, ProcessStatus, SpawnRequestId, Tick, UnitRef};
use handle::KernelHandle;
use kernel_api::{
    CoopBudget, CpuMeter, KernelError, Message, ProcessContext, ProcessInit, ProcessKernel,
    ProcessRecord, SleepExtension, SpawnExtension, SpawnOptions, SpawnStatusReport,
    StartedProcess,
};
use serde_json::Value;
use services_logger::{LogBuffer, LoggerFactory, SharedLogBuffer};
use services_registry::{Bundle, ExtensionRegistry, ProcessRegistry};
use services_spawn::{SpawnHost, SpawnQueue};
use state::{InstanceCache, KernelState};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// How one run went, as far as the tick loop cares
#[derive(Debug, Clone, Copy, Default)]
struct RunOutcome {
    cpu: f64,
    faulted: bool,
}

/// The kernel
pub struct Kernel {
    state: KernelState,
    registry: ProcessRegistry,
    extensions: ExtensionRegistry,
    instances: InstanceCache,
    meter: Box<dyn CpuMeter>,
    budget: Box<dyn BudgetPolicy>,
    spawn_host: Option<Box<dyn SpawnHost>>,
    logs: LoggerFactory,
}

impl Kernel {
    /// Creates a kernel with the default configuration
    pub fn new(registry: ProcessRegistry) -> Self {
        Self::with_config(registry, KernelConfig::default())
    }

    /// Creates a kernel
    ///
    /// CPU is not metered until a meter is installed with
    /// [`Kernel::with_cpu_meter`].
    pub fn with_config(registry: ProcessRegistry, config: KernelConfig) -> Self {
        let logs = LoggerFactory::new(
            config.log_level,
            LogBuffer::shared(config.log_buffer_capacity),
        );
        Self {
            budget: Box::new(FixedBudget::new(config.default_budget)),
            state: KernelState::new(config),
            registry,
            extensions: ExtensionRegistry::new(),
            instances: InstanceCache::new(),
            meter: Box::new(NullCpuMeter),
            spawn_host: None,
            logs,
        }
    }

    /// Rebuilds a kernel from [`Kernel::snapshot`] output
    ///
    /// Process instances are recreated from `registry` the next time each
    /// process is scheduled. Meter, budget policy, spawn host and
    /// extensions are host objects and have to be installed again.
    pub fn restore(
        blob: &str,
        registry: ProcessRegistry,
        config: KernelConfig,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        let snapshot = KernelSnapshot::from_json(blob)?;
        let table = ProcessTable::from_records(snapshot.processes, snapshot.next_pid)?;

        let mut kernel = Self::with_config(registry, config);
        kernel.state.table = table;
        kernel.state.sleep = snapshot.sleep;
        kernel.state.spawn = snapshot.spawn;
        kernel.state.tick = snapshot.tick;

        log::info!(
            "restored {} processes at tick {}",
            kernel.state.table.len(),
            kernel.state.tick
        );
        Ok(kernel)
    }

    /// Installs the CPU meter used for budgets and accounting
    pub fn with_cpu_meter(mut self, meter: impl CpuMeter + 'static) -> Self {
        self.meter = Box::new(meter);
        self
    }

    /// Replaces the default [`FixedBudget`] policy
    pub fn with_budget_policy(mut self, policy: impl BudgetPolicy + 'static) -> Self {
        self.budget = Box::new(policy);
        self
    }

    /// Installs a host that fulfils spawn requests at the end of each tick
    pub fn with_spawn_host(mut self, host: impl SpawnHost + 'static) -> Self {
        self.spawn_host = Some(Box::new(host));
        self
    }

    /// Replaces the extension registry
    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    /// Installs a bundle and starts its root image, if it names one
    pub fn boot_bundle(
        &mut self,
        bundle: &dyn Bundle,
        overrides: Option<Value>,
    ) -> Result<Option<StartedProcess>, KernelError> {
        bundle.install(&mut self.registry);

        let Some(root) = bundle.root_image_name() else {
            return Ok(None);
        };
        let memory = bundle.default_root_memory(overrides);
        let started = self.start_process(root, memory)?;
        log::info!("booted {} as {}", root, started.pid);
        Ok(Some(started))
    }

    /// Runs one tick
    pub fn tick(&mut self) -> TickReport {
        self.state.tick += 1;
        let tick = self.state.tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        report.woken = self.state.wake_due();
        if !report.woken.is_empty() {
            log::debug!("tick {}: woke {:?}", tick, report.woken);
        }

        let limit = self.state.config.tick_cpu_limit;
        for pid in self.state.table.runnable() {
            // Earlier runs this tick may have killed or slept this process
            let Some(record) = self.state.table.get(pid) else {
                continue;
            };
            if !record.status.is_runnable() {
                continue;
            }

            let remaining = limit.map(|limit| limit - report.cpu_used);
            if remaining.is_some_and(|left| left <= 0.0) {
                report.deferred.push(pid);
                self.state.audit.record(ScheduleEvent::Deferred { pid, tick });
                continue;
            }

            let budget = self.budget.budget_for(record, remaining);
            let outcome = self.run_process(pid, budget);
            report.cpu_used += outcome.cpu;
            report.ran.push(pid);
            if outcome.faulted {
                report.faulted.push(pid);
            }
        }

        if !report.deferred.is_empty() {
            log::warn!(
                "tick {}: cpu limit reached, deferred {} process(es)",
                tick,
                report.deferred.len()
            );
        }

        if let Some(host) = self.spawn_host.as_mut() {
            host.fulfil(&mut self.state.spawn, tick);
        }

        report.collected = self.collect_garbage();
        report
    }

    fn run_process(&mut self, pid: Pid, budget: f64) -> RunOutcome {
        let tick = self.state.tick;
        let max_steps = self.state.config.max_steps_per_run;

        let Some(record) = self.state.table.get_mut(pid) else {
            return RunOutcome::default();
        };
        let init = ProcessInit {
            pid,
            parent_id: record.parent_id,
            image_name: record.image_name.clone(),
        };
        record.status = ProcessStatus::Running;
        let mut memory = std::mem::take(&mut record.memory);
        let messages = record.inbox.drain();

        let cached = self.instances.remove(&pid);
        let Some(mut instance) = cached.or_else(|| self.registry.get_new_process(&init)) else {
            if let Some(record) = self.state.table.get_mut(pid) {
                record.memory = memory;
            }
            self.fault(pid, format!("image {} is not registered", init.image_name));
            return RunOutcome {
                cpu: 0.0,
                faulted: true,
            };
        };

        let capabilities = self.extensions.capabilities();
        let logger = self.logs.process_logger(&init.image_name, pid);
        let started_at = self.meter.used();

        let (result, flags, queued_spawn) = {
            let mut handle = KernelHandle::new(
                Some(pid),
                &mut self.state,
                &self.registry,
                &mut self.instances,
            );
            let coop = CoopBudget::start(self.meter.as_ref(), budget);
            let mut ctx =
                ProcessContext::new(init, &mut memory, &mut handle, &capabilities, logger, coop)
                    .with_messages(messages)
                    .with_step_limit(max_steps);

            let result = panic::catch_unwind(AssertUnwindSafe(|| instance.run(&mut ctx)));
            let flags = ctx.finish();
            (result, flags, handle.queued_spawn())
        };

        let cpu = (self.meter.used() - started_at).max(0.0);
        let Some(record) = self.state.table.get_mut(pid) else {
            return RunOutcome {
                cpu,
                faulted: false,
            };
        };
        record.memory = memory;
        record.cpu_last_run = cpu;
        let status = record.status;

        let fault = match result {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(fault.message().to_string()),
            Err(payload) => Some(format!("panic: {}", panic_message(payload.as_ref()))),
        };

        let mut faulted = false;
        match (fault, status) {
            // Killed during its own run: the kill stands, whatever the run did
            (_, ProcessStatus::Killed) => {}
            (Some(message), _) => {
                self.fault(pid, message);
                faulted = true;
            }
            (None, ProcessStatus::Sleeping) => {
                self.instances.insert(pid, instance);
            }
            (None, _) if flags.keep_running || flags.suspended || queued_spawn => {
                record.status = ProcessStatus::Running;
                self.instances.insert(pid, instance);
            }
            (None, _) => {
                self.state.retire(pid, ProcessStatus::Done, None);
                log::debug!("{} finished at tick {}", pid, tick);
            }
        }

        let status = self
            .state
            .table
            .get(pid)
            .map(|r| r.status)
            .unwrap_or(ProcessStatus::Killed);
        self.state.audit.record(ScheduleEvent::Ran {
            pid,
            tick,
            cpu,
            status,
        });

        RunOutcome { cpu, faulted }
    }

    fn fault(&mut self, pid: Pid, message: String) {
        let tick = self.state.tick;
        log::warn!(
            "{}",
            KernelError::ProcessFault {
                pid,
                message: message.clone()
            }
        );
        self.state.audit.record(ScheduleEvent::Faulted {
            pid,
            tick,
            message: message.clone(),
        });
        self.state.retire(pid, ProcessStatus::Error, Some(message));
        self.instances.remove(&pid);
    }

    fn collect_garbage(&mut self) -> Vec<Pid> {
        let tick = self.state.tick;
        let config = &self.state.config;
        let collected = self
            .state
            .table
            .collect_garbage(tick, config.terminal_retention_ticks);
        let requests = self
            .state
            .spawn
            .collect_garbage(tick, config.spawn_retention_ticks);

        for &pid in &collected {
            self.instances.remove(&pid);
            self.state.audit.record(ScheduleEvent::Collected { pid, tick });
        }
        if !collected.is_empty() || requests > 0 {
            log::debug!(
                "tick {}: collected {} record(s), {} spawn request(s)",
                tick,
                collected.len(),
                requests
            );
        }
        collected
    }

    /// Serializes the process table, PID counter, tick, sleep entries and
    /// spawn requests
    pub fn snapshot(&self) -> Result<String, KernelError> {
        self.to_snapshot().to_json()
    }

    pub fn to_snapshot(&self) -> KernelSnapshot {
        KernelSnapshot {
            version: SNAPSHOT_VERSION,
            tick: self.state.tick,
            next_pid: self.state.table.peek_next_pid(),
            processes: self.state.table.iter().cloned().collect(),
            sleep: self.state.sleep.clone(),
            spawn: self.state.spawn.clone(),
        }
    }

    fn host(&mut self) -> KernelHandle<'_> {
        KernelHandle::new(None, &mut self.state, &self.registry, &mut self.instances)
    }

    /// Last completed tick; 0 before the first
    pub fn current_tick(&self) -> Tick {
        self.state.tick
    }

    pub fn config(&self) -> &KernelConfig {
        &self.state.config
    }

    /// All records in PID order
    pub fn processes(&self) -> Vec<&ProcessRecord> {
        self.state.table.iter().collect()
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.state.table
    }

    /// Process listing for display
    pub fn format_table(&self) -> String {
        self.state.table.format_table()
    }

    pub fn sleep_scheduler(&self) -> &SleepScheduler {
        &self.state.sleep
    }

    pub fn spawn_queue(&self) -> &SpawnQueue {
        &self.state.spawn
    }

    /// Direct access for hosts that fulfil requests without a [`SpawnHost`]
    pub fn spawn_queue_mut(&mut self) -> &mut SpawnQueue {
        &mut self.state.spawn
    }

    pub fn audit(&self) -> &AuditLog {
        &self.state.audit
    }

    pub fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.state.audit
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProcessRegistry {
        &mut self.registry
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Changes apply to every context built afterwards
    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Factory for host-side loggers sharing the kernel's buffer
    pub fn logger_factory(&self) -> &LoggerFactory {
        &self.logs
    }

    pub fn log_buffer(&self) -> SharedLogBuffer {
        self.logs.buffer().clone()
    }

    /// Whether a live instance is cached for `pid`
    pub fn has_instance(&self, pid: Pid) -> bool {
        self.instances.contains_key(&pid)
    }
}

/// Host-side process control; started processes are roots
impl ProcessKernel for Kernel {
    fn start_process(
        &mut self,
        image_name: &str,
        start_context: Value,
    ) -> Result<StartedProcess, KernelError> {
        self.host().start_process(image_name, start_context)
    }

    fn kill_process(&mut self, pid: Pid) {
        self.host().kill_process(pid);
    }

    fn get_process_by_id(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.state.table.get(pid)
    }

    fn set_parent(&mut self, pid: Pid, parent_id: Option<Pid>) -> bool {
        self.host().set_parent(pid, parent_id)
    }

    fn notify(&mut self, pid: Pid, message: Message) -> Result<(), KernelError> {
        self.host().notify(pid, message)
    }
}

/// Host-side sleep; `pid` is required
impl SleepExtension for Kernel {
    fn sleep(&mut self, ticks: u64, pid: Option<Pid>) -> Result<(), KernelError> {
        self.host().sleep(ticks, pid)
    }
}

impl SpawnExtension for Kernel {
    fn spawn_creep(&mut self, opts: SpawnOptions) -> Result<SpawnRequestId, KernelError> {
        self.host().spawn_creep(opts)
    }

    fn get_status(&self, id: SpawnRequestId) -> SpawnStatusReport {
        self.state.spawn.status(id)
    }

    fn get_creep(&self, id: SpawnRequestId) -> Option<UnitRef> {
        self.state.spawn.unit(id)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
