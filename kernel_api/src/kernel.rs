//! Extension traits a process reaches through its context

use crate::{KernelError, Message, ProcessRecord, SpawnOptions, SpawnStatusReport};
use core_types::{Pid, SpawnRequestId, UnitRef};
use serde_json::Value;

/// Returned by [`ProcessKernel::start_process`]
///
/// The process instance itself stays owned by the kernel; callers address
/// it through the PID from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedProcess {
    pub pid: Pid,
    /// Copy of the freshly inserted record
    pub record: ProcessRecord,
}

/// Process tree control
///
/// Multiple implementations are possible: the tick kernel's per-process
/// handle, or the host-facing `Kernel` itself. The only difference is who
/// becomes the parent of a started process.
///
/// # Example
///
/// ```
/// use kernel_api::{KernelError, ProcessKernel};
/// use serde_json::json;
///
/// fn start_miner<K: ProcessKernel>(kernel: &mut K) -> Result<(), KernelError> {
///     let started = kernel.start_process("ANI/Miner", json!({ "room": "W1N1" }))?;
///     assert!(kernel.get_process_by_id(started.pid).is_some());
///     Ok(())
/// }
/// ```
pub trait ProcessKernel {
    /// Starts a process from a registered image
    ///
    /// The new process's parent is the acting process (none when the host
    /// calls directly) and `start_context` becomes its initial memory.
    fn start_process(
        &mut self,
        image_name: &str,
        start_context: Value,
    ) -> Result<StartedProcess, KernelError>;

    /// Kills a process and, recursively, all of its descendants
    ///
    /// Unknown PIDs are ignored.
    fn kill_process(&mut self, pid: Pid);

    /// Looks up a process record
    fn get_process_by_id(&self, pid: Pid) -> Option<&ProcessRecord>;

    /// Reparents a process; `None` makes it a root
    ///
    /// Returns false (and changes nothing) if either PID is unknown or the
    /// change would create a cycle.
    fn set_parent(&mut self, pid: Pid, parent_id: Option<Pid>) -> bool;

    /// Posts a message to a process's mailbox
    fn notify(&mut self, pid: Pid, message: Message) -> Result<(), KernelError>;
}

/// Sleep scheduling
pub trait SleepExtension {
    /// Puts a process to sleep for `ticks` ticks
    ///
    /// `pid` defaults to the acting process. Zero ticks still yields the
    /// rest of the current tick and wakes on the next one.
    fn sleep(&mut self, ticks: u64, pid: Option<Pid>) -> Result<(), KernelError>;
}

/// Spawn request queue
///
/// Process calls `spawn_creep`, then polls `get_status` until it reports
/// `Spawned` (or `Error`), then calls `get_creep`.
pub trait SpawnExtension {
    /// Queues a spawn request and returns its id
    fn spawn_creep(&mut self, opts: SpawnOptions) -> Result<SpawnRequestId, KernelError>;

    /// Polls a request; unknown ids report `Error`
    fn get_status(&self, id: SpawnRequestId) -> SpawnStatusReport;

    /// Returns the spawned unit once the request reached `Spawned`
    fn get_creep(&self, id: SpawnRequestId) -> Option<UnitRef>;
}
