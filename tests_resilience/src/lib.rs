//! Resilience Test Utilities
//!
//! Shared setup for the scenario and property tests in `tests/`.
//!
//! ## Test Philosophy
//!
//! - **Containment**: a failing or killed process never disturbs anything
//!   outside its own subtree
//! - **Determinism**: the same snapshot and registry always produce the
//!   same schedule
//! - **Exact windows**: a process asleep for `n` ticks runs again exactly
//!   `n` ticks later

use core_types::Pid;
use kernel_api::{KernelError, ProcessKernel};
use serde_json::{json, Value};
use tick_kernel::test_utils::{sleep_self, RunLog, TestBench};
use tick_kernel::{Kernel, KernelConfig, SimCpuMeter};

/// Stays resident and runs every tick
pub const RESIDENT: &str = "RES/Resident";
/// Finishes on its first run
pub const ONCE: &str = "RES/Once";
/// Sleeps for the number of ticks held in its memory after every run
pub const NAPPER: &str = "RES/Napper";
/// Returns an error on its first run
pub const FAILING: &str = "RES/Failing";
/// Panics on its first run
pub const PANICKING: &str = "RES/Panicking";

/// Bench with the standard resilience images registered
pub fn standard_bench() -> TestBench {
    TestBench::new()
        .resident(RESIDENT)
        .once(ONCE)
        .image(NAPPER, |ctx| {
            let ticks: u64 = ctx.memory().load()?;
            sleep_self(ctx, ticks)?;
            Ok(())
        })
        .image(FAILING, |_| Err(kernel_api::ProcessFault::new("scripted failure")))
        .image(PANICKING, |_| panic!("scripted panic"))
}

/// Bootstrap helper for tests
///
/// Creates a kernel over [`standard_bench`] with the given configuration.
pub fn test_bootstrap(config: KernelConfig) -> (Kernel, RunLog, SimCpuMeter) {
    standard_bench().kernel(config)
}

/// Starts a root process of `image`
pub fn start(kernel: &mut Kernel, image: &str) -> Result<Pid, KernelError> {
    start_with(kernel, image, Value::Null)
}

/// Starts a root process of `image` with the given start context
pub fn start_with(kernel: &mut Kernel, image: &str, context: Value) -> Result<Pid, KernelError> {
    Ok(kernel.start_process(image, context)?.pid)
}

/// Starts a napper that sleeps `ticks` after each run
pub fn start_napper(kernel: &mut Kernel, ticks: u64) -> Result<Pid, KernelError> {
    start_with(kernel, NAPPER, json!(ticks))
}

/// Builds a tree of resident processes
///
/// `parents[i]` is the index of node `i`'s parent, or `None` for a root.
/// A parent index must be lower than the node's own index. Returns the
/// PIDs in node order.
pub fn build_tree(kernel: &mut Kernel, parents: &[Option<usize>]) -> Result<Vec<Pid>, KernelError> {
    let mut pids = Vec::with_capacity(parents.len());
    for (index, parent) in parents.iter().enumerate() {
        let pid = start(kernel, RESIDENT)?;
        if let Some(parent) = *parent {
            let parent_pid = pids.get(parent).copied().filter(|_| parent < index);
            let linked = parent_pid.is_some_and(|p| kernel.set_parent(pid, Some(p)));
            if !linked {
                return Err(KernelError::UnknownPid(pid));
            }
        }
        pids.push(pid);
    }
    Ok(pids)
}

/// Indices of `node` and all its descendants in a tree given as parent
/// indices
pub fn subtree_indices(parents: &[Option<usize>], node: usize) -> Vec<usize> {
    let mut members = vec![node];
    for index in 0..parents.len() {
        if let Some(parent) = parents[index] {
            if members.contains(&parent) && !members.contains(&index) {
                members.push(index);
            }
        }
    }
    members.sort_unstable();
    members
}
