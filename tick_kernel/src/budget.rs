//! CPU metering and budget policies

use kernel_api::{CpuMeter, ProcessRecord};
use std::cell::Cell;
use std::rc::Rc;

/// Decides how much CPU a process may use on its next run
///
/// `remaining` is what is left of the tick-wide limit, if one is
/// configured. Policies must be deterministic: the same record and
/// remaining CPU always give the same budget.
pub trait BudgetPolicy {
    fn budget_for(&self, record: &ProcessRecord, remaining: Option<f64>) -> f64;
}

/// Same budget for every process, capped by the tick's remaining CPU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBudget {
    per_run: f64,
}

impl FixedBudget {
    pub fn new(per_run: f64) -> Self {
        Self {
            per_run: per_run.max(0.0),
        }
    }

    pub fn per_run(&self) -> f64 {
        self.per_run
    }
}

impl BudgetPolicy for FixedBudget {
    fn budget_for(&self, _record: &ProcessRecord, remaining: Option<f64>) -> f64 {
        match remaining {
            Some(left) => self.per_run.min(left.max(0.0)),
            None => self.per_run,
        }
    }
}

/// Meter for hosts that do not measure CPU
///
/// Every run costs nothing, so wrapped programs are only ever stopped by
/// the step limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCpuMeter;

impl CpuMeter for NullCpuMeter {
    fn used(&self) -> f64 {
        0.0
    }
}

/// Manually driven meter for simulation and tests
///
/// Clones share the same counter, so a test can hand one clone to the
/// kernel and charge CPU from inside a process through another.
///
/// ```
/// use kernel_api::CpuMeter;
/// use tick_kernel::SimCpuMeter;
///
/// let meter = SimCpuMeter::new();
/// let handle = meter.clone();
/// handle.charge(2.5);
/// assert_eq!(meter.used(), 2.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimCpuMeter {
    used: Rc<Cell<f64>>,
}

impl SimCpuMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the reading; negative amounts are ignored
    pub fn charge(&self, amount: f64) {
        if amount > 0.0 {
            self.used.set(self.used.get() + amount);
        }
    }
}

impl CpuMeter for SimCpuMeter {
    fn used(&self) -> f64 {
        self.used.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Pid, ProcessMemory};

    fn record() -> ProcessRecord {
        ProcessRecord::new(
            Pid::FIRST,
            None,
            "TST/Any".to_string(),
            0,
            ProcessMemory::default(),
            4,
        )
    }

    #[test]
    fn test_fixed_budget_without_limit() {
        let policy = FixedBudget::new(5.0);
        assert_eq!(policy.budget_for(&record(), None), 5.0);
    }

    #[test]
    fn test_fixed_budget_capped_by_remaining() {
        let policy = FixedBudget::new(5.0);
        assert_eq!(policy.budget_for(&record(), Some(3.0)), 3.0);
        assert_eq!(policy.budget_for(&record(), Some(8.0)), 5.0);
        assert_eq!(policy.budget_for(&record(), Some(-1.0)), 0.0);
    }

    #[test]
    fn test_negative_per_run_clamped() {
        assert_eq!(FixedBudget::new(-2.0).per_run(), 0.0);
    }

    #[test]
    fn test_sim_meter_shared_between_clones() {
        let meter = SimCpuMeter::new();
        let other = meter.clone();
        other.charge(1.5);
        other.charge(-4.0);
        meter.charge(0.5);
        assert_eq!(other.used(), 2.0);
    }

    #[test]
    fn test_null_meter() {
        assert_eq!(NullCpuMeter.used(), 0.0);
    }
}
