//! Cooperative CPU budgeting
//!
//! CPU is an abstract number supplied by the host through [`CpuMeter`].
//! A process that wants to yield mid-work describes its work as a
//! [`StepProgram`]: a step function that returns either the state to
//! continue from or `Done`. The context drives the program and, once the
//! process has used more than its budget, stops between two steps and
//! persists the state so the next tick resumes it.

use crate::{ProcessContext, ProcessFault};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Host-supplied CPU metric
///
/// `used` is monotonic and non-negative within a tick; the kernel charges
/// each process the difference between the readings around its run.
pub trait CpuMeter {
    fn used(&self) -> f64;
}

/// Budget view exposed to processes
pub trait CooperativeScheduling {
    /// CPU used by the process so far in this run
    fn used(&self) -> f64;
    /// CPU the scheduler allocated to the process for this run
    fn budget(&self) -> f64;
}

/// Per-run budget bookkeeping
#[derive(Clone, Copy)]
pub struct CoopBudget<'a> {
    meter: &'a dyn CpuMeter,
    started_at: f64,
    budget: f64,
}

impl<'a> CoopBudget<'a> {
    /// Starts measuring from the meter's current reading
    pub fn start(meter: &'a dyn CpuMeter, budget: f64) -> Self {
        Self {
            meter,
            started_at: meter.used(),
            budget,
        }
    }

    /// Checks whether the process has gone over budget
    pub fn exhausted(&self) -> bool {
        self.used() > self.budget
    }
}

impl CooperativeScheduling for CoopBudget<'_> {
    fn used(&self) -> f64 {
        (self.meter.used() - self.started_at).max(0.0)
    }

    fn budget(&self) -> f64 {
        self.budget
    }
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<S> {
    /// More work remains; continue from this state
    Continue(S),
    /// The sequence is finished
    Done,
}

/// A resumable computation driven by [`ProcessContext::wrap`]
pub trait StepProgram {
    /// Everything needed to resume; persisted in process memory between
    /// ticks
    type State: Serialize + DeserializeOwned + Default;

    /// Performs one step of work
    fn step(
        &mut self,
        state: Self::State,
        ctx: &mut ProcessContext<'_>,
    ) -> Result<Step<Self::State>, ProcessFault>;

    /// Called when the program is suspended for budget, before its state
    /// is persisted
    fn shutdown(&mut self, _state: &Self::State, _ctx: &mut ProcessContext<'_>) {}
}

/// How a wrapped program left the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapOutcome {
    /// The program returned `Done`
    Completed,
    /// The budget ran out after `steps` steps; resumes next tick
    Suspended { steps: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Meter(Cell<f64>);

    impl CpuMeter for Meter {
        fn used(&self) -> f64 {
            self.0.get()
        }
    }

    #[test]
    fn test_budget_measures_from_start() {
        let meter = Meter(Cell::new(10.0));
        let budget = CoopBudget::start(&meter, 5.0);
        assert_eq!(budget.used(), 0.0);

        meter.0.set(14.0);
        assert_eq!(budget.used(), 4.0);
        assert!(!budget.exhausted());

        meter.0.set(15.5);
        assert!(budget.exhausted());
    }

    #[test]
    fn test_budget_reaching_limit_is_not_exceeding_it() {
        let meter = Meter(Cell::new(0.0));
        let budget = CoopBudget::start(&meter, 2.0);
        meter.0.set(2.0);
        assert!(!budget.exhausted());
    }
}
