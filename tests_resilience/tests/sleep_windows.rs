//! Sleep Window Tests
//!
//! A process that sleeps `n` ticks at tick `T` is not run again before
//! `T + n`, and is run at `T + n` (or `T + 1` for `n = 0`).

use core_types::ProcessStatus;
use kernel_api::{Message, ProcessKernel, SleepExtension};
use proptest::prelude::*;
use tests_resilience::{start, start_napper, test_bootstrap, RESIDENT};
use tick_kernel::test_utils::run_ticks;
use tick_kernel::KernelConfig;

#[test]
fn test_nap_of_five() {
    let (mut kernel, _, _) = test_bootstrap(KernelConfig::default());
    let napper = start_napper(&mut kernel, 5).unwrap();

    let mut ran_at = Vec::new();
    for _ in 0..12 {
        let report = kernel.tick();
        if report.ran.contains(&napper) {
            ran_at.push(report.tick);
        }
    }
    assert_eq!(ran_at, vec![1, 6, 11]);
}

#[test]
fn test_interrupt_cuts_nap_short() {
    let (mut kernel, runs, _) = test_bootstrap(KernelConfig::default());
    let napper = start_napper(&mut kernel, 50).unwrap();

    kernel.tick();
    kernel.tick();
    kernel.notify(napper, Message::interrupt("invader")).unwrap();
    let report = kernel.tick();

    assert_eq!(report.woken, vec![napper]);
    assert_eq!(report.ran, vec![napper]);
    assert_eq!(runs.count(napper), 2);
    assert_eq!(kernel.get_process_by_id(napper).unwrap().wake_tick, Some(53));
}

#[test]
fn test_host_put_to_sleep() {
    let (mut kernel, runs, _) = test_bootstrap(KernelConfig::default());
    let resident = start(&mut kernel, RESIDENT).unwrap();

    kernel.tick();
    kernel.sleep(3, Some(resident)).unwrap();
    assert_eq!(kernel.get_process_by_id(resident).unwrap().status, ProcessStatus::Sleeping);

    run_ticks(&mut kernel, 2);
    assert_eq!(runs.count(resident), 1);
    kernel.tick();
    assert_eq!(runs.count(resident), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Consecutive runs of a napper are always `max(n, 1)` ticks apart
    #[test]
    fn naps_are_exact(nap in 0u64..20, delay in 0u64..10) {
        let (mut kernel, _, _) = test_bootstrap(KernelConfig::default());
        run_ticks(&mut kernel, delay);
        let napper = start_napper(&mut kernel, nap).unwrap();

        let mut ran_at = Vec::new();
        for _ in 0..60 {
            let report = kernel.tick();
            if report.ran.contains(&napper) {
                ran_at.push(report.tick);
            }
        }

        prop_assert_eq!(ran_at[0], delay + 1);
        let gap = nap.max(1);
        for pair in ran_at.windows(2) {
            prop_assert_eq!(pair[1] - pair[0], gap);
        }
        prop_assert_eq!(ran_at.len() as u64, (60 - 1) / gap + 1);
    }
}
