//! Kill Cascade Tests
//!
//! Killing a process takes its whole subtree down with it and leaves every
//! other process alone.

use core_types::{Pid, ProcessStatus};
use kernel_api::{InterfaceId, KernelError, ProcessKernel};
use proptest::prelude::*;
use serde_json::Value;
use tests_resilience::{
    build_tree, standard_bench, start, start_napper, subtree_indices, test_bootstrap, FAILING, ONCE,
    RESIDENT,
};
use tick_kernel::test_utils::run_ticks;
use tick_kernel::KernelConfig;

/// Random forests as parent indices; a parent always precedes its child
fn forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..12).prop_map(|nodes| {
        nodes
            .into_iter()
            .enumerate()
            .map(|(i, (rooted, parent))| {
                if i == 0 || rooted {
                    None
                } else {
                    Some(parent.index(i))
                }
            })
            .collect()
    })
}

#[test]
fn test_kill_middle_of_tree() {
    let (mut kernel, runs, _) = test_bootstrap(KernelConfig::default());
    //        0
    //      /   \
    //     1     3
    //     |
    //     2
    let pids = build_tree(&mut kernel, &[None, Some(0), Some(1), Some(0)]).unwrap();
    kernel.tick();
    runs.take();

    kernel.kill_process(pids[1]);

    assert_eq!(kernel.get_process_by_id(pids[1]).unwrap().status, ProcessStatus::Killed);
    assert_eq!(kernel.get_process_by_id(pids[2]).unwrap().status, ProcessStatus::Killed);
    assert_eq!(kernel.get_process_by_id(pids[0]).unwrap().status, ProcessStatus::Running);
    assert_eq!(kernel.get_process_by_id(pids[3]).unwrap().status, ProcessStatus::Running);

    kernel.tick();
    assert_eq!(runs.take(), vec![pids[0], pids[3]]);
}

#[test]
fn test_kill_process_started_child_leaves_new_root_alone() {
    let (kernel, runs, _) = standard_bench()
        .image("RES/Parent", |ctx| {
            if ctx.memory().data().is_null() {
                let child = ctx
                    .kernel()
                    .ok_or(KernelError::CapabilityUnavailable(InterfaceId::Kernel))?
                    .start_process(RESIDENT, Value::Null)?;
                ctx.memory_mut().store(&child.pid)?;
            }
            ctx.keep_running();
            Ok(())
        })
        .kernel(KernelConfig::default());
    let mut kernel = kernel;
    let parent = start(&mut kernel, "RES/Parent").unwrap();
    kernel.tick();

    let child: Pid = kernel.get_process_by_id(parent).unwrap().memory.load::<Option<Pid>>().unwrap().unwrap();
    assert_eq!(kernel.get_process_by_id(child).unwrap().parent_id, Some(parent));

    kernel.kill_process(parent);
    let bystander = start(&mut kernel, RESIDENT).unwrap();

    for pid in [parent, child] {
        let record = kernel.get_process_by_id(pid).unwrap();
        assert_eq!(record.status, ProcessStatus::Killed);
        assert_eq!(record.ended_tick, Some(1));
    }
    assert_eq!(kernel.get_process_by_id(bystander).unwrap().status, ProcessStatus::Starting);

    runs.take();
    kernel.tick();
    assert_eq!(runs.take(), vec![bystander]);
}

#[test]
fn test_kill_relabels_finished_descendants() {
    let (mut kernel, _, _) = test_bootstrap(KernelConfig::default());
    let root = start(&mut kernel, RESIDENT).unwrap();
    let once = start(&mut kernel, ONCE).unwrap();
    let failing = start(&mut kernel, FAILING).unwrap();
    assert!(kernel.set_parent(once, Some(root)));
    assert!(kernel.set_parent(failing, Some(once)));

    kernel.tick();
    assert_eq!(kernel.get_process_by_id(once).unwrap().status, ProcessStatus::Done);
    assert_eq!(kernel.get_process_by_id(failing).unwrap().status, ProcessStatus::Error);
    kernel.tick();

    kernel.kill_process(root);
    for pid in [root, once, failing] {
        let record = kernel.get_process_by_id(pid).unwrap();
        assert_eq!(record.status, ProcessStatus::Killed);
        assert_eq!(record.ended_tick, Some(2));
        assert_eq!(record.error, None);
    }
}

#[test]
fn test_killed_sleeper_never_wakes() {
    let (mut kernel, runs, _) = test_bootstrap(KernelConfig::default());
    let root = start(&mut kernel, RESIDENT).unwrap();
    let napper = start_napper(&mut kernel, 3).unwrap();
    assert!(kernel.set_parent(napper, Some(root)));

    kernel.tick();
    assert_eq!(kernel.get_process_by_id(napper).unwrap().status, ProcessStatus::Sleeping);

    kernel.kill_process(root);
    assert!(kernel.sleep_scheduler().is_empty());
    run_ticks(&mut kernel, 10);
    assert_eq!(runs.count(napper), 1);
}

#[test]
fn test_kill_twice_keeps_first_end_tick() {
    let (mut kernel, _, _) = test_bootstrap(KernelConfig::default());
    let pid = start(&mut kernel, RESIDENT).unwrap();

    run_ticks(&mut kernel, 2);
    kernel.kill_process(pid);
    run_ticks(&mut kernel, 2);
    kernel.kill_process(pid);

    let record = kernel.get_process_by_id(pid).unwrap();
    assert_eq!(record.status, ProcessStatus::Killed);
    assert_eq!(record.ended_tick, Some(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Killing any node kills exactly its subtree
    #[test]
    fn kill_takes_exactly_the_subtree(
        parents in forest(),
        target in any::<prop::sample::Index>(),
    ) {
        let (mut kernel, runs, _) = test_bootstrap(KernelConfig::default());
        let pids = build_tree(&mut kernel, &parents).unwrap();
        kernel.tick();
        runs.take();

        let target = target.index(parents.len());
        let doomed = subtree_indices(&parents, target);
        kernel.kill_process(pids[target]);

        for (index, pid) in pids.iter().enumerate() {
            let status = kernel.get_process_by_id(*pid).unwrap().status;
            if doomed.contains(&index) {
                prop_assert_eq!(status, ProcessStatus::Killed);
            } else {
                prop_assert_eq!(status, ProcessStatus::Running);
            }
        }

        kernel.tick();
        let survivors: Vec<_> = pids
            .iter()
            .enumerate()
            .filter(|(index, _)| !doomed.contains(index))
            .map(|(_, pid)| *pid)
            .collect();
        prop_assert_eq!(runs.take(), survivors);
    }
}
