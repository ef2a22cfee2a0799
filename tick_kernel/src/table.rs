//! Process table
//!
//! Records are kept in an arena keyed by PID. Each record stores its
//! parent; the table maintains the reverse (parent -> children) index
//! incrementally so kill cascades never scan the whole table.

use core_types::{Pid, Tick};
use kernel_api::{KernelError, ProcessRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Process table and PID allocator
#[derive(Debug, Clone)]
pub struct ProcessTable {
    records: BTreeMap<Pid, ProcessRecord>,
    children: BTreeMap<Pid, BTreeSet<Pid>>,
    next_pid: Pid,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            children: BTreeMap::new(),
            next_pid: Pid::FIRST,
        }
    }

    /// Rebuilds a table from persisted records
    ///
    /// Fails if a record points at a parent that is not in the table, or
    /// if `next_pid` would hand out a PID that is already taken.
    pub fn from_records(
        records: impl IntoIterator<Item = ProcessRecord>,
        next_pid: Pid,
    ) -> Result<Self, KernelError> {
        let mut table = Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
            children: BTreeMap::new(),
            next_pid,
        };

        if let Some((&highest, _)) = table.records.last_key_value() {
            if highest >= next_pid {
                return Err(KernelError::Persistence(format!(
                    "next pid {} is not above existing {}",
                    next_pid, highest
                )));
            }
        }

        let links: Vec<(Pid, Pid)> = table
            .records
            .values()
            .filter_map(|r| r.parent_id.map(|parent| (r.id, parent)))
            .collect();
        for (pid, parent) in links {
            if !table.records.contains_key(&parent) {
                return Err(KernelError::Persistence(format!(
                    "{} references missing parent {}",
                    pid, parent
                )));
            }
            table.children.entry(parent).or_default().insert(pid);
        }

        for &pid in table.records.keys() {
            if table.has_cycle_from(pid) {
                return Err(KernelError::Persistence(format!(
                    "parent chain of {} contains a cycle",
                    pid
                )));
            }
        }

        Ok(table)
    }

    /// The PID the next `allocate_pid` call returns
    pub fn peek_next_pid(&self) -> Pid {
        self.next_pid
    }

    /// Hands out the next PID; PIDs are never reused
    pub fn allocate_pid(&mut self) -> Result<Pid, KernelError> {
        let pid = self.next_pid;
        self.next_pid = pid.next().ok_or(KernelError::PidSpaceExhausted)?;
        Ok(pid)
    }

    /// Inserts a new record and links it under its parent
    pub fn insert(&mut self, record: ProcessRecord) {
        if let Some(parent) = record.parent_id {
            self.children.entry(parent).or_default().insert(record.id);
        }
        self.records.insert(record.id, record);
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.records.get_mut(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.records.contains_key(&pid)
    }

    /// Direct children of `pid`, in PID order
    pub fn children(&self, pid: Pid) -> impl Iterator<Item = Pid> + '_ {
        self.children.get(&pid).into_iter().flatten().copied()
    }

    /// `pid` followed by all of its descendants, depth-first
    pub fn subtree(&self, pid: Pid) -> Vec<Pid> {
        let mut order = Vec::new();
        if !self.contains(pid) {
            return order;
        }

        let mut stack = vec![pid];
        while let Some(current) = stack.pop() {
            order.push(current);
            // Reverse so the lowest PID is visited first
            let mut kids: Vec<Pid> = self.children(current).collect();
            kids.reverse();
            stack.extend(kids);
        }
        order
    }

    /// Reparents `pid`; `None` makes it a root
    pub fn set_parent(&mut self, pid: Pid, parent: Option<Pid>) -> Result<(), KernelError> {
        let current = self
            .records
            .get(&pid)
            .ok_or(KernelError::UnknownPid(pid))?
            .parent_id;

        if let Some(new_parent) = parent {
            if !self.contains(new_parent) {
                return Err(KernelError::UnknownPid(new_parent));
            }
            if self.is_ancestor_or_self(pid, new_parent) {
                return Err(KernelError::CycleDetected {
                    pid,
                    parent: new_parent,
                });
            }
        }

        if let Some(old_parent) = current {
            self.unlink(old_parent, pid);
        }
        if let Some(new_parent) = parent {
            self.children.entry(new_parent).or_default().insert(pid);
        }
        if let Some(record) = self.records.get_mut(&pid) {
            record.parent_id = parent;
        }
        Ok(())
    }

    /// Checks whether `ancestor` is `pid` itself or on its parent chain
    pub fn is_ancestor_or_self(&self, ancestor: Pid, pid: Pid) -> bool {
        let mut current = Some(pid);
        let mut hops = 0;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.records.len() {
                return false;
            }
            current = self.records.get(&p).and_then(|r| r.parent_id);
        }
        false
    }

    fn has_cycle_from(&self, pid: Pid) -> bool {
        let mut current = self.records.get(&pid).and_then(|r| r.parent_id);
        let mut hops = 0;
        while let Some(p) = current {
            if p == pid || hops > self.records.len() {
                return true;
            }
            hops += 1;
            current = self.records.get(&p).and_then(|r| r.parent_id);
        }
        false
    }

    fn unlink(&mut self, parent: Pid, child: Pid) {
        if let Some(kids) = self.children.get_mut(&parent) {
            kids.remove(&child);
            if kids.is_empty() {
                self.children.remove(&parent);
            }
        }
    }

    /// PIDs with status `Starting` or `Running`, in PID order
    pub fn runnable(&self) -> Vec<Pid> {
        self.records
            .values()
            .filter(|r| r.status.is_runnable())
            .map(|r| r.id)
            .collect()
    }

    /// Removes terminal records that ended at least `retention` ticks ago
    /// and have no children left; returns their PIDs in ascending order
    ///
    /// A terminal parent is kept as long as any child still points at it,
    /// so parent links never dangle.
    pub fn collect_garbage(&mut self, tick: Tick, retention: u64) -> Vec<Pid> {
        let mut collected = Vec::new();
        loop {
            let expired: Vec<Pid> = self
                .records
                .values()
                .filter(|r| r.status.is_terminal())
                .filter(|r| {
                    r.ended_tick
                        .is_some_and(|ended| tick.saturating_sub(ended) >= retention)
                })
                .filter(|r| !self.children.contains_key(&r.id))
                .map(|r| r.id)
                .collect();
            if expired.is_empty() {
                break;
            }

            for pid in expired {
                if let Some(record) = self.records.remove(&pid) {
                    if let Some(parent) = record.parent_id {
                        self.unlink(parent, pid);
                    }
                    collected.push(pid);
                }
            }
        }
        collected.sort();
        collected
    }

    /// All records in PID order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Formats the table for display, one process per line
    pub fn format_table(&self) -> String {
        let mut output = String::new();
        output.push_str("PID        PARENT     IMAGE                    STATUS\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for record in self.iter() {
            output.push_str(&format!("{}\n", record));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ProcessMemory, ProcessStatus};

    fn pid(raw: u64) -> Pid {
        Pid::from_raw(raw)
    }

    fn spawn(table: &mut ProcessTable, parent: Option<Pid>) -> Pid {
        let id = table.allocate_pid().unwrap();
        table.insert(ProcessRecord::new(
            id,
            parent,
            "TST/Node".to_string(),
            0,
            ProcessMemory::default(),
            4,
        ));
        id
    }

    /// 1 -> {2 -> {4}, 3}
    fn tree() -> ProcessTable {
        let mut table = ProcessTable::new();
        let root = spawn(&mut table, None);
        let a = spawn(&mut table, Some(root));
        let _b = spawn(&mut table, Some(root));
        spawn(&mut table, Some(a));
        table
    }

    #[test]
    fn test_pid_allocation_is_monotonic() {
        let mut table = ProcessTable::new();
        assert_eq!(table.allocate_pid(), Ok(pid(1)));
        assert_eq!(table.allocate_pid(), Ok(pid(2)));
        assert_eq!(table.peek_next_pid(), pid(3));
    }

    #[test]
    fn test_exhausted_counter_is_an_error() {
        let mut table = ProcessTable::from_records(Vec::new(), pid(u64::MAX)).unwrap();
        assert_eq!(table.allocate_pid(), Err(KernelError::PidSpaceExhausted));
        assert_eq!(table.peek_next_pid(), pid(u64::MAX));
    }

    #[test]
    fn test_subtree_depth_first() {
        let table = tree();
        assert_eq!(table.subtree(pid(1)), vec![pid(1), pid(2), pid(4), pid(3)]);
        assert_eq!(table.subtree(pid(3)), vec![pid(3)]);
        assert!(table.subtree(pid(99)).is_empty());
    }

    #[test]
    fn test_set_parent_updates_index() {
        let mut table = tree();
        table.set_parent(pid(4), Some(pid(3))).unwrap();

        assert_eq!(table.get(pid(4)).unwrap().parent_id, Some(pid(3)));
        assert_eq!(table.children(pid(2)).count(), 0);
        assert_eq!(table.children(pid(3)).collect::<Vec<_>>(), vec![pid(4)]);

        table.set_parent(pid(4), None).unwrap();
        assert!(table.get(pid(4)).unwrap().is_root());
        assert_eq!(table.children(pid(3)).count(), 0);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut table = tree();

        assert_eq!(
            table.set_parent(pid(1), Some(pid(4))),
            Err(KernelError::CycleDetected {
                pid: pid(1),
                parent: pid(4)
            })
        );
        assert_eq!(
            table.set_parent(pid(2), Some(pid(2))),
            Err(KernelError::CycleDetected {
                pid: pid(2),
                parent: pid(2)
            })
        );
        // Nothing changed
        assert_eq!(table.subtree(pid(1)), vec![pid(1), pid(2), pid(4), pid(3)]);
    }

    #[test]
    fn test_set_parent_unknown_pids() {
        let mut table = tree();
        assert_eq!(
            table.set_parent(pid(9), None),
            Err(KernelError::UnknownPid(pid(9)))
        );
        assert_eq!(
            table.set_parent(pid(2), Some(pid(9))),
            Err(KernelError::UnknownPid(pid(9)))
        );
    }

    #[test]
    fn test_runnable_excludes_sleeping_and_terminal() {
        let mut table = tree();
        table.get_mut(pid(2)).unwrap().status = ProcessStatus::Sleeping;
        table
            .get_mut(pid(3))
            .unwrap()
            .terminate(ProcessStatus::Done, 1, None);
        table.get_mut(pid(4)).unwrap().status = ProcessStatus::Running;

        assert_eq!(table.runnable(), vec![pid(1), pid(4)]);
    }

    #[test]
    fn test_gc_waits_for_retention_and_children() {
        let mut table = tree();
        for raw in 1..=4 {
            table
                .get_mut(pid(raw))
                .unwrap()
                .terminate(ProcessStatus::Killed, 10, None);
        }
        table.get_mut(pid(4)).unwrap().status = ProcessStatus::Running;
        table.get_mut(pid(4)).unwrap().ended_tick = None;

        assert!(table.collect_garbage(12, 5).is_empty());

        // 3 has no children; 2 still has a live child, which pins 1 as well
        assert_eq!(table.collect_garbage(15, 5), vec![pid(3)]);
        assert!(table.contains(pid(1)));
        assert!(table.contains(pid(2)));

        table
            .get_mut(pid(4))
            .unwrap()
            .terminate(ProcessStatus::Done, 15, None);
        assert_eq!(table.collect_garbage(20, 5), vec![pid(1), pid(2), pid(4)]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_records_rebuilds_index() {
        let table = tree();
        let records: Vec<ProcessRecord> = table.iter().cloned().collect();
        let restored = ProcessTable::from_records(records, table.peek_next_pid()).unwrap();

        assert_eq!(restored.subtree(pid(1)), table.subtree(pid(1)));
        assert_eq!(restored.peek_next_pid(), pid(5));
    }

    #[test]
    fn test_from_records_rejects_missing_parent() {
        let table = tree();
        let records: Vec<ProcessRecord> = table.iter().filter(|r| r.id != pid(2)).cloned().collect();
        let result = ProcessTable::from_records(records, pid(5));
        assert!(matches!(result, Err(KernelError::Persistence(_))));
    }

    #[test]
    fn test_from_records_rejects_reused_pid_counter() {
        let table = tree();
        let records: Vec<ProcessRecord> = table.iter().cloned().collect();
        let result = ProcessTable::from_records(records, pid(3));
        assert!(matches!(result, Err(KernelError::Persistence(_))));
    }

    #[test]
    fn test_format_table() {
        let mut table = tree();
        table
            .get_mut(pid(3))
            .unwrap()
            .terminate(ProcessStatus::Error, 2, Some("boom".to_string()));

        let output = table.format_table();
        assert!(output.starts_with("PID"));
        assert_eq!(output.lines().count(), 6);
        assert!(output.contains("boom"));
    }
}
