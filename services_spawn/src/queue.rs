//! Spawn request queue

use crate::SpawnError;
use core_types::{Pid, SpawnRequestId, SpawnStatus, Tick, UnitRef};
use kernel_api::{KernelError, SpawnOptions, SpawnStatusReport};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// One outstanding or finished spawn request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub id: SpawnRequestId,
    pub status: SpawnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Process the unit is for
    pub pid: Option<Pid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitRef>,
    pub rooms: Vec<String>,
    pub body: Vec<Vec<String>>,
    /// Clamped priority; lower is served first
    pub priority: i32,
    /// Submission order, unique within a queue
    pub seq: u64,
    pub queued_tick: Tick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_tick: Option<Tick>,
    /// The owning process is gone
    #[serde(default)]
    pub detached: bool,
    /// Some caller has polled the request since it was created
    #[serde(default)]
    observed: Cell<bool>,
}

impl SpawnRequest {
    /// Whether any caller has polled this request
    pub fn observed(&self) -> bool {
        self.observed.get()
    }

    fn report(&self) -> SpawnStatusReport {
        SpawnStatusReport {
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Spawn request queue
///
/// Requests are kept in submission order. Reads through [`SpawnQueue::status`]
/// take `&self` and only flip the request's observation flag, so processes
/// can poll without mutable access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnQueue {
    requests: Vec<SpawnRequest>,
    next_seq: u64,
}

impl SpawnQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and queues a request
    ///
    /// Invalid options create nothing. `opts.pid` is stored as given; the
    /// kernel fills it with the acting process beforehand.
    pub fn submit(&mut self, opts: SpawnOptions, tick: Tick) -> Result<SpawnRequestId, KernelError> {
        opts.validate()?;

        let priority = opts.effective_priority();
        let id = SpawnRequestId::new();
        let seq = self.next_seq;
        self.next_seq += 1;

        log::debug!(
            "queued {} for {:?} (priority {}, rooms {:?})",
            id,
            opts.pid,
            priority,
            opts.rooms
        );

        self.requests.push(SpawnRequest {
            id,
            status: SpawnStatus::Queued,
            message: None,
            pid: opts.pid,
            unit: None,
            rooms: opts.rooms,
            body: opts.body,
            priority,
            seq,
            queued_tick: tick,
            terminal_tick: None,
            detached: false,
            observed: Cell::new(false),
        });
        Ok(id)
    }

    /// Looks up a request without marking it observed
    pub fn get(&self, id: SpawnRequestId) -> Option<&SpawnRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Polls a request
    ///
    /// A poll that reports a final status marks the request observed.
    /// Unknown or collected ids report `Error`.
    pub fn status(&self, id: SpawnRequestId) -> SpawnStatusReport {
        match self.get(id) {
            Some(request) => {
                if request.status.is_terminal() {
                    request.observed.set(true);
                }
                request.report()
            }
            None => SpawnStatusReport::error(format!("no such spawn request: {}", id)),
        }
    }

    /// The spawned unit, once the request is `Spawned`
    pub fn unit(&self, id: SpawnRequestId) -> Option<UnitRef> {
        self.get(id)
            .filter(|r| r.status == SpawnStatus::Spawned)
            .and_then(|r| r.unit.clone())
    }

    /// Marks a queued request as being spawned
    pub fn begin_spawning(&mut self, id: SpawnRequestId) -> Result<(), SpawnError> {
        self.transition(id, SpawnStatus::Spawning, None)?;
        Ok(())
    }

    /// Records the unit produced for a request
    pub fn complete(&mut self, id: SpawnRequestId, unit: UnitRef, tick: Tick) -> Result<(), SpawnError> {
        let request = self.transition(id, SpawnStatus::Spawned, Some(tick))?;
        log::debug!("{} spawned {}", id, unit);
        request.unit = Some(unit);
        Ok(())
    }

    /// Fails a request with a message for the requester
    pub fn fail(
        &mut self,
        id: SpawnRequestId,
        message: impl Into<String>,
        tick: Tick,
    ) -> Result<(), SpawnError> {
        let request = self.transition(id, SpawnStatus::Error, Some(tick))?;
        let message = message.into();
        log::debug!("{} failed: {}", id, message);
        request.message = Some(message);
        Ok(())
    }

    fn transition(
        &mut self,
        id: SpawnRequestId,
        to: SpawnStatus,
        tick: Option<Tick>,
    ) -> Result<&mut SpawnRequest, SpawnError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(SpawnError::UnknownRequest(id))?;

        if !request.status.can_transition_to(to) {
            return Err(SpawnError::InvalidTransition {
                id,
                from: request.status,
                to,
            });
        }

        request.status = to;
        if to.is_terminal() {
            request.terminal_tick = tick;
        }
        Ok(request)
    }

    /// Detaches every outstanding request of `pid`; returns how many
    ///
    /// Detached requests stay queued so the host can still finish or
    /// cancel them.
    pub fn detach_pid(&mut self, pid: Pid) -> usize {
        let mut detached = 0;
        for request in self
            .requests
            .iter_mut()
            .filter(|r| r.pid == Some(pid) && !r.status.is_terminal() && !r.detached)
        {
            request.detached = true;
            detached += 1;
        }
        detached
    }

    /// Non-terminal requests in service order
    pub fn pending(&self) -> Vec<&SpawnRequest> {
        let mut pending: Vec<&SpawnRequest> = self
            .requests
            .iter()
            .filter(|r| !r.status.is_terminal())
            .collect();
        pending.sort_by_key(|r| (r.priority, r.seq));
        pending
    }

    /// Drops terminal requests that were polled and have been final for at
    /// least `retention` ticks; returns how many
    pub fn collect_garbage(&mut self, tick: Tick, retention: u64) -> usize {
        let before = self.requests.len();
        self.requests.retain(|r| {
            let expired = r
                .terminal_tick
                .is_some_and(|ended| tick.saturating_sub(ended) >= retention);
            !(r.status.is_terminal() && r.observed.get() && expired)
        });
        before - self.requests.len()
    }

    /// All requests in submission order
    pub fn iter(&self) -> impl Iterator<Item = &SpawnRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> SpawnOptions {
        SpawnOptions::new(["W1N1"], [["WORK", "CARRY", "MOVE"]])
    }

    #[test]
    fn test_submit_queues_request() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts().with_pid(Pid::FIRST), 3).unwrap();

        let request = queue.get(id).unwrap();
        assert_eq!(request.status, SpawnStatus::Queued);
        assert_eq!(request.pid, Some(Pid::FIRST));
        assert_eq!(request.queued_tick, 3);
        assert!(!request.observed());
    }

    #[test]
    fn test_invalid_options_create_nothing() {
        let mut queue = SpawnQueue::new();
        let result = queue.submit(SpawnOptions::new(["W1N1"], Vec::<Vec<String>>::new()), 0);
        assert!(matches!(result, Err(KernelError::InvalidSpawnRequest(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_priority_is_clamped() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts().with_priority(-5000), 0).unwrap();
        assert_eq!(queue.get(id).unwrap().priority, -1000);
    }

    #[test]
    fn test_only_final_polls_mark_observed() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();

        assert_eq!(queue.status(id).status, SpawnStatus::Queued);
        assert!(!queue.get(id).unwrap().observed());

        queue.begin_spawning(id).unwrap();
        assert_eq!(queue.status(id).status, SpawnStatus::Spawning);
        assert!(!queue.get(id).unwrap().observed());

        queue.complete(id, UnitRef::new("creep-1"), 3).unwrap();
        assert_eq!(queue.status(id).status, SpawnStatus::Spawned);
        assert!(queue.get(id).unwrap().observed());
    }

    #[test]
    fn test_early_poll_does_not_expose_request_to_gc() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();
        assert_eq!(queue.status(id).status, SpawnStatus::Queued);

        queue.begin_spawning(id).unwrap();
        queue.complete(id, UnitRef::new("creep-1"), 1).unwrap();
        assert_eq!(queue.collect_garbage(50, 10), 0);

        assert_eq!(queue.status(id).status, SpawnStatus::Spawned);
        assert_eq!(queue.unit(id), Some(UnitRef::new("creep-1")));
        assert_eq!(queue.collect_garbage(50, 10), 1);
    }

    #[test]
    fn test_unknown_request_reports_error() {
        let queue = SpawnQueue::new();
        let report = queue.status(SpawnRequestId::new());
        assert_eq!(report.status, SpawnStatus::Error);
        assert!(report.message.unwrap().contains("no such spawn request"));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();

        queue.begin_spawning(id).unwrap();
        assert_eq!(queue.status(id).status, SpawnStatus::Spawning);
        assert_eq!(queue.unit(id), None);

        queue.complete(id, UnitRef::new("creep-1"), 2).unwrap();
        assert_eq!(queue.status(id).status, SpawnStatus::Spawned);
        assert_eq!(queue.unit(id), Some(UnitRef::new("creep-1")));
        assert_eq!(queue.get(id).unwrap().terminal_tick, Some(2));
    }

    #[test]
    fn test_transitions_never_regress() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();

        let skip = queue.complete(id, UnitRef::new("creep-1"), 1);
        assert_eq!(
            skip,
            Err(SpawnError::InvalidTransition {
                id,
                from: SpawnStatus::Queued,
                to: SpawnStatus::Spawned,
            })
        );

        queue.fail(id, "no energy", 1).unwrap();
        assert!(queue.begin_spawning(id).is_err());
        assert!(queue.fail(id, "again", 2).is_err());

        let report = queue.status(id);
        assert_eq!(report.status, SpawnStatus::Error);
        assert_eq!(report.message.as_deref(), Some("no energy"));
    }

    #[test]
    fn test_transition_unknown_request() {
        let mut queue = SpawnQueue::new();
        let id = SpawnRequestId::new();
        assert_eq!(queue.begin_spawning(id), Err(SpawnError::UnknownRequest(id)));
    }

    #[test]
    fn test_pending_order() {
        let mut queue = SpawnQueue::new();
        let low = queue.submit(opts().with_priority(10), 0).unwrap();
        let first_default = queue.submit(opts(), 0).unwrap();
        let high = queue.submit(opts().with_priority(-10), 0).unwrap();
        let second_default = queue.submit(opts(), 0).unwrap();
        let done = queue.submit(opts().with_priority(-999), 0).unwrap();
        queue.fail(done, "cancelled", 0).unwrap();

        let order: Vec<_> = queue.pending().iter().map(|r| r.id).collect();
        assert_eq!(order, vec![high, first_default, second_default, low]);
    }

    #[test]
    fn test_detach_pid() {
        let mut queue = SpawnQueue::new();
        let a = queue.submit(opts().with_pid(Pid::from_raw(1)), 0).unwrap();
        let b = queue.submit(opts().with_pid(Pid::from_raw(2)), 0).unwrap();
        let finished = queue.submit(opts().with_pid(Pid::from_raw(1)), 0).unwrap();
        queue.fail(finished, "x", 0).unwrap();

        assert_eq!(queue.detach_pid(Pid::from_raw(1)), 1);
        assert_eq!(queue.detach_pid(Pid::from_raw(1)), 0);

        assert!(queue.get(a).unwrap().detached);
        assert!(!queue.get(b).unwrap().detached);
        assert!(!queue.get(finished).unwrap().detached);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_gc_requires_observation_and_retention() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();
        queue.begin_spawning(id).unwrap();
        queue.complete(id, UnitRef::new("creep-1"), 5).unwrap();

        // Never polled
        assert_eq!(queue.collect_garbage(100, 10), 0);

        queue.status(id);
        assert_eq!(queue.collect_garbage(14, 10), 0);
        assert_eq!(queue.collect_garbage(15, 10), 1);
        assert_eq!(queue.status(id).status, SpawnStatus::Error);
    }

    #[test]
    fn test_gc_keeps_outstanding_requests() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts(), 0).unwrap();
        queue.status(id);
        assert_eq!(queue.collect_garbage(1000, 0), 0);
    }

    #[test]
    fn test_queue_serialization() {
        let mut queue = SpawnQueue::new();
        let id = queue.submit(opts().with_pid(Pid::FIRST), 1).unwrap();
        queue.fail(id, "no energy", 1).unwrap();
        queue.status(id);

        let json = serde_json::to_string(&queue).unwrap();
        let restored: SpawnQueue = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, queue);
        assert!(restored.get(id).unwrap().observed());

        let mut restored = restored;
        let next = restored.submit(opts(), 2).unwrap();
        assert_eq!(restored.get(next).unwrap().seq, 1);
    }
}
