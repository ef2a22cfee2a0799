//! Host-side spawn fulfilment

use crate::SpawnQueue;
use core_types::{SpawnStatus, Tick, UnitRef};
use std::collections::BTreeSet;

/// Fulfils queued spawn requests
///
/// The kernel calls `fulfil` once at the end of every tick, after all
/// processes ran. Implementations drive requests through the queue's
/// transitions; anything they leave pending is offered again next tick.
pub trait SpawnHost {
    fn fulfil(&mut self, queue: &mut SpawnQueue, tick: Tick);
}

/// Deterministic in-memory spawn host for tests and simulation
///
/// Requests are served in queue order. Each one is marked `Spawning` and,
/// unless two-phase mode is on, completed in the same call with a unit named
/// `<prefix><n>`. Detached requests and requests whose first room is marked
/// unavailable are failed.
#[derive(Debug, Clone)]
pub struct SimSpawnHost {
    unit_prefix: String,
    next_unit: u64,
    unavailable_rooms: BTreeSet<String>,
    per_tick: Option<usize>,
    two_phase: bool,
}

impl SimSpawnHost {
    pub fn new() -> Self {
        Self {
            unit_prefix: "unit-".to_string(),
            next_unit: 1,
            unavailable_rooms: BTreeSet::new(),
            per_tick: None,
            two_phase: false,
        }
    }

    /// Sets the prefix of generated unit names
    pub fn with_unit_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unit_prefix = prefix.into();
        self
    }

    /// Limits how many requests are handled per tick
    pub fn with_capacity(mut self, per_tick: usize) -> Self {
        self.per_tick = Some(per_tick);
        self
    }

    /// Completes requests one tick after they start spawning
    pub fn two_phase(mut self) -> Self {
        self.two_phase = true;
        self
    }

    /// Fails every request whose first room is `room`
    pub fn mark_unavailable(&mut self, room: impl Into<String>) {
        self.unavailable_rooms.insert(room.into());
    }

    fn next_unit(&mut self) -> UnitRef {
        let unit = UnitRef::new(format!("{}{}", self.unit_prefix, self.next_unit));
        self.next_unit += 1;
        unit
    }
}

impl Default for SimSpawnHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SpawnHost for SimSpawnHost {
    fn fulfil(&mut self, queue: &mut SpawnQueue, tick: Tick) {
        let limit = self.per_tick.unwrap_or(usize::MAX);
        let work: Vec<_> = queue
            .pending()
            .into_iter()
            .take(limit)
            .map(|r| (r.id, r.status, r.detached, r.rooms.first().cloned()))
            .collect();

        for (id, status, detached, room) in work {
            let outcome = if detached {
                queue.fail(id, "owning process terminated", tick)
            } else if let Some(room) = room.filter(|r| self.unavailable_rooms.contains(r)) {
                queue.fail(id, format!("no spawner available in {}", room), tick)
            } else if status == SpawnStatus::Queued && self.two_phase {
                queue.begin_spawning(id)
            } else {
                let unit = self.next_unit();
                let started = if status == SpawnStatus::Queued {
                    queue.begin_spawning(id)
                } else {
                    Ok(())
                };
                started.and_then(|_| queue.complete(id, unit, tick))
            };

            if let Err(err) = outcome {
                log::warn!("sim spawn host: {}", err);
            }
        }
    }
}
