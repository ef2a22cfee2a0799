//! # Spawn Request Service
//!
//! Asynchronous unit spawning: processes queue requests, the host fulfils
//! them between ticks, and processes poll for the result.
//!
//! ## Philosophy
//!
//! - **Deterministic**: requests are served in (priority, submission) order
//! - **Monotonic**: a request only ever moves forward through
//!   `Queued -> Spawning -> Spawned`, or into `Error`
//! - **Host-driven**: the kernel never spawns anything itself; a
//!   [`SpawnHost`] does, through explicit transitions
//!
//! ## Example
//!
//! ```
//! use kernel_api::SpawnOptions;
//! use services_spawn::{SimSpawnHost, SpawnHost, SpawnQueue};
//! use core_types::SpawnStatus;
//!
//! let mut queue = SpawnQueue::new();
//! let id = queue
//!     .submit(SpawnOptions::new(["W1N1"], [["WORK", "MOVE"]]), 0)
//!     .unwrap();
//!
//! SimSpawnHost::new().fulfil(&mut queue, 1);
//!
//! assert_eq!(queue.status(id).status, SpawnStatus::Spawned);
//! assert!(queue.unit(id).is_some());
//! ```

pub mod host;
pub mod queue;

pub use host::{SimSpawnHost, SpawnHost};
pub use queue::{SpawnQueue, SpawnRequest};

use core_types::{SpawnRequestId, SpawnStatus};
use thiserror::Error;

/// Errors raised by host-side transitions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("No such spawn request: {0}")]
    UnknownRequest(SpawnRequestId),

    #[error("Spawn request {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: SpawnRequestId,
        from: SpawnStatus,
        to: SpawnStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = SpawnRequestId::new();
        let err = SpawnError::InvalidTransition {
            id,
            from: SpawnStatus::Spawned,
            to: SpawnStatus::Queued,
        };
        assert_eq!(
            err.to_string(),
            format!("Spawn request {} cannot move from spawned to queued", id)
        );
    }
}
