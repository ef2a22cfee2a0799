//! # Core Types
//!
//! This crate defines the fundamental types shared by the Wombat kernel and
//! the processes it runs.
//!
//! ## Philosophy
//!
//! Core types are designed with these principles:
//! - **Identity is stable**: A PID names exactly one process, forever.
//! - **State is data**: Everything a process or request is can be
//!   serialized and restored on the next tick.
//! - **Status is explicit**: Lifecycle transitions are typed enums, never
//!   magic numbers.
//!
//! ## Key Types
//!
//! - [`Pid`]: Process identifier, allocated in creation order
//! - [`SpawnRequestId`]: Identifier of an asynchronous spawn request
//! - [`UnitRef`]: Handle to a unit produced by a fulfilled spawn request
//! - [`ProcessStatus`] / [`SpawnStatus`]: Lifecycle states
//! - [`ProcessMemory`]: Process-private persisted state blob

pub mod ids;
pub mod memory;
pub mod status;

pub use ids::{Pid, SpawnRequestId, UnitRef};
pub use memory::ProcessMemory;
pub use status::{ProcessStatus, SpawnStatus};

/// Discrete unit of kernel time; one host invocation.
pub type Tick = u64;
