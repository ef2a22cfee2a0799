//! # Kernel API
//!
//! This crate defines the interface between processes and the tick kernel.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Process creation by image name (not forking)
//! - A parent/child tree with explicit kill cascades
//! - Sleep and cooperative yield (never preemption)
//! - Asynchronous spawn requests fulfilled by the host
//!
//! ## Design Goals
//!
//! 1. **Testability**: Everything a process touches is reached through
//!    [`ProcessContext`], so processes can be run against any kernel
//! 2. **Explicitness**: The acting process is carried by the context; there
//!    is no "current process" global
//! 3. **Capabilities**: Extensions are looked up from a typed
//!    [`CapabilitySet`]; absence is `None`, never a panic
//! 4. **Persistence**: Every piece of process state is serializable

pub mod capability;
pub mod context;
pub mod coop;
pub mod error;
pub mod kernel;
pub mod message;
pub mod process;
pub mod record;
pub mod spawn;

pub use capability::{CapabilitySet, InterfaceId};
pub use context::{KernelServices, ProcessContext, RunFlags};
pub use coop::{CoopBudget, CooperativeScheduling, CpuMeter, Step, StepProgram, WrapOutcome};
pub use error::KernelError;
pub use kernel::{ProcessKernel, SleepExtension, SpawnExtension, StartedProcess};
pub use message::{Mailbox, MailboxFull, Message};
pub use process::{Process, ProcessConstructor, ProcessFault, ProcessInit};
pub use record::ProcessRecord;
pub use spawn::{SpawnOptions, SpawnStatusReport, PRIORITY_HIGHEST, PRIORITY_LOWEST};
