//! The process trait and its construction inputs

use crate::{KernelError, ProcessContext};
use core_types::Pid;
use thiserror::Error;

/// A fault raised from inside a process's `run`
///
/// The kernel converts it into the `Error` status of that process alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessFault {
    message: String,
}

impl ProcessFault {
    /// Creates a fault with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The fault message recorded on the process
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<KernelError> for ProcessFault {
    fn from(err: KernelError) -> Self {
        ProcessFault::new(err.to_string())
    }
}

impl From<serde_json::Error> for ProcessFault {
    fn from(err: serde_json::Error) -> Self {
        ProcessFault::new(format!("memory error: {}", err))
    }
}

/// Identity a process instance is constructed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInit {
    pub pid: Pid,
    pub parent_id: Option<Pid>,
    pub image_name: String,
}

/// A user-defined process
///
/// Instances may be rebuilt from the registry at any tick (for example
/// after the host restored the kernel from a snapshot), so anything that
/// must survive belongs in the context's memory, not in `self`.
pub trait Process {
    /// Runs the process for one tick
    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessFault>;
}

/// Builds a process instance for a given identity
pub type ProcessConstructor = Box<dyn Fn(&ProcessInit) -> Box<dyn Process>>;
