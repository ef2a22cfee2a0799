//! Kernel error types

use crate::InterfaceId;
use core_types::Pid;
use thiserror::Error;

/// Errors that can occur when interacting with the kernel
///
/// `ProcessFault` is only ever produced by the kernel while recording a
/// faulted process; every other variant is returned synchronously to the
/// caller and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// No constructor is registered for the image name
    #[error("Unknown image: {0}")]
    UnknownImage(String),

    /// Spawn request rejected before it was queued
    #[error("Invalid spawn request: {0}")]
    InvalidSpawnRequest(String),

    /// Reparenting would make a process its own ancestor
    #[error("Setting parent of {pid} to {parent} would create a cycle")]
    CycleDetected { pid: Pid, parent: Pid },

    /// Operation referenced a process that does not exist
    #[error("Unknown process: {0}")]
    UnknownPid(Pid),

    /// The PID counter cannot advance any further
    #[error("PID space exhausted")]
    PidSpaceExhausted,

    /// Host-side call needed an explicit PID
    #[error("No acting process; a pid is required")]
    NoActingProcess,

    /// Fault escaped a process's run
    #[error("Process {pid} faulted: {message}")]
    ProcessFault { pid: Pid, message: String },

    /// Target mailbox has no room left
    #[error("Mailbox of {0} is full")]
    MailboxFull(Pid),

    /// Requested interface is not granted to the caller
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(InterfaceId),

    /// Snapshot or configuration could not be encoded or decoded
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = KernelError::CycleDetected {
            pid: Pid::from_raw(1),
            parent: Pid::from_raw(3),
        };
        assert_eq!(
            err.to_string(),
            "Setting parent of pid:1 to pid:3 would create a cycle"
        );

        let err = KernelError::UnknownImage("ANI/Missing".to_string());
        assert!(err.to_string().contains("ANI/Missing"));
    }

    #[test]
    fn test_serde_error_becomes_persistence() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: KernelError = json_err.into();
        assert!(matches!(err, KernelError::Persistence(_)));
    }
}
