//! Unique identifiers for kernel entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a process
///
/// PIDs come from a monotonically increasing counter that is persisted
/// together with the process table. They are never reused, and their
/// ordering is the order in which processes were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(u64);

impl Pid {
    /// The first PID handed out by a fresh kernel
    pub const FIRST: Pid = Pid(1);

    /// Creates a PID from its raw counter value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the PID allocated after this one, or `None` once the
    /// counter is exhausted
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

/// Unique identifier for a spawn request
///
/// Request IDs are opaque strings to callers; internally they are UUIDs so
/// that requests created by independent kernel instances never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpawnRequestId(Uuid);

impl SpawnRequestId {
    /// Creates a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a request ID from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SpawnRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpawnRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn:{}", self.0)
    }
}

impl FromStr for SpawnRequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("spawn:").unwrap_or(s);
        Uuid::parse_str(raw).map(Self)
    }
}

/// Reference to a unit produced by a fulfilled spawn request
///
/// The kernel never interprets this value; it is whatever the host uses to
/// find the unit again (typically its name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitRef(String);

impl UnitRef {
    /// Creates a unit reference
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the reference as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
