//! # Process Memory
//!
//! Each process owns a private JSON blob that the kernel persists between
//! ticks but never interprets. A second, kernel-managed slot holds the
//! resume state of step-wrapped processes so that a suspended computation
//! can pick up where it left off after the host rebuilds the kernel.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Process-private persisted state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMemory {
    /// Process-owned data
    #[serde(default)]
    data: Value,
    /// Resume state of an interrupted step sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume: Option<Value>,
}

impl ProcessMemory {
    /// Creates memory holding the given start context
    pub fn new(data: Value) -> Self {
        Self { data, resume: None }
    }

    /// Returns the raw process data
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Mutable access to the raw process data
    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    /// Decodes the process data, falling back to `T::default()` for empty
    /// memory.
    pub fn load<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned + Default,
    {
        if self.data.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.data.clone())
    }

    /// Encodes `value` as the new process data
    pub fn store<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.data = serde_json::to_value(value)?;
        Ok(())
    }

    /// Returns the stored resume state, if a step sequence was interrupted
    pub fn resume_state(&self) -> Option<&Value> {
        self.resume.as_ref()
    }

    /// Replaces the resume state
    pub fn set_resume_state(&mut self, state: Option<Value>) {
        self.resume = state;
    }

    /// Removes and returns the resume state
    pub fn take_resume_state(&mut self) -> Option<Value> {
        self.resume.take()
    }
}
