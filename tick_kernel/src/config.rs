//! Kernel configuration

use kernel_api::KernelError;
use serde::{Deserialize, Serialize};
use services_logger::LogLevel;

/// Kernel configuration
///
/// Every field has a default, so a host only spells out what it changes:
///
/// ```
/// use tick_kernel::KernelConfig;
///
/// let config = KernelConfig::from_json(r#"{ "default_budget": 2.5 }"#).unwrap();
/// assert_eq!(config.default_budget, 2.5);
/// assert_eq!(config.mailbox_capacity, KernelConfig::default().mailbox_capacity);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// CPU a process may use per run before a wrapped program is suspended
    pub default_budget: f64,
    /// CPU available to all processes together in one tick
    pub tick_cpu_limit: Option<f64>,
    /// Maximum steps a wrapped program runs per tick, guards against
    /// programs on a meter that never advances
    pub max_steps_per_run: Option<u64>,
    /// Ticks a terminal record stays queryable
    pub terminal_retention_ticks: u64,
    /// Ticks an observed, terminal spawn request is kept
    pub spawn_retention_ticks: u64,
    pub mailbox_capacity: usize,
    pub log_level: LogLevel,
    pub log_buffer_capacity: usize,
    /// Scheduling events kept for inspection
    pub audit_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_budget: 10.0,
            tick_cpu_limit: None,
            max_steps_per_run: Some(10_000),
            terminal_retention_ticks: 100,
            spawn_retention_ticks: 10,
            mailbox_capacity: 16,
            log_level: LogLevel::Info,
            log_buffer_capacity: 256,
            audit_capacity: 1024,
        }
    }
}

impl KernelConfig {
    /// Parses a configuration, filling unspecified fields with defaults
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the kernel cannot work with
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.default_budget.is_finite() || self.default_budget < 0.0 {
            return Err(KernelError::Persistence(format!(
                "default_budget must be a non-negative number, got {}",
                self.default_budget
            )));
        }
        if let Some(limit) = self.tick_cpu_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(KernelError::Persistence(format!(
                    "tick_cpu_limit must be a non-negative number, got {}",
                    limit
                )));
            }
        }
        if self.mailbox_capacity == 0 {
            return Err(KernelError::Persistence(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
