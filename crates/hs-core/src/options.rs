//! VM configuration
//!
//! Options can be built in code with the `with_*` constructors or loaded from
//! a TOML document:
//!
//! ```toml
//! trace_instructions = false
//! scratch_initial_capacity = 4
//!
//! [limits]
//! max_call_depth = 256
//! max_steps = 1000000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Resource limits for a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of nested frames
    pub max_call_depth: usize,

    /// Maximum value stack depth per frame
    pub max_stack_depth: usize,

    /// Maximum scratch heap slots per frame
    pub max_scratch_slots: usize,

    /// Maximum array length for `ARRAY_NEW*`
    pub max_array_len: usize,

    /// Maximum live heap objects (None = unlimited)
    pub max_heap_objects: Option<usize>,

    /// Maximum instructions per run (None = unlimited)
    pub max_steps: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_stack_depth: 1024,
            max_scratch_slots: 1 << 16,
            max_array_len: 1 << 20,
            max_heap_objects: None,
            max_steps: None,
        }
    }
}

impl ResourceLimits {
    /// Create limits with a specific call depth
    pub fn with_call_depth(max_call_depth: usize) -> Self {
        Self {
            max_call_depth,
            ..Default::default()
        }
    }

    /// Create limits with a heap object cap
    pub fn with_heap_limit(max_heap_objects: usize) -> Self {
        Self {
            max_heap_objects: Some(max_heap_objects),
            ..Default::default()
        }
    }

    /// Create limits with an instruction budget
    pub fn with_step_budget(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
            ..Default::default()
        }
    }
}

/// Options for a [`Vm`](crate::Vm)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Resource limits
    pub limits: ResourceLimits,

    /// Emit a `trace!` event for every dispatched instruction
    pub trace_instructions: bool,

    /// Initial scratch heap slots per frame
    pub scratch_initial_capacity: usize,

    /// Give up on a contended `LOCK` after this many milliseconds
    pub lock_timeout_ms: Option<u64>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            trace_instructions: false,
            scratch_initial_capacity: 4,
            lock_timeout_ms: None,
        }
    }
}

impl VmOptions {
    /// Replace the resource limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Toggle per-instruction tracing
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.trace_instructions = enabled;
        self
    }

    /// Set the lock acquisition timeout
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// Lock acquisition timeout, if any
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Parse options from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: VmOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_call_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.scratch_initial_capacity > self.limits.max_scratch_slots {
            return Err(ConfigError::ValidationError(format!(
                "scratch_initial_capacity {} exceeds max_scratch_slots {}",
                self.scratch_initial_capacity, self.limits.max_scratch_slots
            )));
        }
        Ok(())
    }
}
