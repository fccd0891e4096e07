//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid)
//! - Check topology integrity (unique names, known roles, one primary)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SentinelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::SentinelConfig;
use crate::topology::Tier;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SentinelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let monitor = &config.monitor;
    if monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be greater than 0"));
    }
    if monitor.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("monitor.probe_timeout_ms", "must be greater than 0"));
    } else if monitor.interval_secs > 0 && monitor.probe_timeout_ms >= monitor.interval_secs * 1000 {
        errors.push(ValidationError::new(
            "monitor.probe_timeout_ms",
            "must be shorter than the check interval",
        ));
    }
    if !(monitor.replication_lag_threshold_secs >= 0.0) {
        errors.push(ValidationError::new(
            "monitor.replication_lag_threshold_secs",
            "must be a non-negative number",
        ));
    }

    let failover = &config.failover;
    if failover.wait_timeout_secs == 0 {
        errors.push(ValidationError::new("failover.wait_timeout_secs", "must be greater than 0"));
    }
    if failover.poll_interval_ms == 0 {
        errors.push(ValidationError::new("failover.poll_interval_ms", "must be greater than 0"));
    } else if failover.poll_interval_ms > failover.wait_timeout_secs * 1000 {
        errors.push(ValidationError::new(
            "failover.poll_interval_ms",
            "must not exceed the failover wait timeout",
        ));
    }
    if failover.rejoin_timeout_secs == 0 {
        errors.push(ValidationError::new("failover.rejoin_timeout_secs", "must be greater than 0"));
    }

    let injection = &config.fault_injection;
    if injection.stop_command.is_empty() {
        errors.push(ValidationError::new("fault_injection.stop_command", "must not be empty"));
    }
    if injection.start_command.is_empty() {
        errors.push(ValidationError::new("fault_injection.start_command", "must not be empty"));
    }

    let mut names = HashSet::new();
    let mut primaries = 0;
    for (i, node) in config.nodes.iter().enumerate() {
        let field = format!("nodes[{}]", i);
        if node.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !names.insert(node.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate node name '{}'", node.name),
            ));
        }
        match node.role.parse::<Tier>() {
            Ok(Tier::ServingPrimary) => primaries += 1,
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(format!("{}.role", field), e)),
        }
        if node.host.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.host", field), "must not be empty"));
        }
        if node.port == 0 || node.api_port == Some(0) {
            errors.push(ValidationError::new(format!("{}.port", field), "must be non-zero"));
        }
    }
    if primaries > 1 {
        errors.push(ValidationError::new(
            "nodes",
            format!("{} nodes configured as serving-primary, at most one allowed", primaries),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
