// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for register configuration validation.
//!
//! Everything outside config validation (file I/O, YAML syntax, Modbus bind
//! failures) flows through `anyhow::Result` instead; this enum only covers
//! the well-known validation failure classes from register loading, each
//! mapped to a distinct process exit code.

use thiserror::Error;

/// Validation failure raised while building a [`crate::register::RegisterTable`]
/// from a sequence of register specs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("register '{name}' is missing required field '{field}'")]
    MissingField { name: String, field: &'static str },

    #[error("register '{name}' has invalid scale {scale} (must be > 0)")]
    InvalidScale { name: String, scale: f64 },

    #[error("duplicate register address {address} (registers '{first}' and '{second}')")]
    DuplicateAddress {
        address: u16,
        first: String,
        second: String,
    },

    #[error("duplicate register name '{name}'")]
    DuplicateName { name: String },

    #[error("duplicate variable_name '{variable_name}' (registers '{first}' and '{second}')")]
    DuplicateVariableName {
        variable_name: String,
        first: String,
        second: String,
    },

    #[error("register '{first}' (address {first_addr}..{first_end}) overlaps register '{second}' (address {second_addr}..{second_end})")]
    OverlappingRange {
        first: String,
        first_addr: u16,
        first_end: u16,
        second: String,
        second_addr: u16,
        second_end: u16,
    },

    #[error("writable register '{name}' must specify a non-empty variable_name")]
    MissingVariableName { name: String },

    #[error("register '{name}' has min_value {min} greater than max_value {max}")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("accumulator register '{name}' references unknown source register '{source}'")]
    UnknownAccumulatorSource { name: String, source: String },

    #[error("register '{name}' combines mutually exclusive behaviors: {reason}")]
    ConflictingBehavior { name: String, reason: String },

    #[error("expression of register '{name}' references unresolved identifier '{identifier}'")]
    UnresolvedIdentifier { name: String, identifier: String },

    #[error("expression of register '{name}' failed to parse: {reason}")]
    InvalidExpression { name: String, reason: String },

    #[error("no registers defined in configuration")]
    Empty,
}

impl ConfigError {
    /// Process exit code this error should surface as, mirroring the
    /// one-class-per-code convention used for configuration failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingField { .. } => 1,
            ConfigError::InvalidScale { .. } => 2,
            ConfigError::DuplicateAddress { .. } => 3,
            ConfigError::DuplicateName { .. } => 4,
            ConfigError::DuplicateVariableName { .. } => 5,
            ConfigError::OverlappingRange { .. } => 6,
            ConfigError::MissingVariableName { .. } => 7,
            ConfigError::InvalidRange { .. } => 8,
            ConfigError::UnknownAccumulatorSource { .. } => 9,
            ConfigError::ConflictingBehavior { .. } => 10,
            ConfigError::UnresolvedIdentifier { .. } => 11,
            ConfigError::InvalidExpression { .. } => 12,
            ConfigError::Empty => 13,
        }
    }
}
