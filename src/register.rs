// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register configuration and validation.
//!
//! [`RegisterSpec`] is the raw, deserialized shape a config file supplies.
//! [`RegisterTable::load`] validates a sequence of specs into an immutable
//! [`Register`] list plus address/name indexes, per the invariants in the
//! data model: unique addresses, unique names, unique `variable_name`s,
//! non-overlapping word ranges, resolvable accumulator sources, and
//! resolvable expression identifiers.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::codec::RegisterType;
use crate::error::ConfigError;
use crate::expr::{CompiledExpression, RESERVED_NAMES};

/// The minimum register bank length (in words), regardless of the highest
/// declared address, so generic Modbus client tools have something to poll.
pub const MIN_BANK_LENGTH: usize = 10;

/// Raw register configuration as deserialized from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSpec {
    pub address: u16,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub reg_type: RegisterType,
    pub scale: f64,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub fluctuation: Option<f64>,
    #[serde(default)]
    pub accumulate: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

/// A register's primary dynamic behavior. At most one of these applies; an
/// `expression` may additionally decorate any `None`/accumulate/randomize
/// register (it runs last, in the derive phase, and overrides whatever
/// randomize/accumulate computed).
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Static base value, unless overridden by a layered expression.
    Static,
    Randomize { fluctuation: f64 },
    Accumulate { source: String },
    Writable {
        variable_name: String,
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
}

/// A fully validated, immutable register description.
#[derive(Debug, Clone)]
pub struct Register {
    pub address: u16,
    pub name: String,
    pub description: String,
    pub reg_type: RegisterType,
    pub scale: f64,
    pub base_value: f64,
    pub behavior: Behavior,
    pub expression: Option<CompiledExpression>,
}

impl Register {
    pub fn word_count(&self) -> u16 {
        self.reg_type.word_count()
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.behavior, Behavior::Writable { .. })
    }
}

/// The validated, process-scoped register model: an ordered list of
/// registers plus indexes by address and by name.
pub struct RegisterTable {
    registers: Vec<Register>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u16, usize>,
    max_word_address: u16,
}

impl RegisterTable {
    /// Validate and index a sequence of raw specs. Global variables (one per
    /// writable register, seeded from `base_value`) are returned alongside
    /// so the caller can construct the process-wide [`crate::globals::GlobalVariables`]
    /// exactly once, per the load-time-only initialization decision.
    pub fn load(specs: Vec<RegisterSpec>) -> Result<(Self, HashMap<String, f64>), ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut by_address_spec: HashMap<u16, &RegisterSpec> = HashMap::new();
        let mut by_name_spec: HashMap<String, &RegisterSpec> = HashMap::new();
        let mut variable_names: HashMap<String, &RegisterSpec> = HashMap::new();
        let mut globals = HashMap::new();

        for spec in &specs {
            if spec.name.is_empty() {
                return Err(ConfigError::MissingField {
                    name: format!("<address {}>", spec.address),
                    field: "name",
                });
            }
            if spec.scale <= 0.0 {
                return Err(ConfigError::InvalidScale {
                    name: spec.name.clone(),
                    scale: spec.scale,
                });
            }
            if let Some(existing) = by_address_spec.insert(spec.address, spec) {
                return Err(ConfigError::DuplicateAddress {
                    address: spec.address,
                    first: existing.name.clone(),
                    second: spec.name.clone(),
                });
            }
            if let Some(existing) = by_name_spec.insert(spec.name.clone(), spec) {
                return Err(ConfigError::DuplicateName {
                    name: existing.name.clone(),
                });
            }

            if spec.writable {
                let variable_name = spec
                    .variable_name
                    .clone()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| ConfigError::MissingVariableName {
                        name: spec.name.clone(),
                    })?;
                if let (Some(min), Some(max)) = (spec.min_value, spec.max_value) {
                    if min > max {
                        return Err(ConfigError::InvalidRange {
                            name: spec.name.clone(),
                            min,
                            max,
                        });
                    }
                }
                if let Some(existing) = variable_names.insert(variable_name.clone(), spec) {
                    return Err(ConfigError::DuplicateVariableName {
                        variable_name,
                        first: existing.name.clone(),
                        second: spec.name.clone(),
                    });
                }
                globals.insert(variable_name, spec.base_value);

                if spec.randomize || spec.accumulate || spec.expression.is_some() {
                    return Err(ConfigError::ConflictingBehavior {
                        name: spec.name.clone(),
                        reason: "writable registers cannot randomize, accumulate, or derive"
                            .to_string(),
                    });
                }
            } else if spec.randomize && spec.accumulate {
                return Err(ConfigError::ConflictingBehavior {
                    name: spec.name.clone(),
                    reason: "a register cannot both randomize and accumulate".to_string(),
                });
            }
        }

        // Non-overlapping word ranges.
        let mut ranges: Vec<(u16, u16, &str)> = specs
            .iter()
            .map(|s| (s.address, s.address + s.reg_type.word_count(), s.name.as_str()))
            .collect();
        ranges.sort_by_key(|(start, _, _)| *start);
        for window in ranges.windows(2) {
            let (a_start, a_end, a_name) = window[0];
            let (b_start, b_end, b_name) = window[1];
            if b_start < a_end {
                return Err(ConfigError::OverlappingRange {
                    first: a_name.to_string(),
                    first_addr: a_start,
                    first_end: a_end,
                    second: b_name.to_string(),
                    second_addr: b_start,
                    second_end: b_end,
                });
            }
        }

        // Accumulator sources must resolve to an existing register.
        for spec in &specs {
            if spec.accumulate {
                let source = spec.source.clone().ok_or_else(|| ConfigError::MissingField {
                    name: spec.name.clone(),
                    field: "source",
                })?;
                if !by_name_spec.contains_key(&source) {
                    return Err(ConfigError::UnknownAccumulatorSource {
                        name: spec.name.clone(),
                        source,
                    });
                }
            }
        }

        // Compile expressions and validate identifier resolution against the
        // combined register-name/global-variable namespace (fail at load,
        // per the resolved open question).
        let known_names: HashSet<&str> = by_name_spec
            .keys()
            .map(String::as_str)
            .chain(globals.keys().map(String::as_str))
            .collect();

        let mut registers = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::with_capacity(specs.len());
        let mut by_address = HashMap::with_capacity(specs.len());
        let mut max_word_address = 0u16;

        for spec in specs {
            let expression = match &spec.expression {
                Some(source) => {
                    let compiled = CompiledExpression::compile(source).map_err(|reason| {
                        ConfigError::InvalidExpression {
                            name: spec.name.clone(),
                            reason,
                        }
                    })?;
                    for identifier in compiled.identifiers() {
                        if RESERVED_NAMES.contains(&identifier) {
                            continue;
                        }
                        if !known_names.contains(identifier) {
                            return Err(ConfigError::UnresolvedIdentifier {
                                name: spec.name.clone(),
                                identifier: identifier.to_string(),
                            });
                        }
                    }
                    Some(compiled)
                }
                None => None,
            };

            let behavior = if spec.writable {
                Behavior::Writable {
                    variable_name: spec.variable_name.clone().unwrap_or_default(),
                    min_value: spec.min_value,
                    max_value: spec.max_value,
                }
            } else if spec.randomize {
                Behavior::Randomize {
                    fluctuation: spec.fluctuation.unwrap_or(0.0),
                }
            } else if spec.accumulate {
                Behavior::Accumulate {
                    source: spec.source.clone().unwrap_or_default(),
                }
            } else {
                Behavior::Static
            };

            let end = spec.address + spec.reg_type.word_count();
            max_word_address = max_word_address.max(end.saturating_sub(1));

            let index = registers.len();
            by_name.insert(spec.name.clone(), index);
            by_address.insert(spec.address, index);

            registers.push(Register {
                address: spec.address,
                name: spec.name,
                description: spec.description,
                reg_type: spec.reg_type,
                scale: spec.scale,
                base_value: spec.base_value,
                behavior,
                expression,
            });
        }

        Ok((
            Self {
                registers,
                by_name,
                by_address,
                max_word_address,
            },
            globals,
        ))
    }

    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Register> {
        self.by_name.get(name).map(|&i| &self.registers[i])
    }

    pub fn get_by_address(&self, address: u16) -> Option<&Register> {
        self.by_address.get(&address).map(|&i| &self.registers[i])
    }

    /// Length the Register Bank must have: the highest declared word address
    /// plus 2 (so a 32-bit register at the last address fits), never less
    /// than [`MIN_BANK_LENGTH`].
    pub fn bank_length(&self) -> usize {
        (self.max_word_address as usize + 2).max(MIN_BANK_LENGTH)
    }
}
