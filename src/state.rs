// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-instance Value Store + Register Bank, guarded by the instance mutex.
//!
//! The Value Store holds each register's current *logical* value (the
//! number the update pipeline computes). The Register Bank holds the
//! encoded 16-bit words a Modbus client actually reads. [`SimulationState`]
//! bundles both plus a queue of pending client writes, all behind the one
//! mutex the update pipeline and the Modbus service share.

use std::collections::HashMap;

use crate::register::RegisterTable;

/// A write request queued by the Modbus service (function code 6 or 16),
/// to be ingested by the pipeline's ingest-writes phase rather than applied
/// immediately, so a tick never observes a half-applied write.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub address: u16,
    pub words: Vec<u16>,
}

/// The mutable state of one simulation instance: logical values, the
/// encoded register bank, and writes awaiting ingestion.
pub struct SimulationState {
    /// Logical value per register name (the Value Store).
    pub values: HashMap<String, f64>,
    /// Encoded words, indexed by address (the Register Bank).
    pub bank: Vec<u16>,
    /// Client writes accepted since the last tick, awaiting ingestion.
    pub pending_writes: Vec<PendingWrite>,
}

impl SimulationState {
    /// Build the initial state: Value Store seeded from each register's
    /// `base_value`, Register Bank encoded from those same values (including
    /// writable registers, which only get this one seeding outside of a
    /// client write).
    pub fn new(table: &RegisterTable) -> Self {
        let mut values = HashMap::with_capacity(table.registers().len());
        for register in table.registers() {
            values.insert(register.name.clone(), register.base_value);
        }
        let mut state = Self {
            values,
            bank: vec![0u16; table.bank_length()],
            pending_writes: Vec::new(),
        };
        for register in table.registers() {
            state.encode_into_bank(register);
        }
        state
    }

    fn encode_into_bank(&mut self, register: &crate::register::Register) {
        let logical = self.values.get(&register.name).copied().unwrap_or(0.0);
        let words = crate::codec::encode(logical, register.reg_type, register.scale);
        let start = register.address as usize;
        for (offset, word) in words.into_iter().enumerate() {
            if let Some(slot) = self.bank.get_mut(start + offset) {
                *slot = word;
            }
        }
    }

    /// Re-encode a single register's bank words from its current logical
    /// value, identified by address. Used by the ingest-writes phase to
    /// reflect a just-clamped write, since writable registers are excluded
    /// from [`SimulationState::publish`].
    pub fn encode_register_at(&mut self, table: &RegisterTable, address: u16) {
        if let Some(register) = table.get_by_address(address) {
            self.encode_into_bank(register);
        }
    }

    /// Encode every non-writable register's current logical value into the
    /// bank. The pipeline's publish phase. Writable registers are skipped:
    /// their bank words are authoritative as last written by a client (or
    /// seeded at construction), not re-derived from the Value Store.
    pub fn publish(&mut self, table: &RegisterTable) {
        for register in table.registers() {
            if register.is_writable() {
                continue;
            }
            self.encode_into_bank(register);
        }
    }

    /// Read a register's current raw words straight from the bank, for
    /// Modbus read requests (function code 3).
    pub fn read_bank(&self, address: u16, count: u16) -> Option<&[u16]> {
        let start = address as usize;
        let end = start + count as usize;
        self.bank.get(start..end)
    }

    /// Queue a raw write for later ingestion; never applied in place.
    pub fn queue_write(&mut self, address: u16, words: Vec<u16>) {
        self.pending_writes.push(PendingWrite { address, words });
    }
}
