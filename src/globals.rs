// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide Global Variable table.
//!
//! Global variables are seeded exactly once, at [`crate::register::RegisterTable::load`]
//! time, from each writable register's `base_value`. They are never
//! re-seeded per simulation instance: two instances sharing a writable
//! register name share its live value.

use std::collections::HashMap;
use std::sync::Mutex;

/// Shared table of named global variables, written by Modbus client writes
/// (the ingest-writes phase) and read by the randomize/accumulate/derive
/// phases and by expressions.
#[derive(Debug, Default)]
pub struct GlobalVariables {
    values: Mutex<HashMap<String, f64>>,
}

impl GlobalVariables {
    /// Seed the table from validated initial values, per register load.
    pub fn new(initial: HashMap<String, f64>) -> Self {
        Self {
            values: Mutex::new(initial),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.lock().unwrap().get(name).copied()
    }

    pub fn set(&self, name: &str, value: f64) {
        self.values.lock().unwrap().insert(name.to_string(), value);
    }

    /// Snapshot of the entire table, for building a frozen per-tick context.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.values.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_value_is_visible_immediately() {
        let globals = GlobalVariables::new(HashMap::from([("setpoint".to_string(), 100.0)]));
        assert_eq!(globals.get("setpoint"), Some(100.0));
    }

    #[test]
    fn set_overwrites_and_snapshot_reflects_it() {
        let globals = GlobalVariables::new(HashMap::new());
        globals.set("setpoint", 42.0);
        assert_eq!(globals.get("setpoint"), Some(42.0));
        let snap = globals.snapshot();
        assert_eq!(snap.get("setpoint"), Some(&42.0));
    }

    #[test]
    fn unknown_name_is_none() {
        let globals = GlobalVariables::new(HashMap::new());
        assert_eq!(globals.get("missing"), None);
    }
}
