// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide Simulation Registry: the set of live simulation instances,
//! appended to by the operator/CLI task and iterated by the UI/snapshot
//! path, each under its own mutex.

use std::sync::{Arc, Mutex};

use crate::instance::SimulationInstance;

#[derive(Default)]
pub struct SimulationRegistry {
    instances: Mutex<Vec<Arc<SimulationInstance>>>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instance: Arc<SimulationInstance>) {
        self.instances.lock().unwrap().push(instance);
    }

    pub fn count(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn iter(&self) -> Vec<Arc<SimulationInstance>> {
        self.instances.lock().unwrap().clone()
    }

    pub fn get(&self, index: usize) -> Option<Arc<SimulationInstance>> {
        self.instances.lock().unwrap().get(index).cloned()
    }
}
