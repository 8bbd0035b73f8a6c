// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The five-phase update pipeline run once per tick, under the instance
//! mutex: randomize, accumulate, ingest-writes, derive, publish.
//!
//! Expressions in the derive phase evaluate against a snapshot of the
//! Value Store and Global Variables taken at the *start* of the phase, so
//! cross-referencing expressions within the same tick always see the
//! previous tick's values rather than a partially updated one.

use rand::Rng;

use crate::codec;
use crate::globals::GlobalVariables;
use crate::register::{Behavior, RegisterTable};
use crate::state::SimulationState;

/// Run one full tick of the update pipeline. `tick_ms` is the cadence Δ in
/// milliseconds, needed by the accumulate phase's kWh integration.
pub fn tick<R: Rng>(
    table: &RegisterTable,
    globals: &GlobalVariables,
    state: &mut SimulationState,
    rng: &mut R,
    tick_ms: u64,
) {
    randomize(table, state, rng);
    accumulate(table, state, tick_ms);
    ingest_writes(table, globals, state);
    derive(table, globals, state);
    state.publish(table);
}

fn randomize<R: Rng>(table: &RegisterTable, state: &mut SimulationState, rng: &mut R) {
    for register in table.registers() {
        if let Behavior::Randomize { fluctuation } = register.behavior {
            let u: f64 = rng.random_range(-fluctuation..=fluctuation);
            state
                .values
                .insert(register.name.clone(), register.base_value * (1.0 + u));
        }
    }
}

/// `source` is read in power units; the accumulator integrates to energy in
/// kWh given Δ in seconds: `value += source_value * Δ / 3600 / 1000`. `Δ`
/// arrives here as `tick_ms` milliseconds, so it is converted to seconds
/// first.
fn accumulate(table: &RegisterTable, state: &mut SimulationState, tick_ms: u64) {
    let tick_seconds = tick_ms as f64 / 1000.0;
    for register in table.registers() {
        if let Behavior::Accumulate { source } = &register.behavior {
            let source_value = state.values.get(source).copied().unwrap_or(0.0);
            let current = state.values.get(&register.name).copied().unwrap_or(0.0);
            let increment = source_value * tick_seconds / 3600.0 / 1000.0;
            state
                .values
                .insert(register.name.clone(), current + increment);
        }
    }
}

fn ingest_writes(table: &RegisterTable, globals: &GlobalVariables, state: &mut SimulationState) {
    let pending = std::mem::take(&mut state.pending_writes);
    for write in pending {
        let Some(register) = table.get_by_address(write.address) else {
            continue;
        };
        let Behavior::Writable {
            variable_name,
            min_value,
            max_value,
        } = &register.behavior
        else {
            continue;
        };

        let logical = codec::decode(&write.words, register.reg_type, register.scale);
        let clamped = clamp_optional(logical, *min_value, *max_value);
        let address = register.address;

        state.values.insert(register.name.clone(), clamped);
        globals.set(variable_name, clamped);
        // Writable registers are excluded from the publish phase, so the
        // bank must be re-encoded here to reflect the clamped value.
        state.encode_register_at(table, address);
    }
}

fn clamp_optional(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let value = match min {
        Some(min) => value.max(min),
        None => value,
    };
    match max {
        Some(max) => value.min(max),
        None => value,
    }
}

fn derive(table: &RegisterTable, globals: &GlobalVariables, state: &mut SimulationState) {
    let mut snapshot = globals.snapshot();
    for (name, value) in &state.values {
        snapshot.insert(name.clone(), *value);
    }

    for register in table.registers() {
        if let Some(expression) = &register.expression {
            let value = expression.evaluate(&snapshot);
            state.values.insert(register.name.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RegisterType;
    use crate::register::{RegisterSpec, RegisterTable};
    use rand::rngs::mock::StepRng;

    fn spec(address: u16, name: &str, reg_type: RegisterType) -> RegisterSpec {
        RegisterSpec {
            address,
            name: name.to_string(),
            description: String::new(),
            reg_type,
            scale: 1.0,
            base_value: 0.0,
            randomize: false,
            fluctuation: None,
            accumulate: false,
            source: None,
            expression: None,
            writable: false,
            variable_name: None,
            min_value: None,
            max_value: None,
        }
    }

    const S6_TICK_MS: u64 = 300;
    const S6_POWER: f64 = 23000.0;

    #[test]
    fn accumulate_integrates_power_to_energy_s6() {
        // S6: Δ = 300 ms, a steady power=23000 source, energy accumulates
        // as 23000 * N * 0.3 / 3600 / 1000 after N ticks (Δ in seconds).
        let mut power = spec(0, "power_kw", RegisterType::U16);
        power.base_value = S6_POWER;

        let mut energy = spec(1, "energy_kwh", RegisterType::U32);
        energy.accumulate = true;
        energy.source = Some("power_kw".to_string());

        let (table, initial) = RegisterTable::load(vec![power, energy]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        let mut rng = StepRng::new(0, 0);

        let per_tick = S6_POWER * (S6_TICK_MS as f64 / 1000.0) / 3600.0 / 1000.0;

        tick(&table, &globals, &mut state, &mut rng, S6_TICK_MS);
        assert!((state.values.get("energy_kwh").unwrap() - per_tick).abs() < 1e-9);
        tick(&table, &globals, &mut state, &mut rng, S6_TICK_MS);
        assert!((state.values.get("energy_kwh").unwrap() - 2.0 * per_tick).abs() < 1e-9);
    }

    #[test]
    fn accumulator_is_monotonically_non_decreasing_for_non_negative_source() {
        let mut power = spec(0, "power_kw", RegisterType::U16);
        power.base_value = 3.0;

        let mut energy = spec(1, "energy_kwh", RegisterType::U32);
        energy.accumulate = true;
        energy.source = Some("power_kw".to_string());

        let (table, initial) = RegisterTable::load(vec![power, energy]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        let mut rng = StepRng::new(0, 0);

        let mut previous = 0.0;
        for _ in 0..5 {
            tick(&table, &globals, &mut state, &mut rng, 300);
            let current = *state.values.get("energy_kwh").unwrap();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn ingest_write_clamps_to_range_s4() {
        let mut setpoint = spec(4, "setpoint_reg", RegisterType::U16);
        setpoint.writable = true;
        setpoint.variable_name = Some("setpoint".to_string());
        setpoint.base_value = 50.0;
        setpoint.min_value = Some(0.0);
        setpoint.max_value = Some(100.0);

        let (table, initial) = RegisterTable::load(vec![setpoint]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        state.queue_write(4, vec![200]); // above max_value
        let mut rng = StepRng::new(0, 0);

        tick(&table, &globals, &mut state, &mut rng, 300);
        assert_eq!(state.values.get("setpoint_reg"), Some(&100.0));
        assert_eq!(globals.get("setpoint"), Some(100.0));
    }

    #[test]
    fn derive_sees_previous_tick_values_not_partial_s5() {
        let mut voltage = spec(0, "voltage", RegisterType::U16);
        voltage.base_value = 230.0;

        let mut setpoint = spec(1, "setpoint_reg", RegisterType::U16);
        setpoint.writable = true;
        setpoint.variable_name = Some("setpoint".to_string());
        setpoint.base_value = 100.0;

        let mut power = spec(2, "power", RegisterType::U32);
        power.expression = Some("voltage * setpoint".to_string());

        let (table, initial) = RegisterTable::load(vec![voltage, setpoint, power]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        let mut rng = StepRng::new(0, 0);

        tick(&table, &globals, &mut state, &mut rng, 300);
        assert_eq!(state.values.get("power"), Some(&23000.0));
    }

    #[test]
    fn randomized_register_stays_within_fluctuation_band() {
        let mut temp = spec(0, "temp", RegisterType::F32);
        temp.randomize = true;
        temp.fluctuation = Some(0.1);
        temp.base_value = 20.0;

        let (table, initial) = RegisterTable::load(vec![temp]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        let mut rng = rand::rng();

        for _ in 0..100 {
            tick(&table, &globals, &mut state, &mut rng, 300);
            let value = *state.values.get("temp").unwrap();
            assert!((value - 20.0).abs() <= 20.0 * 0.1 + 1e-9);
        }
    }

    #[test]
    fn no_op_tick_leaves_static_register_unchanged() {
        let reg = spec(0, "fixed", RegisterType::U16);
        let (table, initial) = RegisterTable::load(vec![reg]).unwrap();
        let globals = GlobalVariables::new(initial);
        let mut state = SimulationState::new(&table);
        let before = state.read_bank(0, 1).unwrap().to_vec();
        let mut rng = StepRng::new(0, 0);

        tick(&table, &globals, &mut state, &mut rng, 300);
        assert_eq!(state.read_bank(0, 1).unwrap(), before.as_slice());
    }
}
