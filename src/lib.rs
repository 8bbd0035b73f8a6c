// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configurable Modbus TCP device simulator.
//!
//! Register values are declared in a YAML configuration file and evolve in
//! real time: randomized fluctuation, accumulation of a source register,
//! arithmetic expressions over other registers and shared global
//! variables, and client-writable registers echoed through that shared
//! namespace. See [`config`] for the configuration shape and [`instance`]
//! for the simulation lifecycle.

pub mod codec;
pub mod config;
pub mod error;
pub mod expr;
pub mod globals;
pub mod instance;
pub mod modbus_service;
pub mod pipeline;
pub mod register;
pub mod registry;
pub mod state;
