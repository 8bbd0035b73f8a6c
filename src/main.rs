// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use tokio::signal;

use modsim::config::SimConfig;
use modsim::globals::GlobalVariables;
use modsim::instance::SimulationInstance;
use modsim::register::RegisterTable;
use modsim::registry::SimulationRegistry;

/// Configurable Modbus TCP device simulator.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for the primary simulation instance
    #[arg(long)]
    ip: Option<String>,

    /// TCP port for the primary simulation instance
    #[arg(long)]
    port: Option<u16>,

    /// Modbus slave/unit id in [1, 247]
    #[arg(long)]
    slave_id: Option<u8>,

    /// Update pipeline cadence in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Print the configuration shape and exit
    #[arg(long)]
    show_config_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.show_config_schema {
        print_config_schema();
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let mut config = match SimConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration from {config_path:?}: {err:?}");
            std::process::exit(1);
        }
    };

    config.apply_args(args.ip.clone(), args.port, args.slave_id, args.tick_ms);

    let (table, initial_globals) = match RegisterTable::load(config.registers.clone()) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("invalid register configuration: {err}");
            std::process::exit(err.exit_code());
        }
    };

    let table = Arc::new(table);
    let globals = Arc::new(GlobalVariables::new(initial_globals));
    let registry = SimulationRegistry::new();

    let instance = SimulationInstance::new(
        config.defaults.ip.clone(),
        config.defaults.port,
        config.defaults.slave_id,
        table,
        globals,
        config.defaults.tick_ms,
    );
    instance.start().await?;
    registry.register(instance.clone());

    info!(
        "modsim running on {}:{}@{} (tick {} ms)",
        config.defaults.ip, config.defaults.port, config.defaults.slave_id, config.defaults.tick_ms
    );

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal, stopping simulation");
            instance.stop().await;
        }
        Err(err) => {
            error!("error waiting for shutdown signal: {err}");
        }
    }

    Ok(())
}

/// A lightweight stand-in for a JSON-schema dump: this crate's config has
/// no JSON Schema, so this just describes the YAML shape `RegisterTable::load`
/// expects.
fn print_config_schema() {
    println!(
        "defaults:\n  \
         ip: string (default 127.0.0.1)\n  \
         port: u16 (default 5020)\n  \
         slave_id: u8 in [1, 247] (default 1)\n  \
         tick_ms: u64 (default 300)\n\
         registers:\n  \
         - address: u16\n    \
           name: string (unique)\n    \
           description: string\n    \
           type: u16 | u32 | i16 | i32 | f32\n    \
           scale: positive real\n    \
           base_value: real\n    \
           randomize: bool, fluctuation: real\n    \
           accumulate: bool, source: string\n    \
           expression: string\n    \
           writable: bool, variable_name: string, min_value/max_value: real"
    );
}
