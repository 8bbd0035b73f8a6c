// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A Simulation Instance: one Modbus TCP endpoint backed by its own Value
//! Store and Register Bank, driven by two concurrent tasks (network and
//! updater) coordinated through a shared cancellation flag, mirroring the
//! teacher's `Daemon` task-supervision shape.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::globals::GlobalVariables;
use crate::modbus_service::SimModbusService;
use crate::pipeline;
use crate::register::RegisterTable;
use crate::state::SimulationState;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const BACKOFF_TICKS: u32 = 5;

/// One register's display snapshot, for a UI collaborator.
#[derive(Debug, Clone)]
pub struct RegisterSnapshot {
    pub address: u16,
    pub name: String,
    pub description: String,
    pub words: Vec<u16>,
    pub logical_value: f64,
    pub writable: bool,
}

/// A single simulated Modbus TCP slave device.
pub struct SimulationInstance {
    pub ip: String,
    pub port: u16,
    pub slave_id: u8,
    tick_ms: u64,
    table: Arc<RegisterTable>,
    globals: Arc<GlobalVariables>,
    state: Arc<Mutex<SimulationState>>,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulationInstance {
    pub fn new(
        ip: String,
        port: u16,
        slave_id: u8,
        table: Arc<RegisterTable>,
        globals: Arc<GlobalVariables>,
        tick_ms: u64,
    ) -> Arc<Self> {
        let state = SimulationState::new(&table);
        Arc::new(Self {
            ip,
            port,
            slave_id,
            tick_ms,
            table,
            globals,
            state: Arc::new(Mutex::new(state)),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the updater and network tasks. Fails if the TCP listener
    /// cannot bind.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.ip, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.ip, self.port))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind Modbus TCP listener on {addr}"))?;

        self.running.store(true, Ordering::SeqCst);

        let updater = self.clone().spawn_updater();
        let network = self.clone().spawn_network(listener);

        *self.tasks.lock().unwrap() = vec![updater, network];
        info!("simulation instance {}:{}@{} started", self.ip, self.port, self.slave_id);
        Ok(())
    }

    fn spawn_updater(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while self.running.load(Ordering::SeqCst) {
                time::sleep(Duration::from_millis(self.tick_ms)).await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if self.run_tick().is_err() {
                    error!(
                        "{}:{}@{}: tick panicked, backing off for {} ticks",
                        self.ip, self.port, self.slave_id, BACKOFF_TICKS
                    );
                    time::sleep(Duration::from_millis(self.tick_ms * BACKOFF_TICKS as u64)).await;
                }
            }
        })
    }

    /// Run one tick, isolating a panic inside a phase from the rest of the
    /// process (§5 failure isolation).
    fn run_tick(&self) -> std::thread::Result<()> {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut rng = rand::rng();
            let mut state = self.state.lock().unwrap();
            pipeline::tick(&self.table, &self.globals, &mut state, &mut rng, self.tick_ms);
        }))
    }

    fn spawn_network(self: Arc<Self>, listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let server = Server::new(listener);
            let table = self.table.clone();
            let state = self.state.clone();

            let on_connected = move |stream, socket_addr| {
                let table = table.clone();
                let state = state.clone();
                async move {
                    accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                        Ok(Some(SimModbusService {
                            table: table.clone(),
                            state: state.clone(),
                        }))
                    })
                }
            };
            let on_process_error = |err| error!("Modbus server error: {err}");

            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve(&on_connected, on_process_error).await {
                    error!("Modbus server terminated: {e}");
                }
            });

            while self.running.load(Ordering::SeqCst) {
                time::sleep(Duration::from_secs(1)).await;
            }

            server_handle.abort();
            if tokio::time::timeout(JOIN_TIMEOUT, server_handle).await.is_err() {
                warn!(
                    "{}:{}@{}: Modbus server shutdown timed out, forcing termination",
                    self.ip, self.port, self.slave_id
                );
            }
        })
    }

    /// Signal both tasks to stop and join them with a bounded timeout.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            if tokio::time::timeout(JOIN_TIMEOUT, task).await.is_err() {
                warn!("{}:{}@{}: task join timed out", self.ip, self.port, self.slave_id);
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Copy of Bank words for a contiguous range, for a UI collaborator.
    pub fn snapshot_range(&self, address: u16, count: u16) -> Vec<u16> {
        self.state
            .lock()
            .unwrap()
            .read_bank(address, count)
            .map(<[u16]>::to_vec)
            .unwrap_or_default()
    }

    /// Per-register display rows: address, decoded value, raw words.
    pub fn snapshot_table(&self) -> Vec<RegisterSnapshot> {
        let state = self.state.lock().unwrap();
        self.table
            .registers()
            .iter()
            .map(|register| {
                let words = state
                    .read_bank(register.address, register.word_count())
                    .map(<[u16]>::to_vec)
                    .unwrap_or_default();
                let logical_value = state.values.get(&register.name).copied().unwrap_or(0.0);
                RegisterSnapshot {
                    address: register.address,
                    name: register.name.clone(),
                    description: register.description.clone(),
                    words,
                    logical_value,
                    writable: register.is_writable(),
                }
            })
            .collect()
    }
}
