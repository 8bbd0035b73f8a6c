// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin binding from `tokio-modbus`'s server trait onto a simulation
//! instance's Register Bank.
//!
//! Reads are served directly from the bank. Writes are never applied in
//! place: they are queued on the shared [`SimulationState`] and ingested by
//! the update pipeline's ingest-writes phase, so a tick never observes a
//! write mid-flight.

use std::future;
use std::sync::{Arc, Mutex};

use log::error;
use tokio_modbus::prelude::*;

use crate::register::RegisterTable;
use crate::state::SimulationState;

/// Modbus TCP `Service` for one simulation instance, serving function codes
/// 3 (read holding registers), 6 (write single register), and 16 (write
/// multiple registers).
pub struct SimModbusService {
    pub(crate) table: Arc<RegisterTable>,
    pub(crate) state: Arc<Mutex<SimulationState>>,
}

impl tokio_modbus::server::Service for SimModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => self
                .read_registers(addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::WriteSingleRegister(addr, value) => self
                .queue_write(addr, &[value])
                .map(|_| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleRegisters(addr, values) => self
                .queue_write(addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            other => {
                error!("unsupported Modbus request: {other:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

impl SimModbusService {
    fn read_registers(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let state = self.state.lock().unwrap();
        state
            .read_bank(addr, cnt)
            .map(<[u16]>::to_vec)
            .ok_or_else(|| {
                error!("read of {cnt} register(s) at {addr} is out of range");
                ExceptionCode::IllegalDataAddress
            })
    }

    fn queue_write(&self, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        let register = self.table.get_by_address(addr).ok_or_else(|| {
            error!("write to unknown register address {addr}");
            ExceptionCode::IllegalDataAddress
        })?;
        if !register.is_writable() {
            error!("write to non-writable register '{}'", register.name);
            return Err(ExceptionCode::IllegalDataAddress);
        }
        if values.len() != register.word_count() as usize {
            error!(
                "write to '{}' supplied {} word(s), expected {}",
                register.name,
                values.len(),
                register.word_count()
            );
            return Err(ExceptionCode::IllegalDataValue);
        }
        self.state.lock().unwrap().queue_write(addr, values.to_vec());
        Ok(())
    }
}
