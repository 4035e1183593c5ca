// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The wasmtime backend.
//!
//! Compute metering rides wasmtime's fuel counter: the contract burns fuel
//! per instruction, and every host-call boundary reconciles fuel against
//! the context's resource meter in both directions, so host-side charges
//! shrink the fuel the contract has left and vice versa.
//!
//! Host-call status discipline: a recoverable syscall failure returns as a
//! nonzero status the contract may inspect; resource exhaustion, fatal
//! errors, and the exit unwind trap the instance instead.

use std::sync::Mutex;

use anyhow::anyhow;
use wasmtime::{AsContextMut, Caller, Config, Engine, Linker, Store, Trap};

use basalt_shared::error::ErrorNumber;
use byteorder::{ByteOrder, LittleEndian};

use crate::context::ExecutionContext;
use crate::error::{ExecutionError, Result, SyscallError};
use crate::syscall_error;
use crate::syscalls;
use crate::thunks::ThunkDispatcher;

use super::cache::{ModuleCache, DEFAULT_MODULE_CACHE_SIZE};
use super::VmBackend;

/// Export name of a contract's entry point.
const ENTRY_EXPORT: &str = "_start";

/// Store data for one contract invocation.
pub(crate) struct InvocationData {
    pub ctx: ExecutionContext,
    /// Fuel most recently synchronized with the meter.
    pub last_fuel: u64,
}

/// A trapping execution error smuggled through wasmtime's error channel.
#[derive(Debug, thiserror::Error)]
#[error("host trap: {0}")]
struct HostTrap(ExecutionError);

/// Whether an error aborts the instance instead of surfacing as a status.
fn is_trapping(e: &ExecutionError) -> bool {
    match e {
        ExecutionError::Exit(_) | ExecutionError::Fatal(_) => true,
        ExecutionError::Syscall(SyscallError(_, number)) => matches!(
            number,
            ErrorNumber::TickMeterExhausted
                | ErrorNumber::DiskStorageExceeded
                | ErrorNumber::NetworkBandwidthExceeded
                | ErrorNumber::InsufficientRc
        ),
    }
}

pub struct WasmtimeBackend {
    engine: Engine,
    linker: Linker<InvocationData>,
    cache: ModuleCache,
    initialized: Mutex<bool>,
}

impl WasmtimeBackend {
    pub fn new() -> Result<Self> {
        Self::with_cache_size(DEFAULT_MODULE_CACHE_SIZE)
    }

    pub fn with_cache_size(cache_size: usize) -> Result<Self> {
        let mut config = Config::default();
        config.consume_fuel(true);
        let engine = Engine::new(&config)
            .map_err(|e| ExecutionError::Fatal(anyhow!("engine construction failed: {e}")))?;

        let mut linker: Linker<InvocationData> = Linker::new(&engine);
        bind_host_functions(&mut linker)
            .map_err(|e| ExecutionError::Fatal(anyhow!("binding host imports failed: {e}")))?;

        Ok(WasmtimeBackend {
            engine,
            linker,
            cache: ModuleCache::new(cache_size),
            initialized: Mutex::new(false),
        })
    }

    pub fn module_cache(&self) -> &ModuleCache {
        &self.cache
    }
}

impl VmBackend for WasmtimeBackend {
    fn backend_name(&self) -> &'static str {
        "wasmtime"
    }

    fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().unwrap_or_else(|e| e.into_inner());
        if !*initialized {
            log::info!("wasmtime backend initialized");
            *initialized = true;
        }
        Ok(())
    }

    fn run(&self, ctx: &mut ExecutionContext, bytecode: &[u8], id: &[u8]) -> Result<()> {
        let module = self.cache.load(&self.engine, id, bytecode)?;

        let body = ctx.take_body();
        let ticks = body.meter.compute_bandwidth_remaining();
        let mut store = Store::new(
            &self.engine,
            InvocationData {
                ctx: ExecutionContext::from_body(body),
                last_fuel: ticks,
            },
        );

        let outcome = store
            .set_fuel(ticks)
            .and_then(|()| {
                let instance = self.linker.instantiate(&mut store, &module)?;
                let start = instance.get_typed_func::<(), ()>(&mut store, ENTRY_EXPORT)?;
                start.call(&mut store, ())
            });

        // Charge whatever fuel the contract burned since the last sync,
        // then hand the context body back before reporting anything.
        let fuel_left = store.get_fuel().unwrap_or(0);
        let data = store.into_data();
        let mut shell = data.ctx;
        let burned = data.last_fuel.saturating_sub(fuel_left);
        let meter_outcome = shell.use_compute_bandwidth(burned);
        ctx.restore_body(shell.take_body());
        meter_outcome?;

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(classify_vm_error(e)),
        }
    }
}

fn classify_vm_error(e: anyhow::Error) -> ExecutionError {
    match e.downcast::<HostTrap>() {
        Ok(HostTrap(inner)) => inner,
        Err(e) => {
            if e.downcast_ref::<Trap>() == Some(&Trap::OutOfFuel) {
                syscall_error!(TickMeterExhausted; "contract ran out of compute ticks")
            } else {
                syscall_error!(WasmTrap; "contract trapped: {}", e)
            }
        }
    }
}

// ---- host imports ---------------------------------------------------------

fn bind_host_functions(linker: &mut Linker<InvocationData>) -> anyhow::Result<()> {
    linker.func_wrap(
        "env",
        "invoke_thunk",
        |mut caller: Caller<'_, InvocationData>,
         id: u32,
         ret_ptr: u32,
         ret_len: u32,
         arg_ptr: u32,
         arg_len: u32,
         written_ptr: u32|
         -> anyhow::Result<u32> {
            host_invoke(&mut caller, id, ret_ptr, ret_len, arg_ptr, arg_len, written_ptr, false)
        },
    )?;

    linker.func_wrap(
        "env",
        "invoke_system_call",
        |mut caller: Caller<'_, InvocationData>,
         id: u32,
         ret_ptr: u32,
         ret_len: u32,
         arg_ptr: u32,
         arg_len: u32,
         written_ptr: u32|
         -> anyhow::Result<u32> {
            host_invoke(&mut caller, id, ret_ptr, ret_len, arg_ptr, arg_len, written_ptr, true)
        },
    )?;

    linker.func_wrap(
        "env",
        "get_meter_ticks",
        |mut caller: Caller<'_, InvocationData>| -> anyhow::Result<i64> {
            charge_for_exec(&mut caller)?;
            let ticks = caller.data().ctx.meter.compute_bandwidth_remaining();
            Ok(ticks.min(i64::MAX as u64) as i64)
        },
    )?;

    linker.func_wrap(
        "env",
        "use_meter_ticks",
        |mut caller: Caller<'_, InvocationData>, ticks: u64| -> anyhow::Result<()> {
            charge_for_exec(&mut caller)?;
            caller
                .data_mut()
                .ctx
                .use_compute_bandwidth(ticks)
                .map_err(|e| anyhow!(HostTrap(e)))?;
            update_fuel(&mut caller)
        },
    )?;

    linker.func_wrap(
        "env",
        "exit",
        |mut caller: Caller<'_, InvocationData>,
         code: i32,
         ret_ptr: u32,
         ret_len: u32|
         -> anyhow::Result<()> {
            charge_for_exec(&mut caller)?;
            let value = if ret_len > 0 {
                let memory = instance_memory(&mut caller)?;
                let (mem, _) = memory.data_and_store_mut(&mut caller);
                read_memory(mem, ret_ptr, ret_len)?.to_vec()
            } else {
                Vec::new()
            };
            let data = caller.data_mut();
            data.ctx
                .current_frame_mut()
                .map_err(|e| anyhow!(HostTrap(e)))?
                .result = value;
            Err(anyhow!(HostTrap(ExecutionError::Exit(code))))
        },
    )?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn host_invoke(
    caller: &mut Caller<'_, InvocationData>,
    id: u32,
    ret_ptr: u32,
    ret_len: u32,
    arg_ptr: u32,
    arg_len: u32,
    written_ptr: u32,
    system: bool,
) -> anyhow::Result<u32> {
    charge_for_exec(caller)?;

    let memory = instance_memory(caller)?;
    let (mem, data) = memory.data_and_store_mut(&mut *caller);
    let args = read_memory(mem, arg_ptr, arg_len)?.to_vec();

    let result = if system {
        syscalls::invoke_system_call(&mut data.ctx, id, &args)
    } else {
        ThunkDispatcher::instance().call_thunk(&mut data.ctx, id, &args)
    };

    let status = match result {
        Ok(value) => {
            if value.len() > ret_len as usize {
                write_u32(mem, written_ptr, 0)?;
                ErrorNumber::ReturnBufferTooSmall as u32
            } else {
                let out = read_memory_mut(mem, ret_ptr, value.len() as u32)?;
                out.copy_from_slice(&value);
                write_u32(mem, written_ptr, value.len() as u32)?;
                0
            }
        }
        Err(e) if !is_trapping(&e) => {
            log::debug!("host call {id} failed with status: {e}");
            write_u32(mem, written_ptr, 0)?;
            e.number() as u32
        }
        Err(e) => return Err(anyhow!(HostTrap(e))),
    };

    update_fuel(caller)?;
    Ok(status)
}

/// Pull the instance's exported linear memory, trapping when absent.
fn instance_memory(
    caller: &mut Caller<'_, InvocationData>,
) -> anyhow::Result<wasmtime::Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| anyhow!("contract exports no linear memory"))
}

fn read_memory(mem: &[u8], ptr: u32, len: u32) -> anyhow::Result<&[u8]> {
    mem.get(ptr as usize..)
        .and_then(|m| m.get(..len as usize))
        .ok_or_else(|| {
            anyhow!(HostTrap(syscall_error!(WasmMemoryFault;
                "buffer {} (length {}) out of bounds", ptr, len)))
        })
}

fn read_memory_mut(mem: &mut [u8], ptr: u32, len: u32) -> anyhow::Result<&mut [u8]> {
    mem.get_mut(ptr as usize..)
        .and_then(|m| m.get_mut(..len as usize))
        .ok_or_else(|| {
            anyhow!(HostTrap(syscall_error!(WasmMemoryFault;
                "buffer {} (length {}) out of bounds", ptr, len)))
        })
}

fn write_u32(mem: &mut [u8], ptr: u32, value: u32) -> anyhow::Result<()> {
    let out = read_memory_mut(mem, ptr, 4)?;
    LittleEndian::write_u32(out, value);
    Ok(())
}

/// Meter the fuel burned by wasm execution since the last synchronization.
fn charge_for_exec(caller: &mut Caller<'_, InvocationData>) -> anyhow::Result<()> {
    let fuel = caller.as_context_mut().get_fuel()?;
    let last = caller.data().last_fuel;
    let burned = last.saturating_sub(fuel);
    caller
        .data_mut()
        .ctx
        .use_compute_bandwidth(burned)
        .map_err(|e| anyhow!(HostTrap(e)))?;
    caller.data_mut().last_fuel = fuel;
    Ok(())
}

/// Push the meter's remaining compute back into the fuel counter so host
/// charges shorten the contract's runway.
fn update_fuel(caller: &mut Caller<'_, InvocationData>) -> anyhow::Result<()> {
    let remaining = caller.data().ctx.meter.compute_bandwidth_remaining();
    caller.as_context_mut().set_fuel(remaining)?;
    caller.data_mut().last_fuel = remaining;
    Ok(())
}
