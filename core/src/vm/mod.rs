// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The sandboxed WASM backend.
//!
//! The execution core only sees the [`VmBackend`] trait: load-or-fetch a
//! module, instantiate it with the host imports, run its entry point under
//! the compute meter. The wasmtime implementation lives in
//! [`wasmtime_backend`]; modules are cached compiled and shared immutably.

mod cache;
pub mod wasmtime_backend;

pub use cache::ModuleCache;
pub use wasmtime_backend::WasmtimeBackend;

use crate::context::ExecutionContext;
use crate::error::Result;

pub trait VmBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// One-time process setup. Host imports are registered here.
    fn initialize(&self) -> Result<()>;

    /// Execute `bytecode`'s entry point against the context. `id` keys the
    /// module cache and must be collision-free for distinct bytecode (the
    /// callers use a digest).
    fn run(&self, ctx: &mut ExecutionContext, bytecode: &[u8], id: &[u8]) -> Result<()>;
}
