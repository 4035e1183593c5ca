// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The Basalt execution core.
//!
//! Turns submitted blocks into accepted state transitions (a receipt and a
//! new head) or bounded, isolated failures that leave no state residue. The
//! pieces, bottom up: a resource meter and nested sessions, the chronicler
//! for events and logs, thunks and the system-call table, the metered WASM
//! backend, and the controller that orchestrates block application over the
//! forked state database.
//!
//! ## Logging
//!
//! This crate emits through the `log` facade; configure a backend in the
//! consuming application.

pub use context::{ExecutionContext, Intent, Privilege, StackFrame};
pub use controller::{Config, Controller, ForkResolutionAlgorithm};
pub use error::{ClassifyResult, Context, ExecutionError, Result, SyscallError};
pub use runtime::Runtime;

pub mod bus;
pub mod chronicler;
pub mod context;
pub mod controller;
pub mod error;
pub mod indexer;
pub mod rectify;
pub mod resource;
pub mod rpc;
pub mod runtime;
pub mod session;
pub mod syscalls;
pub mod thunks;
pub mod vm;
