// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The runtime bundle: the thunk dispatcher and the WASM backend.
//!
//! Both have natural process-wide singletons, but semantically they are
//! plain objects: the controller is handed a `Runtime` and everything below
//! it reaches them through that handle, never through the statics.

use std::sync::Arc;

use crate::error::Result;
use crate::thunks::ThunkDispatcher;
use crate::vm::{VmBackend, WasmtimeBackend};

pub struct Runtime {
    pub thunks: &'static ThunkDispatcher,
    pub vm: Arc<dyn VmBackend>,
}

impl Runtime {
    pub fn new(vm: Arc<dyn VmBackend>) -> Result<Self> {
        vm.initialize()?;
        Ok(Runtime {
            thunks: ThunkDispatcher::instance(),
            vm,
        })
    }

    /// The default runtime: the wasmtime backend with its standard cache.
    pub fn with_wasmtime() -> Result<Self> {
        Self::new(Arc::new(WasmtimeBackend::new()?))
    }
}
