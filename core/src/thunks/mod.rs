// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Thunks: the primitive host functions contracts ultimately bottom out in.
//!
//! Every thunk is a pure function of the execution context and a bcs
//! argument blob. The dispatcher owns a dense id-indexed table that is
//! closed after construction; the process-wide instance exists only as an
//! initialization convenience and is always reached through the
//! [`Runtime`](crate::runtime::Runtime) handed to the controller.

pub mod ids;
pub mod types;

mod account;
pub(crate) mod apply;
mod chain;
mod contract;
mod crypto;
mod database;
mod diagnostics;
mod registration;
pub(crate) mod resource;

use lazy_static::lazy_static;

use basalt_shared::{compute_load, MAX_ARGUMENT_SIZE};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::syscall_error;

pub type ThunkFn = fn(&mut ExecutionContext, &[u8]) -> Result<Vec<u8>>;

pub struct ThunkEntry {
    pub name: &'static str,
    pub handler: ThunkFn,
    /// Callable from kernel frames only.
    pub kernel_only: bool,
    /// Available before the system-call table is populated.
    pub genesis: bool,
    /// Compute ticks charged on dispatch.
    pub load: u64,
}

pub struct ThunkDispatcher {
    table: Vec<Option<ThunkEntry>>,
}

lazy_static! {
    static ref DISPATCHER: ThunkDispatcher = ThunkDispatcher::build();
}

impl ThunkDispatcher {
    pub fn instance() -> &'static ThunkDispatcher {
        &DISPATCHER
    }

    fn build() -> Self {
        let mut d = ThunkDispatcher { table: Vec::new() };

        use basalt_shared::compute_load::{HEAVY, LIGHT, MEDIUM};

        use self::ids::*;

        d.register(APPLY_BLOCK, "apply_block", apply::apply_block, true, true, HEAVY);
        d.register(APPLY_TRANSACTION, "apply_transaction", apply::apply_transaction, true, true, HEAVY);
        d.register(
            APPLY_UPLOAD_CONTRACT_OPERATION,
            "apply_upload_contract_operation",
            apply::apply_upload_contract_operation,
            true,
            true,
            HEAVY,
        );
        d.register(
            APPLY_CALL_CONTRACT_OPERATION,
            "apply_call_contract_operation",
            apply::apply_call_contract_operation,
            true,
            true,
            MEDIUM,
        );
        d.register(
            APPLY_SET_SYSTEM_CALL_OPERATION,
            "apply_set_system_call_operation",
            apply::apply_set_system_call_operation,
            true,
            true,
            MEDIUM,
        );

        d.register(PUT_OBJECT, "put_object", database::put_object, false, true, MEDIUM);
        d.register(GET_OBJECT, "get_object", database::get_object, false, true, MEDIUM);
        d.register(GET_NEXT_OBJECT, "get_next_object", database::get_next_object, false, true, MEDIUM);
        d.register(GET_PREV_OBJECT, "get_prev_object", database::get_prev_object, false, true, MEDIUM);
        d.register(REMOVE_OBJECT, "remove_object", database::remove_object, false, true, MEDIUM);

        d.register(LOG, "log", diagnostics::log, false, true, LIGHT);
        d.register(EVENT, "event", diagnostics::event, false, true, LIGHT);
        d.register(EXIT_CONTRACT, "exit_contract", contract::exit_contract, false, true, LIGHT);
        d.register(GET_ARGUMENTS, "get_arguments", contract::get_arguments, false, true, LIGHT);
        d.register(CALL_CONTRACT, "call_contract", contract::call_contract, false, true, MEDIUM);
        d.register(GET_CALLER, "get_caller", contract::get_caller, false, true, LIGHT);
        d.register(GET_CONTRACT_ID, "get_contract_id", contract::get_contract_id, false, true, LIGHT);
        d.register(
            REQUIRE_AUTHORITY,
            "require_authority",
            contract::require_authority,
            false,
            true,
            MEDIUM,
        );

        d.register(GET_HEAD_INFO, "get_head_info", chain::get_head_info, false, true, LIGHT);
        d.register(GET_CHAIN_ID, "get_chain_id", chain::get_chain_id, false, true, LIGHT);
        d.register(
            GET_LAST_IRREVERSIBLE_BLOCK,
            "get_last_irreversible_block",
            chain::get_last_irreversible_block,
            false,
            true,
            LIGHT,
        );

        d.register(GET_ACCOUNT_NONCE, "get_account_nonce", account::get_account_nonce, false, true, LIGHT);
        d.register(
            VERIFY_ACCOUNT_NONCE,
            "verify_account_nonce",
            account::verify_account_nonce,
            false,
            true,
            LIGHT,
        );
        d.register(SET_ACCOUNT_NONCE, "set_account_nonce", account::set_account_nonce, true, true, LIGHT);
        d.register(GET_ACCOUNT_RC, "get_account_rc", account::get_account_rc, false, true, LIGHT);
        d.register(CONSUME_ACCOUNT_RC, "consume_account_rc", account::consume_account_rc, true, true, LIGHT);

        d.register(
            GET_RESOURCE_LIMITS,
            "get_resource_limits",
            resource::get_resource_limits,
            false,
            true,
            LIGHT,
        );
        d.register(
            CONSUME_BLOCK_RESOURCES,
            "consume_block_resources",
            resource::consume_block_resources,
            true,
            true,
            LIGHT,
        );

        d.register(HASH, "hash", crypto::hash, false, true, MEDIUM);
        d.register(RECOVER_PUBLIC_KEY, "recover_public_key", crypto::recover_public_key, false, true, HEAVY);
        d.register(VERIFY_SIGNATURE, "verify_signature", crypto::verify_signature, false, true, HEAVY);

        d.register(SET_SYSTEM_CALL, "set_system_call", registration::set_system_call, true, true, MEDIUM);

        d
    }

    fn register(
        &mut self,
        id: u32,
        name: &'static str,
        handler: ThunkFn,
        kernel_only: bool,
        genesis: bool,
        load: u64,
    ) {
        let idx = id as usize;
        if self.table.len() <= idx {
            self.table.resize_with(idx + 1, || None);
        }
        debug_assert!(self.table[idx].is_none(), "duplicate thunk id {id}");
        self.table[idx] = Some(ThunkEntry {
            name,
            handler,
            kernel_only,
            genesis,
            load,
        });
    }

    fn entry(&self, id: u32) -> Option<&ThunkEntry> {
        self.table.get(id as usize).and_then(|e| e.as_ref())
    }

    pub fn exists(&self, id: u32) -> bool {
        self.entry(id).is_some()
    }

    pub fn is_genesis(&self, id: u32) -> bool {
        self.entry(id).map(|e| e.genesis).unwrap_or(false)
    }

    pub fn name(&self, id: u32) -> Option<&'static str> {
        self.entry(id).map(|e| e.name)
    }

    /// Dispatch a thunk: privilege and argument checks, the per-class
    /// compute charge, then the handler.
    pub fn call_thunk(
        &self,
        ctx: &mut ExecutionContext,
        id: u32,
        args: &[u8],
    ) -> Result<Vec<u8>> {
        if args.len() as u64 > MAX_ARGUMENT_SIZE as u64 {
            return Err(syscall_error!(ArgumentTooLarge;
                "{} byte argument exceeds the {} byte cap", args.len(), MAX_ARGUMENT_SIZE));
        }
        let entry = self
            .entry(id)
            .ok_or_else(|| syscall_error!(UnknownThunk; "thunk {} not found", id))?;
        if entry.kernel_only && !ctx.is_kernel() {
            return Err(syscall_error!(InsufficientPrivileges;
                "thunk {} requires kernel privilege", entry.name));
        }
        ctx.use_compute_bandwidth(entry.load)?;
        log::trace!("dispatching thunk {}", entry.name);
        (entry.handler)(ctx, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_dense_and_closed() {
        let d = ThunkDispatcher::instance();
        assert!(d.exists(ids::APPLY_BLOCK));
        assert!(d.exists(ids::SET_SYSTEM_CALL));
        assert!(!d.exists(0));
        assert!(!d.exists(9999));
        assert_eq!(d.name(ids::LOG), Some("log"));
        assert!(d.is_genesis(ids::GET_OBJECT));
    }
}
