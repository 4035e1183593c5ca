// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The system-call table: the indirection layer between callers (WASM or
//! the controller) and thunks.
//!
//! Each id resolves through the per-state-node registry stored under the
//! kernel dispatch space. An absent record routes to the thunk of the same
//! id, which is also what makes genesis-marked thunks reachable before any
//! registration has happened. An override pushes a user-privilege frame and
//! runs the registered contract instead.

use byteorder::{BigEndian, ByteOrder};

use basalt_shared::block::SystemCallTarget;
use basalt_shared::space::kernel;
use basalt_shared::SYSTEM_CALL_DISPATCH_RECORD_MAX;

use crate::context::{ExecutionContext, Privilege};
use crate::error::{ExecutionError, Result};
use crate::syscall_error;
use crate::thunks::{ids, ThunkDispatcher};

/// System calls that must always hit their thunk: registration itself, the
/// exit unwind, and argument fetch.
const NON_OVERRIDABLE: [u32; 3] = [ids::SET_SYSTEM_CALL, ids::EXIT_CONTRACT, ids::GET_ARGUMENTS];

pub fn is_overridable(id: u32) -> bool {
    !NON_OVERRIDABLE.contains(&id)
}

/// Registry key for a system call id: the id in big-endian.
pub fn dispatch_key(id: u32) -> [u8; 4] {
    let mut key = [0u8; 4];
    BigEndian::write_u32(&mut key, id);
    key
}

/// Resolve an id against the current state node's registry.
pub fn resolve(ctx: &ExecutionContext, id: u32) -> Result<SystemCallTarget> {
    let record = ctx
        .db
        .get(ctx.node()?, &kernel::system_call_dispatch(), &dispatch_key(id))?;
    match record {
        None => Ok(SystemCallTarget::Thunk(id)),
        Some(bytes) => {
            if bytes.len() as u32 > SYSTEM_CALL_DISPATCH_RECORD_MAX {
                return Err(ExecutionError::fatal(anyhow::anyhow!(
                    "dispatch record for system call {id} exceeds the size cap"
                )));
            }
            let target: SystemCallTarget = bcs::from_bytes(&bytes)?;
            Ok(target)
        }
    }
}

pub fn invoke_system_call(ctx: &mut ExecutionContext, id: u32, args: &[u8]) -> Result<Vec<u8>> {
    match resolve(ctx, id)? {
        SystemCallTarget::Thunk(thunk_id) => {
            let dispatcher = ThunkDispatcher::instance();
            if !dispatcher.exists(thunk_id) {
                return Err(syscall_error!(UnknownSystemCall;
                    "system call {} resolves to no thunk", id));
            }
            dispatcher.call_thunk(ctx, thunk_id, args)
        }
        SystemCallTarget::Contract { id: contract, entry_point } => {
            ctx.call_contract(contract, entry_point, args.to_vec(), Privilege::User)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_overridable_set() {
        assert!(!is_overridable(ids::SET_SYSTEM_CALL));
        assert!(!is_overridable(ids::EXIT_CONTRACT));
        assert!(!is_overridable(ids::GET_ARGUMENTS));
        assert!(is_overridable(ids::LOG));
        assert!(is_overridable(ids::PUT_OBJECT));
    }

    #[test]
    fn dispatch_keys_are_big_endian() {
        assert_eq!(dispatch_key(1), [0, 0, 0, 1]);
        assert_eq!(dispatch_key(0x0102_0304), [1, 2, 3, 4]);
    }
}
