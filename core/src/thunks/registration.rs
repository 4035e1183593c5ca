// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! System-call registration. Registration itself is a thunk so that the
//! whole dispatch surface stays reachable through one mechanism, but it can
//! never be overridden.

use basalt_shared::block::SystemCallTarget;
use basalt_shared::space::kernel;
use basalt_shared::SYSTEM_CALL_DISPATCH_RECORD_MAX;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::syscall_error;
use crate::syscalls;

use super::types::SetSystemCallArguments;
use super::ThunkDispatcher;

pub fn set_system_call(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: SetSystemCallArguments = bcs::from_bytes(args)?;

    if !syscalls::is_overridable(args.call_id) {
        return Err(syscall_error!(SyscallNotOverridable;
            "system call {} cannot be overridden", args.call_id));
    }

    match &args.target {
        SystemCallTarget::Thunk(id) => {
            if !ThunkDispatcher::instance().exists(*id) {
                return Err(syscall_error!(UnknownThunk;
                    "target thunk {} not found", id));
            }
        }
        SystemCallTarget::Contract { id, .. } => {
            // The override target must already be uploaded.
            ctx.bytecode_of(id)?;
        }
    }

    let record = bcs::to_bytes(&args.target).expect("target serializes");
    if record.len() as u32 > SYSTEM_CALL_DISPATCH_RECORD_MAX {
        return Err(syscall_error!(ObjectTooLarge;
            "dispatch record of {} bytes exceeds the {} byte cap",
            record.len(), SYSTEM_CALL_DISPATCH_RECORD_MAX));
    }

    let key = syscalls::dispatch_key(args.call_id);
    ctx.put_object(&kernel::system_call_dispatch(), &key, record)?;
    log::info!("system call {} rerouted", args.call_id);
    Ok(Vec::new())
}
