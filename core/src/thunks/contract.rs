// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Contract plumbing: frame introspection, cross-contract calls, and the
//! exit unwind.

use crate::context::{ExecutionContext, Privilege};
use crate::error::{ExecutionError, Result};

use super::types::{
    CallContractArguments, ExitArguments, GetArgumentsReturn, GetCallerReturn,
    RequireAuthorityArguments,
};

/// Terminate the current contract invocation. The value becomes the frame
/// result; a nonzero code reverts the enclosing transaction.
pub fn exit_contract(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ExitArguments = bcs::from_bytes(args)?;
    ctx.current_frame_mut()?.result = args.value;
    Err(ExecutionError::Exit(args.code))
}

pub fn get_arguments(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let frame = ctx.current_frame()?;
    let ret = GetArgumentsReturn {
        entry_point: frame.entry_point,
        arguments: frame.arguments.clone(),
    };
    Ok(bcs::to_bytes(&ret).expect("return serializes"))
}

pub fn call_contract(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: CallContractArguments = bcs::from_bytes(args)?;
    let value = ctx.call_contract(
        args.contract_id,
        args.entry_point,
        args.arguments,
        Privilege::User,
    )?;
    Ok(bcs::to_bytes(&value).expect("return serializes"))
}

pub fn get_caller(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let frames = &ctx.frames;
    let caller_is_kernel = if frames.len() >= 2 {
        frames[frames.len() - 2].privilege == Privilege::Kernel
    } else {
        true
    };
    let ret = GetCallerReturn {
        caller: ctx.caller(),
        caller_is_kernel,
    };
    Ok(bcs::to_bytes(&ret).expect("return serializes"))
}

pub fn get_contract_id(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    Ok(bcs::to_bytes(&ctx.contract_id()).expect("return serializes"))
}

pub fn require_authority(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: RequireAuthorityArguments = bcs::from_bytes(args)?;
    ctx.require_authority(&args.account)?;
    Ok(Vec::new())
}
