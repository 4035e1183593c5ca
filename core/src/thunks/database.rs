// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! State access thunks. Permission and size checks live on the context.

use crate::context::ExecutionContext;
use crate::error::Result;

use super::types::{GetObjectArguments, GetObjectReturn, ObjectPairReturn, PutObjectArguments};

pub fn put_object(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: PutObjectArguments = bcs::from_bytes(args)?;
    let existed = ctx.put_object(&args.space, &args.key, args.value)?;
    Ok(bcs::to_bytes(&existed).expect("return serializes"))
}

pub fn get_object(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: GetObjectArguments = bcs::from_bytes(args)?;
    let value = ctx.get_object(&args.space, &args.key)?;
    Ok(bcs::to_bytes(&GetObjectReturn { value }).expect("return serializes"))
}

pub fn get_next_object(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: GetObjectArguments = bcs::from_bytes(args)?;
    let entry = ctx.get_next_object(&args.space, &args.key)?;
    Ok(bcs::to_bytes(&ObjectPairReturn { entry }).expect("return serializes"))
}

pub fn get_prev_object(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: GetObjectArguments = bcs::from_bytes(args)?;
    let entry = ctx.get_prev_object(&args.space, &args.key)?;
    Ok(bcs::to_bytes(&ObjectPairReturn { entry }).expect("return serializes"))
}

pub fn remove_object(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: GetObjectArguments = bcs::from_bytes(args)?;
    let existed = ctx.remove_object(&args.space, &args.key)?;
    Ok(bcs::to_bytes(&existed).expect("return serializes"))
}
