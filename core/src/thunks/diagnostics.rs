// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::context::ExecutionContext;
use crate::error::Result;

use super::types::{EventArguments, LogArguments};

pub fn log(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: LogArguments = bcs::from_bytes(args)?;
    log::debug!("contract {}: {}", hex::encode(ctx.contract_id()), args.message);
    ctx.push_log(args.message);
    Ok(Vec::new())
}

pub fn event(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: EventArguments = bcs::from_bytes(args)?;
    ctx.push_event(args.name, args.payload, args.impacted)?;
    Ok(Vec::new())
}
