// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::syscall_error;

use super::types::{
    AccountArguments, ConsumeAccountRcArguments, SetAccountNonceArguments,
    VerifyAccountNonceArguments,
};

pub fn get_account_nonce(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: AccountArguments = bcs::from_bytes(args)?;
    let nonce = ctx.account_nonce(&args.account)?;
    Ok(bcs::to_bytes(&nonce).expect("return serializes"))
}

/// A transaction nonce is valid when it is exactly the stored nonce plus one.
pub fn verify_account_nonce(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: VerifyAccountNonceArguments = bcs::from_bytes(args)?;
    let stored = ctx.account_nonce(&args.account)?;
    if args.nonce != stored + 1 {
        return Err(syscall_error!(InvalidNonce;
            "expected nonce {}, got {}", stored + 1, args.nonce));
    }
    Ok(bcs::to_bytes(&true).expect("return serializes"))
}

pub fn set_account_nonce(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: SetAccountNonceArguments = bcs::from_bytes(args)?;
    ctx.set_account_nonce(&args.account, args.nonce)?;
    Ok(Vec::new())
}

pub fn get_account_rc(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: AccountArguments = bcs::from_bytes(args)?;
    let rc = ctx.account_rc(&args.account)?;
    Ok(bcs::to_bytes(&rc).expect("return serializes"))
}

pub fn consume_account_rc(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ConsumeAccountRcArguments = bcs::from_bytes(args)?;
    ctx.consume_account_rc(&args.account, args.rc)?;
    Ok(bcs::to_bytes(&true).expect("return serializes"))
}
