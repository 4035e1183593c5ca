// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Wire-stable thunk identifiers. System calls with no override resolve to
//! the thunk of the same id, so these double as the default system-call ids.

pub const APPLY_BLOCK: u32 = 1;
pub const APPLY_TRANSACTION: u32 = 2;
pub const APPLY_UPLOAD_CONTRACT_OPERATION: u32 = 3;
pub const APPLY_CALL_CONTRACT_OPERATION: u32 = 4;
pub const APPLY_SET_SYSTEM_CALL_OPERATION: u32 = 5;

pub const PUT_OBJECT: u32 = 10;
pub const GET_OBJECT: u32 = 11;
pub const GET_NEXT_OBJECT: u32 = 12;
pub const GET_PREV_OBJECT: u32 = 13;
pub const REMOVE_OBJECT: u32 = 14;

pub const LOG: u32 = 20;
pub const EVENT: u32 = 21;
pub const EXIT_CONTRACT: u32 = 22;
pub const GET_ARGUMENTS: u32 = 23;
pub const CALL_CONTRACT: u32 = 24;
pub const GET_CALLER: u32 = 25;
pub const GET_CONTRACT_ID: u32 = 26;
pub const REQUIRE_AUTHORITY: u32 = 27;

pub const GET_HEAD_INFO: u32 = 30;
pub const GET_CHAIN_ID: u32 = 31;
pub const GET_LAST_IRREVERSIBLE_BLOCK: u32 = 32;

pub const GET_ACCOUNT_NONCE: u32 = 40;
pub const VERIFY_ACCOUNT_NONCE: u32 = 41;
pub const SET_ACCOUNT_NONCE: u32 = 42;
pub const GET_ACCOUNT_RC: u32 = 43;
pub const CONSUME_ACCOUNT_RC: u32 = 44;

pub const GET_RESOURCE_LIMITS: u32 = 50;
pub const CONSUME_BLOCK_RESOURCES: u32 = 51;

pub const HASH: u32 = 60;
pub const RECOVER_PUBLIC_KEY: u32 = 61;
pub const VERIFY_SIGNATURE: u32 = 62;

pub const SET_SYSTEM_CALL: u32 = 70;
