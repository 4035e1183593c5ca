// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Kernel-reserved keys under the metadata space.
//!
//! Each key is the SHA-256 of its qualified name, so new reserved keys can be
//! added without coordinating a numeric registry.

use lazy_static::lazy_static;

use crate::crypto::hash;

fn object_key(name: &str) -> Vec<u8> {
    hash(format!("object_key::{name}").as_bytes()).to_vec()
}

lazy_static! {
    pub static ref HEAD_BLOCK: Vec<u8> = object_key("head_block");
    pub static ref CHAIN_ID: Vec<u8> = object_key("chain_id");
    pub static ref GENESIS_KEY: Vec<u8> = object_key("genesis_key");
    pub static ref RESOURCE_LIMIT_DATA: Vec<u8> = object_key("resource_limit_data");
    pub static ref MAX_ACCOUNT_RESOURCES: Vec<u8> = object_key("max_account_resources");
    pub static ref PROTOCOL_DESCRIPTOR: Vec<u8> = object_key("protocol_descriptor");
    pub static ref COMPUTE_BANDWIDTH_REGISTRY: Vec<u8> = object_key("compute_bandwidth_registry");
    pub static ref BLOCK_HASH_CODE: Vec<u8> = object_key("block_hash_code");
}
