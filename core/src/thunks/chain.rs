// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::context::ExecutionContext;
use crate::error::Result;

use super::types::{GetChainIdReturn, GetHeadInfoReturn, GetLastIrreversibleBlockReturn};

pub fn get_head_info(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let info = match &ctx.block {
        // While a block is being applied, head info describes that block.
        Some(block) => GetHeadInfoReturn {
            id: block.id.clone(),
            previous: block.header.previous.clone(),
            height: block.header.height,
            last_irreversible_block: ctx.db.root().height,
            head_block_time: block.header.timestamp,
        },
        None => {
            let head = ctx.db.head();
            GetHeadInfoReturn {
                id: head.block_id.clone().unwrap_or_default(),
                previous: ctx
                    .db
                    .block_header(head.handle)
                    .ok()
                    .flatten()
                    .map(|h| h.previous)
                    .unwrap_or_default(),
                height: head.height,
                last_irreversible_block: ctx.db.root().height,
                head_block_time: head.timestamp,
            }
        }
    };
    Ok(bcs::to_bytes(&info).expect("return serializes"))
}

pub fn get_chain_id(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let chain_id = ctx.chain_id()?;
    Ok(bcs::to_bytes(&GetChainIdReturn { chain_id }).expect("return serializes"))
}

pub fn get_last_irreversible_block(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let height = ctx.db.root().height;
    Ok(bcs::to_bytes(&GetLastIrreversibleBlockReturn { height }).expect("return serializes"))
}
