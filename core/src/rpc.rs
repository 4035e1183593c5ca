// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Request/response shapes for the controller's RPC surface. Transport and
//! framing belong to the node daemon; these are plain serde types.

use serde::{Deserialize, Serialize};

use basalt_shared::block::{Block, Transaction};
use basalt_shared::receipt::{BlockReceipt, EventData, TransactionReceipt};
use basalt_shared::resource::ResourceLimitData;
use basalt_shared::{Address, BlockId, ContractId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTopology {
    pub id: BlockId,
    pub height: u64,
    pub previous: BlockId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitBlockRequest {
    pub block: Block,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitBlockResponse {
    pub receipt: BlockReceipt,
}

pub type ProposeBlockRequest = SubmitBlockRequest;

/// Identical shape to a submission, but nothing is finalized.
pub type ProposeBlockResponse = SubmitBlockResponse;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitTransactionRequest {
    pub transaction: Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitTransactionResponse {
    pub receipt: TransactionReceipt,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetHeadInfoResponse {
    pub head_topology: BlockTopology,
    pub last_irreversible_block: u64,
    pub head_block_time: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetChainIdResponse {
    pub chain_id: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetForkHeadsResponse {
    pub fork_heads: Vec<BlockTopology>,
    pub last_irreversible_block: BlockTopology,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadContractRequest {
    pub contract_id: ContractId,
    pub entry_point: u32,
    pub args: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReadContractResponse {
    pub result: Vec<u8>,
    pub logs: Vec<String>,
    pub events: Vec<EventData>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetAccountNonceRequest {
    pub account: Address,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetAccountNonceResponse {
    pub nonce: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetAccountRcRequest {
    pub account: Address,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetAccountRcResponse {
    pub rc: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetResourceLimitsResponse {
    pub limits: ResourceLimitData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvokeSystemCallRequest {
    pub id: u32,
    pub args: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InvokeSystemCallResponse {
    pub value: Vec<u8>,
}
