// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Argument and return framing for thunks. Everything crossing the host
//! boundary is a bcs blob of one of these types.

use serde::{Deserialize, Serialize};

use basalt_shared::block::{
    Block, CallContractOperation, SetSystemCallOperation, SystemCallTarget, Transaction,
    UploadContractOperation,
};
use basalt_shared::resource::ResourceLimitData;
use basalt_shared::space::ObjectSpace;
use basalt_shared::{Address, BlockId, ContractId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyBlockArguments {
    pub block: Block,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyTransactionArguments {
    pub transaction: Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyUploadContractOperationArguments {
    pub operation: UploadContractOperation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyCallContractOperationArguments {
    pub operation: CallContractOperation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplySetSystemCallOperationArguments {
    pub operation: SetSystemCallOperation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PutObjectArguments {
    pub space: ObjectSpace,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetObjectArguments {
    pub space: ObjectSpace,
    pub key: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetObjectReturn {
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectPairReturn {
    pub entry: Option<(Vec<u8>, Vec<u8>)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogArguments {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventArguments {
    pub name: String,
    pub payload: Vec<u8>,
    pub impacted: Vec<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExitArguments {
    pub code: i32,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetArgumentsReturn {
    pub entry_point: u32,
    pub arguments: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallContractArguments {
    pub contract_id: ContractId,
    pub entry_point: u32,
    pub arguments: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetCallerReturn {
    pub caller: ContractId,
    pub caller_is_kernel: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequireAuthorityArguments {
    pub account: Address,
}

/// Arguments handed to a contract's authorize entry point.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthorizeArguments {
    pub entry_point: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetHeadInfoReturn {
    pub id: BlockId,
    pub previous: BlockId,
    pub height: u64,
    pub last_irreversible_block: u64,
    pub head_block_time: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetChainIdReturn {
    pub chain_id: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetLastIrreversibleBlockReturn {
    pub height: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountArguments {
    pub account: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyAccountNonceArguments {
    pub account: Address,
    pub nonce: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetAccountNonceArguments {
    pub account: Address,
    pub nonce: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumeAccountRcArguments {
    pub account: Address,
    pub rc: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetResourceLimitsReturn {
    pub limits: ResourceLimitData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumeBlockResourcesArguments {
    pub disk_storage: u64,
    pub network_bandwidth: u64,
    pub compute_bandwidth: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HashArguments {
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoverPublicKeyArguments {
    pub signature: Vec<u8>,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifySignatureArguments {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetSystemCallArguments {
    pub call_id: u32,
    pub target: SystemCallTarget,
}
