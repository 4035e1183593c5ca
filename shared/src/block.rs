// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Blocks, transactions, and operations.
//!
//! Identifiers are digests of the bcs-serialized headers; signatures are
//! recoverable signatures over those identifiers.

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::space::ObjectSpace;
use crate::{Address, BlockId, ContractId, TransactionId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Id of the parent block.
    pub previous: BlockId,
    pub height: u64,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
    /// State merkle root of the parent block's state node.
    pub previous_state_merkle_root: Vec<u8>,
    /// Merkle root over the ids of the contained transactions.
    pub transaction_merkle_root: Vec<u8>,
    /// Address of the block producer.
    pub signer: Address,
}

impl BlockHeader {
    /// The block id: the digest of the serialized header.
    pub fn id(&self) -> BlockId {
        let bytes = bcs::to_bytes(self).expect("block header serialization cannot fail");
        crypto::hash(&bytes).to_vec()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Recoverable signature over the block id by the signer.
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Chain this transaction is valid on.
    pub chain_id: Vec<u8>,
    /// Resource credits the payer is willing to spend.
    pub rc_limit: u64,
    /// Must equal the payer's stored nonce + 1.
    pub nonce: u64,
    pub payer: Address,
    /// Account that receives the effects when it differs from the payer.
    pub payee: Option<Address>,
    /// Merkle root over the serialized operations.
    pub operation_merkle_root: Vec<u8>,
}

impl TransactionHeader {
    pub fn id(&self) -> TransactionId {
        let bytes = bcs::to_bytes(self).expect("transaction header serialization cannot fail");
        crypto::hash(&bytes).to_vec()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub header: TransactionHeader,
    pub operations: Vec<Operation>,
    /// Recoverable signatures; the first must recover to the payer.
    pub signatures: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn operation_merkle_root(&self) -> Vec<u8> {
        let leaves: Vec<Vec<u8>> = self
            .operations
            .iter()
            .map(|op| bcs::to_bytes(op).expect("operation serialization cannot fail"))
            .collect();
        crypto::merkle_root(&leaves).to_vec()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    UploadContract(UploadContractOperation),
    CallContract(CallContractOperation),
    SetSystemCall(SetSystemCallOperation),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadContractOperation {
    pub contract_id: ContractId,
    pub bytecode: Vec<u8>,
    /// When set, the contract's authorize entry point is consulted for
    /// transactions paid by this account.
    pub authorizes_transactions: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContractOperation {
    pub contract_id: ContractId,
    pub entry_point: u32,
    pub args: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSystemCallOperation {
    pub call_id: u32,
    pub target: SystemCallTarget,
}

/// Where a system call resolves: the thunk of the same id, a specific thunk,
/// or an overriding contract entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemCallTarget {
    Thunk(u32),
    Contract { id: ContractId, entry_point: u32 },
}

/// Record kept under the contract-metadata space for every uploaded
/// contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    /// Digest of the stored bytecode; doubles as the module-cache key.
    pub hash: Vec<u8>,
    pub authorizes_transactions: bool,
}

/// Initial state planted at height 0 when a database is first opened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisData {
    pub entries: Vec<GenesisEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisEntry {
    pub space: ObjectSpace,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl GenesisData {
    /// The genesis block id: the digest of the serialized genesis entries.
    pub fn block_id(&self) -> BlockId {
        let bytes = bcs::to_bytes(self).expect("genesis data serialization cannot fail");
        crypto::hash(&bytes).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_ids_are_deterministic() {
        let header = BlockHeader {
            previous: vec![1; 32],
            height: 7,
            timestamp: 1000,
            ..Default::default()
        };
        assert_eq!(header.id(), header.id());

        let mut other = header.clone();
        other.height = 8;
        assert_ne!(header.id(), other.id());
    }

    #[test]
    fn operation_merkle_root_tracks_operations() {
        let mut tx = Transaction::default();
        let empty = tx.operation_merkle_root();
        tx.operations
            .push(Operation::CallContract(CallContractOperation {
                contract_id: vec![2; 32],
                entry_point: 1,
                args: vec![],
            }));
        assert_ne!(empty, tx.operation_merkle_root());
    }
}
