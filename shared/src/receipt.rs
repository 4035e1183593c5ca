// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Receipts, events, and state delta entries.

use serde::{Deserialize, Serialize};

use crate::space::ObjectSpace;
use crate::{Address, BlockId, ContractId, TransactionId};

/// An event emitted during execution. `sequence` is assigned by the
/// chronicler and is dense within a receipt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    pub sequence: u32,
    pub source: ContractId,
    pub name: String,
    pub payload: Vec<u8>,
    pub impacted: Vec<Address>,
}

/// One state write observed by a receipt. `value = None` records a delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDeltaEntry {
    pub space: ObjectSpace,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub id: TransactionId,
    pub payer: Address,
    pub max_payer_rc: u64,
    pub rc_limit: u64,
    pub rc_used: u64,
    pub disk_storage_used: u64,
    pub network_bandwidth_used: u64,
    pub compute_bandwidth_used: u64,
    pub reverted: bool,
    /// Zero on success, otherwise an [`crate::error::ErrorNumber`] value.
    pub code: u32,
    pub events: Vec<EventData>,
    pub logs: Vec<String>,
    pub state_delta_entries: Vec<StateDeltaEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReceipt {
    pub id: BlockId,
    pub height: u64,
    pub disk_storage_used: u64,
    pub network_bandwidth_used: u64,
    pub compute_bandwidth_used: u64,
    /// Compute actually charged against block limits. Differs from
    /// `compute_bandwidth_used` when a compute bandwidth registry entry
    /// rescales an operation class.
    pub compute_bandwidth_charged: u64,
    pub state_merkle_root: Vec<u8>,
    pub events: Vec<EventData>,
    pub transaction_receipts: Vec<TransactionReceipt>,
    pub logs: Vec<String>,
    pub state_delta_entries: Vec<StateDeltaEntry>,
}
