// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Deterministic state rectification.
//!
//! A patch pins a historical (block id, height) and, when that exact block
//! is applied, overrides specific receipt fields and state entries so that
//! replay stays byte-identical with the canonical chain after a discovered
//! anomaly. The mechanism is permanent; the patch list is configuration
//! data supplied to the controller, never hard-coded.

use serde::{Deserialize, Serialize};

use basalt_shared::block::Block;
use basalt_shared::receipt::{BlockReceipt, StateDeltaEntry};
use basalt_shared::BlockId;
use basalt_statedb::{NodeHandle, StateDb};

use crate::error::Result;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatePatch {
    pub block_id: BlockId,
    pub height: u64,
    pub compute_bandwidth_used: Option<u64>,
    pub compute_bandwidth_charged: Option<u64>,
    pub transaction_patches: Vec<TransactionPatch>,
    /// Entries written into the block's state node and substituted into the
    /// matching receipt delta entries.
    pub state_entries: Vec<StateDeltaEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    /// Index into the block's transaction receipts.
    pub index: usize,
    pub compute_bandwidth_used: Option<u64>,
    pub rc_used: Option<u64>,
}

/// Apply any patch matching the block. Runs after transaction application
/// and before the node is finalized, so corrected state flows into the
/// merkle root like any other write.
pub fn maybe_rectify_state(
    db: &StateDb,
    node: NodeHandle,
    block: &Block,
    receipt: &mut BlockReceipt,
    patches: &[StatePatch],
) -> Result<()> {
    for patch in patches {
        if patch.height != block.header.height || patch.block_id != block.id {
            continue;
        }
        log::warn!(
            "rectifying state at block {} height {}",
            hex::encode(&block.id),
            block.header.height
        );

        if let Some(used) = patch.compute_bandwidth_used {
            receipt.compute_bandwidth_used = used;
        }
        if let Some(charged) = patch.compute_bandwidth_charged {
            receipt.compute_bandwidth_charged = charged;
        }
        for tx_patch in &patch.transaction_patches {
            if let Some(tx_receipt) = receipt.transaction_receipts.get_mut(tx_patch.index) {
                if let Some(used) = tx_patch.compute_bandwidth_used {
                    tx_receipt.compute_bandwidth_used = used;
                }
                if let Some(rc) = tx_patch.rc_used {
                    tx_receipt.rc_used = rc;
                }
            }
        }

        for entry in &patch.state_entries {
            match &entry.value {
                Some(value) => {
                    db.put(node, &entry.space, &entry.key, value.clone())?;
                }
                None => {
                    db.erase(node, &entry.space, &entry.key)?;
                }
            }
            for existing in receipt
                .state_delta_entries
                .iter_mut()
                .filter(|e| e.space == entry.space && e.key == entry.key)
            {
                existing.value = entry.value.clone();
            }
        }
    }
    Ok(())
}
