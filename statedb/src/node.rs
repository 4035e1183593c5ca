// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use basalt_shared::block::BlockHeader;
use basalt_shared::crypto;
use basalt_shared::space::ObjectSpace;
use basalt_shared::BlockId;

/// Stable handle to a node in the state tree arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub(crate) u64);

/// A `(space, key)` pair. Orders by space first, then user key, matching the
/// flat backend encoding within any one space.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub space: ObjectSpace,
    pub key: Vec<u8>,
}

impl StateKey {
    pub fn new(space: ObjectSpace, key: impl Into<Vec<u8>>) -> Self {
        StateKey {
            space,
            key: key.into(),
        }
    }
}

/// The backend's single non-KV record: the last committed block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub id: BlockId,
    pub header: BlockHeader,
    pub merkle_root: Vec<u8>,
}

/// Node metadata handed to callers and fork-choice comparators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSummary {
    pub handle: NodeHandle,
    pub block_id: Option<BlockId>,
    pub height: u64,
    pub timestamp: u64,
    /// Arena insertion order; drives FIFO fork choice.
    pub insertion: u64,
    pub finalized: bool,
}

/// One snapshot in the tree. The delta layer maps keys to a value or a
/// tombstone (`None`) masking the parent's entry.
pub(crate) struct StateNode {
    pub block_id: Option<BlockId>,
    pub parent: Option<u64>,
    pub height: u64,
    pub finalized: bool,
    pub insertion: u64,
    pub delta: BTreeMap<StateKey, Option<Vec<u8>>>,
    pub header: Option<BlockHeader>,
    pub merkle_root: Option<Vec<u8>>,
}

impl StateNode {
    /// Digest of this node's delta layer, chained onto the parent root by
    /// the tree when the node is finalized.
    pub fn delta_digest(&self) -> Vec<u8> {
        let entries: Vec<(&StateKey, &Option<Vec<u8>>)> = self.delta.iter().collect();
        let bytes = bcs::to_bytes(&entries).expect("delta serialization cannot fail");
        crypto::hash(&bytes).to_vec()
    }
}
