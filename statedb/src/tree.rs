// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::path::Path;
use std::sync::RwLock;

use log::{debug, warn};

use basalt_shared::block::{BlockHeader, GenesisData};
use basalt_shared::crypto;
use basalt_shared::receipt::StateDeltaEntry;
use basalt_shared::space::ObjectSpace;
use basalt_shared::BlockId;

use crate::backend::{Backend, Cursor, MemoryBackend, RocksBackend};
use crate::fork::ForkChoice;
use crate::key::{decode_user_key, encode_key};
use crate::node::{HeaderRecord, NodeHandle, NodeSummary, StateKey, StateNode};
use crate::{Error, Result};

/// The forked state database: an arena of copy-on-write nodes over a
/// persistent root backend.
///
/// All methods take `&self`; the arena is guarded by a reader/writer lock.
/// Readers share access to finalized nodes, writers serialize, and head
/// advancement and irreversibility commits hold the lock exclusively.
pub struct StateDb {
    inner: RwLock<Inner>,
}

struct Inner {
    backend: Box<dyn Backend>,
    chooser: Box<dyn ForkChoice>,
    nodes: HashMap<u64, StateNode>,
    by_block: HashMap<BlockId, u64>,
    root: u64,
    head: u64,
    next_handle: u64,
    next_insertion: u64,
}

impl StateDb {
    /// Load or initialize the tree. `path = None` opens an ephemeral
    /// in-memory backend. When the backend carries no committed header the
    /// genesis entries are planted at height 0; `reset` wipes a persistent
    /// backend first.
    pub fn open(
        path: Option<&Path>,
        genesis: &GenesisData,
        chooser: Box<dyn ForkChoice>,
        reset: bool,
    ) -> Result<Self> {
        let mut backend: Box<dyn Backend> = match path {
            Some(p) => Box::new(RocksBackend::open(p, reset)?),
            None => Box::new(MemoryBackend::new()),
        };

        let record = match backend.block_header()? {
            Some(blob) => bcs::from_bytes::<HeaderRecord>(&blob)
                .map_err(|e| Error::Corruption(format!("bad committed header: {e}")))?,
            None => {
                debug!("planting genesis at height 0");
                for entry in &genesis.entries {
                    backend.put(&encode_key(&entry.space, &entry.key), &entry.value)?;
                }
                let record = HeaderRecord {
                    id: genesis.block_id(),
                    header: BlockHeader::default(),
                    merkle_root: genesis.block_id(),
                };
                backend.set_block_header(&bcs::to_bytes(&record).expect("record serializes"))?;
                record
            }
        };

        let root = StateNode {
            block_id: Some(record.id.clone()),
            parent: None,
            height: record.header.height,
            finalized: true,
            insertion: 0,
            delta: Default::default(),
            header: Some(record.header),
            merkle_root: Some(record.merkle_root),
        };

        let mut nodes = HashMap::new();
        nodes.insert(0, root);
        let mut by_block = HashMap::new();
        by_block.insert(record.id, 0);

        Ok(StateDb {
            inner: RwLock::new(Inner {
                backend,
                chooser,
                nodes,
                by_block,
                root: 0,
                head: 0,
                next_handle: 1,
                next_insertion: 1,
            }),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle of the finalized node carrying `block_id`, if present.
    pub fn node(&self, block_id: &[u8]) -> Option<NodeHandle> {
        self.read().by_block.get(block_id).copied().map(NodeHandle)
    }

    pub fn root(&self) -> NodeSummary {
        let inner = self.read();
        inner.summary(inner.root).expect("root always exists")
    }

    pub fn head(&self) -> NodeSummary {
        let inner = self.read();
        inner.summary(inner.head).expect("head always exists")
    }

    pub fn summary(&self, node: NodeHandle) -> Result<NodeSummary> {
        self.read().summary(node.0)
    }

    pub fn block_header(&self, node: NodeHandle) -> Result<Option<BlockHeader>> {
        Ok(self.read().node(node.0)?.header.clone())
    }

    /// The node's state merkle root: the parent root chained with the digest
    /// of this node's delta layer.
    pub fn merkle_root(&self, node: NodeHandle) -> Result<Vec<u8>> {
        let inner = self.read();
        inner.merkle_root(node.0)
    }

    /// All finalized tips, most preferred first per the fork-choice rule.
    pub fn fork_heads(&self) -> Vec<NodeSummary> {
        let inner = self.read();
        let mut tips: Vec<NodeSummary> = inner
            .nodes
            .iter()
            .filter(|(h, n)| n.finalized && !inner.has_finalized_child(**h))
            .map(|(h, _)| inner.summary(*h).expect("node exists"))
            .collect();
        // prefer(a, b) == Greater means b is preferred, which sorts a after b.
        tips.sort_by(|a, b| {
            inner
                .chooser
                .prefer(a, b)
                .then_with(|| a.block_id.cmp(&b.block_id))
        });
        tips
    }

    /// Create an anonymous writable child of `parent`.
    pub fn create_writable_node(&self, parent: NodeHandle) -> Result<NodeHandle> {
        let mut inner = self.write();
        let height = inner.node(parent.0)?.height + 1;
        let handle = inner.next_handle;
        inner.next_handle += 1;
        let insertion = inner.next_insertion;
        inner.next_insertion += 1;
        inner.nodes.insert(
            handle,
            StateNode {
                block_id: None,
                parent: Some(parent.0),
                height,
                finalized: false,
                insertion,
                delta: Default::default(),
                header: None,
                merkle_root: None,
            },
        );
        Ok(NodeHandle(handle))
    }

    /// Atomically assign `block_id` and freeze the node.
    pub fn finalize_node(
        &self,
        node: NodeHandle,
        block_id: BlockId,
        header: BlockHeader,
    ) -> Result<()> {
        let mut inner = self.write();
        if inner.by_block.contains_key(&block_id) {
            return Err(Error::DuplicateNodeId);
        }
        let (parent, height) = {
            let n = inner.node(node.0)?;
            if n.finalized {
                return Err(Error::NodeFinalized);
            }
            (n.parent, n.height)
        };
        let parent = parent.ok_or(Error::NodeNotFound)?;
        let parent_root = {
            let p = inner.node(parent)?;
            if !p.finalized {
                return Err(Error::ParentNotFinalized);
            }
            p.merkle_root.clone().ok_or_else(|| {
                Error::Corruption("finalized parent lacks a merkle root".into())
            })?
        };
        if header.height != height {
            return Err(Error::HeightMismatch);
        }

        let n = inner.node_mut(node.0)?;
        let mut chained = parent_root;
        chained.extend_from_slice(&n.delta_digest());
        n.merkle_root = Some(crypto::hash(&chained).to_vec());
        n.block_id = Some(block_id.clone());
        n.header = Some(header);
        n.finalized = true;
        inner.by_block.insert(block_id, node.0);
        Ok(())
    }

    /// Drop a node. Refused for the root, for any node on the head line, and
    /// for nodes with live descendants.
    pub fn discard_node(&self, node: NodeHandle) -> Result<()> {
        let mut inner = self.write();
        inner.node(node.0)?;
        if node.0 == inner.root || inner.on_head_line(node.0) || inner.has_child(node.0) {
            return Err(Error::CannotDiscard);
        }
        let removed = inner.nodes.remove(&node.0).expect("checked above");
        if let Some(id) = removed.block_id {
            warn!("discarding state node {}", hex::encode(&id));
            inner.by_block.remove(&id);
        }
        Ok(())
    }

    /// Fold an anonymous node's delta into its writable parent and remove
    /// it. This is how per-transaction nodes commit into their block node.
    pub fn squash_node(&self, node: NodeHandle) -> Result<()> {
        let mut inner = self.write();
        let parent = {
            let n = inner.node(node.0)?;
            if n.finalized {
                return Err(Error::NodeFinalized);
            }
            n.parent.ok_or(Error::CannotDiscard)?
        };
        if inner.node(parent)?.finalized {
            return Err(Error::NodeFinalized);
        }
        if inner.has_child(node.0) {
            return Err(Error::CannotDiscard);
        }
        let delta = inner.nodes.remove(&node.0).expect("checked above").delta;
        inner.node_mut(parent)?.delta.extend(delta);
        Ok(())
    }

    /// Move head to a finalized node.
    pub fn set_head(&self, node: NodeHandle) -> Result<()> {
        let mut inner = self.write();
        if !inner.node(node.0)?.finalized {
            return Err(Error::IllegalHead);
        }
        inner.head = node.0;
        Ok(())
    }

    /// Consult the fork-choice rule and advance head to `candidate` when it
    /// is preferred. Returns whether head moved.
    pub fn maybe_advance_head(&self, candidate: NodeHandle) -> Result<bool> {
        let mut inner = self.write();
        if !inner.node(candidate.0)?.finalized {
            return Err(Error::IllegalHead);
        }
        if candidate.0 == inner.head {
            return Ok(false);
        }
        let current = inner.summary(inner.head)?;
        let next = inner.summary(candidate.0)?;
        let preferred = match inner.chooser.prefer(&current, &next) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            // Tie: lexicographically smaller block id wins.
            std::cmp::Ordering::Equal => next.block_id < current.block_id,
        };
        if preferred {
            inner.head = candidate.0;
        }
        Ok(preferred)
    }

    /// Squash the head-line prefix at `height` into the root backend and
    /// prune everything that does not descend from it.
    pub fn commit_irreversible(&self, height: u64) -> Result<NodeSummary> {
        let mut inner = self.write();
        let root_height = inner.node(inner.root)?.height;
        if height <= root_height {
            return inner.summary(inner.root);
        }

        // Walk the head line down to the commit target.
        let mut target = inner.head;
        loop {
            let n = inner.node(target)?;
            if n.height == height {
                break;
            }
            target = n.parent.ok_or(Error::NoNodeAtHeight)?;
        }

        // Merge path deltas oldest-first so nearer layers override.
        let mut path = Vec::new();
        let mut walk = target;
        while walk != inner.root {
            path.push(walk);
            walk = inner.node(walk)?.parent.ok_or_else(|| {
                Error::Corruption("commit target does not descend from root".into())
            })?;
        }
        path.reverse();
        for handle in &path {
            let delta: Vec<(StateKey, Option<Vec<u8>>)> = inner
                .node(*handle)?
                .delta
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (sk, value) in delta {
                let flat = encode_key(&sk.space, &sk.key);
                match value {
                    Some(v) => inner.backend.put(&flat, &v)?,
                    None => inner.backend.erase(&flat)?,
                }
            }
        }

        let record = {
            let n = inner.node(target)?;
            HeaderRecord {
                id: n.block_id.clone().ok_or_else(|| {
                    Error::Corruption("finalized node lacks a block id".into())
                })?,
                header: n
                    .header
                    .clone()
                    .ok_or_else(|| Error::Corruption("finalized node lacks a header".into()))?,
                merkle_root: n
                    .merkle_root
                    .clone()
                    .ok_or_else(|| Error::Corruption("finalized node lacks a root".into()))?,
            }
        };
        inner
            .backend
            .set_block_header(&bcs::to_bytes(&record).expect("record serializes"))?;
        debug!(
            "committed block {} at height {} to the root backend",
            hex::encode(&record.id),
            height
        );

        // Keep the target and its descendants; everything else dies with
        // the branches it belonged to.
        let keep: Vec<u64> = inner
            .nodes
            .keys()
            .copied()
            .filter(|h| inner.descends_from(*h, target))
            .collect();
        let keep: std::collections::HashSet<u64> = keep.into_iter().collect();
        inner.nodes.retain(|h, _| keep.contains(h));
        inner.by_block.retain(|_, h| keep.contains(h));

        let new_root = inner.node_mut(target)?;
        new_root.parent = None;
        new_root.delta.clear();
        inner.root = target;
        if !keep.contains(&inner.head) {
            inner.head = target;
        }

        inner.summary(target)
    }

    /// Overlay lookup: nearest ancestor entry not shadowed by a tombstone.
    pub fn get(&self, node: NodeHandle, space: &ObjectSpace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.read();
        inner.resolve(node.0, space, key)
    }

    /// First live entry with user key strictly greater than `key`.
    pub fn get_next(
        &self,
        node: NodeHandle,
        space: &ObjectSpace,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let inner = self.read();
        inner.merged_next(node.0, space, key)
    }

    /// Last live entry with user key strictly less than `key`.
    pub fn get_prev(
        &self,
        node: NodeHandle,
        space: &ObjectSpace,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let inner = self.read();
        inner.merged_prev(node.0, space, key)
    }

    /// Live entries in `[low, high)`; `high = None` scans to the end of the
    /// space.
    pub fn range(
        &self,
        node: NodeHandle,
        space: &ObjectSpace,
        low: &[u8],
        high: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.read();
        let mut out = Vec::new();
        if high.map_or(true, |h| low < h) {
            if let Some(value) = inner.resolve(node.0, space, low)? {
                out.push((low.to_vec(), value));
            }
        }
        let mut cursor = low.to_vec();
        while let Some((k, v)) = inner.merged_next(node.0, space, &cursor)? {
            if high.is_some_and(|h| k.as_slice() >= h) {
                break;
            }
            cursor.clone_from(&k);
            out.push((k, v));
        }
        Ok(out)
    }

    /// Write a value. Returns the previous size of the entry as seen through
    /// the overlay, for disk accounting.
    pub fn put(
        &self,
        node: NodeHandle,
        space: &ObjectSpace,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<Option<usize>> {
        let mut inner = self.write();
        if inner.node(node.0)?.finalized {
            return Err(Error::NodeFinalized);
        }
        let prev = inner.resolve(node.0, space, key)?.map(|v| v.len());
        inner
            .node_mut(node.0)?
            .delta
            .insert(StateKey::new(space.clone(), key), Some(value));
        Ok(prev)
    }

    /// Record a tombstone. Returns the previous size, if the key was live.
    pub fn erase(
        &self,
        node: NodeHandle,
        space: &ObjectSpace,
        key: &[u8],
    ) -> Result<Option<usize>> {
        let mut inner = self.write();
        if inner.node(node.0)?.finalized {
            return Err(Error::NodeFinalized);
        }
        let prev = inner.resolve(node.0, space, key)?.map(|v| v.len());
        inner
            .node_mut(node.0)?
            .delta
            .insert(StateKey::new(space.clone(), key), None);
        Ok(prev)
    }

    /// The node's own delta layer as receipt entries.
    pub fn delta_entries(&self, node: NodeHandle) -> Result<Vec<StateDeltaEntry>> {
        let inner = self.read();
        Ok(inner
            .node(node.0)?
            .delta
            .iter()
            .map(|(sk, v)| StateDeltaEntry {
                space: sk.space.clone(),
                key: sk.key.clone(),
                value: v.clone(),
            })
            .collect())
    }
}

impl Inner {
    fn node(&self, handle: u64) -> Result<&StateNode> {
        self.nodes.get(&handle).ok_or(Error::NodeNotFound)
    }

    fn node_mut(&mut self, handle: u64) -> Result<&mut StateNode> {
        self.nodes.get_mut(&handle).ok_or(Error::NodeNotFound)
    }

    fn summary(&self, handle: u64) -> Result<NodeSummary> {
        let n = self.node(handle)?;
        Ok(NodeSummary {
            handle: NodeHandle(handle),
            block_id: n.block_id.clone(),
            height: n.height,
            timestamp: n.header.as_ref().map(|h| h.timestamp).unwrap_or_default(),
            insertion: n.insertion,
            finalized: n.finalized,
        })
    }

    fn merkle_root(&self, handle: u64) -> Result<Vec<u8>> {
        let n = self.node(handle)?;
        if let Some(root) = &n.merkle_root {
            return Ok(root.clone());
        }
        let parent = n
            .parent
            .ok_or_else(|| Error::Corruption("root lacks a merkle root".into()))?;
        let mut chained = self.merkle_root(parent)?;
        chained.extend_from_slice(&n.delta_digest());
        Ok(crypto::hash(&chained).to_vec())
    }

    fn has_child(&self, handle: u64) -> bool {
        self.nodes.values().any(|n| n.parent == Some(handle))
    }

    fn has_finalized_child(&self, handle: u64) -> bool {
        self.nodes
            .values()
            .any(|n| n.finalized && n.parent == Some(handle))
    }

    fn on_head_line(&self, handle: u64) -> bool {
        let mut walk = Some(self.head);
        while let Some(h) = walk {
            if h == handle {
                return true;
            }
            walk = self.nodes.get(&h).and_then(|n| n.parent);
        }
        false
    }

    fn descends_from(&self, handle: u64, ancestor: u64) -> bool {
        let mut walk = Some(handle);
        while let Some(h) = walk {
            if h == ancestor {
                return true;
            }
            walk = self.nodes.get(&h).and_then(|n| n.parent);
        }
        false
    }

    /// The ancestor chain from `handle` to the root, nearest first.
    fn chain(&self, handle: u64) -> Result<Vec<u64>> {
        let mut chain = Vec::new();
        let mut walk = Some(handle);
        while let Some(h) = walk {
            self.node(h)?;
            chain.push(h);
            walk = self.node(h)?.parent;
        }
        Ok(chain)
    }

    fn resolve(&self, handle: u64, space: &ObjectSpace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let sk = StateKey::new(space.clone(), key);
        for h in self.chain(handle)? {
            if let Some(entry) = self.node(h)?.delta.get(&sk) {
                return Ok(entry.clone());
            }
        }
        self.backend.get(&encode_key(space, key))
    }

    fn merged_next(
        &self,
        handle: u64,
        space: &ObjectSpace,
        start: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let chain = self.chain(handle)?;
        let mut cursor = start.to_vec();
        loop {
            let mut best: Option<Vec<u8>> = None;

            let bound = StateKey::new(space.clone(), cursor.clone());
            for h in &chain {
                let candidate = self
                    .node(*h)?
                    .delta
                    .range((Excluded(bound.clone()), Unbounded))
                    .next()
                    .filter(|(k, _)| &k.space == space)
                    .map(|(k, _)| k.key.clone());
                best = min_key(best, candidate);
            }

            // Smallest backend key strictly greater than the cursor: seek to
            // the cursor's immediate successor in byte order.
            let mut succ = encode_key(space, &cursor);
            succ.push(0);
            let c = self.backend.lower_bound(&succ)?;
            let backend_candidate = c
                .key()
                .and_then(|flat| decode_user_key(space, flat))
                .map(|k| k.to_vec());
            best = min_key(best, backend_candidate);

            match best {
                None => return Ok(None),
                Some(k) => match self.resolve(handle, space, &k)? {
                    Some(v) => return Ok(Some((k, v))),
                    None => cursor = k,
                },
            }
        }
    }

    fn merged_prev(
        &self,
        handle: u64,
        space: &ObjectSpace,
        start: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let chain = self.chain(handle)?;
        let mut cursor = start.to_vec();
        loop {
            let mut best: Option<Vec<u8>> = None;

            let bound = StateKey::new(space.clone(), cursor.clone());
            for h in &chain {
                let candidate = self
                    .node(*h)?
                    .delta
                    .range((Unbounded, Excluded(bound.clone())))
                    .next_back()
                    .filter(|(k, _)| &k.space == space)
                    .map(|(k, _)| k.key.clone());
                best = max_key(best, candidate);
            }

            let c = self.backend.prev(&Cursor {
                key: Some(encode_key(space, &cursor)),
            })?;
            let backend_candidate = c
                .key()
                .and_then(|flat| decode_user_key(space, flat))
                .map(|k| k.to_vec());
            best = max_key(best, backend_candidate);

            match best {
                None => return Ok(None),
                Some(k) => match self.resolve(handle, space, &k)? {
                    Some(v) => return Ok(Some((k, v))),
                    None => cursor = k,
                },
            }
        }
    }
}

fn min_key(a: Option<Vec<u8>>, b: Option<Vec<u8>>) -> Option<Vec<u8>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_key(a: Option<Vec<u8>>, b: Option<Vec<u8>>) -> Option<Vec<u8>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use basalt_shared::block::GenesisEntry;

    use super::*;
    use crate::fork::{BlockTimeForkChoice, FifoForkChoice};

    fn space() -> ObjectSpace {
        ObjectSpace::new(b"test-zone".to_vec(), 0, false)
    }

    fn genesis() -> GenesisData {
        GenesisData {
            entries: vec![GenesisEntry {
                space: space(),
                key: b"seed".to_vec(),
                value: b"genesis-value".to_vec(),
            }],
        }
    }

    fn open() -> StateDb {
        StateDb::open(None, &genesis(), Box::new(FifoForkChoice), false).unwrap()
    }

    fn finalize(db: &StateDb, node: NodeHandle, tag: u8) -> BlockId {
        let parent_height = {
            let inner = db.read();
            inner.node(node.0).unwrap().height
        };
        let header = BlockHeader {
            previous: vec![],
            height: parent_height,
            timestamp: tag as u64 * 100,
            ..Default::default()
        };
        let id = vec![tag; 32];
        db.finalize_node(node, id.clone(), header).unwrap();
        id
    }

    #[test]
    fn genesis_is_planted_at_open() {
        let db = open();
        let root = db.root();
        assert_eq!(root.height, 0);
        assert!(root.finalized);
        assert_eq!(
            db.get(root.handle, &space(), b"seed").unwrap(),
            Some(b"genesis-value".to_vec())
        );
    }

    #[test]
    fn overlay_lookup_masks_with_tombstones() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        db.put(a, &space(), b"k", b"v1".to_vec()).unwrap();
        finalize(&db, a, 1);

        let b = db.create_writable_node(a).unwrap();
        assert_eq!(db.get(b, &space(), b"k").unwrap(), Some(b"v1".to_vec()));
        db.erase(b, &space(), b"k").unwrap();
        assert_eq!(db.get(b, &space(), b"k").unwrap(), None);
        // Parent view unchanged.
        assert_eq!(db.get(a, &space(), b"k").unwrap(), Some(b"v1".to_vec()));
        // Seed from the backend still resolves through both layers.
        assert_eq!(
            db.get(b, &space(), b"seed").unwrap(),
            Some(b"genesis-value".to_vec())
        );
        db.erase(b, &space(), b"seed").unwrap();
        assert_eq!(db.get(b, &space(), b"seed").unwrap(), None);
    }

    #[test]
    fn merge_scan_deduplicates_by_nearest_ancestor() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        db.put(a, &space(), b"a", b"1".to_vec()).unwrap();
        db.put(a, &space(), b"c", b"parent".to_vec()).unwrap();
        finalize(&db, a, 1);

        let b = db.create_writable_node(a).unwrap();
        db.put(b, &space(), b"c", b"child".to_vec()).unwrap();
        db.put(b, &space(), b"e", b"3".to_vec()).unwrap();
        db.erase(b, &space(), b"seed").unwrap();

        let all = db.range(b, &space(), b"", None).unwrap();
        assert_eq!(
            all,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"c".to_vec(), b"child".to_vec()),
                (b"e".to_vec(), b"3".to_vec()),
            ]
        );

        assert_eq!(
            db.get_next(b, &space(), b"a").unwrap(),
            Some((b"c".to_vec(), b"child".to_vec()))
        );
        assert_eq!(
            db.get_prev(b, &space(), b"c").unwrap(),
            Some((b"a".to_vec(), b"1".to_vec()))
        );
        assert_eq!(db.get_prev(b, &space(), b"a").unwrap(), None);
    }

    #[test]
    fn discarding_anonymous_child_leaves_parent_intact() {
        let db = open();
        let root = db.root().handle;
        let before = db.range(root, &space(), b"", None).unwrap();

        let child = db.create_writable_node(root).unwrap();
        db.put(child, &space(), b"junk", b"junk".to_vec()).unwrap();
        db.discard_node(child).unwrap();

        assert_eq!(db.range(root, &space(), b"", None).unwrap(), before);
        assert!(matches!(
            db.get(child, &space(), b"junk"),
            Err(Error::NodeNotFound)
        ));
    }

    #[test]
    fn finalize_rejects_duplicates_and_double_finalize() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        let id = finalize(&db, a, 1);

        let b = db.create_writable_node(db.root().handle).unwrap();
        assert!(matches!(
            db.finalize_node(
                b,
                id,
                BlockHeader {
                    height: 1,
                    ..Default::default()
                }
            ),
            Err(Error::DuplicateNodeId)
        ));
        assert!(matches!(
            db.finalize_node(
                a,
                vec![9; 32],
                BlockHeader {
                    height: 1,
                    ..Default::default()
                }
            ),
            Err(Error::NodeFinalized)
        ));
        // Height must match the node's position in the tree.
        assert!(matches!(
            db.finalize_node(
                b,
                vec![8; 32],
                BlockHeader {
                    height: 7,
                    ..Default::default()
                }
            ),
            Err(Error::HeightMismatch)
        ));
    }

    #[test]
    fn writes_to_finalized_nodes_fail() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        finalize(&db, a, 1);
        assert!(matches!(
            db.put(a, &space(), b"k", b"v".to_vec()),
            Err(Error::NodeFinalized)
        ));
        assert!(matches!(
            db.erase(a, &space(), b"k"),
            Err(Error::NodeFinalized)
        ));
    }

    #[test]
    fn head_advances_by_block_time_and_reorg_discard_restores() {
        let db = StateDb::open(None, &genesis(), Box::new(BlockTimeForkChoice), false).unwrap();
        let root = db.root().handle;

        let b1 = db.create_writable_node(root).unwrap();
        db.put(b1, &space(), b"who", b"b1".to_vec()).unwrap();
        finalize(&db, b1, 5); // timestamp 500
        assert!(db.maybe_advance_head(b1).unwrap());
        assert_eq!(db.head().block_id, Some(vec![5; 32]));

        // Earlier sibling wins under block-time.
        let b1p = db.create_writable_node(root).unwrap();
        db.put(b1p, &space(), b"who", b"b1p".to_vec()).unwrap();
        finalize(&db, b1p, 2); // timestamp 200
        assert!(db.maybe_advance_head(b1p).unwrap());
        assert_eq!(db.head().block_id, Some(vec![2; 32]));

        let heads = db.fork_heads();
        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0].block_id, Some(vec![2; 32]));

        // The losing branch can be discarded, restoring a single tip.
        db.discard_node(b1).unwrap();
        assert_eq!(db.fork_heads().len(), 1);
        assert_eq!(db.get(b1p, &space(), b"who").unwrap(), Some(b"b1p".to_vec()));
    }

    #[test]
    fn discard_refuses_head_line_and_parents() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        finalize(&db, a, 1);
        db.set_head(a).unwrap();

        assert!(matches!(db.discard_node(a), Err(Error::CannotDiscard)));
        assert!(matches!(
            db.discard_node(db.root().handle),
            Err(Error::CannotDiscard)
        ));

        let b = db.create_writable_node(a).unwrap();
        finalize(&db, b, 2);
        // `a` now has a descendant and is off-head only if head moved past it.
        db.set_head(b).unwrap();
        assert!(matches!(db.discard_node(a), Err(Error::CannotDiscard)));
    }

    #[test]
    fn commit_irreversible_squashes_and_prunes() {
        let db = open();
        let root = db.root().handle;

        let a = db.create_writable_node(root).unwrap();
        db.put(a, &space(), b"x", b"a".to_vec()).unwrap();
        finalize(&db, a, 1);
        db.set_head(a).unwrap();

        // Sibling fork that must die at commit.
        let f = db.create_writable_node(root).unwrap();
        db.put(f, &space(), b"x", b"fork".to_vec()).unwrap();
        let fork_id = finalize(&db, f, 9);

        let b = db.create_writable_node(a).unwrap();
        db.put(b, &space(), b"y", b"b".to_vec()).unwrap();
        db.erase(b, &space(), b"seed").unwrap();
        finalize(&db, b, 2);
        db.set_head(b).unwrap();

        let committed = db.commit_irreversible(1).unwrap();
        assert_eq!(committed.block_id, Some(vec![1; 32]));
        assert_eq!(db.root().block_id, Some(vec![1; 32]));
        assert!(db.node(&fork_id).is_none());

        // The committed delta is in the backend and still visible.
        assert_eq!(db.get(db.root().handle, &space(), b"x").unwrap(), Some(b"a".to_vec()));
        // Head and its delta survive.
        assert_eq!(db.get(b, &space(), b"y").unwrap(), Some(b"b".to_vec()));
        assert_eq!(db.get(b, &space(), b"seed").unwrap(), None);
        assert_eq!(db.head().block_id, Some(vec![2; 32]));

        // Committing at or below the root height is a no-op.
        let again = db.commit_irreversible(1).unwrap();
        assert_eq!(again.block_id, Some(vec![1; 32]));
    }

    #[test]
    fn squash_folds_child_into_writable_parent() {
        let db = open();
        let block_node = db.create_writable_node(db.root().handle).unwrap();
        db.put(block_node, &space(), b"block", b"b".to_vec()).unwrap();

        let tx_node = db.create_writable_node(block_node).unwrap();
        db.put(tx_node, &space(), b"tx", b"t".to_vec()).unwrap();
        db.erase(tx_node, &space(), b"seed").unwrap();

        db.squash_node(tx_node).unwrap();
        // The child is gone; its writes and tombstones live on the parent.
        assert!(matches!(
            db.get(tx_node, &space(), b"tx"),
            Err(Error::NodeNotFound)
        ));
        assert_eq!(db.get(block_node, &space(), b"tx").unwrap(), Some(b"t".to_vec()));
        assert_eq!(db.get(block_node, &space(), b"seed").unwrap(), None);
        assert_eq!(db.get(block_node, &space(), b"block").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn squash_into_finalized_parent_fails() {
        let db = open();
        let a = db.create_writable_node(db.root().handle).unwrap();
        finalize(&db, a, 1);
        let child = db.create_writable_node(a).unwrap();
        assert!(matches!(db.squash_node(child), Err(Error::NodeFinalized)));
    }

    #[test]
    fn block_determinism_same_writes_same_root() {
        let run = || {
            let db = open();
            let a = db.create_writable_node(db.root().handle).unwrap();
            db.put(a, &space(), b"k1", b"v1".to_vec()).unwrap();
            db.put(a, &space(), b"k2", b"v2".to_vec()).unwrap();
            db.erase(a, &space(), b"seed").unwrap();
            finalize(&db, a, 1);
            db.merkle_root(a).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn persistent_reopen_sees_committed_line() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = StateDb::open(
                Some(dir.path()),
                &genesis(),
                Box::new(FifoForkChoice),
                false,
            )
            .unwrap();
            let a = db.create_writable_node(db.root().handle).unwrap();
            db.put(a, &space(), b"persisted", b"yes".to_vec()).unwrap();
            finalize(&db, a, 1);
            db.set_head(a).unwrap();
            db.commit_irreversible(1).unwrap();
        }
        let db = StateDb::open(
            Some(dir.path()),
            &genesis(),
            Box::new(FifoForkChoice),
            false,
        )
        .unwrap();
        assert_eq!(db.root().height, 1);
        assert_eq!(
            db.get(db.root().handle, &space(), b"persisted").unwrap(),
            Some(b"yes".to_vec())
        );
    }
}
