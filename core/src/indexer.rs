// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Bulk replay.
//!
//! The indexer and the bus client are the only components allowed to block
//! on I/O: a fetch thread pulls batches from a [`BlockProvider`] into a
//! bounded queue while the calling thread drains it through
//! `submit_block_at`, so a slow provider never stalls inside the
//! controller's lock.

use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

use basalt_shared::block::Block;

use crate::controller::Controller;
use crate::error::{ClassifyResult, Result};
use crate::rpc::SubmitBlockRequest;

/// Source of historical blocks, typically a block store reached over the
/// bus. May block.
pub trait BlockProvider: Send + 'static {
    /// Up to `limit` consecutive blocks starting at `height`. An empty
    /// batch ends the replay.
    fn fetch(&mut self, height: u64, limit: usize) -> anyhow::Result<Vec<Block>>;
}

const QUEUE_DEPTH: usize = 64;
const BATCH_SIZE: usize = 512;

pub struct Indexer<P: BlockProvider> {
    controller: Arc<Controller>,
    provider: P,
    target_height: u64,
}

impl<P: BlockProvider> Indexer<P> {
    pub fn new(controller: Arc<Controller>, provider: P, target_height: u64) -> Self {
        Indexer {
            controller,
            provider,
            target_height,
        }
    }

    /// Replay until the provider runs dry or the target height is reached.
    /// Returns the last applied height.
    pub fn index(self) -> Result<u64> {
        let Indexer {
            controller,
            mut provider,
            target_height,
        } = self;

        let start = controller.get_head_info()?.head_topology.height;
        let (sender, receiver) = sync_channel::<Block>(QUEUE_DEPTH);

        let fetcher = thread::spawn(move || -> anyhow::Result<()> {
            let mut height = start + 1;
            loop {
                if target_height > 0 && height > target_height {
                    return Ok(());
                }
                let batch = provider.fetch(height, BATCH_SIZE)?;
                if batch.is_empty() {
                    return Ok(());
                }
                height += batch.len() as u64;
                for block in batch {
                    // A closed receiver means the applier bailed out.
                    if sender.send(block).is_err() {
                        return Ok(());
                    }
                }
            }
        });

        let mut last_height = start;
        let mut apply_error = None;
        for block in receiver.iter() {
            let height = block.header.height;
            match controller.submit_block_at(SubmitBlockRequest { block }, target_height, 0) {
                Ok(_) => last_height = height,
                Err(e) => {
                    apply_error = Some(e);
                    break;
                }
            }
            if last_height % 10_000 == 0 {
                log::info!("indexed {last_height} blocks");
            }
        }
        drop(receiver);

        let fetch_outcome = fetcher.join();
        if let Some(e) = apply_error {
            return Err(e);
        }
        fetch_outcome
            .map_err(|_| anyhow::anyhow!("indexer fetch thread panicked"))
            .or_fatal()?
            .or_fatal()?;

        log::info!("indexing complete at height {last_height}");
        Ok(last_height)
    }
}
