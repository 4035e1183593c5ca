// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The message-bus boundary. The transport lives outside this crate; the
//! controller only needs somewhere to hand completed facts. Implementations
//! are expected to queue and return immediately, since they are called from
//! the block-application path.

use basalt_shared::receipt::BlockReceipt;
use basalt_shared::TransactionId;

use crate::rpc::GetForkHeadsResponse;

pub trait BusClient: Send + Sync {
    fn block_accepted(&self, receipt: &BlockReceipt);
    fn transaction_failed(&self, id: &TransactionId);
    fn fork_heads_updated(&self, heads: &GetForkHeadsResponse);
}
