// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state node not found")]
    NodeNotFound,
    #[error("state node is finalized")]
    NodeFinalized,
    #[error("state node is not finalized")]
    NodeNotFinalized,
    #[error("state node cannot be discarded")]
    CannotDiscard,
    #[error("block id already exists in the tree")]
    DuplicateNodeId,
    #[error("parent node is not finalized")]
    ParentNotFinalized,
    #[error("node height is inconsistent with its parent")]
    HeightMismatch,
    #[error("head must be a finalized node")]
    IllegalHead,
    #[error("no node on the head line at the requested height")]
    NoNodeAtHeight,
    #[error("database is corrupt: {0}")]
    Corruption(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
