// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The forked state database.
//!
//! A copy-on-write tree of state snapshots keyed by block id. Each node
//! presents an ordered `(space, key) -> value` map materialized as its own
//! delta layer over its parent's view; the root of the tree is backed by a
//! persistent ordered key/value store holding the committed line.

pub mod backend;
pub mod fork;

mod error;
mod key;
mod node;
mod tree;

pub use error::{Error, Result};
pub use fork::{BlockTimeForkChoice, FifoForkChoice, ForkChoice, PobForkChoice};
pub use key::{decode_user_key, encode_key, encode_space_prefix};
pub use node::{HeaderRecord, NodeHandle, NodeSummary, StateKey};
pub use tree::StateDb;
