// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Types shared between the Basalt execution core, the state database, and
//! external clients.
//!
//! Everything in this crate is wire-stable: values of these types are hashed,
//! signed, or persisted, so changes here are consensus changes.

pub mod block;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod receipt;
pub mod resource;
pub mod space;

/// An opaque block identifier (a digest of the block header).
pub type BlockId = Vec<u8>;

/// An opaque transaction identifier (a digest of the transaction header).
pub type TransactionId = Vec<u8>;

/// An account address. Derived from the compressed public key by hashing; the
/// derivation is opaque to everything but [`crypto`].
pub type Address = Vec<u8>;

/// A contract identifier. Contract ids share the address space with accounts.
pub type ContractId = Vec<u8>;

/// Blocks deeper than this below head are committed to the root backend and
/// become irreversible.
pub const DEFAULT_IRREVERSIBLE_THRESHOLD: u64 = 60;

/// The entry point invoked on an account's contract to authorize a
/// transaction, when one is registered.
pub const AUTHORIZE_ENTRY_POINT: u32 = 0x4a2d_bd90;

/// Largest serialized object the state layer will store.
pub const MAX_OBJECT_SIZE: u32 = 1024 * 1024;

/// Largest system-call dispatch record the table will accept.
pub const SYSTEM_CALL_DISPATCH_RECORD_MAX: u32 = 512;

/// Largest argument blob a thunk accepts.
pub const MAX_ARGUMENT_SIZE: u32 = 1024 * 1024;

/// Compute-tick constants charged per operation class.
pub mod compute_load {
    pub const LIGHT: u64 = 100;
    pub const MEDIUM: u64 = 1_000;
    pub const HEAVY: u64 = 10_000;
}
