// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The wire-stable error taxonomy.
//!
//! Transaction-scoped numbers appear in transaction receipts; block-scoped
//! numbers are reported to the block submitter. The numeric values are part
//! of the protocol.

use num_derive::FromPrimitive;
use thiserror::Error;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, Error,
)]
#[repr(u32)]
pub enum ErrorNumber {
    // Transaction-scoped: rolled back at the session boundary.
    #[error("unknown thunk")]
    UnknownThunk = 1,
    #[error("unknown system call")]
    UnknownSystemCall = 2,
    #[error("system call is not overridable")]
    SyscallNotOverridable = 3,
    #[error("insufficient privileges")]
    InsufficientPrivileges = 4,
    #[error("insufficient rc")]
    InsufficientRc = 5,
    #[error("argument too large")]
    ArgumentTooLarge = 6,
    #[error("return buffer too small")]
    ReturnBufferTooSmall = 7,
    #[error("tick meter exhausted")]
    TickMeterExhausted = 8,
    #[error("disk storage limit exceeded")]
    DiskStorageExceeded = 9,
    #[error("network bandwidth limit exceeded")]
    NetworkBandwidthExceeded = 10,
    #[error("wasm memory fault")]
    WasmMemoryFault = 11,
    #[error("wasm trap")]
    WasmTrap = 12,
    #[error("invalid nonce")]
    InvalidNonce = 13,
    #[error("authorization failure")]
    AuthorizationFailure = 14,
    #[error("unknown contract")]
    UnknownContract = 15,
    #[error("object exceeds maximum size")]
    ObjectTooLarge = 16,
    #[error("state is read only")]
    ReadOnlyContext = 17,
    #[error("malformed object")]
    MalformedObject = 18,
    #[error("contract reverted")]
    Reverted = 19,
    #[error("invalid chain id")]
    InvalidChainId = 20,
    #[error("call stack overflow")]
    StackOverflow = 21,
    #[error("pending transaction limit exceeded")]
    PendingTransactionLimitExceeded = 22,

    // Block-scoped: the block is rejected, head does not move.
    #[error("unknown previous block")]
    UnknownPreviousBlock = 32,
    #[error("block height mismatch")]
    BlockHeightMismatch = 33,
    #[error("invalid previous id")]
    InvalidPreviousId = 34,
    #[error("invalid signature")]
    InvalidSignature = 35,
    #[error("state merkle root mismatch")]
    StateRootMismatch = 36,
    #[error("transaction merkle root mismatch")]
    TransactionRootMismatch = 37,
    #[error("timestamp out of bounds")]
    TimestampOutOfBounds = 38,
    #[error("malformed block")]
    MalformedBlock = 39,
    #[error("block resources exceeded")]
    BlockResourceExceeded = 40,

    #[error("internal failure")]
    Failure = 255,
}

impl ErrorNumber {
    /// Whether a failure with this number rolls back a single transaction
    /// (as opposed to rejecting the containing block).
    pub fn is_transaction_scoped(&self) -> bool {
        (*self as u32) < 32
    }
}

#[cfg(test)]
mod tests {
    use num_traits::FromPrimitive;

    use super::*;

    #[test]
    fn numbers_round_trip() {
        for n in [
            ErrorNumber::UnknownThunk,
            ErrorNumber::TickMeterExhausted,
            ErrorNumber::UnknownPreviousBlock,
            ErrorNumber::Failure,
        ] {
            assert_eq!(ErrorNumber::from_u32(n as u32), Some(n));
        }
        assert_eq!(ErrorNumber::from_u32(0), None);
    }

    #[test]
    fn scoping_split() {
        assert!(ErrorNumber::InsufficientPrivileges.is_transaction_scoped());
        assert!(!ErrorNumber::BlockHeightMismatch.is_transaction_scoped());
    }
}
