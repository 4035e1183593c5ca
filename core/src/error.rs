// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The execution error taxonomy.
//!
//! Recoverable failures carry a wire-stable [`ErrorNumber`] and roll back at
//! a session or frame boundary; fatal failures abort the enclosing block or
//! query and indicate a bug or an environmental problem, never contract
//! behavior.

use std::fmt::Display;

use basalt_shared::error::ErrorNumber;

/// Execution result.
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// A recoverable failure: a message for diagnostics plus the wire number
/// reported in receipts.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0} ({1})")]
pub struct SyscallError(pub String, pub ErrorNumber);

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A contract terminated itself. Code zero is a success, anything else
    /// reverts the enclosing transaction.
    #[error("contract exited with code {0}")]
    Exit(i32),
    #[error(transparent)]
    Syscall(#[from] SyscallError),
    #[error("fatal error: {0:#}")]
    Fatal(anyhow::Error),
}

impl ExecutionError {
    pub fn fatal(e: impl Into<anyhow::Error>) -> Self {
        ExecutionError::Fatal(e.into())
    }

    /// Whether the enclosing session can absorb this failure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ExecutionError::Fatal(_))
    }

    /// The receipt code for this failure.
    pub fn number(&self) -> ErrorNumber {
        match self {
            ExecutionError::Exit(0) => ErrorNumber::Failure,
            ExecutionError::Exit(_) => ErrorNumber::Reverted,
            ExecutionError::Syscall(SyscallError(_, num)) => *num,
            ExecutionError::Fatal(_) => ErrorNumber::Failure,
        }
    }
}

impl From<basalt_statedb::Error> for ExecutionError {
    fn from(e: basalt_statedb::Error) -> Self {
        use basalt_statedb::Error::*;
        match e {
            NodeFinalized => {
                ExecutionError::Syscall(SyscallError("state node is finalized".into(), ErrorNumber::ReadOnlyContext))
            }
            NodeNotFound => {
                ExecutionError::Syscall(SyscallError("state node not found".into(), ErrorNumber::UnknownPreviousBlock))
            }
            other => ExecutionError::Fatal(other.into()),
        }
    }
}

impl From<bcs::Error> for ExecutionError {
    fn from(e: bcs::Error) -> Self {
        ExecutionError::Syscall(SyscallError(
            format!("malformed object: {e}"),
            ErrorNumber::MalformedObject,
        ))
    }
}

/// Build a [`SyscallError`] wrapped in an [`ExecutionError`].
#[macro_export]
macro_rules! syscall_error {
    ($number:ident; $msg:literal $(, $ex:expr)*) => {
        $crate::error::ExecutionError::Syscall($crate::error::SyscallError(
            format!($msg $(, $ex)*),
            basalt_shared::error::ErrorNumber::$number,
        ))
    };
}

/// Classify raw results as recoverable syscall errors or fatal errors.
pub trait ClassifyResult: Sized {
    type Ok;
    type Err;

    fn or_error(self, number: ErrorNumber) -> Result<Self::Ok>
    where
        Self::Err: Display;

    fn or_fatal(self) -> Result<Self::Ok>
    where
        Self::Err: Into<anyhow::Error>;
}

impl<T, E> ClassifyResult for std::result::Result<T, E> {
    type Ok = T;
    type Err = E;

    fn or_error(self, number: ErrorNumber) -> Result<T>
    where
        E: Display,
    {
        self.map_err(|e| ExecutionError::Syscall(SyscallError(e.to_string(), number)))
    }

    fn or_fatal(self) -> Result<T>
    where
        E: Into<anyhow::Error>,
    {
        self.map_err(|e| ExecutionError::Fatal(e.into()))
    }
}

impl<T> ClassifyResult for Option<T> {
    type Ok = T;
    type Err = &'static str;

    fn or_error(self, number: ErrorNumber) -> Result<T> {
        self.ok_or_else(|| ExecutionError::Syscall(SyscallError("value missing".into(), number)))
    }

    fn or_fatal(self) -> Result<T> {
        self.ok_or_else(|| ExecutionError::Fatal(anyhow::anyhow!("value missing")))
    }
}

/// Attach context to an execution error, preserving its classification.
pub trait Context {
    type WithContext;
    fn context<D: Display>(self, context: D) -> Self::WithContext;
}

impl<T> Context for Result<T> {
    type WithContext = Result<T>;

    fn context<D: Display>(self, context: D) -> Result<T> {
        self.map_err(|e| match e {
            ExecutionError::Syscall(SyscallError(msg, num)) => {
                ExecutionError::Syscall(SyscallError(format!("{context}: {msg}"), num))
            }
            ExecutionError::Fatal(e) => ExecutionError::Fatal(e.context(context.to_string())),
            exit => exit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let recoverable: Result<()> = Err(syscall_error!(UnknownThunk; "thunk {} not found", 7));
        let err = recoverable.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.number(), ErrorNumber::UnknownThunk);

        let fatal: Result<()> = Err(ExecutionError::fatal(anyhow::anyhow!("disk on fire")));
        assert!(!fatal.unwrap_err().is_recoverable());
    }

    #[test]
    fn context_preserves_number() {
        let r: Result<()> = Err(syscall_error!(InvalidNonce; "expected {}", 3));
        let err = r.context("applying transaction").unwrap_err();
        assert_eq!(err.number(), ErrorNumber::InvalidNonce);
        assert!(err.to_string().contains("applying transaction"));
    }

    #[test]
    fn option_classification() {
        let missing: Option<u32> = None;
        let err = missing.or_error(ErrorNumber::UnknownContract).unwrap_err();
        assert_eq!(err.number(), ErrorNumber::UnknownContract);
    }
}
