// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Ordered byte-key/byte-value backends.
//!
//! Two implementations: an in-memory ordered map for tests and ephemeral
//! forks, and a persistent rocksdb engine with a bounded value cache for the
//! committed line. Besides the key/value table a backend carries one opaque
//! block-header blob.

mod memory;
mod rocks;

pub use memory::MemoryBackend;
pub use rocks::RocksBackend;

use crate::Result;

/// A position in a backend's key order.
///
/// Cursors have copy semantics and address a key, not an internal iterator:
/// they stay valid across inserts to other keys, and stepping a cursor whose
/// key was erased re-seeks from that key. `key = None` is the end position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) key: Option<Vec<u8>>,
}

impl Cursor {
    pub fn end() -> Self {
        Cursor { key: None }
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn is_end(&self) -> bool {
        self.key.is_none()
    }
}

pub trait Backend: Send {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn erase(&mut self, key: &[u8]) -> Result<()>;

    /// Cursor at `key` if present, else the end cursor.
    fn find(&self, key: &[u8]) -> Result<Cursor>;
    /// Cursor at the first key `>= key`, else the end cursor.
    fn lower_bound(&self, key: &[u8]) -> Result<Cursor>;
    fn begin(&self) -> Result<Cursor>;
    fn end(&self) -> Cursor {
        Cursor::end()
    }

    /// Cursor at the first key strictly after `cursor`. Stepping the end
    /// cursor stays at end.
    fn next(&self, cursor: &Cursor) -> Result<Cursor>;
    /// Cursor at the last key strictly before `cursor`; stepping back from
    /// the end cursor yields the last key.
    fn prev(&self, cursor: &Cursor) -> Result<Cursor>;

    /// Value at the cursor's key, if the key still exists.
    fn value(&self, cursor: &Cursor) -> Result<Option<Vec<u8>>> {
        match cursor.key() {
            Some(k) => self.get(k),
            None => Ok(None),
        }
    }

    fn block_header(&self) -> Result<Option<Vec<u8>>>;
    fn set_block_header(&mut self, blob: &[u8]) -> Result<()>;
}
