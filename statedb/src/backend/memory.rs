// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use super::{Backend, Cursor};
use crate::Result;

/// In-memory ordered backend. Used for tests and for databases opened
/// without a path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    header: Option<Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Backend for MemoryBackend {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    fn find(&self, key: &[u8]) -> Result<Cursor> {
        Ok(Cursor {
            key: self.map.contains_key(key).then(|| key.to_vec()),
        })
    }

    fn lower_bound(&self, key: &[u8]) -> Result<Cursor> {
        Ok(Cursor {
            key: self.map.range(key.to_vec()..).next().map(|(k, _)| k.clone()),
        })
    }

    fn begin(&self) -> Result<Cursor> {
        Ok(Cursor {
            key: self.map.keys().next().cloned(),
        })
    }

    fn next(&self, cursor: &Cursor) -> Result<Cursor> {
        Ok(match cursor.key() {
            Some(k) => Cursor {
                key: self
                    .map
                    .range((Excluded(k.to_vec()), Unbounded))
                    .next()
                    .map(|(k, _)| k.clone()),
            },
            None => Cursor::end(),
        })
    }

    fn prev(&self, cursor: &Cursor) -> Result<Cursor> {
        Ok(match cursor.key() {
            Some(k) => Cursor {
                key: self
                    .map
                    .range((Unbounded, Excluded(k.to_vec())))
                    .next_back()
                    .map(|(k, _)| k.clone()),
            },
            None => Cursor {
                key: self.map.keys().next_back().cloned(),
            },
        })
    }

    fn block_header(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.header.clone())
    }

    fn set_block_header(&mut self, blob: &[u8]) -> Result<()> {
        self.header = Some(blob.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_erase_round_trip() {
        let mut b = MemoryBackend::new();
        b.put(b"k", b"v").unwrap();
        assert_eq!(b.get(b"k").unwrap(), Some(b"v".to_vec()));
        b.erase(b"k").unwrap();
        assert_eq!(b.get(b"k").unwrap(), None);
    }

    #[test]
    fn cursor_stepping() {
        let mut b = MemoryBackend::new();
        for k in [b"a", b"c", b"e"] {
            b.put(k, b"v").unwrap();
        }

        let c = b.lower_bound(b"b").unwrap();
        assert_eq!(c.key(), Some(&b"c"[..]));
        let c = b.next(&c).unwrap();
        assert_eq!(c.key(), Some(&b"e"[..]));
        let c = b.next(&c).unwrap();
        assert!(c.is_end());
        let c = b.prev(&c).unwrap();
        assert_eq!(c.key(), Some(&b"e"[..]));
        let c = b.prev(&b.begin().unwrap()).unwrap();
        assert!(c.is_end());
    }

    #[test]
    fn cursor_survives_unrelated_insert_and_erase_of_current() {
        let mut b = MemoryBackend::new();
        b.put(b"a", b"1").unwrap();
        b.put(b"c", b"2").unwrap();

        let c = b.find(b"a").unwrap();
        b.put(b"b", b"3").unwrap();
        assert_eq!(b.next(&c).unwrap().key(), Some(&b"b"[..]));

        b.erase(b"a").unwrap();
        assert_eq!(b.value(&c).unwrap(), None);
        // Stepping re-seeks from the erased key.
        assert_eq!(b.next(&c).unwrap().key(), Some(&b"b"[..]));
    }

    #[test]
    fn header_blob() {
        let mut b = MemoryBackend::new();
        assert_eq!(b.block_header().unwrap(), None);
        b.set_block_header(b"hdr").unwrap();
        assert_eq!(b.block_header().unwrap(), Some(b"hdr".to_vec()));
    }
}
