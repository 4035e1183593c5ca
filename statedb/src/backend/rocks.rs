// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context as _};
use lru::LruCache;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};

use super::{Backend, Cursor};
use crate::{Error, Result};

const META_CF: &str = "meta";
const HEADER_KEY: &[u8] = b"block_header";

/// Default byte budget for the value cache.
pub const DEFAULT_CACHE_SIZE: usize = 64 << 20;

/// Bounded LRU cache of values keyed by raw key bytes, sized by value bytes.
struct ObjectCache {
    entries: LruCache<Vec<u8>, Arc<Vec<u8>>>,
    size: usize,
    max_size: usize,
}

impl ObjectCache {
    fn new(max_size: usize) -> Self {
        ObjectCache {
            entries: LruCache::unbounded(),
            size: 0,
            max_size,
        }
    }

    fn get(&mut self, key: &[u8]) -> Option<Arc<Vec<u8>>> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Arc<Vec<u8>> {
        if let Some(old) = self.entries.pop(key) {
            self.size -= old.len();
        }
        while self.size + value.len() > self.max_size {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.size -= evicted.len(),
                None => break,
            }
        }
        self.size += value.len();
        let value = Arc::new(value);
        self.entries.put(key.to_vec(), value.clone());
        value
    }

    fn remove(&mut self, key: &[u8]) {
        if let Some(old) = self.entries.pop(key) {
            self.size -= old.len();
        }
    }
}

/// Persistent log-structured backend over rocksdb.
pub struct RocksBackend {
    db: DB,
    cache: Mutex<ObjectCache>,
}

impl RocksBackend {
    pub fn open(path: &Path, reset: bool) -> Result<Self> {
        Self::open_with_cache_size(path, reset, DEFAULT_CACHE_SIZE)
    }

    pub fn open_with_cache_size(path: &Path, reset: bool, cache_size: usize) -> Result<Self> {
        if reset && path.exists() {
            DB::destroy(&Options::default(), path)
                .context("failed to reset state database")
                .map_err(Error::Backend)?;
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(META_CF, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .context("failed to open state database")
            .map_err(Error::Backend)?;

        Ok(RocksBackend {
            db,
            cache: Mutex::new(ObjectCache::new(cache_size)),
        })
    }

    fn meta_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(META_CF)
            .ok_or_else(|| Error::Backend(anyhow!("missing meta column family")))
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ObjectCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Backend for RocksBackend {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .context("rocksdb put failed")
            .map_err(Error::Backend)?;
        self.cache().put(key, value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.cache().get(key) {
            return Ok(Some(value.as_ref().clone()));
        }
        let value = self
            .db
            .get(key)
            .context("rocksdb get failed")
            .map_err(Error::Backend)?;
        if let Some(value) = &value {
            self.cache().put(key, value.clone());
        }
        Ok(value)
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .context("rocksdb delete failed")
            .map_err(Error::Backend)?;
        self.cache().remove(key);
        Ok(())
    }

    fn find(&self, key: &[u8]) -> Result<Cursor> {
        Ok(Cursor {
            key: self.get(key)?.map(|_| key.to_vec()),
        })
    }

    fn lower_bound(&self, key: &[u8]) -> Result<Cursor> {
        let mut iter = self
            .db
            .iterator(IteratorMode::From(key, Direction::Forward));
        match iter.next().transpose().context("rocksdb seek failed")? {
            Some((k, _)) => Ok(Cursor {
                key: Some(k.to_vec()),
            }),
            None => Ok(Cursor::end()),
        }
    }

    fn begin(&self) -> Result<Cursor> {
        let mut iter = self.db.iterator(IteratorMode::Start);
        match iter.next().transpose().context("rocksdb seek failed")? {
            Some((k, _)) => Ok(Cursor {
                key: Some(k.to_vec()),
            }),
            None => Ok(Cursor::end()),
        }
    }

    fn next(&self, cursor: &Cursor) -> Result<Cursor> {
        let Some(key) = cursor.key() else {
            return Ok(Cursor::end());
        };
        let iter = self
            .db
            .iterator(IteratorMode::From(key, Direction::Forward));
        for entry in iter {
            let (k, _) = entry.context("rocksdb scan failed")?;
            if k.as_ref() > key {
                return Ok(Cursor {
                    key: Some(k.to_vec()),
                });
            }
        }
        Ok(Cursor::end())
    }

    fn prev(&self, cursor: &Cursor) -> Result<Cursor> {
        let iter = match cursor.key() {
            Some(key) => self
                .db
                .iterator(IteratorMode::From(key, Direction::Reverse)),
            None => self.db.iterator(IteratorMode::End),
        };
        for entry in iter {
            let (k, _) = entry.context("rocksdb scan failed")?;
            if cursor.key().map_or(true, |key| k.as_ref() < key) {
                return Ok(Cursor {
                    key: Some(k.to_vec()),
                });
            }
        }
        Ok(Cursor::end())
    }

    fn block_header(&self) -> Result<Option<Vec<u8>>> {
        self.db
            .get_cf(self.meta_cf()?, HEADER_KEY)
            .context("rocksdb header read failed")
            .map_err(Error::Backend)
    }

    fn set_block_header(&mut self, blob: &[u8]) -> Result<()> {
        self.db
            .put_cf(self.meta_cf()?, HEADER_KEY, blob)
            .context("rocksdb header write failed")
            .map_err(Error::Backend)
    }
}
