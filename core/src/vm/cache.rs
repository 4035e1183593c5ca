// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use wasmtime::{Engine, Module};

use crate::error::Result;
use crate::syscall_error;

/// Compiled modules this many entries deep are kept hot.
pub const DEFAULT_MODULE_CACHE_SIZE: usize = 64;

/// Size-bounded LRU from bytecode id to compiled module. Modules are
/// reference-counted by wasmtime, so a clone out of the cache stays valid
/// after eviction.
pub struct ModuleCache {
    modules: Mutex<LruCache<Vec<u8>, Module>>,
}

impl ModuleCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is nonzero");
        ModuleCache {
            modules: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn load(&self, engine: &Engine, id: &[u8], bytecode: &[u8]) -> Result<Module> {
        let mut modules = self.modules.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(module) = modules.get(id) {
            return Ok(module.clone());
        }
        let module = Module::new(engine, bytecode).map_err(
            |e| syscall_error!(MalformedObject; "bytecode does not parse: {}", e),
        )?;
        modules.put(id.to_vec(), module.clone());
        Ok(module)
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.modules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.modules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_bytes(tag: u32) -> Vec<u8> {
        wat::parse_str(format!("(module (global i32 (i32.const {tag})))")).unwrap()
    }

    #[test]
    fn evicts_least_recently_used_module() {
        let engine = Engine::default();
        let cache = ModuleCache::new(2);

        cache.load(&engine, b"a", &module_bytes(1)).unwrap();
        cache.load(&engine, b"b", &module_bytes(2)).unwrap();
        // Touch `a` so `b` becomes the eviction candidate.
        cache.load(&engine, b"a", &module_bytes(1)).unwrap();
        cache.load(&engine, b"c", &module_bytes(3)).unwrap();

        assert!(cache.contains(b"a"));
        assert!(!cache.contains(b"b"));
        assert!(cache.contains(b"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn rejects_garbage_bytecode() {
        let engine = Engine::default();
        let cache = ModuleCache::new(2);
        assert!(cache.load(&engine, b"x", b"not wasm").is_err());
        assert!(!cache.contains(b"x"));
    }
}
