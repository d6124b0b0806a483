use crate::cache::{CacheEntry, Principal, ResultCache};
use crate::error::PipelineError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-local cache. Entries are swapped as whole `Arc`s under a short write lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<Principal, Arc<CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn put(
        &self,
        principal: &Principal,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        let entry = Arc::new(CacheEntry::new(name, bytes));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(principal.clone(), Arc::clone(&entry));
        tracing::debug!(%principal, name, size = entry.metadata.size, "cached result in memory");
        Ok(entry)
    }

    fn get(&self, principal: &Principal) -> Result<Option<Arc<CacheEntry>>, PipelineError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(principal)
            .cloned())
    }
}
