use crate::domain::model::{CacheEntry, CacheKey};
use crate::domain::ports::GeocodeCache;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local cache. Used in tests and when no Supabase project is
/// configured; contents are gone when the run ends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl GeocodeCache for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&key.cache_id()).cloned())
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.cache_id(), entry);
        Ok(())
    }
}
