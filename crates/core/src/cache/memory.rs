//! In-process [`CacheStorage`].
//!
//! Holds every store in a single `RwLock`, so a batch write is atomic with
//! respect to readers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::storage::CacheStorage;
use crate::Error;
use crate::http::{RequestKey, StoredResponse};

#[derive(Debug, Default)]
struct Store {
    /// Keys in insertion order.
    order: Vec<RequestKey>,
    entries: HashMap<RequestKey, StoredResponse>,
}

impl Store {
    fn insert(&mut self, key: RequestKey, response: StoredResponse) {
        if self.entries.insert(key.clone(), response).is_none() {
            self.order.push(key);
        }
    }
}

/// Stores kept in memory; cloning shares them.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<(String, Store)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find<'a>(stores: &'a [(String, Store)], name: &str) -> Option<&'a Store> {
    stores.iter().find(|(n, _)| n == name).map(|(_, s)| s)
}

fn find_or_create<'a>(stores: &'a mut Vec<(String, Store)>, name: &str) -> &'a mut Store {
    let idx = match stores.iter().position(|(n, _)| n == name) {
        Some(idx) => idx,
        None => {
            stores.push((name.to_string(), Store::default()));
            stores.len() - 1
        }
    };
    &mut stores[idx].1
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        if find(&stores, name).is_some() {
            return Ok(false);
        }
        stores.push((name.to_string(), Store::default()));
        Ok(true)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(find(&self.stores.read().await, name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|(n, _)| n != name);
        Ok(stores.len() != before)
    }

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let stores = self.stores.read().await;
        Ok(find(&stores, name).and_then(|s| s.entries.get(key)).cloned())
    }

    async fn put(&self, name: &str, key: &RequestKey, response: StoredResponse) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        find_or_create(&mut stores, name).insert(key.clone(), response);
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let store = find_or_create(&mut stores, name);
        for (key, response) in entries {
            store.insert(key, response);
        }
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let stores = self.stores.read().await;
        Ok(find(&stores, name).map(|s| s.order.clone()).unwrap_or_default())
    }
}
