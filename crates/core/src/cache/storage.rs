//! The store abstraction consumed by the interceptor.

use async_trait::async_trait;

use crate::Error;
use crate::http::{RequestKey, StoredResponse};

/// A set of named key-value stores mapping request identity to stored response.
///
/// One store per version tag. Implementations must be safe to share between
/// concurrently running intercept tasks; concurrent `put`s to the same key
/// resolve last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if absent. Returns `true` when this call created it.
    async fn open(&self, name: &str) -> Result<bool, Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Store names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and every entry in it. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up a request in one store. A missing store is a miss.
    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error>;

    /// Write one entry, overwriting any previous entry under the same key.
    async fn put(&self, name: &str, key: &RequestKey, response: StoredResponse) -> Result<(), Error>;

    /// Write a batch atomically: either every entry lands or none does.
    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<(), Error>;

    /// Request identities held by one store, in insertion order.
    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error>;
}
