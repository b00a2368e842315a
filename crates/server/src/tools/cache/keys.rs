//! cache_keys tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interceptor};
use shellcache_core::CacheStorage;

use crate::tools::json_result;

/// One store and the requests it holds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreListing {
    pub name: String,
    /// Entries as "METHOD url", in insertion order.
    pub entries: Vec<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Version tag of the running interceptor.
    pub current: String,
    /// Lifecycle phase of the running interceptor.
    pub phase: String,
    /// Stores in creation order.
    pub stores: Vec<StoreListing>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl<S, F>(interceptor: &Interceptor<S, F>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let storage = interceptor.storage();
    let mut stores = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.entries(&name).await?.iter().map(|k| k.to_string()).collect();
        stores.push(StoreListing { name, entries });
    }

    json_result(&CacheKeysOutput {
        current: interceptor.cache_name().to_string(),
        phase: interceptor.phase().await.as_str().to_string(),
        stores,
    })
}
