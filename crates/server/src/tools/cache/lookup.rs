//! cache_match tool implementation.
//!
//! Looks up one stored response by request URL.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interceptor};
use shellcache_core::{CacheStorage, Error, ResponseType};

use crate::tools::{body_text, json_result};

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Request URL, absolute or relative to the app origin.
    pub url: String,

    /// Store to search (default: the current version).
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub cache_name: String,
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_match tool.
pub async fn match_impl<S, F>(
    interceptor: &Interceptor<S, F>, params: CacheMatchParams,
) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let cache_name = params.cache_name.unwrap_or_else(|| interceptor.cache_name().to_string());
    let key = interceptor.request_for("GET", &params.url)?.key();

    let stored = interceptor
        .storage()
        .match_entry(&cache_name, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {cache_name}")))?;

    json_result(&CacheMatchOutput {
        cache_name,
        url: stored.url.to_string(),
        status: stored.status,
        response_type: stored.response_type,
        body: body_text(&stored.body),
        body_bytes: stored.body.len(),
        headers: stored.headers,
        stored_at: stored.stored_at,
    })
}
