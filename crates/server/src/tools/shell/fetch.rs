//! shell_fetch tool implementation.
//!
//! Sends one request through the interceptor: store first, then network,
//! then the offline fallback.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interceptor};
use shellcache_core::{CacheStorage, Error, ResponseType};

use crate::tools::{body_text, json_result};

/// Input parameters for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchParams {
    /// Absolute URL, or a path resolved against the app origin (e.g. "./index.html").
    pub url: String,

    /// HTTP method (default: GET). Only GET responses are ever stored.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchOutput {
    /// The request URL after resolution.
    pub url: String,
    /// URL the response was produced for.
    pub response_url: String,
    pub status: u16,
    pub response_type: ResponseType,
    /// cache, network, fallback or unavailable.
    pub source: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the shell_fetch tool.
pub async fn fetch_impl<S, F>(
    interceptor: &Interceptor<S, F>, params: ShellFetchParams,
) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = interceptor.request_for(&params.method, &params.url)?;
    let url = request.url.to_string();
    let served = interceptor.handle(request).await?;

    let response = served.response;
    let bytes = response.body.into_bytes();

    json_result(&ShellFetchOutput {
        url,
        response_url: response.url.to_string(),
        status: response.status,
        response_type: response.response_type,
        source: served.source.as_str().to_string(),
        headers: response.headers,
        body: body_text(&bytes),
        body_bytes: bytes.len(),
    })
}
