//! shell_activate tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interceptor};
use shellcache_core::CacheStorage;

use crate::tools::json_result;

/// Output from the shell_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellActivateOutput {
    /// The store that stays.
    pub cache_name: String,
    /// Stores deleted because their version tag differs.
    pub deleted: Vec<String>,
}

/// Implementation of the shell_activate tool.
pub async fn activate_impl<S, F>(interceptor: &Interceptor<S, F>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let report = interceptor.activate().await?;
    json_result(&ShellActivateOutput { cache_name: report.cache_name, deleted: report.deleted })
}
