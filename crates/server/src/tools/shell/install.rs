//! shell_install and shell_resume tool implementations.
//!
//! Install precaches the manifest into the current store; resume adopts a
//! store an earlier install already completed.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Fetcher, Interceptor};
use shellcache_core::CacheStorage;

use crate::tools::json_result;

/// Output from the shell_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellInstallOutput {
    /// Store that was populated.
    pub cache_name: String,
    /// Whether the store was created by this install.
    pub created: bool,
    /// Precached URLs in manifest order.
    pub cached: Vec<String>,
}

/// Implementation of the shell_install tool.
pub async fn install_impl<S, F>(interceptor: &Interceptor<S, F>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let report = interceptor.install().await?;

    json_result(&ShellInstallOutput {
        cache_name: report.cache_name,
        created: report.created,
        cached: report.cached.iter().map(|u| u.to_string()).collect(),
    })
}

/// Output from the shell_resume tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellResumeOutput {
    pub cache_name: String,
    /// False when the store is missing or incomplete; run shell_install then.
    pub resumed: bool,
}

/// Implementation of the shell_resume tool.
pub async fn resume_impl<S, F>(interceptor: &Interceptor<S, F>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let resumed = interceptor.resume().await?;
    json_result(&ShellResumeOutput { cache_name: interceptor.cache_name().to_string(), resumed })
}
