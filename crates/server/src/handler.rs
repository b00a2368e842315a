//! MCP server handler implementation.
//!
//! Routes tool calls to the interceptor and the store views.
use std::sync::Arc;

use crate::tools::cache::{CacheMatchParams, keys_impl, match_impl};
use crate::tools::shell::{ShellFetchParams, activate_impl, fetch_impl, install_impl, resume_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::{HttpFetcher, Interceptor};
use shellcache_core::CacheDb;

pub type AppInterceptor = Interceptor<CacheDb, HttpFetcher>;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellcacheServer {
    tool_router: ToolRouter<Self>,
    interceptor: Arc<AppInterceptor>,
}

#[tool_router]
impl ShellcacheServer {
    pub fn new(interceptor: Arc<AppInterceptor>) -> Self {
        Self { tool_router: Self::tool_router(), interceptor }
    }

    /// Precache every manifest resource into the current store.
    ///
    /// All-or-nothing: a single failed fetch fails the install and leaves the interceptor redundant.
    #[tool(description = "Install the app shell: fetch and store every precache manifest entry. Fails if any entry fails.")]
    async fn shell_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.interceptor).await
    }

    #[tool(
        description = "Resume the current version from a complete persisted store without network access. Returns resumed=false when shell_install is needed instead."
    )]
    async fn shell_resume(&self) -> Result<CallToolResult, McpError> {
        resume_impl(&self.interceptor).await
    }

    #[tool(description = "Activate the installed or resumed shell and delete every store whose name differs from the current version.")]
    async fn shell_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.interceptor).await
    }

    /// Intercept a request: cache first, then network, then the offline fallback.
    #[tool(
        description = "Request a URL through the interceptor. Serves from the store when present, otherwise from the network (caching 200 same-origin GETs), otherwise the offline fallback page."
    )]
    async fn shell_fetch(&self, params: Parameters<ShellFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.interceptor, params.0).await
    }

    #[tool(description = "Look up a stored response by URL without touching the network.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.interceptor, params.0).await
    }

    #[tool(description = "List every store and its entries, plus the current version and lifecycle phase.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.interceptor).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline app-shell cache. Run shell_resume or shell_install, then shell_activate, then route requests through shell_fetch."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
