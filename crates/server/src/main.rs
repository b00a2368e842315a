//! shellcache server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchConfig, HttpFetcher, Interceptor, InterceptorConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        cache_name = %config.cache_name,
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let storage = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_app_config(&config)?)?);
    let interceptor = Arc::new(Interceptor::new(InterceptorConfig::from_app_config(&config)?, storage, fetcher));

    if config.auto_install {
        if interceptor.resume().await? {
            tracing::info!(cache_name = %config.cache_name, "Shell resumed from persisted store");
        } else {
            let installed = interceptor.install().await?;
            tracing::info!(cache_name = %installed.cache_name, cached = installed.cached.len(), "Shell installed");
        }
        let activated = interceptor.activate().await?;
        tracing::info!(deleted = ?activated.deleted, "Shell activated");
    }

    let handler = handler::ShellcacheServer::new(interceptor);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
