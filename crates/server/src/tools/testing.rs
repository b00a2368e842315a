//! Shared fixtures for tool tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use shellcache_client::{Fetcher, Interceptor, InterceptorConfig, Manifest};
use shellcache_core::{Body, Error, MemoryStorage, Request, Response, ResponseType};

pub const ORIGIN: &str = "https://app.test/";

/// Serves `<path>` as the body for every same-origin URL except `/missing.json` (404).
#[derive(Default)]
pub struct StubFetcher {
    pub offline: AtomicBool,
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        let path = request.url.path().to_string();
        let status = if path == "/missing.json" { 404 } else { 200 };
        Ok(Response::new(request.url.clone(), status, ResponseType::Basic, Body::new(path))
            .with_header("Content-Type", "text/plain"))
    }
}

pub type TestInterceptor = Interceptor<MemoryStorage, StubFetcher>;

pub fn interceptor(cache_name: &str) -> (Arc<TestInterceptor>, Arc<MemoryStorage>, Arc<StubFetcher>) {
    interceptor_with(cache_name, Arc::new(MemoryStorage::new()))
}

pub fn interceptor_with(
    cache_name: &str, storage: Arc<MemoryStorage>,
) -> (Arc<TestInterceptor>, Arc<MemoryStorage>, Arc<StubFetcher>) {
    let manifest = Manifest::new(Url::parse(ORIGIN).unwrap(), ["./index.html", "./offline.html"]).unwrap();
    let config = InterceptorConfig::new(cache_name, manifest, "./offline.html").unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let interceptor = Arc::new(Interceptor::new(config, storage.clone(), fetcher.clone()));
    (interceptor, storage, fetcher)
}

/// Pull the JSON text out of a successful tool result.
pub fn output<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
