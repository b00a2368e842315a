use super::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use shellcache_core::{CacheDb, MemoryStorage};

const ORIGIN: &str = "https://app.test/";

/// Answers from a fixed routing table; anything unrouted is a network failure.
#[derive(Default)]
struct ScriptedFetcher {
    routes: StdMutex<HashMap<String, (u16, ResponseType, &'static str)>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, status: u16, body: &'static str) -> Self {
        let url = Url::parse(ORIGIN).unwrap().join(url).unwrap();
        let response_type = if url.origin() == Url::parse(ORIGIN).unwrap().origin() {
            ResponseType::Basic
        } else {
            ResponseType::Opaque
        };
        self.routes.lock().unwrap().insert(url.to_string(), (status, response_type, body));
        self
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Suspend like a real socket would, so concurrent handles interleave.
        tokio::task::yield_now().await;
        if request.method == "BREW" {
            return Err(Error::InvalidInput(format!("unsupported method {}", request.method)));
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }
        let route = self.routes.lock().unwrap().get(request.url.as_str()).copied();
        match route {
            Some((status, response_type, body)) => Ok(Response::new(
                request.url.clone(),
                status,
                response_type,
                Body::new(body),
            )
            .with_header("Content-Type", "text/html")),
            None => Err(Error::Network(format!("{}: connection refused", request.url))),
        }
    }
}

fn shell_fetcher() -> ScriptedFetcher {
    ScriptedFetcher::new()
        .route("/", 200, "<shell>")
        .route("/index.html", 200, "<h1>home</h1>")
        .route("/offline.html", 200, "<h1>offline</h1>")
        .route("/css/style.css", 200, "body{}")
        .route("/js/app.js", 200, "app()")
}

fn config(name: &str, paths: &[&str]) -> InterceptorConfig {
    let manifest = Manifest::new(Url::parse(ORIGIN).unwrap(), paths).unwrap();
    InterceptorConfig::new(name, manifest, "./offline.html").unwrap()
}

fn shell_config(name: &str) -> InterceptorConfig {
    config(name, &["./", "./index.html", "./offline.html", "./css/style.css", "./js/app.js"])
}

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

async fn installed(
    name: &str, storage: Arc<MemoryStorage>, fetcher: Arc<ScriptedFetcher>,
) -> Interceptor<MemoryStorage, ScriptedFetcher> {
    let interceptor = Interceptor::new(shell_config(name), storage, fetcher);
    interceptor.install().await.unwrap();
    interceptor
}

#[tokio::test]
async fn test_install_populates_every_manifest_resource() {
    let storage = Arc::new(MemoryStorage::new());
    let interceptor = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), Arc::new(shell_fetcher()));

    let report = interceptor.install().await.unwrap();
    assert!(report.created);
    assert_eq!(report.cached.len(), 5);
    assert_eq!(interceptor.phase().await, Phase::Installed);

    for resource in interceptor.config().manifest.resources() {
        let found = storage.match_entry("app-cache-v1", &RequestKey::get(resource.clone())).await.unwrap();
        assert!(found.is_some(), "missing {resource}");
    }

    let order: Vec<Url> = storage.entries("app-cache-v1").await.unwrap().into_iter().map(|k| k.url).collect();
    assert_eq!(order, report.cached);
}

#[tokio::test]
async fn test_install_fails_on_error_status_and_leaves_nothing() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = shell_fetcher().route("/js/app.js", 404, "not found");
    let interceptor = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), Arc::new(fetcher));

    let err = interceptor.install().await.unwrap_err();
    assert!(matches!(err, Error::InstallFailed(ref msg) if msg.contains("status 404")));
    assert_eq!(interceptor.phase().await, Phase::Redundant);
    assert!(!storage.has("app-cache-v1").await.unwrap());
}

#[tokio::test]
async fn test_install_fails_on_network_error() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = ScriptedFetcher::new().route("/", 200, "<shell>");
    let interceptor = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), Arc::new(fetcher));

    let err = interceptor.install().await.unwrap_err();
    assert!(matches!(err, Error::InstallFailed(_)));
    assert!(storage.keys().await.unwrap().is_empty());

    let request = interceptor.request_for("GET", "./index.html").unwrap();
    assert!(matches!(interceptor.handle(request).await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn test_failed_install_keeps_preexisting_store_unpopulated() {
    let storage = Arc::new(MemoryStorage::new());
    storage.open("app-cache-v1").await.unwrap();
    let fetcher = shell_fetcher().route("/css/style.css", 500, "boom");
    let interceptor = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), Arc::new(fetcher));

    assert!(interceptor.install().await.is_err());
    assert!(storage.has("app-cache-v1").await.unwrap());
    assert!(storage.entries("app-cache-v1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lifecycle_order_is_enforced() {
    let storage = Arc::new(MemoryStorage::new());
    let interceptor = Interceptor::new(shell_config("app-cache-v1"), storage, Arc::new(shell_fetcher()));

    assert!(matches!(interceptor.activate().await, Err(Error::InvalidState(_))));
    interceptor.install().await.unwrap();
    assert!(matches!(interceptor.install().await, Err(Error::InvalidState(_))));
    interceptor.activate().await.unwrap();
    assert!(matches!(interceptor.activate().await, Err(Error::InvalidState(_))));
    assert_eq!(interceptor.phase().await, Phase::Activated);
}

#[tokio::test]
async fn test_cached_request_skips_network() {
    let fetcher = Arc::new(shell_fetcher());
    let interceptor = installed("app-cache-v1", Arc::new(MemoryStorage::new()), fetcher.clone()).await;
    let before = fetcher.calls();

    let served = interceptor.handle(Request::get(url("/css/style.css"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Cache);
    assert_eq!(served.response.body.into_bytes().as_ref(), b"body{}");
    assert_eq!(fetcher.calls(), before);
}

#[tokio::test]
async fn test_stored_index_served_without_network() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());
    let interceptor = Interceptor::new(config("v1", &["/index.html", "/offline.html"]), storage, fetcher.clone());
    interceptor.install().await.unwrap();
    fetcher.go_offline();

    let served = interceptor.handle(Request::get(url("/index.html"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Cache);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.body.into_bytes().as_ref(), b"<h1>home</h1>");
}

#[tokio::test]
async fn test_miss_writes_through_same_origin_200() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher().route("/data/questions.json", 200, "[1,2,3]"));
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher.clone()).await;

    let served = interceptor.handle(Request::get(url("/data/questions.json"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Network);
    let status = served.response.status;
    let body = served.response.body.into_bytes();

    let stored = storage
        .match_entry("app-cache-v1", &RequestKey::get(url("/data/questions.json")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, status);
    assert_eq!(stored.body, body);

    let calls = fetcher.calls();
    let again = interceptor.handle(Request::get(url("/data/questions.json"))).await.unwrap();
    assert_eq!(again.source, ServedFrom::Cache);
    assert_eq!(fetcher.calls(), calls);
}

#[tokio::test]
async fn test_error_status_returned_but_not_cached() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher().route("/missing.json", 404, "nope"));
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher).await;

    let served = interceptor.handle(Request::get(url("/missing.json"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Network);
    assert_eq!(served.response.status, 404);

    let stored = storage.match_entry("app-cache-v1", &RequestKey::get(url("/missing.json"))).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_cross_origin_response_not_cached() {
    let storage = Arc::new(MemoryStorage::new());
    let api = "https://api.example.com/2.3/questions";
    let fetcher = Arc::new(shell_fetcher().route(api, 200, "{\"items\":[]}"));
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher).await;

    let served = interceptor.handle(Request::get(Url::parse(api).unwrap())).await.unwrap();
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.response_type, ResponseType::Opaque);

    let stored = storage.match_entry("app-cache-v1", &RequestKey::get(Url::parse(api).unwrap())).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_non_get_bypasses_store() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher.clone()).await;
    let before = fetcher.calls();

    let request = interceptor.request_for("post", "./index.html").unwrap();
    let served = interceptor.handle(request.clone()).await.unwrap();
    assert_eq!(served.source, ServedFrom::Network);
    assert_eq!(fetcher.calls(), before + 1);
    assert!(storage.match_entry("app-cache-v1", &request.key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_network_failure_serves_fallback_exactly() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher.clone()).await;
    fetcher.go_offline();

    let served = interceptor.handle(Request::get(url("/about.html"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Fallback);

    let offline = storage
        .match_entry("app-cache-v1", &RequestKey::get(url("/offline.html")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(served.response.status, offline.status);
    assert_eq!(served.response.body.into_bytes(), offline.body);
}

#[tokio::test]
async fn test_missing_fallback_synthesises_503() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());
    let interceptor = Interceptor::new(config("v1", &["./index.html"]), storage, fetcher.clone());
    interceptor.install().await.unwrap();
    fetcher.go_offline();

    let served = interceptor.handle(Request::get(url("/contact.html"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Unavailable);
    assert_eq!(served.response.status, 503);
    assert_eq!(served.response.response_type, ResponseType::Error);
}

#[tokio::test]
async fn test_activate_purges_other_versions() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());

    let v1 = installed("app-cache-v1", storage.clone(), fetcher.clone()).await;
    v1.activate().await.unwrap();
    storage.open("unrelated-cache").await.unwrap();
    assert!(
        storage
            .match_entry("app-cache-v1", &RequestKey::get(url("/offline.html")))
            .await
            .unwrap()
            .is_some()
    );

    let v2 = installed("app-cache-v2", storage.clone(), fetcher).await;
    let report = v2.activate().await.unwrap();

    assert_eq!(report.deleted, vec!["app-cache-v1".to_string(), "unrelated-cache".to_string()]);
    assert_eq!(storage.keys().await.unwrap(), vec!["app-cache-v2".to_string()]);
    assert!(!storage.has("app-cache-v1").await.unwrap());
    assert!(
        storage
            .match_entry("app-cache-v1", &RequestKey::get(url("/offline.html")))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_concurrent_misses_for_same_resource_leave_one_entry() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher().route("/detail.html", 200, "<detail>"));
    let interceptor = installed("app-cache-v1", storage.clone(), fetcher.clone()).await;
    let before = fetcher.calls();

    let (a, b) = tokio::join!(
        interceptor.handle(Request::get(url("/detail.html"))),
        interceptor.handle(Request::get(url("/detail.html")))
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!((a.source, b.source), (ServedFrom::Network, ServedFrom::Network));
    assert_eq!(fetcher.calls() - before, 2);

    let keys = storage.entries("app-cache-v1").await.unwrap();
    assert_eq!(keys.iter().filter(|k| k.url == url("/detail.html")).count(), 1);
}

#[tokio::test]
async fn test_non_network_fetch_error_is_returned() {
    let storage = Arc::new(MemoryStorage::new());
    let interceptor = installed("app-cache-v1", storage, Arc::new(shell_fetcher())).await;

    let err = interceptor.handle(Request::new("BREW", url("/pot"))).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_resume_requires_complete_store() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(shell_fetcher());

    let empty = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), fetcher.clone());
    assert!(!empty.resume().await.unwrap());
    assert_eq!(empty.phase().await, Phase::Parsed);

    // A store holding only part of the manifest is not resumable.
    let partial = config("app-cache-v1", &["./", "./index.html"]);
    Interceptor::new(partial, storage.clone(), fetcher.clone()).install().await.unwrap();
    assert!(!empty.resume().await.unwrap());

    empty.install().await.unwrap();
    assert!(matches!(empty.resume().await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn test_restart_offline_resumes_persisted_store() {
    let path = std::env::temp_dir().join(format!("shellcache-resume-{}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let fetcher = Arc::new(shell_fetcher());

    {
        let storage = Arc::new(CacheDb::open(&path).await.unwrap());
        let first = Interceptor::new(shell_config("app-cache-v1"), storage, fetcher.clone());
        first.install().await.unwrap();
        first.activate().await.unwrap();
    }

    fetcher.go_offline();
    let storage = Arc::new(CacheDb::open(&path).await.unwrap());
    let restarted = Interceptor::new(shell_config("app-cache-v1"), storage, fetcher.clone());

    assert!(restarted.resume().await.unwrap());
    restarted.activate().await.unwrap();
    assert_eq!(restarted.phase().await, Phase::Activated);

    let before = fetcher.calls();
    let page = restarted.handle(Request::get(url("/index.html"))).await.unwrap();
    assert_eq!(page.source, ServedFrom::Cache);
    assert_eq!(page.response.body.into_bytes().as_ref(), b"<h1>home</h1>");
    assert_eq!(fetcher.calls(), before);

    let other = restarted.handle(Request::get(url("/contact.html"))).await.unwrap();
    assert_eq!(other.source, ServedFrom::Fallback);

    drop(restarted);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_sqlite_backed_lifecycle() {
    let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let fetcher = Arc::new(shell_fetcher().route("/api/tags.json", 200, "[\"rust\"]"));

    let old = Interceptor::new(shell_config("app-cache-v1"), storage.clone(), fetcher.clone());
    old.install().await.unwrap();
    old.activate().await.unwrap();

    let current = Interceptor::new(shell_config("app-cache-v2"), storage.clone(), fetcher.clone());
    current.install().await.unwrap();
    current.activate().await.unwrap();
    assert_eq!(storage.keys().await.unwrap(), vec!["app-cache-v2".to_string()]);

    let served = current.handle(Request::get(url("/api/tags.json"))).await.unwrap();
    assert_eq!(served.source, ServedFrom::Network);

    fetcher.go_offline();
    let cached = current.handle(Request::get(url("/api/tags.json"))).await.unwrap();
    assert_eq!(cached.source, ServedFrom::Cache);
    assert_eq!(cached.response.body.into_bytes().as_ref(), b"[\"rust\"]");

    let fallback = current.handle(Request::get(url("/services.html"))).await.unwrap();
    assert_eq!(fallback.source, ServedFrom::Fallback);
    assert_eq!(fallback.response.body.into_bytes().as_ref(), b"<h1>offline</h1>");
}

#[test]
fn test_config_from_app_config() {
    let app = AppConfig::default();
    let config = InterceptorConfig::from_app_config(&app).unwrap();
    assert_eq!(config.cache_name, "app-cache-v1");
    assert_eq!(config.fallback.as_str(), "http://localhost:8080/offline.html");
    assert!(config.manifest.contains(&config.fallback));
}

#[test]
fn test_config_rejects_empty_name() {
    let manifest = Manifest::new(Url::parse(ORIGIN).unwrap(), ["./"]).unwrap();
    assert!(matches!(InterceptorConfig::new(" ", manifest, "./offline.html"), Err(Error::InvalidInput(_))));
}
