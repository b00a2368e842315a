//! Offline cache interceptor.
//!
//! Three lifecycle hooks over an injected store and fetcher:
//!
//! - **install**: fetch every manifest resource as one batch and write them
//!   atomically into the store named by the current version tag. A host
//!   restarting on a complete store may **resume** it instead, offline.
//! - **activate**: delete every store whose name is not the current tag.
//! - **handle**: cache-first serving with write-through of same-origin 200s
//!   and the offline fallback when the network yields nothing.
//!
//! Install must succeed before activate, and neither hook may run twice.
//! Concurrent `handle` calls for the same request race on the final store
//! write; the last write wins.

mod phase;

pub use phase::Phase;

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Fetcher, resolve};
use crate::manifest::Manifest;
use shellcache_core::{
    AppConfig, Body, CacheStorage, Error, Request, RequestKey, Response, ResponseType, StoredResponse,
};

/// Body of the synthesised response when the fallback is not in the store.
const UNAVAILABLE_BODY: &str = "offline: resource unavailable";

/// What an interceptor serves and where it keeps it.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Store name, including the version tag.
    pub cache_name: String,
    pub manifest: Manifest,
    /// Served when the network yields no response.
    pub fallback: Url,
}

impl InterceptorConfig {
    pub fn new(cache_name: impl Into<String>, manifest: Manifest, fallback: &str) -> Result<Self, Error> {
        let cache_name = cache_name.into();
        if cache_name.trim().is_empty() {
            return Err(Error::InvalidInput("cache name must not be empty".into()));
        }
        let fallback = resolve(manifest.scope(), fallback).map_err(|e| Error::InvalidUrl(format!("fallback: {e}")))?;
        Ok(Self { cache_name, manifest, fallback })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = Manifest::new(scope, &config.precache)?;
        Self::new(config.cache_name.clone(), manifest, &config.offline_fallback)
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// The current store.
    Cache,
    /// A live network response.
    Network,
    /// The stored offline fallback, after a network failure.
    Fallback,
    /// Network failed and no fallback was stored; a 503 was synthesised.
    Unavailable,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "cache",
            ServedFrom::Network => "network",
            ServedFrom::Fallback => "fallback",
            ServedFrom::Unavailable => "unavailable",
        }
    }
}

/// Result of [`Interceptor::handle`].
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    /// Whether install created the store rather than reusing one.
    pub created: bool,
    /// Stored resources, in manifest order.
    pub cached: Vec<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub cache_name: String,
    /// Stores deleted because their name differs from the current tag.
    pub deleted: Vec<String>,
}

/// Cache-first request interceptor bound to one version tag.
pub struct Interceptor<S, F> {
    config: InterceptorConfig,
    storage: Arc<S>,
    fetcher: Arc<F>,
    phase: RwLock<Phase>,
    /// Serialises install and activate.
    lifecycle: Mutex<()>,
}

impl<S, F> Interceptor<S, F>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    pub fn new(config: InterceptorConfig, storage: Arc<S>, fetcher: Arc<F>) -> Self {
        Self { config, storage, fetcher, phase: RwLock::new(Phase::Parsed), lifecycle: Mutex::new(()) }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    /// Build a request for `target`, resolved against the manifest scope.
    pub fn request_for(&self, method: &str, target: &str) -> Result<Request, Error> {
        let url = resolve(self.config.manifest.scope(), target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Request::new(method, url))
    }

    /// Populate the current store from the manifest.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE` unless this is the first lifecycle call.
    /// `INSTALL_FAILED` if any resource fails to fetch, returns a non-2xx
    /// status, or the batch write fails. The interceptor is then redundant and
    /// a store created by this call is deleted again.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.enter(&[Phase::Parsed], Phase::Installing).await?;

        let name = self.cache_name();
        tracing::info!(cache = %name, resources = self.config.manifest.len(), "install started");

        let created = match self.storage.open(name).await {
            Ok(created) => created,
            Err(err) => return Err(self.fail_install(false, err).await),
        };

        match self.precache().await {
            Ok(cached) => {
                self.set_phase(Phase::Installed).await;
                tracing::info!(cache = %name, cached = cached.len(), created, "install complete");
                Ok(InstallReport { cache_name: name.to_string(), created, cached })
            }
            Err(err) => Err(self.fail_install(created, err).await),
        }
    }

    /// Take over a store left complete by an earlier install of this version.
    ///
    /// Returns `true` and moves to `Installed` when the current store exists
    /// and holds every manifest resource; activate may follow as after an
    /// install. Returns `false` and stays `Parsed` otherwise, leaving
    /// [`install`](Self::install) as the way in. Nothing is fetched.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE` unless this is the first lifecycle call. Storage errors
    /// from inspecting the store leave the phase at `Parsed`.
    pub async fn resume(&self) -> Result<bool, Error> {
        let _guard = self.lifecycle.lock().await;
        self.enter(&[Phase::Parsed], Phase::Installing).await?;

        let name = self.cache_name();
        match self.stored_completely().await {
            Ok(true) => {
                self.set_phase(Phase::Installed).await;
                tracing::info!(cache = %name, resources = self.config.manifest.len(), "resumed persisted store");
                Ok(true)
            }
            Ok(false) => {
                self.set_phase(Phase::Parsed).await;
                tracing::info!(cache = %name, "no complete store to resume");
                Ok(false)
            }
            Err(err) => {
                self.set_phase(Phase::Parsed).await;
                tracing::warn!(cache = %name, error = %err, "could not inspect store for resume");
                Err(err)
            }
        }
    }

    async fn stored_completely(&self) -> Result<bool, Error> {
        let name = self.cache_name();
        if !self.storage.has(name).await? {
            return Ok(false);
        }
        let held: HashSet<RequestKey> = self.storage.entries(name).await?.into_iter().collect();
        Ok(self.config.manifest.requests().all(|request| held.contains(&request.key())))
    }

    /// Fetch the whole manifest, then write it in one batch.
    async fn precache(&self) -> Result<Vec<Url>, Error> {
        let mut tasks = JoinSet::new();
        for (index, request) in self.config.manifest.requests().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            tasks.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut slots: Vec<Option<(RequestKey, StoredResponse)>> = Vec::new();
        slots.resize_with(self.config.manifest.len(), || None);

        // Returning early drops `tasks`, which aborts the fetches still running.
        while let Some(joined) = tasks.join_next().await {
            let (index, request, result) =
                joined.map_err(|e| Error::Network(format!("precache task failed: {e}")))?;
            let response = result?;
            if !response.is_ok() {
                return Err(Error::HttpError(format!("{}: status {}", request.url, response.status)));
            }
            tracing::debug!(url = %request.url, status = response.status, "precached");
            slots[index] = Some((request.key(), response.into_stored()));
        }

        let entries: Vec<(RequestKey, StoredResponse)> = slots.into_iter().flatten().collect();
        let cached = entries.iter().map(|(key, _)| key.url.clone()).collect();
        self.storage.put_all(self.cache_name(), entries).await?;

        Ok(cached)
    }

    async fn fail_install(&self, created: bool, err: Error) -> Error {
        let name = self.cache_name();
        if created && let Err(cleanup) = self.storage.delete(name).await {
            tracing::warn!(cache = %name, error = %cleanup, "failed to remove store after failed install");
        }
        self.set_phase(Phase::Redundant).await;
        tracing::error!(cache = %name, error = %err, "install failed");
        Error::InstallFailed(err.to_string())
    }

    /// Delete every store whose name is not the current version tag.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE` unless install has completed and activate has not run.
    /// A storage error leaves the interceptor installed so activation can be
    /// retried.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.enter(&[Phase::Installed], Phase::Activating).await?;

        match self.purge_stale().await {
            Ok(deleted) => {
                self.set_phase(Phase::Activated).await;
                tracing::info!(cache = %self.cache_name(), deleted = deleted.len(), "activated");
                Ok(ActivateReport { cache_name: self.cache_name().to_string(), deleted })
            }
            Err(err) => {
                self.set_phase(Phase::Installed).await;
                tracing::error!(cache = %self.cache_name(), error = %err, "activation failed");
                Err(err)
            }
        }
    }

    async fn purge_stale(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == self.config.cache_name {
                continue;
            }
            if self.storage.delete(&name).await? {
                tracing::info!(cache = %name, "deleted stale store");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Serve one intercepted request.
    ///
    /// Network failures never surface as errors: they are answered with the
    /// fallback resource.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE` before a successful install; storage errors from the
    /// store lookup; fetcher errors that are not network failures, such as a
    /// method the client cannot send.
    pub async fn handle(&self, request: Request) -> Result<Served, Error> {
        let phase = self.phase().await;
        if !phase.is_serving() {
            return Err(Error::InvalidState(format!("cannot intercept requests while {}", phase.as_str())));
        }

        let name = self.cache_name();
        let key = request.key();

        if request.is_get()
            && let Some(stored) = self.storage.match_entry(name, &key).await?
        {
            tracing::debug!(request = %key, "served from store");
            return Ok(Served { response: stored.into_response(), source: ServedFrom::Cache });
        }

        let response = match self.fetcher.fetch(&request).await {
            Ok(response) => response,
            Err(err) if err.is_network() => {
                tracing::warn!(request = %key, error = %err, "network failed; serving offline fallback");
                return Ok(self.fallback().await);
            }
            Err(err) => return Err(err),
        };

        if !(request.is_get() && response.is_cacheable()) {
            tracing::debug!(
                request = %key,
                status = response.status,
                response_type = response.response_type.as_str(),
                "not cacheable"
            );
            return Ok(Served { response, source: ServedFrom::Network });
        }

        let (live, copy) = response.duplicate();
        if let Err(err) = self.storage.put(name, &key, copy.into_stored()).await {
            tracing::warn!(request = %key, error = %err, "write-through failed");
        }

        Ok(Served { response: live, source: ServedFrom::Network })
    }

    async fn fallback(&self) -> Served {
        let key = RequestKey::get(self.config.fallback.clone());
        match self.storage.match_entry(self.cache_name(), &key).await {
            Ok(Some(stored)) => Served { response: stored.into_response(), source: ServedFrom::Fallback },
            Ok(None) => {
                tracing::warn!(fallback = %key, "offline fallback is not stored");
                Served { response: self.unavailable(), source: ServedFrom::Unavailable }
            }
            Err(err) => {
                tracing::warn!(fallback = %key, error = %err, "offline fallback lookup failed");
                Served { response: self.unavailable(), source: ServedFrom::Unavailable }
            }
        }
    }

    fn unavailable(&self) -> Response {
        Response::new(self.config.fallback.clone(), 503, ResponseType::Error, Body::new(UNAVAILABLE_BODY))
            .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    async fn enter(&self, from: &[Phase], to: Phase) -> Result<(), Error> {
        let mut phase = self.phase.write().await;
        if !from.contains(&*phase) {
            return Err(Error::InvalidState(format!("cannot start {} while {}", to.as_str(), phase.as_str())));
        }
        *phase = to;
        Ok(())
    }

    async fn set_phase(&self, to: Phase) {
        *self.phase.write().await = to;
    }
}

#[cfg(test)]
mod tests;
