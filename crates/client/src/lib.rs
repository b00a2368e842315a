//! Client side of shellcache.
//!
//! This crate provides the network fetcher, the precache manifest and the
//! offline cache interceptor that ties them to a store.

pub mod fetch;
pub mod interceptor;
pub mod manifest;

pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use interceptor::{ActivateReport, InstallReport, Interceptor, InterceptorConfig, Phase, Served, ServedFrom};
pub use manifest::Manifest;
