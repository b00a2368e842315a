//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - The request/response model with move-once bodies
//! - The named, versioned store abstraction with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, MemoryStorage};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Body, Request, RequestKey, Response, ResponseType, StoredResponse};
