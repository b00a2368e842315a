//! Named, versioned response stores.
//!
//! A store maps a request identity (method + URL) to a stored response. The
//! store name carries the version tag, so an upgrade opens a new store and the
//! interceptor's activate phase deletes the rest.
//!
//! - [`CacheDb`]: persistent SQLite backend (WAL, migrations, atomic batches)
//! - [`MemoryStorage`]: in-process backend for tests and ephemeral hosts

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
