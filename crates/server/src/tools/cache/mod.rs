//! Cache-related MCP tools.
//!
//! Read-only views of the versioned stores, independent of the interceptor phase.

pub mod keys;
pub mod lookup;

pub use keys::{CacheKeysOutput, keys_impl};
pub use lookup::{CacheMatchParams, match_impl};
