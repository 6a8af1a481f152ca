//! Local caching module for offline data access.
//!
//! This module provides the `OfflineStorage` for storing and retrieving
//! Odoo data locally on top of a `KeyValueStore`. Each key holds one JSON
//! blob; collections are wrapped in a `CachedData` envelope and
//! considered stale after 60 minutes.
//!
//! Cached data types include:
//! - The last signed-in user (for offline login)
//! - Projects, tasks, employees and the user profile
//! - The pending sync queue and the session

pub mod manager;
pub mod store;

pub use manager::{CacheStats, CachedData, CachedUser, OfflineStorage};
pub use store::{FileStore, KeyValueStore, MemoryStore};
