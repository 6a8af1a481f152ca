//! Core library for the ONA BTP field client.
//!
//! Talks to an Odoo ERP instance over JSON-RPC, hydrates raw rows into
//! view models, caches the last good responses for offline use, and
//! queues mutations made while the server is unreachable so they can be
//! replayed later.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod hydration;
pub mod models;
pub mod services;
pub mod sync;
pub mod utils;

pub use api::{ApiError, Credentials, OdooClient};
pub use auth::{AuthError, AuthService, CredentialStore, LoginOutcome};
pub use cache::{FileStore, KeyValueStore, MemoryStore, OfflineStorage};
pub use config::Config;
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use services::{
    refresh_all, DataSource, Fetched, ProjectService, ServiceContext, TaskService, UserService,
    WriteOutcome,
};
pub use sync::{OfflineAction, SyncEngine, SyncQueue, SyncReport};
