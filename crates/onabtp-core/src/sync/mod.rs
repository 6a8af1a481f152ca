//! Offline mutation queue and replay.
//!
//! Writes that fail for transport reasons are appended to the persisted
//! `sync_queue` as `OfflineAction`s. `SyncEngine` replays them in order
//! once the server is reachable again, marking each one synced only after
//! Odoo accepted it.
//!
//! Replay carries no idempotency key: a CREATE whose earlier attempt
//! reached the server before the connection dropped will be created twice.

pub mod engine;
pub mod queue;

pub use engine::{SyncEngine, SyncReport};
pub use queue::{ActionType, EntityKind, OfflineAction, SyncQueue};
