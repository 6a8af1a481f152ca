//! Entity services over the Odoo client and the offline cache.
//!
//! Reads go to the server first; a successful fetch is hydrated and
//! overwrites the cached collection, and any failure falls back to the
//! last cached copy. Writes go to the server first; a transport failure
//! queues the write for replay instead of failing.

pub mod project;
pub mod task;
pub mod user;

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::api::{is_transport_error, Credentials, OdooClient};
use crate::cache::{CachedData, OfflineStorage};
use crate::sync::{ActionType, EntityKind, SyncQueue};

pub use project::ProjectService;
pub use task::TaskService;
pub use user::UserService;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    Network,
    Cache,
}

/// Data returned by a read, tagged with its origin.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub source: DataSource,
    /// When the cached copy was written; `None` for live data or an empty cache.
    pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
    pub fn network(data: T) -> Self {
        Self {
            data,
            source: DataSource::Network,
            cached_at: None,
        }
    }

    pub fn cache(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
        Self {
            data,
            source: DataSource::Cache,
            cached_at,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.source == DataSource::Cache
    }

    /// "5m ago" style age of cached data.
    pub fn age_display(&self) -> Option<String> {
        self.cached_at.map(|at| {
            CachedData {
                data: (),
                cached_at: at,
            }
            .age_display()
        })
    }
}

impl<T: Default> Fetched<T> {
    /// Fall back to a cached envelope, or the empty value when there is none.
    fn from_cache(cached: Result<Option<CachedData<T>>>, what: &str) -> Self {
        match cached {
            Ok(Some(cached)) => Fetched::cache(cached.data, Some(cached.cached_at)),
            Ok(None) => Fetched::cache(T::default(), None),
            Err(e) => {
                warn!(cache = what, error = %e, "Failed to read cache");
                Fetched::cache(T::default(), None)
            }
        }
    }
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// Odoo accepted the write.
    Applied(T),
    /// The server was unreachable; the action id in the sync queue.
    Queued(String),
}

impl<T> WriteOutcome<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued(_))
    }
}

/// What every service needs to talk to Odoo and fall back offline.
#[derive(Clone)]
pub struct ServiceContext {
    pub client: OdooClient,
    pub credentials: Credentials,
    pub storage: OfflineStorage,
    pub queue: SyncQueue,
}

impl ServiceContext {
    pub fn new(client: OdooClient, credentials: Credentials, storage: OfflineStorage) -> Self {
        let queue = SyncQueue::new(storage.clone());
        Self {
            client,
            credentials,
            storage,
            queue,
        }
    }

    /// Run a write, queueing `data` for replay if the server is unreachable.
    ///
    /// Odoo-side rejections are returned as errors and never queued.
    pub(crate) async fn apply_or_queue<T, F>(
        &self,
        action_type: ActionType,
        entity: EntityKind,
        data: Value,
        write: F,
    ) -> Result<WriteOutcome<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match write.await {
            Ok(result) => Ok(WriteOutcome::Applied(result)),
            Err(e) if is_transport_error(&e) => {
                warn!(action = %action_type, entity = %entity, error = %e, "Server unreachable, queueing write");
                let action = self.queue.add(action_type, entity, data)?;
                Ok(WriteOutcome::Queued(action.id))
            }
            Err(e) => Err(e),
        }
    }
}

/// Sizes of a full refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub projects: usize,
    pub tasks: usize,
    pub employees: usize,
    pub offline: bool,
}

/// Refetch projects, tasks and employees concurrently.
pub async fn refresh_all(
    projects: &ProjectService,
    tasks: &TaskService,
    users: &UserService,
) -> RefreshSummary {
    let (projects, tasks, employees) =
        futures::join!(projects.get_projects(), tasks.get_tasks(), users.get_employees());
    RefreshSummary {
        projects: projects.data.len(),
        tasks: tasks.data.len(),
        employees: employees.data.len(),
        offline: projects.is_offline() || tasks.is_offline() || employees.is_offline(),
    }
}
