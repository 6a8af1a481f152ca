use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::OfflineStorage;
use crate::models::{PROJECT_MODEL, TASK_MODEL, USER_MODEL};

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Project,
    Task,
    User,
}

impl EntityKind {
    /// Odoo model the entity lives in.
    pub fn model(&self) -> &'static str {
        match self {
            EntityKind::Project => PROJECT_MODEL,
            EntityKind::Task => TASK_MODEL,
            EntityKind::User => USER_MODEL,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Create => "CREATE",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Project => "PROJECT",
            EntityKind::Task => "TASK",
            EntityKind::User => "USER",
        };
        f.write_str(s)
    }
}

/// A mutation made while offline, waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub entity: EntityKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub synced: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl OfflineAction {
    pub fn new(action_type: ActionType, entity: EntityKind, data: Value) -> Self {
        let timestamp = Utc::now();
        Self {
            id: generate_action_id(timestamp),
            action_type,
            entity,
            data,
            timestamp,
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }

    /// Id of the record the action targets, from `data.id`.
    pub fn record_id(&self) -> Result<i64> {
        self.data
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("Action {} has no record id", self.id))
    }

    /// The action's values without the `id` key.
    pub fn values(&self) -> Value {
        match &self.data {
            Value::Object(map) => {
                let mut values = map.clone();
                values.remove("id");
                Value::Object(values)
            }
            other => other.clone(),
        }
    }
}

/// `action_<unix millis>_<9 base36 chars>`
fn generate_action_id(at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("action_{}_{}", at.timestamp_millis(), suffix)
}

/// The persisted queue of offline actions.
///
/// Every operation is a read-modify-write of the whole `sync_queue` key,
/// serialized by a lock shared between clones.
#[derive(Clone)]
pub struct SyncQueue {
    storage: OfflineStorage,
    lock: Arc<Mutex<()>>,
}

impl SyncQueue {
    pub fn new(storage: OfflineStorage) -> Self {
        Self {
            storage,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append an action and persist the queue.
    pub fn add(&self, action_type: ActionType, entity: EntityKind, data: Value) -> Result<OfflineAction> {
        let action = OfflineAction::new(action_type, entity, data);
        let queued = action.clone();
        let len = self.update(move |actions| {
            actions.push(queued);
            actions.len()
        })?;
        info!(id = %action.id, action = %action_type, entity = %entity, queue_len = len, "Action queued for sync");
        Ok(action)
    }

    pub fn load(&self) -> Result<Vec<OfflineAction>> {
        self.storage.load_queue()
    }

    /// Unsynced actions, oldest first.
    pub fn pending(&self) -> Result<Vec<OfflineAction>> {
        Ok(self.load()?.into_iter().filter(|a| !a.synced).collect())
    }

    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.pending()?.len())
    }

    /// Returns false when no action has that id.
    pub fn mark_synced(&self, id: &str) -> Result<bool> {
        self.update(|actions| match actions.iter_mut().find(|a| a.id == id) {
            Some(action) => {
                action.synced = true;
                true
            }
            None => false,
        })
    }

    /// Drop replayed actions; returns how many were removed.
    pub fn purge_synced(&self) -> Result<usize> {
        let removed = self.update(|actions| {
            let before = actions.len();
            actions.retain(|a| !a.synced);
            before - actions.len()
        })?;
        debug!(removed, "Synced actions purged");
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        self.update(|actions| actions.clear())
    }

    /// Load, modify and persist the queue under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<OfflineAction>) -> R) -> Result<R> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Sync queue lock poisoned"))?;
        let mut actions = self.storage.load_queue()?;
        let result = f(&mut actions);
        self.storage.save_queue(&actions)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore};
    use serde_json::json;

    fn queue() -> SyncQueue {
        SyncQueue::new(OfflineStorage::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_action_id_format() {
        let action = OfflineAction::new(ActionType::Create, EntityKind::Task, json!({}));
        let parts: Vec<&str> = action.id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "action");
        assert_eq!(parts[1], action.timestamp.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_serialized_shape() {
        let action = OfflineAction::new(ActionType::Update, EntityKind::Project, json!({"id": 3}));
        let value = serde_json::to_value(&action).expect("serialize");
        assert_eq!(value["type"], "UPDATE");
        assert_eq!(value["entity"], "PROJECT");
        assert_eq!(value["synced"], false);
    }

    #[test]
    fn test_legacy_entries_without_attempts() {
        let raw = json!([{
            "id": "action_1_abc",
            "type": "DELETE",
            "entity": "TASK",
            "data": {"id": 4},
            "timestamp": "2024-05-01T10:00:00Z",
            "synced": false
        }]);
        let actions: Vec<OfflineAction> = serde_json::from_value(raw).expect("parse");
        assert_eq!(actions[0].attempts, 0);
        assert_eq!(actions[0].record_id().expect("id"), 4);
    }

    #[test]
    fn test_values_drop_id() {
        let action = OfflineAction::new(
            ActionType::Update,
            EntityKind::Task,
            json!({"id": 4, "name": "Coffrage"}),
        );
        assert_eq!(action.values(), json!({"name": "Coffrage"}));
        let no_id = OfflineAction::new(ActionType::Delete, EntityKind::Task, json!({}));
        assert!(no_id.record_id().is_err());
    }

    #[test]
    fn test_queue_is_durable_across_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let open = || {
            let store = FileStore::new(dir.path().to_path_buf()).expect("store");
            SyncQueue::new(OfflineStorage::new(Arc::new(store)))
        };

        let added = open()
            .add(ActionType::Update, EntityKind::Task, json!({"id": 4, "progress": 50}))
            .expect("add");

        let reloaded = open();
        let pending = reloaded.pending().expect("pending");
        assert_eq!(pending, vec![added.clone()]);
        assert!(!pending[0].synced);

        assert!(reloaded.mark_synced(&added.id).expect("mark"));
        assert!(open().pending().expect("pending").is_empty());
        assert_eq!(open().load().expect("load").len(), 1);
    }

    #[test]
    fn test_pending_keeps_insertion_order() {
        let queue = queue();
        let first = queue.add(ActionType::Create, EntityKind::Task, json!({"name": "a"})).expect("add");
        let second = queue.add(ActionType::Update, EntityKind::Task, json!({"id": 1})).expect("add");
        let third = queue.add(ActionType::Delete, EntityKind::Project, json!({"id": 2})).expect("add");
        queue.mark_synced(&second.id).expect("mark");

        let ids: Vec<String> = queue.pending().expect("pending").into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
    }

    #[test]
    fn test_mark_unknown_and_purge() {
        let queue = queue();
        assert!(!queue.mark_synced("action_0_missing").expect("mark"));

        let a = queue.add(ActionType::Create, EntityKind::User, json!({})).expect("add");
        queue.add(ActionType::Create, EntityKind::User, json!({})).expect("add");
        queue.mark_synced(&a.id).expect("mark");

        assert_eq!(queue.purge_synced().expect("purge"), 1);
        assert_eq!(queue.load().expect("load").len(), 1);

        queue.clear().expect("clear");
        assert_eq!(queue.pending_count().expect("count"), 0);
    }
}
