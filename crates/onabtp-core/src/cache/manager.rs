use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::store::KeyValueStore;
use crate::models::{Employee, Project, Task, UserProfile};
use crate::sync::OfflineAction;

/// Consider cache stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

pub const KEY_CACHED_USER: &str = "cached_user";
pub const KEY_PROJECTS: &str = "cached_projects";
pub const KEY_TASKS: &str = "cached_tasks";
pub const KEY_USERS: &str = "cached_users";
pub const KEY_PROFILE: &str = "cached_profile";
pub const KEY_SYNC_QUEUE: &str = "sync_queue";
pub const KEY_SESSION: &str = "session";
/// Last email that signed in. Survives logout so the login prompt can offer it.
pub const KEY_LAST_LOGIN: &str = "last_login";
pub const KEY_PROJECTS_LAST_SYNC: &str = "projects_last_sync";
pub const KEY_TASKS_LAST_SYNC: &str = "tasks_last_sync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// The last user who signed in successfully, for offline login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedUser {
    pub uid: i64,
    pub email: String,
    pub name: String,
    pub last_login: DateTime<Utc>,
}

impl CachedUser {
    pub fn new(uid: i64, email: &str) -> Self {
        let name = email.split('@').next().unwrap_or(email).to_string();
        Self {
            uid,
            email: email.to_string(),
            name,
            last_login: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub user_cached: bool,
    pub projects_count: usize,
    pub tasks_count: usize,
    pub pending_actions: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub projects_age: Option<String>,
    pub tasks_age: Option<String>,
}

/// Typed access to everything the client keeps offline.
#[derive(Clone)]
pub struct OfflineStorage {
    store: Arc<dyn KeyValueStore>,
}

impl OfflineStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(contents) => {
                let value = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse cache entry: {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize cache entry: {}", key))?;
        self.store.set(key, &contents)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    fn save_collection<T: Serialize>(&self, key: &str, sync_key: &str, items: &[T]) -> Result<()> {
        let cached = CachedData::new(items);
        self.set_json(key, &cached)?;
        self.set_json(sync_key, &cached.cached_at)?;
        debug!(cache = key, count = items.len(), "Collection cached");
        Ok(())
    }

    // ===== User =====

    pub fn cache_user(&self, user: &CachedUser) -> Result<()> {
        self.set_json(KEY_CACHED_USER, user)
    }

    pub fn cached_user(&self) -> Result<Option<CachedUser>> {
        self.get_json(KEY_CACHED_USER)
    }

    pub fn clear_user(&self) -> Result<()> {
        self.store.remove(KEY_CACHED_USER)
    }

    pub fn set_last_login(&self, email: &str) -> Result<()> {
        self.set_json(KEY_LAST_LOGIN, email)
    }

    pub fn last_login(&self) -> Result<Option<String>> {
        self.get_json(KEY_LAST_LOGIN)
    }

    // ===== Projects =====

    pub fn cache_projects(&self, projects: &[Project]) -> Result<()> {
        self.save_collection(KEY_PROJECTS, KEY_PROJECTS_LAST_SYNC, projects)
    }

    pub fn load_projects(&self) -> Result<Option<CachedData<Vec<Project>>>> {
        self.get_json(KEY_PROJECTS)
    }

    pub fn project_by_id(&self, id: i64) -> Result<Option<Project>> {
        Ok(self
            .load_projects()?
            .and_then(|cached| cached.data.into_iter().find(|p| p.id == id)))
    }

    // ===== Tasks =====

    pub fn cache_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.save_collection(KEY_TASKS, KEY_TASKS_LAST_SYNC, tasks)
    }

    pub fn load_tasks(&self) -> Result<Option<CachedData<Vec<Task>>>> {
        self.get_json(KEY_TASKS)
    }

    pub fn task_by_id(&self, id: i64) -> Result<Option<Task>> {
        Ok(self
            .load_tasks()?
            .and_then(|cached| cached.data.into_iter().find(|t| t.id == id)))
    }

    pub fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .map(|cached| {
                cached
                    .data
                    .into_iter()
                    .filter(|t| t.project_id == Some(project_id))
                    .collect()
            })
            .unwrap_or_default())
    }

    // ===== Users =====

    pub fn cache_employees(&self, employees: &[Employee]) -> Result<()> {
        self.set_json(KEY_USERS, &CachedData::new(employees))
    }

    pub fn load_employees(&self) -> Result<Option<CachedData<Vec<Employee>>>> {
        self.get_json(KEY_USERS)
    }

    pub fn cache_profile(&self, profile: &UserProfile) -> Result<()> {
        self.set_json(KEY_PROFILE, &CachedData::new(profile))
    }

    pub fn load_profile(&self) -> Result<Option<CachedData<UserProfile>>> {
        self.get_json(KEY_PROFILE)
    }

    // ===== Sync queue =====

    pub fn load_queue(&self) -> Result<Vec<OfflineAction>> {
        Ok(self.get_json(KEY_SYNC_QUEUE)?.unwrap_or_default())
    }

    pub fn save_queue(&self, queue: &[OfflineAction]) -> Result<()> {
        self.set_json(KEY_SYNC_QUEUE, queue)
    }

    // ===== Maintenance =====

    /// Helper to load cache and log errors without failing
    fn load_age<T>(&self, name: &str, loader: impl FnOnce() -> Result<Option<CachedData<T>>>) -> Option<String> {
        match loader() {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let projects = self.load_projects()?;
        let tasks = self.load_tasks()?;
        Ok(CacheStats {
            user_cached: self.cached_user()?.is_some(),
            projects_count: projects.as_ref().map(|c| c.data.len()).unwrap_or(0),
            tasks_count: tasks.as_ref().map(|c| c.data.len()).unwrap_or(0),
            pending_actions: self.load_queue()?.iter().filter(|a| !a.synced).count(),
            last_sync: self.get_json(KEY_PROJECTS_LAST_SYNC)?,
            projects_age: self.load_age(KEY_PROJECTS, || Ok(projects)),
            tasks_age: self.load_age(KEY_TASKS, || Ok(tasks)),
        })
    }

    /// Helper to check staleness and log errors without failing
    fn is_cache_stale<T>(&self, name: &str, loader: impl FnOnce() -> Result<Option<CachedData<T>>>) -> bool {
        match loader() {
            Ok(Some(cached)) => cached.is_stale(),
            Ok(None) => true,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for staleness check");
                true
            }
        }
    }

    /// Check if either entity collection is missing or stale
    pub fn any_stale(&self) -> bool {
        self.is_cache_stale(KEY_PROJECTS, || self.load_projects())
            || self.is_cache_stale(KEY_TASKS, || self.load_tasks())
    }

    /// Wipe every key, queue included.
    pub fn clear_all(&self) -> Result<()> {
        self.store.clear()
    }
}

// ============================================================================
// Tests
// ============================================================================
