use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::manager::KEY_SESSION;
use crate::cache::OfflineStorage;

/// The signed-in user. Odoo's JSON-RPC endpoint has no token, so the
/// session never expires; it lasts until logout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub uid: i64,
    pub login: String,
    pub database: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(uid: i64, login: &str, database: &str) -> Self {
        Self {
            uid,
            login: login.to_string(),
            database: database.to_string(),
            created_at: Utc::now(),
        }
    }
}

pub struct Session {
    storage: OfflineStorage,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(storage: OfflineStorage) -> Self {
        Self {
            storage,
            data: None,
        }
    }

    /// Load the session from storage
    pub fn load(&mut self) -> Result<bool> {
        self.data = self.storage.get_json(KEY_SESSION)?;
        Ok(self.data.is_some())
    }

    /// Save the session to storage
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            self.storage.set_json(KEY_SESSION, data)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        self.storage.remove(KEY_SESSION)
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn uid(&self) -> Option<i64> {
        self.data.as_ref().map(|d| d.uid)
    }

    pub fn login(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.login.as_str())
    }
}
