use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::queue::{ActionType, OfflineAction, SyncQueue};
use crate::api::{Credentials, OdooClient};
use crate::connectivity::{Connectivity, ConnectivityMonitor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Replays queued offline actions against Odoo, one at a time.
#[derive(Clone)]
pub struct SyncEngine {
    client: OdooClient,
    credentials: Credentials,
    queue: SyncQueue,
    connectivity: Connectivity,
    running: Arc<Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        client: OdooClient,
        credentials: Credentials,
        queue: SyncQueue,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            client,
            credentials,
            queue,
            connectivity,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Replay every unsynced action in insertion order.
    ///
    /// A failed action keeps `synced = false` with its attempt count and
    /// error recorded; replay moves on to the next one. Nothing is sent
    /// when the server is unreachable.
    pub async fn sync_pending_actions(&self) -> Result<SyncReport> {
        let _running = self.running.lock().await;

        if !self.connectivity.check().await {
            info!("Server unreachable, sync postponed");
            return Ok(SyncReport::default());
        }

        let pending = self.queue.pending()?;
        if pending.is_empty() {
            debug!("No pending actions to sync");
            return Ok(SyncReport::default());
        }
        info!(count = pending.len(), "Syncing pending actions");

        let mut outcomes: HashMap<String, Option<String>> = HashMap::new();
        for action in &pending {
            match self.replay(action).await {
                Ok(()) => {
                    debug!(id = %action.id, "Action synced");
                    outcomes.insert(action.id.clone(), None);
                }
                Err(e) => {
                    warn!(id = %action.id, action = %action.action_type, entity = %action.entity, error = %e, "Action sync failed");
                    outcomes.insert(action.id.clone(), Some(format!("{:#}", e)));
                }
            }
        }

        // Merge by id so actions queued during the replay are kept
        let report = self.queue.update(|actions| {
            let mut report = SyncReport {
                attempted: outcomes.len(),
                ..SyncReport::default()
            };
            for action in actions.iter_mut() {
                match outcomes.get(&action.id) {
                    Some(None) => {
                        action.synced = true;
                        action.last_error = None;
                        report.synced += 1;
                    }
                    Some(Some(error)) => {
                        action.attempts += 1;
                        action.last_error = Some(error.clone());
                        report.failed += 1;
                    }
                    None => {}
                }
            }
            report
        })?;

        info!(synced = report.synced, failed = report.failed, "Sync finished");
        Ok(report)
    }

    async fn replay(&self, action: &OfflineAction) -> Result<()> {
        let model = action.entity.model();
        match action.action_type {
            ActionType::Create => {
                let id = self
                    .client
                    .create(&self.credentials, model, &action.values())
                    .await?;
                debug!(model, id, "Record created from queue");
            }
            ActionType::Update => {
                let id = action.record_id()?;
                self.client
                    .write(&self.credentials, model, &[id], &action.values())
                    .await?;
            }
            ActionType::Delete => {
                let id = action.record_id()?;
                self.client.unlink(&self.credentials, model, &[id]).await?;
            }
        }
        Ok(())
    }

    /// Replay the queue each time the monitor goes from offline to online.
    ///
    /// Runs until the monitor is dropped.
    pub async fn run_on_reconnect(&self, monitor: &ConnectivityMonitor) {
        let mut rx = monitor.subscribe();
        let mut was_online = *rx.borrow_and_update();

        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online && !was_online {
                info!("Back online, replaying queued actions");
                if let Err(e) = self.sync_pending_actions().await {
                    warn!(error = %e, "Sync after reconnect failed");
                }
            }
            was_online = online;
        }
    }
}
