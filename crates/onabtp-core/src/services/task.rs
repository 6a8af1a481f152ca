use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::project::with_id;
use super::{Fetched, ServiceContext, WriteOutcome};
use crate::api::{Domain, SearchOptions};
use crate::models::{hydrate_tasks, Task, TaskDraft, TaskRow, TASK_FIELDS, TASK_MODEL};
use crate::sync::{ActionType, EntityKind};

#[derive(Clone)]
pub struct TaskService {
    ctx: ServiceContext,
}

impl TaskService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn fetch(&self, domain: Domain) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = self
            .ctx
            .client
            .search_read(
                &self.ctx.credentials,
                TASK_MODEL,
                &domain,
                TASK_FIELDS,
                &SearchOptions::default(),
            )
            .await?;
        Ok(hydrate_tasks(&rows))
    }

    /// All active tasks. A successful fetch replaces the cached tasks.
    pub async fn get_tasks(&self) -> Fetched<Vec<Task>> {
        match self.fetch(Domain::new().eq("active", true)).await {
            Ok(tasks) => {
                if let Err(e) = self.ctx.storage.cache_tasks(&tasks) {
                    warn!(error = %e, "Failed to cache tasks");
                }
                Fetched::network(tasks)
            }
            Err(e) => {
                warn!(error = %e, "Task fetch failed, using cache");
                Fetched::from_cache(self.ctx.storage.load_tasks(), "tasks")
            }
        }
    }

    /// Active tasks of one project. Does not touch the cache on success.
    pub async fn get_tasks_by_project(&self, project_id: i64) -> Fetched<Vec<Task>> {
        let domain = Domain::new().eq("active", true).eq("project_id", project_id);
        match self.fetch(domain).await {
            Ok(tasks) => Fetched::network(tasks),
            Err(e) => {
                warn!(project_id, error = %e, "Task fetch failed, using cache");
                let cached_at = self.cached_at();
                let tasks = self.ctx.storage.tasks_by_project(project_id).unwrap_or_else(|e| {
                    debug!(error = %e, "Task cache unreadable");
                    Vec::new()
                });
                Fetched::cache(tasks, cached_at)
            }
        }
    }

    pub async fn get_task(&self, id: i64) -> Fetched<Option<Task>> {
        match self.fetch(Domain::new().eq("id", id)).await {
            Ok(tasks) => Fetched::network(tasks.into_iter().next()),
            Err(e) => {
                warn!(id, error = %e, "Task fetch failed, using cache");
                let task = self.ctx.storage.task_by_id(id).unwrap_or_else(|e| {
                    debug!(error = %e, "Task cache unreadable");
                    None
                });
                Fetched::cache(task, self.cached_at())
            }
        }
    }

    fn cached_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.ctx
            .storage
            .load_tasks()
            .ok()
            .flatten()
            .map(|cached| cached.cached_at)
    }

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<WriteOutcome<i64>> {
        let values = draft.to_values();
        self.ctx
            .apply_or_queue(
                ActionType::Create,
                EntityKind::Task,
                values.clone(),
                self.ctx.client.create(&self.ctx.credentials, TASK_MODEL, &values),
            )
            .await
    }

    pub async fn update_task(&self, id: i64, values: Value) -> Result<WriteOutcome<bool>> {
        self.ctx
            .apply_or_queue(
                ActionType::Update,
                EntityKind::Task,
                with_id(id, &values),
                self.ctx.client.write(&self.ctx.credentials, TASK_MODEL, &[id], &values),
            )
            .await
    }

    pub async fn delete_task(&self, id: i64) -> Result<WriteOutcome<bool>> {
        self.ctx
            .apply_or_queue(
                ActionType::Delete,
                EntityKind::Task,
                json!({ "id": id }),
                self.ctx.client.unlink(&self.ctx.credentials, TASK_MODEL, &[id]),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::*;
    use crate::services::DataSource;
    use httpmock::prelude::*;

    fn seed(ctx: &ServiceContext) {
        let tasks: Vec<Task> = [(1, 3), (2, 4), (3, 3)]
            .iter()
            .map(|(id, project)| {
                let row: TaskRow = serde_json::from_value(json!({
                    "id": id,
                    "name": format!("Tâche {}", id),
                    "project_id": [project, "Chantier"]
                }))
                .expect("row");
                Task::from_row(&row)
            })
            .collect();
        ctx.storage.cache_tasks(&tasks).expect("seed");
    }

    #[tokio::test]
    async fn test_get_tasks_filters_active() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_includes("\"project.task\"")
                .body_includes("[[\"active\",\"=\",true]]");
            then.status(200).json_body(rpc_result(json!([
                {"id": 1, "name": "Fondations", "state": "1_done", "project_id": [3, "Villa"]}
            ])));
        });

        let ctx = context(&server.base_url());
        let fetched = TaskService::new(ctx.clone()).get_tasks().await;
        mock.assert();
        assert_eq!(fetched.source, DataSource::Network);
        assert_eq!(fetched.data[0].state, "done");
        assert_eq!(ctx.storage.load_tasks().expect("load").expect("cached").data.len(), 1);
    }

    #[tokio::test]
    async fn test_tasks_by_project_domain() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_includes("[[\"active\",\"=\",true],[\"project_id\",\"=\",3]]");
            then.status(200).json_body(rpc_result(json!([])));
        });
        let fetched = TaskService::new(context(&server.base_url()))
            .get_tasks_by_project(3)
            .await;
        mock.assert();
        assert!(fetched.data.is_empty());
        assert!(!fetched.is_offline());
    }

    #[tokio::test]
    async fn test_offline_reads_use_cache() {
        let ctx = context(OFFLINE);
        seed(&ctx);
        let service = TaskService::new(ctx);

        let all = service.get_tasks().await;
        assert!(all.is_offline());
        assert_eq!(all.data.len(), 3);

        let ids: Vec<i64> = service.get_tasks_by_project(3).await.data.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let task = service.get_task(2).await;
        assert_eq!(task.data.and_then(|t| t.project_id), Some(4));
        assert!(task.cached_at.is_some());
    }

    #[tokio::test]
    async fn test_create_task_queued_offline() {
        let ctx = context(OFFLINE);
        let mut draft = TaskDraft::new("Ferraillage");
        draft.project_id = Some(3);

        let outcome = TaskService::new(ctx.clone()).create_task(&draft).await.expect("create");
        let WriteOutcome::Queued(action_id) = outcome else {
            panic!("expected queued write");
        };
        let pending = ctx.queue.pending().expect("pending");
        assert_eq!(pending[0].id, action_id);
        assert_eq!(pending[0].action_type, ActionType::Create);
        assert_eq!(pending[0].data["name"], "Ferraillage");
    }

    #[tokio::test]
    async fn test_update_task_online() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_includes("\"write\"")
                .body_includes("[[42],{\"progress\":50}]");
            then.status(200).json_body(rpc_result(json!(true)));
        });
        let ctx = context(&server.base_url());
        let outcome = TaskService::new(ctx)
            .update_task(42, json!({"progress": 50}))
            .await
            .expect("update");
        mock.assert();
        assert_eq!(outcome, WriteOutcome::Applied(true));
    }
}
