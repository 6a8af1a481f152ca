use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Fetched, ServiceContext, WriteOutcome};
use crate::api::{Domain, SearchOptions};
use crate::models::{
    hydrate_projects, Project, ProjectRow, PROJECT_DETAIL_FIELDS, PROJECT_LIST_FIELDS,
    PROJECT_MODEL,
};
use crate::sync::{ActionType, EntityKind};

const PROJECT_LIMIT: u32 = 100;
const PROJECT_ORDER: &str = "create_date desc";

#[derive(Clone)]
pub struct ProjectService {
    ctx: ServiceContext,
}

impl ProjectService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        let domain = Domain::new().eq("user_id", self.ctx.credentials.uid);
        let options = SearchOptions {
            limit: Some(PROJECT_LIMIT),
            order: Some(PROJECT_ORDER.to_string()),
        };
        let rows: Vec<ProjectRow> = self
            .ctx
            .client
            .search_read(&self.ctx.credentials, PROJECT_MODEL, &domain, PROJECT_LIST_FIELDS, &options)
            .await?;
        Ok(hydrate_projects(&rows))
    }

    /// Projects managed by the signed-in user, newest first.
    pub async fn get_projects(&self) -> Fetched<Vec<Project>> {
        match self.fetch_projects().await {
            Ok(projects) => {
                if let Err(e) = self.ctx.storage.cache_projects(&projects) {
                    warn!(error = %e, "Failed to cache projects");
                }
                Fetched::network(projects)
            }
            Err(e) => {
                warn!(error = %e, "Project fetch failed, using cache");
                Fetched::from_cache(self.ctx.storage.load_projects(), "projects")
            }
        }
    }

    pub async fn get_project(&self, id: i64) -> Fetched<Option<Project>> {
        let rows: Result<Vec<ProjectRow>> = self
            .ctx
            .client
            .search_read(
                &self.ctx.credentials,
                PROJECT_MODEL,
                &Domain::new().eq("id", id),
                PROJECT_DETAIL_FIELDS,
                &SearchOptions::default(),
            )
            .await;

        match rows {
            Ok(rows) => Fetched::network(hydrate_projects(&rows).into_iter().next()),
            Err(e) => {
                warn!(id, error = %e, "Project fetch failed, using cache");
                let cached = self.ctx.storage.load_projects().unwrap_or_else(|e| {
                    debug!(error = %e, "Project cache unreadable");
                    None
                });
                match cached {
                    Some(cached) => {
                        let at = cached.cached_at;
                        Fetched::cache(cached.data.into_iter().find(|p| p.id == id), Some(at))
                    }
                    None => Fetched::cache(None, None),
                }
            }
        }
    }

    pub async fn create_project(&self, values: Value) -> Result<WriteOutcome<i64>> {
        self.ctx
            .apply_or_queue(
                ActionType::Create,
                EntityKind::Project,
                values.clone(),
                self.ctx.client.create(&self.ctx.credentials, PROJECT_MODEL, &values),
            )
            .await
    }

    pub async fn update_project(&self, id: i64, values: Value) -> Result<WriteOutcome<bool>> {
        self.ctx
            .apply_or_queue(
                ActionType::Update,
                EntityKind::Project,
                with_id(id, &values),
                self.ctx.client.write(&self.ctx.credentials, PROJECT_MODEL, &[id], &values),
            )
            .await
    }

    pub async fn delete_project(&self, id: i64) -> Result<WriteOutcome<bool>> {
        self.ctx
            .apply_or_queue(
                ActionType::Delete,
                EntityKind::Project,
                json!({ "id": id }),
                self.ctx.client.unlink(&self.ctx.credentials, PROJECT_MODEL, &[id]),
            )
            .await
    }
}

/// Queue payload for an update: the values plus the record id.
pub(crate) fn with_id(id: i64, values: &Value) -> Value {
    let mut data = match values {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    data.insert("id".to_string(), json!(id));
    Value::Object(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::*;
    use crate::services::DataSource;
    use httpmock::prelude::*;

    fn project_rows() -> Value {
        json!([
            {"id": 2, "name": "Immeuble Plateau", "state": "open", "user_id": [7, "Awa"], "partner_id": false},
            {"id": 1, "name": "Villa Almadies", "state": "draft", "user_id": [7, "Awa"], "partner_id": [3, "SONATEL"]}
        ])
    }

    #[tokio::test]
    async fn test_get_projects_caches_result() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_includes("\"project.project\"")
                .body_includes("\"create_date desc\"")
                .body_includes("\"limit\":100")
                .body_includes("[[\"user_id\",\"=\",7]]");
            then.status(200).json_body(rpc_result(project_rows()));
        });

        let ctx = context(&server.base_url());
        let fetched = ProjectService::new(ctx.clone()).get_projects().await;
        mock.assert();
        assert_eq!(fetched.source, DataSource::Network);
        assert_eq!(fetched.data.len(), 2);
        assert_eq!(fetched.data[1].partner_name, "SONATEL");

        let cached = ctx.storage.load_projects().expect("load").expect("cached");
        assert_eq!(cached.data, fetched.data);
    }

    #[tokio::test]
    async fn test_get_projects_falls_back_to_cache() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc");
            then.status(200).json_body(rpc_result(project_rows()));
        });
        let online = context(&server.base_url());
        let live = ProjectService::new(online.clone()).get_projects().await;

        let mut offline = context(OFFLINE);
        offline.storage = online.storage.clone();
        let fetched = ProjectService::new(offline).get_projects().await;
        assert_eq!(fetched.source, DataSource::Cache);
        assert_eq!(fetched.data, live.data);
        assert!(fetched.cached_at.is_some());
    }

    #[tokio::test]
    async fn test_get_projects_empty_cache_offline() {
        let fetched = ProjectService::new(context(OFFLINE)).get_projects().await;
        assert!(fetched.is_offline());
        assert!(fetched.data.is_empty());
        assert!(fetched.cached_at.is_none());
    }

    #[tokio::test]
    async fn test_get_project_from_cache() {
        let ctx = context(OFFLINE);
        let row: ProjectRow = serde_json::from_value(json!({"id": 5, "name": "Pont"})).expect("row");
        ctx.storage.cache_projects(&[Project::from_row(&row)]).expect("seed");

        let service = ProjectService::new(ctx);
        assert_eq!(service.get_project(5).await.data.map(|p| p.name), Some("Pont".to_string()));
        assert!(service.get_project(6).await.data.is_none());
    }

    #[tokio::test]
    async fn test_update_queued_offline() {
        let ctx = context(OFFLINE);
        let outcome = ProjectService::new(ctx.clone())
            .update_project(3, json!({"name": "Villa B"}))
            .await
            .expect("update");
        assert!(outcome.is_queued());

        let pending = ctx.queue.pending().expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity, EntityKind::Project);
        assert_eq!(pending[0].data, json!({"id": 3, "name": "Villa B"}));
    }

    #[tokio::test]
    async fn test_create_project_queued_offline() {
        let ctx = context(OFFLINE);
        let outcome = ProjectService::new(ctx.clone())
            .create_project(json!({"name": "Ecole Thiès"}))
            .await
            .expect("create");
        let WriteOutcome::Queued(action_id) = outcome else {
            panic!("expected queued write");
        };

        let pending = ctx.queue.pending().expect("pending");
        assert_eq!(pending[0].id, action_id);
        assert_eq!(pending[0].action_type, ActionType::Create);
        assert_eq!(pending[0].entity, EntityKind::Project);
        assert_eq!(pending[0].data, json!({"name": "Ecole Thiès"}));
    }

    #[tokio::test]
    async fn test_create_project_applied_online() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_includes("\"project.project\"")
                .body_includes("\"create\"");
            then.status(200).json_body(rpc_result(json!(12)));
        });
        let ctx = context(&server.base_url());
        let outcome = ProjectService::new(ctx.clone())
            .create_project(json!({"name": "Ecole Thiès"}))
            .await
            .expect("create");
        mock.assert();
        assert_eq!(outcome, WriteOutcome::Applied(12));
        assert_eq!(ctx.queue.pending_count().expect("count"), 0);
    }

    #[tokio::test]
    async fn test_delete_applied_online() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc").body_includes("\"unlink\"");
            then.status(200).json_body(rpc_result(json!(true)));
        });
        let ctx = context(&server.base_url());
        let outcome = ProjectService::new(ctx.clone()).delete_project(3).await.expect("delete");
        assert_eq!(outcome, WriteOutcome::Applied(true));
        assert_eq!(ctx.queue.pending_count().expect("count"), 0);
    }
}
