use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::session::{Session, SessionData};
use crate::api::{ApiError, OdooClient};
use crate::cache::{CachedUser, OfflineStorage};
use crate::connectivity::Connectivity;
use crate::services::DataSource;

/// A successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub uid: i64,
    pub source: DataSource,
    /// Background check of cached credentials against the server, present
    /// for cache logins. Resolves to whether the server accepted the
    /// password, or `None` when it could not be asked.
    pub revalidation: Option<JoinHandle<Option<bool>>>,
}

impl LoginOutcome {
    /// Whether the server accepted the password.
    ///
    /// Online logins are confirmed already; cache logins wait for the
    /// revalidation. `None` when the server could not be asked.
    pub async fn password_confirmed(&mut self) -> Option<bool> {
        match self.revalidation.take() {
            None => (self.source == DataSource::Network).then_some(true),
            Some(handle) => match handle.await {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    debug!(error = %e, "Revalidation task did not finish");
                    None
                }
            },
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    client: OdooClient,
    storage: OfflineStorage,
    connectivity: Connectivity,
}

impl AuthService {
    pub fn new(client: OdooClient, storage: OfflineStorage, connectivity: Connectivity) -> Self {
        Self {
            client,
            storage,
            connectivity,
        }
    }

    /// Sign in, from the cached user when the email matches, else online.
    ///
    /// A cache login does not check the password locally; the spawned
    /// revalidation is the only server-side check.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = email.trim();

        if let Some(cached) = self.storage.cached_user()? {
            if cached.email == email {
                info!(uid = cached.uid, "Logged in from cached user");
                self.open_session(cached.uid, email)?;
                let revalidation = self.spawn_revalidation(email.to_string(), password.to_string());
                return Ok(LoginOutcome {
                    uid: cached.uid,
                    source: DataSource::Cache,
                    revalidation: Some(revalidation),
                });
            }
        }

        let uid = match self.client.login(email, password).await {
            Ok(Some(uid)) => uid,
            Ok(None) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(classify_login_error(&e)),
        };

        remember_user(&self.storage, uid, email)?;
        self.open_session(uid, email)?;
        info!(uid, "Logged in online");
        Ok(LoginOutcome {
            uid,
            source: DataSource::Network,
            revalidation: None,
        })
    }

    fn open_session(&self, uid: i64, email: &str) -> Result<()> {
        let mut session = Session::new(self.storage.clone());
        session.update(SessionData::new(uid, email, self.client.database()));
        session.save()
    }

    fn spawn_revalidation(&self, email: String, password: String) -> JoinHandle<Option<bool>> {
        let client = self.client.clone();
        let storage = self.storage.clone();
        tokio::spawn(async move {
            match client.login(&email, &password).await {
                Ok(Some(uid)) => {
                    if let Err(e) = remember_user(&storage, uid, &email) {
                        warn!(error = %e, "Failed to refresh cached user");
                    } else {
                        debug!(uid, "Cached credentials confirmed by server");
                    }
                    Some(true)
                }
                Ok(None) => {
                    warn!("Server rejected the cached credentials");
                    Some(false)
                }
                Err(e) => match classify_login_error(&e) {
                    AuthError::InvalidCredentials => {
                        warn!("Server rejected the cached credentials");
                        Some(false)
                    }
                    _ => {
                        debug!(error = %e, "Background revalidation skipped");
                        None
                    }
                },
            }
        })
    }

    /// True with a session, provided either the server answers or the
    /// cached user matches the session while offline.
    pub async fn is_authenticated(&self) -> Result<bool> {
        let mut session = Session::new(self.storage.clone());
        if !session.load()? {
            return Ok(false);
        }

        if self.connectivity.check().await {
            match self.client.version().await {
                Ok(_) => return Ok(true),
                Err(e) => debug!(error = %e, "Version probe failed, checking cached user"),
            }
        }

        let cached_uid = self.storage.cached_user()?.map(|u| u.uid);
        Ok(cached_uid.is_some() && cached_uid == session.uid())
    }

    pub fn session(&self) -> Result<Option<SessionData>> {
        let mut session = Session::new(self.storage.clone());
        session.load()?;
        Ok(session.data)
    }

    pub fn current_user(&self) -> Result<Option<CachedUser>> {
        self.storage.cached_user()
    }

    /// Drop the session and the cached user. `last_login` is kept.
    pub fn logout(&self) -> Result<()> {
        Session::new(self.storage.clone()).clear()?;
        self.storage.clear_user()?;
        info!("Logged out");
        Ok(())
    }

    /// Wipe the whole offline cache, queue included.
    pub fn clear_cache(&self) -> Result<()> {
        self.storage.clear_all()
    }
}

fn remember_user(storage: &OfflineStorage, uid: i64, email: &str) -> Result<()> {
    storage.cache_user(&CachedUser::new(uid, email))?;
    storage.set_last_login(email)
}

/// Only a failure to reach the server asks for a connection; an HTTP
/// error status from a reachable server is a server error.
fn classify_login_error(err: &anyhow::Error) -> AuthError {
    match err.chain().find_map(|e| e.downcast_ref::<ApiError>()) {
        Some(ApiError::Rpc { .. }) => AuthError::InvalidCredentials,
        Some(ApiError::NetworkError(_)) | Some(ApiError::Offline) => AuthError::NetworkRequired,
        _ => AuthError::Server(format!("{:#}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::Config;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use serde_json::json;
    use std::sync::Arc;

    const OFFLINE: &str = "http://127.0.0.1:1";

    fn service(url: &str) -> (AuthService, OfflineStorage) {
        let config = Config::for_tests(url);
        let storage = OfflineStorage::new(Arc::new(MemoryStore::new()));
        let service = AuthService::new(
            OdooClient::new(&config).expect("client"),
            storage.clone(),
            Connectivity::new(&config).expect("probe"),
        );
        (service, storage)
    }

    fn login_result(server: &MockServer, result: serde_json::Value) {
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc").body_includes("\"login\"");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": result}));
        });
    }

    #[tokio::test]
    async fn test_cached_login_works_offline() {
        let (auth, storage) = service(OFFLINE);
        storage.cache_user(&CachedUser::new(7, "awa@onabtp.sn")).expect("seed");

        let outcome = auth.login(" awa@onabtp.sn ", "secret").await.expect("login");
        assert_eq!(outcome.uid, 7);
        assert_eq!(outcome.source, DataSource::Cache);
        let confirmed = outcome.revalidation.expect("revalidation").await.expect("join");
        assert_eq!(confirmed, None);

        let session = auth.session().expect("session").expect("present");
        assert_eq!(session.uid, 7);
        assert_eq!(auth.current_user().expect("user").map(|u| u.uid), Some(7));
    }

    #[tokio::test]
    async fn test_other_email_needs_network() {
        let (auth, storage) = service(OFFLINE);
        storage.cache_user(&CachedUser::new(7, "awa@onabtp.sn")).expect("seed");

        let err = auth.login("moussa@onabtp.sn", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkRequired));
        assert!(auth.session().expect("session").is_none());
    }

    #[tokio::test]
    async fn test_online_login_caches_user() {
        let server = MockServer::start();
        login_result(&server, json!(9));
        let (auth, storage) = service(&server.base_url());

        let outcome = auth.login("awa@onabtp.sn", "secret").await.expect("login");
        assert_eq!(outcome.uid, 9);
        assert_eq!(outcome.source, DataSource::Network);
        assert!(outcome.revalidation.is_none());

        let cached = storage.cached_user().expect("read").expect("cached");
        assert_eq!(cached.name, "awa");
        assert_eq!(storage.last_login().expect("read").as_deref(), Some("awa@onabtp.sn"));
    }

    #[tokio::test]
    async fn test_revalidation_refreshes_cached_user() {
        let server = MockServer::start();
        login_result(&server, json!(7));
        let (auth, storage) = service(&server.base_url());
        let mut stale = CachedUser::new(7, "awa@onabtp.sn");
        stale.last_login = chrono::Utc::now() - chrono::Duration::days(3);
        storage.cache_user(&stale).expect("seed");

        let mut outcome = auth.login("awa@onabtp.sn", "secret").await.expect("login");
        assert_eq!(outcome.password_confirmed().await, Some(true));

        let refreshed = storage.cached_user().expect("read").expect("cached");
        assert!(refreshed.last_login > stale.last_login);
    }

    #[tokio::test]
    async fn test_cache_login_with_wrong_password_is_not_confirmed() {
        let server = MockServer::start();
        login_result(&server, json!(false));
        let (auth, storage) = service(&server.base_url());
        storage.cache_user(&CachedUser::new(7, "awa@onabtp.sn")).expect("seed");

        let mut outcome = auth.login("awa@onabtp.sn", "typo").await.expect("login");
        assert_eq!(outcome.source, DataSource::Cache);
        assert_eq!(outcome.password_confirmed().await, Some(false));
    }

    #[tokio::test]
    async fn test_online_login_is_confirmed() {
        let server = MockServer::start();
        login_result(&server, json!(9));
        let (auth, _) = service(&server.base_url());
        let mut outcome = auth.login("awa@onabtp.sn", "secret").await.expect("login");
        assert_eq!(outcome.password_confirmed().await, Some(true));
    }

    #[tokio::test]
    async fn test_server_error_status_is_not_a_network_problem() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc");
            then.status(500).body("Internal Server Error");
        });
        let (auth, _) = service(&server.base_url());
        let err = auth.login("awa@onabtp.sn", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Server(_)));
        assert_eq!(err.to_string(), "Erreur de connexion au serveur");
    }

    #[tokio::test]
    async fn test_offline_mode_needs_network() {
        let mut config = Config::for_tests(OFFLINE);
        config.offline_mode = true;
        let auth = AuthService::new(
            OdooClient::new(&config).expect("client"),
            OfflineStorage::new(Arc::new(MemoryStore::new())),
            Connectivity::new(&config).expect("probe"),
        );
        let err = auth.login("awa@onabtp.sn", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkRequired));
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start();
        login_result(&server, json!(false));
        let (auth, _) = service(&server.base_url());
        let err = auth.login("awa@onabtp.sn", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Identifiants incorrects");
    }

    #[tokio::test]
    async fn test_rpc_error_means_invalid_credentials() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 200, "message": "Odoo Server Error", "data": {"name": "odoo.exceptions.AccessDenied"}}
            }));
        });
        let (auth, _) = service(&server.base_url());
        let err = auth.login("awa@onabtp.sn", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_is_authenticated_offline_uses_cached_uid() {
        let (auth, storage) = service(OFFLINE);
        assert!(!auth.is_authenticated().await.expect("check"));

        storage.cache_user(&CachedUser::new(7, "awa@onabtp.sn")).expect("seed");
        auth.open_session(7, "awa@onabtp.sn").expect("session");
        assert!(auth.is_authenticated().await.expect("check"));

        auth.open_session(8, "other@onabtp.sn").expect("session");
        assert!(!auth.is_authenticated().await.expect("check"));
    }

    #[tokio::test]
    async fn test_is_authenticated_online() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/jsonrpc");
            then.status(200);
        });
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc").body_includes("\"version\"");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0", "id": 1, "result": {"server_version": "17.0"}
            }));
        });
        let (auth, _) = service(&server.base_url());
        auth.open_session(7, "awa@onabtp.sn").expect("session");
        assert!(auth.is_authenticated().await.expect("check"));
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_user() {
        let (auth, storage) = service(OFFLINE);
        storage.cache_user(&CachedUser::new(7, "awa@onabtp.sn")).expect("seed");
        storage.set_last_login("awa@onabtp.sn").expect("seed");
        auth.login("awa@onabtp.sn", "secret").await.expect("login");

        auth.logout().expect("logout");
        assert!(auth.session().expect("session").is_none());
        assert!(auth.current_user().expect("user").is_none());
        assert!(!auth.is_authenticated().await.expect("check"));
        assert_eq!(storage.last_login().expect("read").as_deref(), Some("awa@onabtp.sn"));
    }
}
