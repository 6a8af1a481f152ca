//! API client for the Odoo JSON-RPC endpoint.
//!
//! Every call is a POST of a `call` envelope to `<url>/jsonrpc`. The
//! `common` service handles login and version probes; the `object`
//! service runs `execute_kw` against a model on behalf of a user.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;

use super::error::is_transport_error;
use super::rpc::{Domain, RpcRequest, RpcResponse, SearchOptions};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the JSON-RPC endpoint below the server URL.
const JSONRPC_PATH: &str = "/jsonrpc";

/// User agent sent with every request.
const USER_AGENT: &str = concat!("onabtp/", env!("CARGO_PKG_VERSION"));

/// Backoff policy for transport failures on retried calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each following one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// The uid/password pair `execute_kw` authenticates each call with.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub uid: i64,
    pub password: String,
}

impl Credentials {
    pub fn new(uid: i64, password: impl Into<String>) -> Self {
        Self {
            uid,
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("password", &"***")
            .finish()
    }
}

/// Answer of `common.version`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerVersion {
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub protocol_version: Option<i64>,
}

/// Odoo JSON-RPC client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct OdooClient {
    client: Client,
    endpoint: String,
    database: String,
    retry: RetryPolicy,
    request_id: Arc<AtomicU64>,
    offline: bool,
}

impl OdooClient {
    /// Create a new client for the server and database named in the config
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.url.trim_end_matches('/'), JSONRPC_PATH),
            database: config.database.clone(),
            retry: config.retry_policy(),
            request_id: Arc::new(AtomicU64::new(1)),
            offline: config.offline_mode,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a single `call` envelope and unwrap its result.
    pub async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        if self.offline {
            return Err(ApiError::Offline.into());
        }
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::call(service, method, args, id);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {}.{} request", service, method))?;

        let response = Self::check_response(response).await?;

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse {}.{} response", service, method))?;

        if let Some(error) = envelope.error {
            debug!(service, method, code = error.code, message = %error.message, "RPC error");
            return Err(ApiError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            }
            .into());
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// Like `call`, retrying transport failures with exponential backoff.
    async fn call_with_retry(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let mut attempt = 1;

        loop {
            match self.call(service, method, args.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if !self.offline && is_transport_error(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        service,
                        method,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ===== common service =====

    /// Probe the server with `common.version`
    pub async fn version(&self) -> Result<ServerVersion> {
        let value = self.call("common", "version", vec![]).await?;
        serde_json::from_value(value).context("Failed to parse version response")
    }

    /// Authenticate and return the uid, or `None` when Odoo rejects the credentials.
    pub async fn login(&self, login: &str, password: &str) -> Result<Option<i64>> {
        debug!(login, database = %self.database, "Authenticating");
        let args = vec![json!(self.database), json!(login), json!(password)];
        let value = self.call_with_retry("common", "login", args).await?;

        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| ApiError::InvalidResponse(format!("uid {} is not an integer", n)).into()),
            Value::Bool(false) | Value::Null => Ok(None),
            other => Err(ApiError::InvalidResponse(format!("Unexpected login result: {}", other)).into()),
        }
    }

    // ===== object service =====

    /// Run `execute_kw` on a model
    pub async fn execute_kw(
        &self,
        creds: &Credentials,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        let call_args = vec![
            json!(self.database),
            json!(creds.uid),
            json!(creds.password),
            json!(model),
            json!(method),
            Value::Array(args),
            Value::Object(kwargs),
        ];
        self.call("object", "execute_kw", call_args)
            .await
            .with_context(|| format!("{}.{} failed", model, method))
    }

    /// Fetch rows matching a domain
    pub async fn search_read<T: DeserializeOwned>(
        &self,
        creds: &Credentials,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<T>> {
        let value = self
            .execute_kw(
                creds,
                model,
                "search_read",
                vec![domain.to_value()],
                options.to_kwargs(fields),
            )
            .await?;

        let rows: Vec<T> = match value {
            Value::Null | Value::Bool(false) => Vec::new(),
            other => serde_json::from_value(other)
                .with_context(|| format!("Failed to parse {} rows", model))?,
        };
        debug!(model, count = rows.len(), "search_read complete");
        Ok(rows)
    }

    /// Create a record and return its id
    pub async fn create(&self, creds: &Credentials, model: &str, values: &Value) -> Result<i64> {
        let value = self
            .execute_kw(creds, model, "create", vec![values.clone()], Map::new())
            .await?;
        value
            .as_i64()
            .ok_or_else(|| ApiError::InvalidResponse(format!("create returned {}", value)).into())
    }

    /// Write values onto existing records
    pub async fn write(&self, creds: &Credentials, model: &str, ids: &[i64], values: &Value) -> Result<bool> {
        let value = self
            .execute_kw(creds, model, "write", vec![json!(ids), values.clone()], Map::new())
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Delete records
    pub async fn unlink(&self, creds: &Credentials, model: &str, ids: &[i64]) -> Result<bool> {
        let value = self
            .execute_kw(creds, model, "unlink", vec![json!(ids)], Map::new())
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}
