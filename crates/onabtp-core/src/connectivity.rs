//! Reachability checks for the Odoo server.
//!
//! `Connectivity::check` is the quick probe used before replaying the sync
//! queue or trusting a cached login. `ConnectivityMonitor` polls it and
//! publishes online/offline transitions on a watch channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::OdooClient;
use crate::config::Config;

#[derive(Clone)]
pub struct Connectivity {
    http: Client,
    server_url: String,
    internet_probe_url: String,
    forced_offline: bool,
}

/// Result of a full network diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDiagnostic {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub internet_reachable: bool,
    pub odoo_reachable: bool,
    pub server_version: Option<String>,
    /// Round trip of the Odoo probe, in milliseconds.
    pub response_time_ms: Option<u64>,
    pub error_details: Option<String>,
}

impl NetworkDiagnostic {
    pub fn is_connected(&self) -> bool {
        self.internet_reachable || self.odoo_reachable
    }

    pub fn summary(&self) -> &'static str {
        match (self.internet_reachable, self.odoo_reachable) {
            (_, true) => "Serveur Odoo accessible",
            (true, false) => "Internet accessible mais serveur Odoo injoignable",
            (false, false) => "Aucune connexion réseau",
        }
    }
}

impl Connectivity {
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = config.connectivity_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build probe HTTP client")?;
        Ok(Self {
            http,
            server_url: format!("{}/jsonrpc", config.url.trim_end_matches('/')),
            internet_probe_url: config.internet_probe_url.clone(),
            forced_offline: config.offline_mode,
        })
    }

    /// Quick HEAD probe of the JSON-RPC endpoint.
    ///
    /// Any answer below 500 counts as reachable; Odoo may refuse HEAD on
    /// this route while still serving POSTs.
    pub async fn check(&self) -> bool {
        if self.forced_offline {
            return false;
        }
        match self.http.head(&self.server_url).send().await {
            Ok(response) => {
                let online = !response.status().is_server_error();
                debug!(status = %response.status(), online, "Connectivity probe answered");
                online
            }
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }

    async fn internet_reachable(&self) -> bool {
        match self.http.get(&self.internet_probe_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Internet probe failed");
                false
            }
        }
    }

    /// Probe general internet access and the Odoo server side by side.
    pub async fn diagnostic(&self, client: &OdooClient) -> NetworkDiagnostic {
        let odoo_probe = async {
            let started = Instant::now();
            let result = client.version().await;
            (result, started.elapsed())
        };
        let (internet_reachable, (version, elapsed)) =
            futures::join!(self.internet_reachable(), odoo_probe);

        let (odoo_reachable, server_version, response_time_ms, error_details) = match version {
            Ok(v) => (true, Some(v.server_version), Some(elapsed.as_millis() as u64), None),
            Err(e) => (false, None, None, Some(crate::api::diagnose(&e).to_string())),
        };

        NetworkDiagnostic {
            timestamp: chrono::Utc::now(),
            internet_reachable,
            odoo_reachable,
            server_version,
            response_time_ms,
            error_details,
        }
    }
}

/// Publishes the online state; subscribers see each change once.
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
    poller: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    /// A monitor driven by hand through `set_online`.
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            poller: None,
        }
    }

    /// Poll `connectivity` every `interval` and publish transitions.
    pub async fn start(connectivity: Connectivity, interval: Duration) -> Self {
        let mut monitor = Self::new(connectivity.check().await);
        let tx = Arc::clone(&monitor.tx);
        monitor.poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let online = connectivity.check().await;
                publish(&tx, online);
            }
        }));
        monitor
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        publish(&self.tx, online);
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

fn publish(tx: &watch::Sender<bool>, online: bool) {
    let changed = tx.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    });
    if changed {
        info!(online, "Connectivity changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    #[tokio::test]
    async fn test_check_online() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(HEAD).path("/jsonrpc");
            then.status(405);
        });

        let connectivity = Connectivity::new(&Config::for_tests(&server.base_url())).expect("probe");
        assert!(connectivity.check().await);
        probe.assert();
    }

    #[tokio::test]
    async fn test_check_server_error_is_offline() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/jsonrpc");
            then.status(503);
        });

        let connectivity = Connectivity::new(&Config::for_tests(&server.base_url())).expect("probe");
        assert!(!connectivity.check().await);
    }

    #[tokio::test]
    async fn test_check_unreachable() {
        let connectivity = Connectivity::new(&Config::for_tests("http://127.0.0.1:1")).expect("probe");
        assert!(!connectivity.check().await);
    }

    #[tokio::test]
    async fn test_forced_offline_skips_probe() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(HEAD).path("/jsonrpc");
            then.status(200);
        });

        let mut config = Config::for_tests(&server.base_url());
        config.offline_mode = true;
        let connectivity = Connectivity::new(&config).expect("probe");
        assert!(!connectivity.check().await);
        probe.assert_calls(0);
    }

    #[tokio::test]
    async fn test_diagnostic() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/get");
            then.status(200).json_body(serde_json::json!({}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc").body_includes("\"version\"");
            then.status(200).json_body(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"server_version": "17.0", "protocol_version": 1}
            }));
        });

        let config = Config::for_tests(&server.base_url());
        let connectivity = Connectivity::new(&config).expect("probe");
        let client = OdooClient::new(&config).expect("client");
        let diagnostic = connectivity.diagnostic(&client).await;

        assert!(diagnostic.internet_reachable);
        assert!(diagnostic.odoo_reachable);
        assert_eq!(diagnostic.server_version.as_deref(), Some("17.0"));
        assert!(diagnostic.response_time_ms.is_some());
        assert_eq!(diagnostic.summary(), "Serveur Odoo accessible");
    }

    #[tokio::test]
    async fn test_monitor_publishes_transitions_once() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);
        assert!(!rx.has_changed().expect("open"));

        monitor.set_online(true);
        assert!(rx.has_changed().expect("open"));
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }
}
