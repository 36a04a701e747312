#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tvlp::config::Config;
use tvlp::i18n::Translations;
use tvlp::market::{SimulatedFeed, TransactionFeed};
use tvlp::web::{ApiState, WebServer};
use warp::Filter;

pub const TEST_KEY: &str = "integration-key";

/// One request as seen by the stub webhook.
#[derive(Debug, Clone)]
pub struct Received {
    pub key: Option<String>,
    pub body: Value,
}

/// Stand-in for the upstream broadcast webhook.
pub struct Upstream {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Upstream {
    /// Answers every POST /broadcast with `reply`.
    pub async fn start(reply: Value) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let route = warp::path("broadcast")
            .and(warp::post())
            .and(warp::header::optional::<String>("x-key"))
            .and(warp::body::json())
            .map(move |key: Option<String>, body: Value| {
                sink.lock().unwrap().push(Received { key, body });
                warp::reply::json(&reply)
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        Self {
            url: format!("http://{}/broadcast", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

/// Zero waits, a tiny body limit and the given upstream.
pub fn create_test_config(upstream_url: &str) -> Config {
    let mut config = Config::default();
    config.relay.upstream_url = upstream_url.to_string();
    config.relay.broadcast_key = TEST_KEY.to_string();
    config.relay.timeout_secs = 2;
    config.server.max_body_bytes = 1024;
    config.notify.enabled = false;
    config.wallet.access_settle_ms = 0;
    config.wallet.connect_poll_interval_ms = 0;
    config.wallet.tx_settle_ms = 0;
    config
}

pub fn api_state() -> ApiState {
    ApiState {
        market: Arc::new(SimulatedFeed),
        transactions: TransactionFeed::new(),
        translations: Arc::new(Translations::embedded().unwrap()),
    }
}

/// Serves the full route set on an ephemeral port until the test runtime ends.
pub fn spawn_server(config: &Config) -> SocketAddr {
    let server = WebServer::from_config(config, api_state()).unwrap();
    let (addr, serving) = server
        .bind(([127, 0, 0, 1], 0).into(), std::future::pending())
        .unwrap();
    tokio::spawn(serving);
    addr
}

pub fn notify_url(addr: SocketAddr) -> String {
    format!("http://{}/.netlify/functions/notify-wallet", addr)
}

pub fn sample_notification() -> Value {
    json!({
        "address": "TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV",
        "network": "tron-mainnet",
        "ua": "integration",
        "walletType": "TronLink"
    })
}
