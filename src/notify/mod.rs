//! Best-effort telemetry of wallet events, posted to the relay function.

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use crate::metrics::WALLET_NOTIFICATIONS;
use crate::wallet::provider::WalletProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const RELAY_PATH: &str = "/.netlify/functions/notify-wallet";

/// Keys the payload owns; caller extras may not shadow them.
const RESERVED_KEYS: [&str; 8] = [
    "address", "network", "ua", "ts", "walletType", "tron", "chainId", "web3Client",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronDetails {
    pub base58: Option<String>,
    pub hex: Option<String>,
    pub node: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletNotification {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub ua: String,
    pub ts: DateTime<Utc>,
    #[serde(rename = "walletType")]
    pub wallet_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tron: Option<TronDetails>,
    #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(rename = "web3Client", skip_serializing_if = "Option::is_none")]
    pub web3_client: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Guesses the Tron network from a full-node host name.
pub fn network_from_host(host: &str) -> &'static str {
    let host = host.to_lowercase();
    if host.contains("nile") || host.contains("shasta") {
        "tron-testnet"
    } else if host.contains("trongrid.io") {
        "tron-mainnet"
    } else {
        "tron-unknown"
    }
}

impl WalletNotification {
    pub fn new(address: &str, network: Option<String>, user_agent: &str) -> Self {
        Self {
            address: address.to_string(),
            network,
            ua: user_agent.to_string(),
            ts: Utc::now(),
            wallet_type: "unknown".to_string(),
            tron: None,
            chain_id: None,
            web3_client: None,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        for (key, value) in extra {
            if RESERVED_KEYS.contains(&key.as_str()) {
                debug!("Dropping reserved notification key '{}'", key);
                continue;
            }
            self.extra.insert(key, value);
        }
        self
    }

    /// Fills in whatever the provider reveals without asking for more permissions.
    pub async fn collect(mut self, provider: Option<&dyn WalletProvider>) -> Self {
        let Some(provider) = provider else {
            return self;
        };

        self.wallet_type = provider.kind().to_string();

        if let Some(address) = provider.default_address() {
            let node = provider.node_host();
            if self.network.is_none() {
                if let Some(host) = &node {
                    self.network = Some(network_from_host(host).to_string());
                }
            }
            self.tron = Some(TronDetails {
                base58: Some(address.base58).filter(|s| !s.is_empty()),
                hex: Some(address.hex).filter(|s| !s.is_empty()),
                node,
            });
        }

        self.chain_id = provider.chain_id().await;
        self.web3_client = provider.client_version().await;
        self
    }
}

/// Receives wallet events. Implementations must swallow their own failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionNotifier: Send + Sync {
    async fn notify(&self, notification: &WalletNotification);
}

/// Discards everything; used when `[notify] enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl ConnectionNotifier for NoopNotifier {
    async fn notify(&self, _notification: &WalletNotification) {}
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RELAY_PATH),
        })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send(&self, notification: &WalletNotification) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(Error::RelayError(format!("relay answered {}: {}", status, body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl ConnectionNotifier for RelayClient {
    async fn notify(&self, notification: &WalletNotification) {
        match self.send(notification).await {
            Ok(_) => {
                WALLET_NOTIFICATIONS.with_label_values(&["sent"]).inc();
                debug!("Wallet notification for {} relayed", notification.address);
            }
            Err(e) => {
                WALLET_NOTIFICATIONS.with_label_values(&["failed"]).inc();
                warn!("notifyNewWallet failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::common::FakeProvider;
    use serde_json::json;

    #[test]
    fn test_network_guess() {
        assert_eq!(network_from_host("api.trongrid.io"), "tron-mainnet");
        assert_eq!(network_from_host("NILE.trongrid.io"), "tron-testnet");
        assert_eq!(network_from_host("api.shasta.trongrid.io"), "tron-testnet");
        assert_eq!(network_from_host("localhost"), "tron-unknown");
    }

    #[tokio::test]
    async fn test_collect_from_tron_provider() {
        let provider = FakeProvider::ready_with_address();
        let notification = WalletNotification::new(&provider.base58(), None, "tvlp-test")
            .collect(Some(&provider))
            .await;

        assert_eq!(notification.wallet_type, "TronLink");
        assert_eq!(notification.network.as_deref(), Some("tron-mainnet"));
        let tron = notification.tron.unwrap();
        assert_eq!(tron.base58.as_deref(), Some(provider.base58().as_str()));
        assert_eq!(tron.node.as_deref(), Some("api.trongrid.io"));
    }

    #[tokio::test]
    async fn test_explicit_network_is_kept() {
        let provider = FakeProvider::ready_with_address();
        let notification = WalletNotification::new("T", Some("custom".into()), "ua")
            .collect(Some(&provider))
            .await;
        assert_eq!(notification.network.as_deref(), Some("custom"));
    }

    #[test]
    fn test_payload_shape() {
        let mut extra = Map::new();
        extra.insert("event".into(), json!("connect"));
        extra.insert("address".into(), json!("spoofed"));

        let notification = WalletNotification::new("TAddr", None, "ua").with_extra(extra);
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["address"], "TAddr");
        assert_eq!(value["event"], "connect");
        assert_eq!(value["walletType"], "unknown");
        assert!(value.get("network").is_none());
        assert!(value.get("tron").is_none());
    }

    #[test]
    fn test_relay_endpoint() {
        let client = RelayClient::new("http://localhost:8888/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:8888/.netlify/functions/notify-wallet"
        );
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_swallowed() {
        let client = RelayClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let notification = WalletNotification::new("TAddr", None, "ua");
        assert!(client.send(&notification).await.is_err());
        // `notify` must return normally.
        client.notify(&notification).await;
    }
}
