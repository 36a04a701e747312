use crate::error::Result;
use crate::tron::{AbiValue, TronAddress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletKind {
    TronLink,
    TronGrid,
    MetaMask,
    EvmWallet,
    Unknown,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WalletKind::TronLink => "TronLink",
            WalletKind::TronGrid => "TronGrid",
            WalletKind::MetaMask => "MetaMask",
            WalletKind::EvmWallet => "EVM Wallet",
            WalletKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddress {
    pub base58: String,
    pub hex: String,
}

impl From<&TronAddress> for AccountAddress {
    fn from(address: &TronAddress) -> Self {
        Self {
            base58: address.base58().to_string(),
            hex: address.to_hex(),
        }
    }
}

/// Answer to an account-access request; `200` means granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl AccessResponse {
    pub const GRANTED: i64 = 200;

    pub fn granted() -> Self {
        Self { code: Self::GRANTED, message: None }
    }

    pub fn is_granted(&self) -> bool {
        self.code == Self::GRANTED
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub owner: TronAddress,
    pub contract: TronAddress,
    pub function_selector: String,
    pub parameters: Vec<AbiValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    pub fee_limit: u64,
    pub call_value: u64,
}

/// Provider-built transaction; `raw` is opaque to everything but the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub txid: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub txid: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuild {
    pub result: bool,
    pub message: Option<String>,
    pub transaction: Option<UnsignedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub result: bool,
    pub txid: String,
    pub message: Option<String>,
}

/// What the wallet manager needs from whichever wallet is present.
///
/// Implementations wrap an injected browser wallet, a full node or a test
/// double. The manager treats the provider as possibly absent and never
/// mutates it.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn kind(&self) -> WalletKind;

    /// A `tronWeb`-style API object is available (it may not be ready yet).
    fn has_tron_web(&self) -> bool;

    fn is_ready(&self) -> bool;

    fn default_address(&self) -> Option<AccountAddress>;

    fn node_host(&self) -> Option<String>;

    fn can_sign(&self) -> bool;

    fn can_send_transactions(&self) -> bool;

    fn can_interact_with_contracts(&self) -> bool;

    async fn request_accounts(&self) -> Result<AccessResponse>;

    /// Balance in sun.
    async fn get_balance(&self, address: &str) -> Result<u64>;

    async fn sign_message(&self, message: &str) -> Result<String>;

    /// Read-only call; returns the hex words of `constant_result`.
    async fn trigger_constant_contract(&self, call: &ContractCall) -> Result<Vec<String>>;

    async fn trigger_smart_contract(
        &self,
        call: &ContractCall,
        options: &CallOptions,
    ) -> Result<TransactionBuild>;

    async fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<SignedTransaction>;

    async fn send_raw_transaction(&self, transaction: &SignedTransaction) -> Result<BroadcastReceipt>;

    async fn chain_id(&self) -> Option<String> {
        None
    }

    async fn client_version(&self) -> Option<String> {
        None
    }
}
