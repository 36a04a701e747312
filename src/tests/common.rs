use crate::config::Config;
use crate::error::{Error, Result};
use crate::tron::{AbiValue, TronAddress};
use crate::utils::Sleeper;
use crate::wallet::provider::{
    AccessResponse, AccountAddress, BroadcastReceipt, CallOptions, ContractCall,
    SignedTransaction, TransactionBuild, UnsignedTransaction, WalletKind, WalletProvider,
};
use async_trait::async_trait;
use ruint::aliases::U256;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const SPENDER: &str = "TLBaRhANQoJFTqre9Nf1mjuwNWjCJeYqUL";
pub const OWNER: &str = "TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV";
pub const OTHER: &str = "TD5gsCwxykWsLN9aPrq2TAfNjByuZKYp4E";

// Helper to create a config whose waits are all zero
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.wallet.access_settle_ms = 0;
    config.wallet.connect_poll_attempts = 3;
    config.wallet.connect_poll_interval_ms = 0;
    config.wallet.tx_settle_ms = 0;
    config.notify.enabled = false;
    config
}

/// One call seen by the fake provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    RequestAccounts,
    Balance(String),
    Allowance,
    Build(U256),
    Sign(String),
    Broadcast(U256),
    SignMessage(String),
}

impl Recorded {
    pub fn kind(&self) -> &'static str {
        match self {
            Recorded::RequestAccounts => "request_accounts",
            Recorded::Balance(_) => "balance",
            Recorded::Allowance => "allowance",
            Recorded::Build(_) => "build",
            Recorded::Sign(_) => "sign",
            Recorded::Broadcast(_) => "broadcast",
            Recorded::SignMessage(_) => "sign_message",
        }
    }
}

/// In-memory TRC-20 wallet: approvals update the allowance on broadcast.
pub struct FakeProvider {
    kind: WalletKind,
    has_tron_web: bool,
    ready: AtomicBool,
    // is_ready() calls answered `false` before the provider turns ready
    ready_after: AtomicU32,
    address: Option<TronAddress>,
    access_code: i64,
    balance: u64,
    can_sign: bool,
    settle: bool,
    fail_allowance_reads: bool,
    broadcast_failure: Option<String>,
    allowance: Mutex<U256>,
    pending: Mutex<HashMap<String, U256>>,
    next_tx: AtomicU32,
    log: Mutex<Vec<Recorded>>,
}

impl FakeProvider {
    pub fn ready_with_address() -> Self {
        Self {
            kind: WalletKind::TronLink,
            has_tron_web: true,
            ready: AtomicBool::new(true),
            ready_after: AtomicU32::new(0),
            address: Some(OWNER.parse().unwrap()),
            access_code: AccessResponse::GRANTED,
            balance: 12_500_000,
            can_sign: true,
            settle: true,
            fail_allowance_reads: false,
            broadcast_failure: None,
            allowance: Mutex::new(U256::ZERO),
            pending: Mutex::new(HashMap::new()),
            next_tx: AtomicU32::new(1),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn not_ready() -> Self {
        let provider = Self::ready_with_address();
        provider.ready.store(false, Ordering::SeqCst);
        provider
    }

    /// Becomes ready after `checks` readiness checks have answered `false`.
    pub fn ready_after(checks: u32) -> Self {
        let provider = Self::ready_with_address();
        provider.ready_after.store(checks, Ordering::SeqCst);
        provider
    }

    pub fn with_kind(mut self, kind: WalletKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn without_tron_web(mut self) -> Self {
        self.has_tron_web = false;
        self.address = None;
        self
    }

    pub fn without_address(mut self) -> Self {
        self.address = None;
        self
    }

    pub fn with_address(mut self, base58: &str) -> Self {
        self.address = Some(base58.parse().unwrap());
        self
    }

    pub fn with_access_code(mut self, code: i64) -> Self {
        self.access_code = code;
        self
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        *self.allowance.lock().unwrap() = allowance;
        self
    }

    pub fn with_delayed_settlement(mut self) -> Self {
        self.settle = false;
        self
    }

    pub fn with_broadcast_failure(mut self, message: &str) -> Self {
        self.broadcast_failure = Some(message.to_string());
        self
    }

    pub fn with_allowance_read_failure(mut self) -> Self {
        self.fail_allowance_reads = true;
        self
    }

    pub fn without_signing(mut self) -> Self {
        self.can_sign = false;
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn owner(&self) -> TronAddress {
        OWNER.parse().unwrap()
    }

    pub fn base58(&self) -> String {
        OWNER.to_string()
    }

    pub fn allowance(&self) -> U256 {
        *self.allowance.lock().unwrap()
    }

    pub fn log(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// Amounts of every broadcast approve, in order.
    pub fn broadcasts(&self) -> Vec<U256> {
        self.log()
            .into_iter()
            .filter_map(|entry| match entry {
                Recorded::Broadcast(amount) => Some(amount),
                _ => None,
            })
            .collect()
    }

    fn record(&self, entry: Recorded) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    fn kind(&self) -> WalletKind {
        self.kind
    }

    fn has_tron_web(&self) -> bool {
        self.has_tron_web
    }

    fn is_ready(&self) -> bool {
        let remaining = self.ready_after.load(Ordering::SeqCst);
        if remaining > 0 {
            self.ready_after.store(remaining - 1, Ordering::SeqCst);
            return false;
        }
        self.has_tron_web && self.ready.load(Ordering::SeqCst)
    }

    fn default_address(&self) -> Option<AccountAddress> {
        self.address.as_ref().map(AccountAddress::from)
    }

    fn node_host(&self) -> Option<String> {
        Some("api.trongrid.io".to_string())
    }

    fn can_sign(&self) -> bool {
        self.can_sign
    }

    fn can_send_transactions(&self) -> bool {
        true
    }

    fn can_interact_with_contracts(&self) -> bool {
        true
    }

    async fn request_accounts(&self) -> Result<AccessResponse> {
        self.record(Recorded::RequestAccounts);
        Ok(AccessResponse {
            code: self.access_code,
            message: None,
        })
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        self.record(Recorded::Balance(address.to_string()));
        Ok(self.balance)
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        if !self.can_sign {
            return Err(Error::Unsupported("signing disabled".to_string()));
        }
        self.record(Recorded::SignMessage(message.to_string()));
        Ok(format!("0xsigned:{}", hex::encode(message)))
    }

    async fn trigger_constant_contract(&self, _call: &ContractCall) -> Result<Vec<String>> {
        self.record(Recorded::Allowance);
        if self.fail_allowance_reads {
            return Err(Error::ProviderError("node unavailable".to_string()));
        }
        Ok(vec![hex::encode(self.allowance().to_be_bytes::<32>())])
    }

    async fn trigger_smart_contract(
        &self,
        call: &ContractCall,
        _options: &CallOptions,
    ) -> Result<TransactionBuild> {
        let amount = match call.parameters.get(1) {
            Some(AbiValue::Uint256(amount)) => *amount,
            _ => return Err(Error::ValidationError("approve needs an amount".to_string())),
        };
        self.record(Recorded::Build(amount));

        let txid = format!("tx-{}", self.next_tx.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().unwrap().insert(txid.clone(), amount);
        Ok(TransactionBuild {
            result: true,
            message: None,
            transaction: Some(UnsignedTransaction {
                txid: txid.clone(),
                raw: json!({ "txID": txid }),
            }),
        })
    }

    async fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<SignedTransaction> {
        if !self.can_sign {
            return Err(Error::Unsupported("signing disabled".to_string()));
        }
        self.record(Recorded::Sign(transaction.txid.clone()));
        Ok(SignedTransaction {
            txid: transaction.txid.clone(),
            raw: transaction.raw.clone(),
        })
    }

    async fn send_raw_transaction(&self, transaction: &SignedTransaction) -> Result<BroadcastReceipt> {
        let amount = self
            .pending
            .lock()
            .unwrap()
            .remove(&transaction.txid)
            .unwrap_or(U256::ZERO);

        if let Some(message) = &self.broadcast_failure {
            return Ok(BroadcastReceipt {
                result: false,
                txid: transaction.txid.clone(),
                message: Some(message.clone()),
            });
        }

        self.record(Recorded::Broadcast(amount));
        if self.settle {
            *self.allowance.lock().unwrap() = amount;
        }
        Ok(BroadcastReceipt {
            result: true,
            txid: transaction.txid.clone(),
            message: None,
        })
    }

    async fn chain_id(&self) -> Option<String> {
        match self.kind {
            WalletKind::MetaMask | WalletKind::EvmWallet => Some("0x1".to_string()),
            _ => None,
        }
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
