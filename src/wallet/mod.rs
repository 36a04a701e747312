//! Wallet connection state and the user-facing wallet flows.
//!
//! `WalletManager` owns the connection record and drives every flow through
//! three ports: the attached [`WalletProvider`], a [`Confirmer`] for dialogs
//! and a [`ConnectionNotifier`] for telemetry. Waits go through [`Sleeper`].

pub mod allowance;
pub mod confirm;
pub mod provider;

pub use allowance::{AllowanceManager, AllowanceReport, AllowanceStatus};
pub use confirm::{AutoConfirmer, Clipboard, Confirmer, ConsoleConfirmer, Prompt, TerminalClipboard};
pub use provider::{WalletKind, WalletProvider};

use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::i18n::LanguageStore;
use crate::notify::{ConnectionNotifier, WalletNotification};
use crate::tron::TronAddress;
use crate::utils::{Sleeper, TokioSleeper};
use crate::validation::{format_units, to_raw_units, validate_amount};
use log::{debug, error, info, warn};
use rand::Rng;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const SUN_PER_TRX: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalletConnection {
    pub address: String,
    /// TRX, converted from sun.
    pub balance: f64,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailableWallets {
    pub tron_link: bool,
    pub tron_web: bool,
}

impl AvailableWallets {
    pub fn detect(provider: Option<&dyn WalletProvider>) -> Self {
        match provider {
            Some(provider) => Self {
                tron_link: provider.kind() == WalletKind::TronLink || provider.has_tron_web(),
                tron_web: provider.has_tron_web(),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Default)]
struct WalletState {
    connection: WalletConnection,
    available: AvailableWallets,
    has_management_permission: bool,
    // set by disconnect_wallet; only connect_wallet clears it
    disconnected_by_user: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Declined,
    NoProvider,
    Connected(WalletConnection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Declined,
    Approved(AllowanceReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub value: String,
    /// Not produced by a wallet; proves nothing.
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CapabilityReport {
    pub connected: bool,
    pub tron_web_ready: bool,
    pub can_read_balance: bool,
    pub can_sign_messages: bool,
    pub can_send_transactions: bool,
    pub can_interact_with_contracts: bool,
    pub has_management_permission: bool,
    pub address: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowanceProbe {
    pub owner: String,
    pub spender: String,
    pub raw: String,
    pub formatted: String,
    pub active: bool,
}

/// Resets a flag when the owning flow returns, whichever way it returns.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Background refresh task; aborted when dropped.
pub struct PollerHandle {
    handle: JoinHandle<()>,
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct WalletManager {
    config: WalletConfig,
    token: TronAddress,
    spender: TronAddress,
    user_agent: String,
    provider: RwLock<Option<Arc<dyn WalletProvider>>>,
    state: Mutex<WalletState>,
    approve_lock: Mutex<()>,
    connecting: AtomicBool,
    confirmer: Arc<dyn Confirmer>,
    notifier: Arc<dyn ConnectionNotifier>,
    sleeper: Arc<dyn Sleeper>,
    i18n: Arc<LanguageStore>,
    clipboard: Option<Arc<dyn Clipboard>>,
}

impl WalletManager {
    pub fn new(
        config: WalletConfig,
        user_agent: &str,
        confirmer: Arc<dyn Confirmer>,
        notifier: Arc<dyn ConnectionNotifier>,
        i18n: Arc<LanguageStore>,
    ) -> Result<Self> {
        let token = config.token_contract.parse()?;
        let spender = config.spender.parse()?;
        Ok(Self {
            config,
            token,
            spender,
            user_agent: user_agent.to_string(),
            provider: RwLock::new(None),
            state: Mutex::new(WalletState::default()),
            approve_lock: Mutex::new(()),
            connecting: AtomicBool::new(false),
            confirmer,
            notifier,
            sleeper: Arc::new(TokioSleeper),
            i18n,
            clipboard: None,
        })
    }

    pub fn with_provider(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.provider = RwLock::new(Some(provider));
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// A wallet appeared (e.g. an extension finished injecting).
    pub async fn attach(&self, provider: Arc<dyn WalletProvider>) {
        info!("Wallet provider attached: {}", provider.kind());
        *self.provider.write().await = Some(provider);
    }

    pub async fn detach(&self) {
        *self.provider.write().await = None;
    }

    pub async fn connection(&self) -> WalletConnection {
        self.state.lock().await.connection.clone()
    }

    pub async fn available_wallets(&self) -> AvailableWallets {
        self.state.lock().await.available
    }

    pub async fn has_management_permission(&self) -> bool {
        self.state.lock().await.has_management_permission
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    pub fn is_approving(&self) -> bool {
        self.approve_lock.try_lock().is_err()
    }

    async fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider.read().await.clone()
    }

    /// The attached provider, if it can take calls right now. Shows the
    /// not-ready notice otherwise.
    async fn ready_provider(&self) -> Result<Arc<dyn WalletProvider>> {
        match self.provider().await {
            Some(provider) if provider.is_ready() => Ok(provider),
            _ => {
                self.confirmer
                    .notify(&Prompt::from_modal(&self.i18n, "modals.tronNotReady"))
                    .await;
                Err(Error::ProviderNotReady("TronWeb not ready".to_string()))
            }
        }
    }

    async fn require_connection(&self) -> Result<WalletConnection> {
        let connection = self.connection().await;
        if !connection.connected {
            self.confirmer
                .notify(&Prompt::new(self.i18n.t("wallet.connect_first")))
                .await;
            return Err(Error::NotConnected);
        }
        Ok(connection)
    }

    async fn read_balance(&self, provider: &dyn WalletProvider, address: &str) -> Result<f64> {
        let sun = provider.get_balance(address).await?;
        Ok(sun as f64 / SUN_PER_TRX)
    }

    async fn emit(&self, provider: Option<&dyn WalletProvider>, address: &str, extra: Map<String, Value>) {
        let notification = WalletNotification::new(address, None, &self.user_agent)
            .with_extra(extra)
            .collect(provider)
            .await;
        self.notifier.notify(&notification).await;
    }

    fn connect_intro(&self) -> Prompt {
        let i18n = &self.i18n;
        let mut lines = vec![i18n.t("modals.connectIntro.lead")];
        lines.extend(i18n.list("modals.connectIntro.bullets"));
        lines.push(i18n.t("modals.connectIntro.permissionTitle"));
        lines.extend(i18n.list("modals.connectIntro.permissions"));
        Prompt::new(i18n.t("modals.connectIntro.title"))
            .lines(lines)
            .buttons(
                i18n.t("modals.connectIntro.confirm"),
                i18n.t("modals.connectIntro.cancel"),
            )
    }

    pub async fn connect_wallet(&self) -> Result<ConnectOutcome> {
        self.connecting.store(true, Ordering::SeqCst);
        let _connecting = FlagGuard(&self.connecting);

        if !self.confirmer.confirm(&self.connect_intro()).await {
            info!("User declined the connection");
            return Ok(ConnectOutcome::Declined);
        }

        let provider = match self.provider().await {
            Some(provider) if provider.has_tron_web() || provider.kind() == WalletKind::TronLink => provider,
            _ => {
                info!("No Tron wallet detected");
                self.confirmer
                    .notify(&Prompt::from_modal(&self.i18n, "modals.noTronLink"))
                    .await;
                return Ok(ConnectOutcome::NoProvider);
            }
        };

        match self.establish(provider.as_ref()).await {
            Ok(connection) => {
                {
                    let mut state = self.state.lock().await;
                    if state.connection.address != connection.address {
                        state.has_management_permission = false;
                    }
                    state.connection = connection.clone();
                    state.disconnected_by_user = false;
                    state.available = AvailableWallets::detect(Some(provider.as_ref()));
                }
                info!("Wallet connected: {}", connection.address);

                let mut extra = Map::new();
                extra.insert("event".to_string(), json!("connect"));
                self.emit(Some(provider.as_ref()), &connection.address, extra).await;

                self.confirmer
                    .notify(&Prompt::from_modal(&self.i18n, "modals.connectSuccess"))
                    .await;
                Ok(ConnectOutcome::Connected(connection))
            }
            Err(Error::ProviderNotReady(reason)) => {
                warn!("Wallet connection timed out: {}", reason);
                self.confirmer
                    .notify(&Prompt::from_modal(&self.i18n, "modals.tronNotReady"))
                    .await;
                Err(Error::ProviderNotReady(reason))
            }
            Err(e) => {
                error!("Wallet connection failed: {}", e);
                let message = self
                    .i18n
                    .t_with("wallet.connect_failed", &[("error", &e.to_string())]);
                self.confirmer.notify(&Prompt::new(message)).await;
                Err(e)
            }
        }
    }

    /// Account request, settle delay, then readiness poll.
    async fn establish(&self, provider: &dyn WalletProvider) -> Result<WalletConnection> {
        let access = provider.request_accounts().await?;
        if !access.is_granted() {
            return Err(Error::AccessRejected(access.code));
        }

        self.sleeper.sleep(self.config.access_settle()).await;

        let attempts = self.config.connect_poll_attempts;
        for attempt in 1..=attempts {
            if provider.is_ready() {
                if let Some(address) = provider.default_address().filter(|a| !a.base58.is_empty()) {
                    debug!("TronWeb ready after {} attempt(s)", attempt);
                    let balance = self.read_balance(provider, &address.base58).await?;
                    return Ok(WalletConnection {
                        address: address.base58,
                        balance,
                        connected: true,
                    });
                }
            }
            self.sleeper.sleep(self.config.connect_poll_interval()).await;
        }

        Err(Error::ProviderNotReady(format!(
            "TronWeb not ready after {} attempts",
            attempts
        )))
    }

    pub async fn disconnect_wallet(&self) {
        let mut state = self.state.lock().await;
        state.connection = WalletConnection::default();
        state.has_management_permission = false;
        state.disconnected_by_user = true;
        info!("Wallet disconnected");
    }

    /// Picks up an already-authorised wallet without prompting, unless the
    /// user disconnected it.
    pub async fn check_wallet_connection(&self) -> Result<()> {
        if self.state.lock().await.disconnected_by_user {
            return Ok(());
        }
        let Some(provider) = self.provider().await else {
            return Ok(());
        };
        if !provider.is_ready() {
            return Ok(());
        }
        let Some(address) = provider.default_address().filter(|a| !a.base58.is_empty()) else {
            return Ok(());
        };

        let balance = self.read_balance(provider.as_ref(), &address.base58).await?;
        let mut state = self.state.lock().await;
        if state.disconnected_by_user {
            return Ok(());
        }
        if state.connection.address != address.base58 {
            if state.has_management_permission {
                info!("Account changed to {}; approval must be granted again", address.base58);
            }
            state.has_management_permission = false;
        }
        state.connection = WalletConnection {
            address: address.base58,
            balance,
            connected: true,
        };
        Ok(())
    }

    /// One background tick: re-detect wallets and refresh the connection.
    pub async fn poll_once(&self) {
        let provider = self.provider().await;
        let available = AvailableWallets::detect(provider.as_deref());
        self.state.lock().await.available = available;

        if let Err(e) = self.check_wallet_connection().await {
            error!("Error checking wallet connection: {}", e);
        }
    }

    pub fn spawn_poller(self: &Arc<Self>) -> PollerHandle {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                manager.poll_once().await;
                manager.sleeper.sleep(manager.config.background_poll()).await;
            }
        });
        PollerHandle { handle }
    }

    fn approval_prompt(&self, amount: f64) -> Prompt {
        let i18n = &self.i18n;
        let symbol = self.config.token_symbol.as_str();
        let amount = amount.to_string();
        Prompt::new(i18n.t("wallet.approve.title"))
            .line(i18n.t_with("wallet.approve.token", &[("symbol", symbol)]))
            .line(i18n.t_with("wallet.approve.contract", &[("contract", self.token.base58())]))
            .line(i18n.t_with("wallet.approve.spender", &[("spender", self.spender.base58())]))
            .line(i18n.t_with("wallet.approve.limit", &[("amount", &amount), ("symbol", symbol)]))
            .line(i18n.t_with("wallet.approve.fee", &[("fee", &self.config.fee_estimate)]))
            .line(i18n.t("wallet.approve.warning"))
            .buttons(i18n.t("wallet.approve.confirm"), i18n.t("wallet.approve.cancel"))
    }

    fn success_notice(&self, report: &AllowanceReport) -> Prompt {
        let i18n = &self.i18n;
        let symbol = self.config.token_symbol.as_str();
        let mut notice = Prompt::new(i18n.t("wallet.approve.success_title"));

        if report.status == AllowanceStatus::AlreadySufficient {
            notice = notice.line(i18n.t("wallet.approve.already_sufficient"));
        } else {
            if let Some(txid) = report.last_txid() {
                notice = notice.line(i18n.t_with("wallet.approve.tx", &[("txid", txid)]));
            }
            let status = match report.status {
                AllowanceStatus::Pending => i18n.t("wallet.approve.pending"),
                _ => i18n.t("wallet.approve.verified"),
            };
            notice = notice.line(i18n.t_with("wallet.approve.status", &[("status", &status)]));
        }

        let allowance = format_units(report.current, self.config.token_decimals);
        notice.line(i18n.t_with(
            "wallet.approve.new_limit",
            &[("allowance", &allowance), ("symbol", symbol)],
        ))
    }

    /// Grants the configured spender a TRC-20 allowance of `amount` tokens.
    pub async fn approve_token(&self, amount: f64) -> Result<ApprovalOutcome> {
        let Ok(_approving) = self.approve_lock.try_lock() else {
            warn!("approve_token called while an approval is running");
            return Err(Error::ApprovalInProgress);
        };

        validate_amount(amount)?;
        let desired = to_raw_units(amount, self.config.token_decimals)?;

        let provider = self.ready_provider().await?;
        let owner: TronAddress = match provider.default_address() {
            Some(address) if !address.base58.is_empty() => address.base58.parse()?,
            _ => {
                self.confirmer
                    .notify(&Prompt::new(self.i18n.t("wallet.connect_first")))
                    .await;
                return Err(Error::NotConnected);
            }
        };

        if !self.confirmer.confirm(&self.approval_prompt(amount)).await {
            info!("User cancelled the approval");
            self.confirmer
                .notify(&Prompt::new(self.i18n.t("wallet.approve.cancelled")))
                .await;
            return Ok(ApprovalOutcome::Declined);
        }

        info!(
            "Approving {} raw units of {} for {}",
            desired, self.token, self.spender
        );
        let manager = AllowanceManager::new(
            provider.as_ref(),
            self.sleeper.as_ref(),
            self.token.clone(),
            self.config.tx_settle(),
            self.config.fee_limit_sun,
        );

        match manager.ensure_allowance(&owner, &self.spender, desired).await {
            Ok(report) => {
                self.state.lock().await.has_management_permission = true;

                let mut extra = Map::new();
                extra.insert("event".to_string(), json!("approve"));
                extra.insert("amount".to_string(), json!(amount));
                extra.insert("spender".to_string(), json!(self.spender.base58()));
                if let Some(txid) = report.last_txid() {
                    extra.insert("txid".to_string(), json!(txid));
                }
                self.emit(Some(provider.as_ref()), owner.base58(), extra).await;

                self.confirmer.notify(&self.success_notice(&report)).await;
                Ok(ApprovalOutcome::Approved(report))
            }
            Err(e) => {
                error!("Approval failed: {}", e);
                let notice = Prompt::new(self.i18n.t("wallet.approve.failed_title"))
                    .line(e.to_string())
                    .lines(self.i18n.list("wallet.approve.failed_hints"));
                self.confirmer.notify(&notice).await;
                Err(e)
            }
        }
    }

    /// General permissions dialog, then [`approve_token`](Self::approve_token).
    pub async fn request_fund_management(&self, amount: f64) -> Result<ApprovalOutcome> {
        let i18n = &self.i18n;
        let prompt = Prompt::new(i18n.t("wallet.permissions.title"))
            .lines(i18n.list("wallet.permissions.items"))
            .buttons(
                i18n.t("wallet.permissions.confirm"),
                i18n.t("wallet.permissions.cancel"),
            );
        if !self.confirmer.confirm(&prompt).await {
            self.confirmer
                .notify(&Prompt::new(i18n.t("wallet.permissions.declined")))
                .await;
            return Ok(ApprovalOutcome::Declined);
        }
        self.approve_token(amount).await
    }

    pub async fn sign_message(&self, message: &str) -> Result<Signature> {
        self.require_connection().await?;

        if let Some(provider) = self.provider().await {
            if provider.is_ready() && provider.can_sign() {
                let value = provider.sign_message(message).await?;
                return Ok(Signature {
                    value,
                    simulated: false,
                });
            }
        }

        if !self.config.allow_simulated_signatures {
            return Err(Error::Unsupported(
                "no signing wallet is available".to_string(),
            ));
        }

        let i18n = &self.i18n;
        let prompt = Prompt::new(i18n.t("wallet.sign.title"))
            .line(format!("\"{}\"", message))
            .line(i18n.t("wallet.sign.simulated_warning"))
            .buttons(i18n.t("wallet.sign.confirm"), i18n.t("wallet.sign.cancel"));
        if !self.confirmer.confirm(&prompt).await {
            return Err(Error::UserDeclined("User rejected signing".to_string()));
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        warn!("Returning a simulated signature");
        Ok(Signature {
            value: format!("0x{}", hex::encode(bytes)),
            simulated: true,
        })
    }

    /// Probes what the attached wallet can do. Changes no state.
    pub async fn test_wallet_capabilities(&self) -> Result<CapabilityReport> {
        let connection = self.require_connection().await?;
        let mut report = CapabilityReport {
            connected: connection.connected,
            address: connection.address.clone(),
            balance: connection.balance,
            has_management_permission: self.has_management_permission().await,
            ..Default::default()
        };

        if let Some(provider) = self.provider().await {
            report.tron_web_ready = provider.is_ready();
            match provider.get_balance(&connection.address).await {
                Ok(sun) => {
                    report.can_read_balance = true;
                    debug!("Can read balance: {} TRX", sun as f64 / SUN_PER_TRX);
                }
                Err(e) => debug!("Cannot read balance: {}", e),
            }
            report.can_sign_messages = provider.can_sign();
            report.can_send_transactions = provider.can_send_transactions();
            report.can_interact_with_contracts = provider.can_interact_with_contracts();
        }

        let i18n = &self.i18n;
        let mark = |ok: bool| if ok { "[x]" } else { "[ ]" };
        let notice = Prompt::new(i18n.t("wallet.capabilities.title"))
            .line(format!("{} {}", mark(report.connected), i18n.t("wallet.capabilities.connection")))
            .line(format!("{} {}", mark(report.tron_web_ready), i18n.t("wallet.capabilities.tron_web")))
            .line(format!("{} {}", mark(report.can_read_balance), i18n.t("wallet.capabilities.balance")))
            .line(format!("{} {}", mark(report.can_sign_messages), i18n.t("wallet.capabilities.sign")))
            .line(format!("{} {}", mark(report.can_send_transactions), i18n.t("wallet.capabilities.send")))
            .line(format!(
                "{} {}",
                mark(report.can_interact_with_contracts),
                i18n.t("wallet.capabilities.contracts")
            ))
            .line(format!(
                "{} {}",
                mark(report.has_management_permission),
                i18n.t("wallet.capabilities.permission")
            ))
            .line(i18n.t_with("wallet.capabilities.address", &[("address", &report.address)]))
            .line(i18n.t_with(
                "wallet.capabilities.balance_value",
                &[("balance", &format!("{:.4}", report.balance))],
            ));
        self.confirmer.notify(&notice).await;

        Ok(report)
    }

    /// Reads the current allowance for the configured spender. `None` when
    /// the user cancels the check.
    pub async fn test_token_approve(&self) -> Result<Option<AllowanceProbe>> {
        self.require_connection().await?;
        let provider = self.ready_provider().await?;
        let owner: TronAddress = match provider.default_address() {
            Some(address) => address.base58.parse()?,
            None => return Err(Error::NotConnected),
        };

        let i18n = &self.i18n;
        let prompt = Prompt::new(i18n.t("wallet.allowance.title"))
            .line(i18n.t_with("wallet.approve.token", &[("symbol", &self.config.token_symbol)]))
            .line(i18n.t_with("wallet.allowance.owner", &[("owner", owner.base58())]))
            .line(i18n.t_with("wallet.allowance.spender", &[("spender", self.spender.base58())]));
        if !self.confirmer.confirm(&prompt).await {
            return Ok(None);
        }

        let manager = AllowanceManager::new(
            provider.as_ref(),
            self.sleeper.as_ref(),
            self.token.clone(),
            self.config.tx_settle(),
            self.config.fee_limit_sun,
        );
        let raw = match manager.check_allowance(&owner, &self.spender).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Token approve test failed: {}", e);
                self.confirmer
                    .notify(&Prompt::new(
                        i18n.t_with("wallet.allowance.failed", &[("error", &e.to_string())]),
                    ))
                    .await;
                return Err(e);
            }
        };

        let probe = AllowanceProbe {
            owner: owner.base58().to_string(),
            spender: self.spender.base58().to_string(),
            raw: raw.to_string(),
            formatted: format_units(raw, self.config.token_decimals),
            active: raw > U256::ZERO,
        };

        let mut notice = Prompt::new(i18n.t("wallet.allowance.title"))
            .line(i18n.t_with(
                "wallet.allowance.current",
                &[("allowance", &probe.formatted), ("symbol", &self.config.token_symbol)],
            ))
            .line(i18n.t_with("wallet.allowance.raw", &[("raw", &probe.raw)]));
        notice = if probe.active {
            notice.line(i18n.t("wallet.allowance.active"))
        } else {
            notice
                .line(i18n.t("wallet.allowance.none"))
                .line(i18n.t("wallet.allowance.hint"))
        };
        self.confirmer.notify(&notice).await;

        Ok(Some(probe))
    }

    /// Copies the connected address; `false` when nothing was copied.
    pub async fn copy_address(&self) -> Result<bool> {
        let Some(clipboard) = &self.clipboard else {
            return Ok(false);
        };
        let connection = self.connection().await;
        if connection.address.is_empty() {
            return Ok(false);
        }
        clipboard.write_text(&connection.address)?;
        Ok(true)
    }
}
