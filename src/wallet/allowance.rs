//! TRC-20 allowance management: read, optional reset to zero, approve, verify.

use crate::error::{Error, Result};
use crate::tron::{decode_uint256, AbiValue, TronAddress, TRC20_ALLOWANCE, TRC20_APPROVE};
use crate::utils::Sleeper;
use crate::wallet::provider::{CallOptions, ContractCall, WalletProvider};
use log::{debug, error, info};
use ruint::aliases::U256;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceStatus {
    /// The existing allowance already covered the request; nothing was sent.
    AlreadySufficient,
    Verified,
    /// Transactions were accepted but the new allowance was not visible yet.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceReport {
    pub status: AllowanceStatus,
    pub previous: U256,
    pub current: U256,
    pub desired: U256,
    /// Broadcast transaction ids, in submission order.
    pub transactions: Vec<String>,
}

impl AllowanceReport {
    pub fn last_txid(&self) -> Option<&str> {
        self.transactions.last().map(String::as_str)
    }

    pub fn is_verified(&self) -> bool {
        self.status != AllowanceStatus::Pending
    }
}

pub struct AllowanceManager<'a> {
    provider: &'a dyn WalletProvider,
    sleeper: &'a dyn Sleeper,
    token: TronAddress,
    settle_delay: Duration,
    fee_limit: u64,
}

impl<'a> AllowanceManager<'a> {
    pub fn new(
        provider: &'a dyn WalletProvider,
        sleeper: &'a dyn Sleeper,
        token: TronAddress,
        settle_delay: Duration,
        fee_limit: u64,
    ) -> Self {
        Self {
            provider,
            sleeper,
            token,
            settle_delay,
            fee_limit,
        }
    }

    pub async fn check_allowance(&self, owner: &TronAddress, spender: &TronAddress) -> Result<U256> {
        if !self.provider.is_ready() {
            return Err(Error::ProviderNotReady("TronWeb not ready".to_string()));
        }

        let call = ContractCall {
            owner: owner.clone(),
            contract: self.token.clone(),
            function_selector: TRC20_ALLOWANCE.to_string(),
            parameters: vec![
                AbiValue::Address(owner.clone()),
                AbiValue::Address(spender.clone()),
            ],
        };
        let words = self.provider.trigger_constant_contract(&call).await?;
        let allowance = match words.first() {
            Some(word) => decode_uint256(word)?,
            None => U256::ZERO,
        };
        debug!("Allowance {} -> {}: {}", owner, spender, allowance);
        Ok(allowance)
    }

    /// Builds, signs and broadcasts one `approve(spender, amount)`; returns the txid.
    pub async fn approve(&self, owner: &TronAddress, spender: &TronAddress, amount: U256) -> Result<String> {
        if !self.provider.is_ready() {
            return Err(Error::ProviderNotReady("TronWeb not ready".to_string()));
        }

        let call = ContractCall {
            owner: owner.clone(),
            contract: self.token.clone(),
            function_selector: TRC20_APPROVE.to_string(),
            parameters: vec![AbiValue::Address(spender.clone()), AbiValue::Uint256(amount)],
        };
        let options = CallOptions {
            fee_limit: self.fee_limit,
            call_value: 0,
        };

        let build = self
            .provider
            .trigger_smart_contract(&call, &options)
            .await
            .map_err(|e| Error::TransactionBuild(e.to_string()))?;
        let transaction = match (build.result, build.transaction) {
            (true, Some(transaction)) => transaction,
            (_, _) => {
                let message = build
                    .message
                    .unwrap_or_else(|| "Failed to build transaction".to_string());
                error!("Approve build rejected: {}", message);
                return Err(Error::TransactionBuild(message));
            }
        };

        let signed = self
            .provider
            .sign_transaction(&transaction)
            .await
            .map_err(|e| Error::TransactionSign(e.to_string()))?;

        let receipt = self
            .provider
            .send_raw_transaction(&signed)
            .await
            .map_err(|e| Error::TransactionBroadcast(e.to_string()))?;
        if !receipt.result {
            return Err(Error::TransactionBroadcast(format!(
                "Transaction failed: {}",
                receipt.message.unwrap_or_else(|| "Unknown error".to_string())
            )));
        }

        info!("approve({}, {}) broadcast as {}", spender, amount, receipt.txid);
        Ok(receipt.txid)
    }

    /// Makes sure `spender` may move at least `desired` raw units from `owner`.
    pub async fn ensure_allowance(
        &self,
        owner: &TronAddress,
        spender: &TronAddress,
        desired: U256,
    ) -> Result<AllowanceReport> {
        let previous = self.check_allowance(owner, spender).await?;
        if previous >= desired {
            info!("Sufficient allowance already exists ({} >= {})", previous, desired);
            return Ok(AllowanceReport {
                status: AllowanceStatus::AlreadySufficient,
                previous,
                current: previous,
                desired,
                transactions: Vec::new(),
            });
        }

        let mut transactions = Vec::new();

        // Tokens such as USDT reject changing one non-zero allowance into another.
        if previous > U256::ZERO {
            info!("Resetting allowance to 0 first");
            transactions.push(self.approve(owner, spender, U256::ZERO).await?);
            self.sleeper.sleep(self.settle_delay).await;
        }

        transactions.push(self.approve(owner, spender, desired).await?);

        self.sleeper.sleep(self.settle_delay).await;
        let current = match self.check_allowance(owner, spender).await {
            Ok(value) => value,
            Err(e) => {
                error!("Allowance verification read failed: {}", e);
                U256::ZERO
            }
        };

        let status = if current >= desired {
            AllowanceStatus::Verified
        } else {
            AllowanceStatus::Pending
        };

        Ok(AllowanceReport {
            status,
            previous,
            current,
            desired,
            transactions,
        })
    }
}
