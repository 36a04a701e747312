use crate::error::{Error, Result};
use crate::tron::{encode_parameters, TronAddress};
use crate::wallet::provider::{
    AccessResponse, AccountAddress, BroadcastReceipt, CallOptions, ContractCall,
    SignedTransaction, TransactionBuild, UnsignedTransaction, WalletKind, WalletProvider,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

#[derive(Debug, Deserialize, Default)]
struct AccountResponse {
    #[serde(default)]
    balance: u64,
}

#[derive(Debug, Deserialize, Default)]
struct ReturnStatus {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConstantResponse {
    #[serde(default)]
    constant_result: Vec<String>,
    #[serde(default)]
    result: ReturnStatus,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(default)]
    result: ReturnStatus,
    #[serde(default)]
    transaction: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    txid: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    owner_address: &'a str,
    contract_address: &'a str,
    function_selector: &'a str,
    parameter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fee_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_value: Option<u64>,
    visible: bool,
}

impl<'a> TriggerRequest<'a> {
    fn new(call: &'a ContractCall) -> Self {
        Self {
            owner_address: call.owner.base58(),
            contract_address: call.contract.base58(),
            function_selector: &call.function_selector,
            parameter: encode_parameters(&call.parameters),
            fee_limit: None,
            call_value: None,
            visible: true,
        }
    }
}

/// Node messages come back hex-encoded; fall back to the raw text.
fn decode_node_message(message: Option<String>) -> Option<String> {
    message.map(|m| {
        hex::decode(&m)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or(m)
    })
}

/// Watch-only provider backed by a Tron full node's HTTP API.
///
/// Reads balances and allowances, builds and broadcasts transactions, but
/// holds no keys: both signing operations report `Unsupported`.
#[derive(Debug, Clone)]
pub struct TronGridProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    watch_address: Option<TronAddress>,
}

impl TronGridProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        watch_address: Option<TronAddress>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            watch_address,
        })
    }

    pub fn from_config(config: &crate::config::TronConfig) -> Result<Self> {
        let watch_address = config
            .watch_address
            .as_deref()
            .map(str::parse::<TronAddress>)
            .transpose()?;
        Self::new(
            &config.full_node,
            config.api_key.clone(),
            watch_address,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, body: &impl Serialize) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ProviderError(format!(
                "{} returned {}: {}",
                endpoint, status, text
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl WalletProvider for TronGridProvider {
    fn kind(&self) -> WalletKind {
        WalletKind::TronGrid
    }

    fn has_tron_web(&self) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        self.watch_address.is_some()
    }

    fn default_address(&self) -> Option<AccountAddress> {
        self.watch_address.as_ref().map(AccountAddress::from)
    }

    fn node_host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    fn can_sign(&self) -> bool {
        false
    }

    fn can_send_transactions(&self) -> bool {
        true
    }

    fn can_interact_with_contracts(&self) -> bool {
        true
    }

    async fn request_accounts(&self) -> Result<AccessResponse> {
        match &self.watch_address {
            Some(_) => Ok(AccessResponse::granted()),
            None => Ok(AccessResponse {
                code: 4001,
                message: Some("no watch address configured".to_string()),
            }),
        }
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        let account: AccountResponse = self
            .post("/wallet/getaccount", &json!({ "address": address, "visible": true }))
            .await?;
        Ok(account.balance)
    }

    async fn sign_message(&self, _message: &str) -> Result<String> {
        Err(Error::Unsupported("a watch-only node provider cannot sign messages".to_string()))
    }

    async fn trigger_constant_contract(&self, call: &ContractCall) -> Result<Vec<String>> {
        let response: ConstantResponse = self
            .post("/wallet/triggerconstantcontract", &TriggerRequest::new(call))
            .await?;
        if !response.result.result {
            let message = decode_node_message(response.result.message)
                .or(response.result.code)
                .unwrap_or_else(|| "constant call failed".to_string());
            return Err(Error::ProviderError(message));
        }
        Ok(response.constant_result)
    }

    async fn trigger_smart_contract(
        &self,
        call: &ContractCall,
        options: &CallOptions,
    ) -> Result<TransactionBuild> {
        let mut request = TriggerRequest::new(call);
        request.fee_limit = Some(options.fee_limit);
        request.call_value = Some(options.call_value);

        let response: TriggerResponse = self.post("/wallet/triggersmartcontract", &request).await?;
        let transaction = response.transaction.map(|raw| UnsignedTransaction {
            txid: raw
                .get("txID")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            raw,
        });

        Ok(TransactionBuild {
            result: response.result.result,
            message: decode_node_message(response.result.message),
            transaction,
        })
    }

    async fn sign_transaction(&self, _transaction: &UnsignedTransaction) -> Result<SignedTransaction> {
        Err(Error::Unsupported(
            "a watch-only node provider cannot sign transactions".to_string(),
        ))
    }

    async fn send_raw_transaction(&self, transaction: &SignedTransaction) -> Result<BroadcastReceipt> {
        let response: BroadcastResponse = self
            .post("/wallet/broadcasttransaction", &transaction.raw)
            .await?;
        if !response.result {
            warn!(
                "Broadcast of {} rejected: {:?}",
                transaction.txid, response.code
            );
        }
        Ok(BroadcastReceipt {
            result: response.result,
            txid: if response.txid.is_empty() {
                transaction.txid.clone()
            } else {
                response.txid
            },
            message: decode_node_message(response.message).or(response.code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tron::{AbiValue, TRC20_ALLOWANCE};

    fn provider(watch: Option<&str>) -> TronGridProvider {
        TronGridProvider::new(
            "https://nile.trongrid.io/",
            None,
            watch.map(|a| a.parse().unwrap()),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_node_host_and_readiness() {
        let p = provider(Some("TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV"));
        assert_eq!(p.node_host().as_deref(), Some("nile.trongrid.io"));
        assert!(p.is_ready());
        assert_eq!(
            p.default_address().unwrap().hex,
            "411111111111111111111111111111111111111111"
        );
        assert!(!provider(None).is_ready());
    }

    #[tokio::test]
    async fn test_signing_is_unsupported() {
        let p = provider(None);
        assert!(matches!(p.sign_message("hi").await, Err(Error::Unsupported(_))));
        assert_eq!(p.request_accounts().await.unwrap().code, 4001);
    }

    #[test]
    fn test_trigger_request_shape() {
        let owner: TronAddress = "TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV".parse().unwrap();
        let call = ContractCall {
            owner: owner.clone(),
            contract: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap(),
            function_selector: TRC20_ALLOWANCE.to_string(),
            parameters: vec![AbiValue::Address(owner.clone()), AbiValue::Address(owner)],
        };
        let body = serde_json::to_value(TriggerRequest::new(&call)).unwrap();
        assert_eq!(body["function_selector"], TRC20_ALLOWANCE);
        assert_eq!(body["visible"], true);
        assert_eq!(body["parameter"].as_str().unwrap().len(), 128);
        assert!(body.get("fee_limit").is_none());
    }

    #[test]
    fn test_decode_node_message() {
        assert_eq!(
            decode_node_message(Some(hex::encode("REVERT opcode executed"))).as_deref(),
            Some("REVERT opcode executed")
        );
        assert_eq!(decode_node_message(Some("plain".into())).as_deref(), Some("plain"));
    }
}
