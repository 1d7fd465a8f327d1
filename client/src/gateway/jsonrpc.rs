//! # Ethereum JSON-RPC Gateway
//!
//! A [`LedgerGateway`] over a plain Ethereum JSON-RPC endpoint (Hardhat,
//! Anvil, geth, or a hosted provider). Only four methods are used:
//!
//! | Method                | Used for                                   |
//! |-----------------------|--------------------------------------------|
//! | `eth_call`            | `balanceOf`, `lockPeriod`, `lastDepositTime` |
//! | `eth_getLogs`         | `Deposited` / `Withdrawn` history scans    |
//! | `eth_sendTransaction` | `deposit` / `withdraw` from an unlocked account |
//! | `eth_getCode`         | startup check that the vault is deployed   |
//!
//! Transactions are sent through `eth_sendTransaction`, so the node must
//! manage the `from` account's key (a dev node's unlocked accounts, or a
//! signing proxy in front of a real network).
//!
//! Error bodies are mapped onto [`GatewayError`]: the raw RPC message becomes
//! the generic message, and a revert reason, when one can be recovered from
//! the error data or message, becomes the short message.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    GatewayError, LedgerGateway, LogFilter, RawLog, ReadCall, TransactionId, TransactionRequest,
    VaultEvent,
};
use crate::interface::VaultInterface;

/// Selector of Solidity's built-in `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// The JSON-RPC methods this gateway issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "eth_call")]
    Call,
    #[serde(rename = "eth_getLogs")]
    GetLogs,
    #[serde(rename = "eth_sendTransaction")]
    SendTransaction,
    #[serde(rename = "eth_getCode")]
    GetCode,
    #[serde(rename = "eth_blockNumber")]
    BlockNumber,
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// Request identifier. Echoed back in the response.
    pub id: u64,
    /// The method to invoke.
    pub method: RpcMethod,
    /// Positional parameters.
    pub params: serde_json::Value,
}

impl RpcRequest {
    /// Creates a request with positional `params`.
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` / `error` is set by a
/// conforming node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    #[serde(default)]
    pub jsonrpc: String,
    /// The request ID this response corresponds to.
    #[serde(default)]
    pub id: serde_json::Value,
    /// The successful result.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// The failure.
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional error data; revert payloads live here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<RpcError> for GatewayError {
    fn from(err: RpcError) -> Self {
        let reason = err
            .data
            .as_ref()
            .and_then(revert_data)
            .and_then(|data| decode_revert_reason(&data))
            .or_else(|| revert_reason_from_message(&err.message));

        let base = GatewayError::new(err.message);
        match reason {
            Some(reason) => base.with_short_message(format!("Execution reverted: {reason}")),
            None => base,
        }
    }
}

/// One entry of an `eth_getLogs` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogRecord {
    data: String,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    transaction_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// JsonRpcGateway
// ---------------------------------------------------------------------------

/// [`LedgerGateway`] speaking Ethereum JSON-RPC over HTTP.
pub struct JsonRpcGateway {
    http: reqwest::Client,
    url: String,
    interface: VaultInterface,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    /// Gateway for the node at `url`, encoding calls with `interface`.
    pub fn new(url: impl Into<String>, interface: VaultInterface) -> Self {
        Self::with_client(reqwest::Client::new(), url, interface)
    }

    /// Same as [`JsonRpcGateway::new`] with a preconfigured HTTP client
    /// (timeouts, proxies, TLS roots).
    pub fn with_client(
        http: reqwest::Client,
        url: impl Into<String>,
        interface: VaultInterface,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            interface,
            next_id: AtomicU64::new(1),
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deployed bytecode at `address`; empty if no contract lives there.
    pub async fn code_at(&self, address: Address) -> Result<Vec<u8>, GatewayError> {
        let code: String = self
            .call(
                RpcMethod::GetCode,
                serde_json::json!([hex_prefixed(address.as_slice()), "latest"]),
            )
            .await?;
        decode_hex(&code)
    }

    /// Height of the latest block.
    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let height: String = self
            .call(RpcMethod::BlockNumber, serde_json::json!([]))
            .await?;
        parse_quantity(&height)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        debug!(id, method = ?method, url = %self.url, "json-rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::new(format!("transport error: {e}")))?;

        let status = response.status();
        let body: RpcResponse = response.json().await.map_err(|e| {
            GatewayError::new(format!("invalid JSON-RPC response (HTTP {status}): {e}"))
        })?;

        if let Some(error) = body.error {
            debug!(id, code = error.code, message = %error.message, "json-rpc error");
            return Err(error.into());
        }
        let result = body
            .result
            .ok_or_else(|| GatewayError::new("JSON-RPC response carries neither result nor error"))?;
        serde_json::from_value(result)
            .map_err(|e| GatewayError::new(format!("unexpected {method:?} result: {e}")))
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn read_state(&self, contract: Address, call: ReadCall) -> Result<U256, GatewayError> {
        let data = self.interface.encode_read(&call);
        let params = serde_json::json!([
            {
                "to": hex_prefixed(contract.as_slice()),
                "data": hex_prefixed(&data),
            },
            "latest"
        ]);
        let returned: String = self.call(RpcMethod::Call, params).await?;
        decode_word(&decode_hex(&returned)?)
    }

    async fn scan_logs(
        &self,
        contract: Address,
        event: VaultEvent,
        filter: LogFilter,
    ) -> Result<Vec<RawLog>, GatewayError> {
        let params = serde_json::json!([log_filter_params(
            &self.interface,
            contract,
            event,
            &filter
        )]);
        let records: Vec<LogRecord> = self.call(RpcMethod::GetLogs, params).await?;
        records.into_iter().map(decode_log).collect()
    }

    async fn send_transaction(
        &self,
        contract: Address,
        request: TransactionRequest,
    ) -> Result<TransactionId, GatewayError> {
        let data = self.interface.encode_write(&request.call);
        let params = serde_json::json!([{
            "from": hex_prefixed(request.from.as_slice()),
            "to": hex_prefixed(contract.as_slice()),
            "data": hex_prefixed(&data),
            "value": format!("0x{:x}", request.call.value()),
        }]);
        let hash: String = self.call(RpcMethod::SendTransaction, params).await?;
        Ok(TransactionId::new(hash))
    }
}

// ---------------------------------------------------------------------------
// Encoding / Decoding Helpers
// ---------------------------------------------------------------------------

fn log_filter_params(
    interface: &VaultInterface,
    contract: Address,
    event: VaultEvent,
    filter: &LogFilter,
) -> serde_json::Value {
    let to_block = match filter.to_block {
        Some(block) => format!("0x{block:x}"),
        None => "latest".to_string(),
    };
    serde_json::json!({
        "address": hex_prefixed(contract.as_slice()),
        "topics": [
            hex_prefixed(interface.event_topic(event).as_slice()),
            hex_prefixed(filter.user.into_word().as_slice()),
        ],
        "fromBlock": format!("0x{:x}", filter.from_block),
        "toBlock": to_block,
    })
}

fn decode_log(record: LogRecord) -> Result<RawLog, GatewayError> {
    let amount = decode_word(&decode_hex(&record.data)?)?;
    let transaction_id = record
        .transaction_hash
        .map(TransactionId::new)
        .ok_or_else(|| GatewayError::new("log record without transaction hash"))?;
    let block_number = record.block_number.as_deref().map(parse_quantity).transpose()?;
    Ok(RawLog {
        amount,
        transaction_id,
        block_number,
    })
}

fn hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, GatewayError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| GatewayError::new(format!("invalid hex data {s:?}: {e}")))
}

/// First 32-byte word of ABI-encoded data as a `uint256`.
fn decode_word(bytes: &[u8]) -> Result<U256, GatewayError> {
    bytes
        .get(..32)
        .and_then(U256::try_from_be_slice)
        .ok_or_else(|| GatewayError::new(format!("expected a 32-byte word, got {} bytes", bytes.len())))
}

fn parse_quantity(s: &str) -> Result<u64, GatewayError> {
    s.strip_prefix("0x")
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| u64::from_str_radix(digits, 16).ok())
        .ok_or_else(|| GatewayError::new(format!("invalid quantity {s:?}")))
}

/// Nodes put revert payloads either directly in `data` or nested one level
/// down (`{"data": "0x..."}`).
fn revert_data(data: &serde_json::Value) -> Option<Vec<u8>> {
    let hex = match data {
        serde_json::Value::String(s) => s.as_str(),
        serde_json::Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    decode_hex(hex).ok()
}

/// Decodes an `Error(string)` revert payload.
fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    let offset = usize::try_from(U256::try_from_be_slice(body.get(..32)?)?).ok()?;
    let len_word = body.get(offset..offset.checked_add(32)?)?;
    let len = usize::try_from(U256::try_from_be_slice(len_word)?).ok()?;
    let start = offset + 32;
    let bytes = body.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Recovers a revert reason from the message formats Hardhat and geth use
/// when the payload itself is not returned.
fn revert_reason_from_message(message: &str) -> Option<String> {
    const HARDHAT: &str = "reverted with reason string '";
    const GETH: &str = "execution reverted: ";

    if let Some(idx) = message.find(HARDHAT) {
        let rest = &message[idx + HARDHAT.len()..];
        return rest.find('\'').map(|end| rest[..end].to_string());
    }
    message
        .find(GETH)
        .map(|idx| message[idx + GETH.len()..].trim().to_string())
        .filter(|reason| !reason.is_empty())
}
