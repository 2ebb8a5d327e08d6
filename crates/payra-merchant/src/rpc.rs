//! Read-only JSON-RPC transport.
//!
//! Transports report completion through a callback ([`RpcCallback`]) instead
//! of returning a future. [`crate::bridge`] turns that back into an awaitable
//! call with a deadline.

use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use url::Url;

use crate::PayraError;

/// Completion handler for one `eth_call`. Called at most once.
pub type RpcCallback = Box<dyn FnOnce(Result<Bytes, PayraError>) + Send + 'static>;

/// Issues a single read-only contract call and reports the outcome to `callback`.
///
/// Implementations must not block the caller; the callback may fire on any
/// thread, at any later time, or never.
pub trait RpcTransport: Send + Sync {
    fn call(&self, endpoint: &Url, to: Address, calldata: Bytes, callback: RpcCallback);
}

/// Uniform random choice among the configured endpoints. No health checks and
/// no failover: a failed call is reported, not retried on another URL.
pub fn pick_endpoint(endpoints: &[Url]) -> Result<&Url, PayraError> {
    endpoints
        .choose(&mut rand::rng())
        .ok_or_else(|| PayraError::ConfigError("no RPC URLs configured".to_string()))
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `eth_call` over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRpcTransport {
    client: reqwest::Client,
}

impl HttpRpcTransport {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, PayraError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| PayraError::RpcError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Send one `eth_call` against the latest block and return the raw result bytes.
    pub async fn eth_call(
        &self,
        endpoint: &Url,
        to: Address,
        calldata: &[u8],
    ) -> Result<Bytes, PayraError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{
                "to": format!("0x{}", alloy::hex::encode(to)),
                "data": format!("0x{}", alloy::hex::encode(calldata)),
            }, "latest"],
            "id": 1
        });

        let response = self
            .client
            .post(endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| PayraError::RpcError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayraError::RpcError(format!("endpoint returned HTTP {status}")));
        }

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| PayraError::RpcError(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(PayraError::RpcError(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        let result = parsed
            .result
            .ok_or_else(|| PayraError::RpcError("response has no result".to_string()))?;
        alloy::hex::decode(result.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| PayraError::RpcError(format!("result is not hex: {e}")))
    }
}

impl RpcTransport for HttpRpcTransport {
    fn call(&self, endpoint: &Url, to: Address, calldata: Bytes, callback: RpcCallback) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                callback(Err(PayraError::RpcError(
                    "no async runtime available for RPC call".to_string(),
                )));
                return;
            }
        };
        let transport = self.clone();
        let endpoint = endpoint.clone();
        handle.spawn(async move {
            let result = transport.eth_call(&endpoint, to, &calldata).await;
            callback(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_endpoint_uses_configured_urls() {
        let urls: Vec<Url> = ["https://a.example", "https://b.example", "https://c.example"]
            .iter()
            .map(|u| Url::parse(u).unwrap())
            .collect();
        for _ in 0..32 {
            let picked = pick_endpoint(&urls).unwrap();
            assert!(urls.contains(picked));
        }
    }

    #[test]
    fn test_pick_endpoint_empty_pool() {
        let err = pick_endpoint(&[]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_response_parsing() {
        let ok: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x01"}"#).unwrap();
        assert_eq!(ok.result.as_deref(), Some("0x01"));
        assert!(ok.error.is_none());

        let err: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted"}}"#,
        )
        .unwrap();
        let err = err.error.unwrap();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "execution reverted");
    }

    #[test]
    fn test_call_without_runtime_reports_error() {
        let transport =
            HttpRpcTransport::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        transport.call(
            &Url::parse("http://127.0.0.1:1").unwrap(),
            Address::ZERO,
            Bytes::new(),
            Box::new(move |result| {
                tx.send(result.is_err()).unwrap();
            }),
        );
        assert!(rx.recv().unwrap());
    }
}
