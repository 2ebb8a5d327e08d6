//! Merchant-scoped order queries.
//!
//! Both queries go through the forwarder and return an envelope instead of an
//! error: every failure, from missing configuration to a decode mismatch,
//! ends up in `error` with `success: false`.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::bridge::call_with_timeout;
use crate::config::PayraConfig;
use crate::constants::{FORWARD_FUNCTION, IS_ORDER_PAID_FUNCTION, ORDER_STATUS_FUNCTION};
use crate::forward::{decode_forward_result, ForwardCallBuilder};
use crate::registry::AbiRegistry;
use crate::rpc::{pick_endpoint, RpcTransport};
use crate::{Network, PayraError};

/// Where a single query is in its lifecycle. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Configuring,
    Encoding,
    Dispatched,
    Decoded,
    TimedOut,
    Errored,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryState::Configuring => "configuring",
            QueryState::Encoding => "encoding",
            QueryState::Dispatched => "dispatched",
            QueryState::Decoded => "decoded",
            QueryState::TimedOut => "timed_out",
            QueryState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Result of [`OrderService::get_order_details`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsResponse {
    pub success: bool,
    pub error: Option<String>,
    pub paid: Option<bool>,
    /// Lowercase `0x` hex, not checksummed.
    pub token: Option<String>,
    /// Base units, decimal string.
    pub amount: Option<String>,
    /// Base units, decimal string.
    pub fee: Option<String>,
    /// Unix seconds.
    pub timestamp: Option<u64>,
}

impl OrderDetailsResponse {
    fn failure(error: &PayraError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Result of [`OrderService::is_order_paid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaidResponse {
    pub success: bool,
    pub error: Option<String>,
    pub paid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderDetails {
    paid: bool,
    token: String,
    amount: String,
    fee: String,
    timestamp: u64,
}

/// Runs order queries for any configured network.
pub struct OrderService<T: RpcTransport> {
    config: Arc<PayraConfig>,
    abi: Arc<AbiRegistry>,
    builder: ForwardCallBuilder,
    transport: T,
}

impl<T: RpcTransport> OrderService<T> {
    pub fn new(config: Arc<PayraConfig>, abi: Arc<AbiRegistry>, transport: T) -> Self {
        let builder = ForwardCallBuilder::new(Arc::clone(&config), Arc::clone(&abi));
        Self {
            config,
            abi,
            builder,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Full payment details for `order_id`: paid flag, token, amount, fee and timestamp.
    pub async fn get_order_details(&self, network: &str, order_id: &str) -> OrderDetailsResponse {
        match self.query(network, ORDER_STATUS_FUNCTION, order_id).await {
            Ok(values) => match parse_details(&values) {
                Ok(d) => OrderDetailsResponse {
                    success: true,
                    error: None,
                    paid: Some(d.paid),
                    token: Some(d.token),
                    amount: Some(d.amount),
                    fee: Some(d.fee),
                    timestamp: Some(d.timestamp),
                },
                Err(e) => {
                    self.log_failure(network, order_id, ORDER_STATUS_FUNCTION, &e);
                    OrderDetailsResponse::failure(&e)
                }
            },
            Err(e) => {
                self.log_failure(network, order_id, ORDER_STATUS_FUNCTION, &e);
                OrderDetailsResponse::failure(&e)
            }
        }
    }

    /// Whether `order_id` has been paid.
    pub async fn is_order_paid(&self, network: &str, order_id: &str) -> OrderPaidResponse {
        let result = self
            .query(network, IS_ORDER_PAID_FUNCTION, order_id)
            .await
            .and_then(|values| match values.first() {
                Some(DynSolValue::Bool(paid)) => Ok(*paid),
                other => Err(PayraError::AbiError(format!(
                    "expected bool from {IS_ORDER_PAID_FUNCTION}, got {other:?}"
                ))),
            });
        match result {
            Ok(paid) => OrderPaidResponse {
                success: true,
                error: None,
                paid: Some(paid),
            },
            Err(e) => {
                self.log_failure(network, order_id, IS_ORDER_PAID_FUNCTION, &e);
                OrderPaidResponse {
                    success: false,
                    error: Some(e.to_string()),
                    paid: None,
                }
            }
        }
    }

    /// Resolve config, build the forwarded call, make one round trip and
    /// decode the core function's outputs.
    async fn query(
        &self,
        network: &str,
        function: &str,
        order_id: &str,
    ) -> Result<Vec<DynSolValue>, PayraError> {
        let mut state = QueryState::Configuring;
        tracing::debug!(network, function, %state, "order query");

        let network = Network::new(network)?;
        let target = self.config.query_target(&network)?;
        let endpoint = pick_endpoint(target.rpc_urls)?;

        state = QueryState::Encoding;
        tracing::debug!(network = %network, function, %state, "order query");
        let args = [
            DynSolValue::Uint(target.merchant_id, 256),
            DynSolValue::String(order_id.to_string()),
        ];
        let call = self.builder.build(&network, function, &args)?;
        let forward = self.abi.function(FORWARD_FUNCTION)?;

        state = QueryState::Dispatched;
        tracing::debug!(
            network = %network,
            function,
            %state,
            endpoint = endpoint.host_str().unwrap_or_default(),
            "order query"
        );
        let raw: Bytes = match call_with_timeout(
            &self.transport,
            endpoint,
            call.to,
            call.calldata,
            self.config.rpc_timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                state = if e.is_timeout() {
                    QueryState::TimedOut
                } else {
                    QueryState::Errored
                };
                tracing::debug!(network = %network, function, %state, "order query");
                return Err(e);
            }
        };

        let values = decode_forward_result(forward, &call.function, &raw)?;
        state = QueryState::Decoded;
        tracing::debug!(network = %network, function, %state, "order query");
        Ok(values)
    }

    fn log_failure(&self, network: &str, order_id: &str, function: &str, error: &PayraError) {
        let state = if error.is_timeout() {
            QueryState::TimedOut
        } else {
            QueryState::Errored
        };
        tracing::warn!(
            network,
            order_id,
            function,
            %state,
            error = %error,
            "order query failed"
        );
    }
}

fn parse_details(values: &[DynSolValue]) -> Result<OrderDetails, PayraError> {
    match values {
        [DynSolValue::Bool(paid), DynSolValue::Address(token), DynSolValue::Uint(amount, _), DynSolValue::Uint(fee, _), DynSolValue::Uint(timestamp, _)] =>
        {
            let timestamp = u64::try_from(*timestamp).map_err(|_| {
                PayraError::AbiError(format!("order timestamp {timestamp} does not fit in u64"))
            })?;
            Ok(OrderDetails {
                paid: *paid,
                token: format!("0x{}", alloy::hex::encode(token)),
                amount: amount.to_string(),
                fee: fee.to_string(),
                timestamp,
            })
        }
        other => Err(PayraError::AbiError(format!(
            "expected (bool,address,uint256,uint256,uint256) from {ORDER_STATUS_FUNCTION}, got {} values",
            other.len()
        ))),
    }
}
