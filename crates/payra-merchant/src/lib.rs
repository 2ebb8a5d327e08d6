//! Merchant-side client for the Payra payment gateway.
//!
//! Two jobs:
//!
//! - **Signing** ([`SignatureGenerator`]): produce the ECDSA signature the Payra
//!   contract verifies before accepting a payment for an order.
//! - **Order queries** ([`OrderService`]): read an order's payment state through
//!   the network's forwarder contract (`forward(bytes)`), with a bounded wait
//!   on the RPC callback.
//!
//! Configuration ([`PayraConfig`]) and the contract ABI ([`AbiRegistry`]) are
//! loaded once and shared read-only.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use payra::{AbiRegistry, HttpRpcTransport, OrderService, PayraConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), payra::PayraError> {
//! let config = Arc::new(PayraConfig::from_env()?);
//! let abi = Arc::new(AbiRegistry::embedded()?);
//! let transport = HttpRpcTransport::new(config.connect_timeout, config.rpc_timeout)?;
//! let orders = OrderService::new(config, abi, transport);
//!
//! let status = orders.is_order_paid("polygon", "order_19_984723").await;
//! println!("{}", serde_json::to_string(&status)?);
//! # Ok(())
//! # }
//! ```

// Codec and contract interface
pub mod abi;
pub mod constants;
pub mod error;
pub mod registry;

// Configuration
pub mod config;
pub mod network;

// Network I/O
pub mod bridge;
pub mod rpc;

// Operations
pub mod forward;
pub mod order;
pub mod signature;
pub mod units;

// Re-exports
pub use abi::AbiType;
pub use bridge::call_with_timeout;
pub use config::{NetworkConfig, PayraConfig};
pub use error::PayraError;
pub use forward::{ForwardCall, ForwardCallBuilder};
pub use network::Network;
pub use order::{OrderDetailsResponse, OrderPaidResponse, OrderService, QueryState};
pub use registry::{AbiRegistry, FunctionAbi};
pub use rpc::{HttpRpcTransport, RpcCallback, RpcTransport};
pub use signature::{SignatureGenerator, SignatureRequest, SignatureResponse};
