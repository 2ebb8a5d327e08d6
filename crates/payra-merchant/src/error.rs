use std::time::Duration;

use thiserror::Error;

/// Errors returned by Payra operations.
#[derive(Debug, Error)]
pub enum PayraError {
    /// Missing or malformed configuration for a network (RPC URLs, addresses).
    #[error("config error: {0}")]
    ConfigError(String),

    /// The merchant id or private key for a network is not configured.
    #[error("missing merchant credentials for network: {0}")]
    MissingCredentials(String),

    #[error("abi error: {0}")]
    AbiError(String),

    #[error("function {0} not found in ABI")]
    FunctionNotFound(String),

    #[error("rpc error: {0}")]
    RpcError(String),

    #[error("rpc timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Any failure while producing a signature, with the original cause attached.
    #[error("failed to generate signature: {source}")]
    SignatureError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl PayraError {
    /// Wrap a lower-level failure as a [`PayraError::SignatureError`].
    pub fn signature<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PayraError::SignatureError {
            source: Box::new(source),
        }
    }

    /// True for errors raised while resolving configuration, before any I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PayraError::ConfigError(_) | PayraError::MissingCredentials(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PayraError::Timeout(_))
    }
}
