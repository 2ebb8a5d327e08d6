//! Callback-to-future bridge with a deadline.
//!
//! Each call gets a [`PendingCall`] that moves into the transport callback,
//! while the waiting task keeps only its `settled` flag. The first completion
//! settles the call; anything after that, including a callback that arrives
//! once the deadline has passed, is dropped. A transport that drops the
//! callback without calling it drops the sender too, which the waiter sees
//! immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use tokio::sync::oneshot;
use url::Url;

use crate::rpc::RpcTransport;
use crate::PayraError;

type CallResult = Result<Bytes, PayraError>;

/// Single-write result cell for one in-flight call, owned by the callback.
struct PendingCall {
    settled: Arc<AtomicBool>,
    sender: oneshot::Sender<CallResult>,
}

impl PendingCall {
    fn new() -> (Self, Arc<AtomicBool>, oneshot::Receiver<CallResult>) {
        let (sender, rx) = oneshot::channel();
        let settled = Arc::new(AtomicBool::new(false));
        let pending = Self {
            settled: Arc::clone(&settled),
            sender,
        };
        (pending, settled, rx)
    }

    /// Deliver `result` unless the call is already settled. Returns whether it was delivered.
    fn complete(self, result: CallResult) -> bool {
        if self.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sender.send(result).is_ok()
    }
}

/// Dispatch one `eth_call` through `transport` and wait up to `timeout` for its callback.
///
/// No retries. A timeout yields [`PayraError::Timeout`]; a transport failure
/// is returned as reported, and a callback dropped unfired is an
/// [`PayraError::RpcError`].
pub async fn call_with_timeout(
    transport: &dyn RpcTransport,
    endpoint: &Url,
    to: Address,
    calldata: Bytes,
    timeout: Duration,
) -> Result<Bytes, PayraError> {
    let (pending, settled, rx) = PendingCall::new();
    let endpoint_label = endpoint.host_str().unwrap_or_default().to_string();

    transport.call(
        endpoint,
        to,
        calldata,
        Box::new(move |result| {
            if !pending.complete(result) {
                tracing::warn!(
                    endpoint = %endpoint_label,
                    "RPC callback arrived after the call was settled; dropped"
                );
            }
        }),
    );

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            settled.store(true, Ordering::Release);
            Err(PayraError::RpcError(
                "transport dropped the call without a response".to_string(),
            ))
        }
        Err(_) => {
            settled.store(true, Ordering::Release);
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "RPC call timed out");
            Err(PayraError::Timeout(timeout))
        }
    }
}
