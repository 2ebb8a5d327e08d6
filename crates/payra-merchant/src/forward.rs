//! Forwarder call construction.
//!
//! Core contract functions are not called directly. Their calldata is built
//! from the ABI and passed as the single `bytes` argument of `forward` on
//! the network's forwarder contract.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes};

use crate::config::PayraConfig;
use crate::constants::FORWARD_FUNCTION;
use crate::registry::{AbiRegistry, FunctionAbi};
use crate::{Network, PayraError};

/// A ready-to-dispatch forwarded call.
#[derive(Debug, Clone)]
pub struct ForwardCall {
    /// Forwarder contract address.
    pub to: Address,
    /// `forward(bytes)` calldata wrapping the core call.
    pub calldata: Bytes,
    /// The core function being relayed, used to decode the result.
    pub function: FunctionAbi,
}

#[derive(Debug, Clone)]
pub struct ForwardCallBuilder {
    config: Arc<PayraConfig>,
    abi: Arc<AbiRegistry>,
}

impl ForwardCallBuilder {
    pub fn new(config: Arc<PayraConfig>, abi: Arc<AbiRegistry>) -> Self {
        Self { config, abi }
    }

    /// Build calldata for `core_function(args)` wrapped in `forward(bytes)`.
    ///
    /// Fails with a configuration error when the network has no forwarder
    /// address, and with [`PayraError::FunctionNotFound`] for unknown functions.
    pub fn build(
        &self,
        network: &Network,
        core_function: &str,
        args: &[DynSolValue],
    ) -> Result<ForwardCall, PayraError> {
        let forwarder = self
            .config
            .network(network)
            .and_then(|n| n.forward_address)
            .ok_or_else(|| {
                PayraError::ConfigError(format!(
                    "missing forward contract address for network: {}",
                    network.key()
                ))
            })?;

        let core = self.abi.function(core_function)?;
        let inner = core.encode_call(args)?;
        let calldata = wrap_forward(self.abi.function(FORWARD_FUNCTION)?, inner)?;

        tracing::debug!(
            network = %network,
            function = %core.signature(),
            calldata_len = calldata.len(),
            "built forward call"
        );

        Ok(ForwardCall {
            to: forwarder,
            calldata,
            function: core.clone(),
        })
    }
}

/// Encode `inner` as the sole argument of `forward`.
pub fn wrap_forward(forward: &FunctionAbi, inner: Vec<u8>) -> Result<Bytes, PayraError> {
    forward
        .encode_call(&[DynSolValue::Bytes(inner)])
        .map(Bytes::from)
}

/// Unwrap `forward`'s `bytes` return value and decode it against `function`'s outputs.
///
/// A single tuple output is flattened so callers always see the component list.
pub fn decode_forward_result(
    forward: &FunctionAbi,
    function: &FunctionAbi,
    raw: &[u8],
) -> Result<Vec<DynSolValue>, PayraError> {
    let outer = forward.decode_output(raw)?;
    let inner = match outer.as_slice() {
        [DynSolValue::Bytes(inner)] => inner,
        _ => {
            return Err(PayraError::AbiError(format!(
                "{} did not return a single bytes value",
                forward.name
            )))
        }
    };
    let mut values = function.decode_output(inner)?;
    if values.len() == 1 && matches!(values[0], DynSolValue::Tuple(_)) {
        if let Some(DynSolValue::Tuple(items)) = values.pop() {
            return Ok(items);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{self, AbiType};
    use alloy::primitives::U256;

    fn builder() -> ForwardCallBuilder {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
            (
                "PAYRA_POLYGON_CORE_FORWARD_CONTRACT_ADDRESS",
                "0x1111111111111111111111111111111111111111",
            ),
            ("PAYRA_POLYGON_RPC_URL_1", "https://rpc.example"),
            ("PAYRA_LINEA_MERCHANT_ID", "1"),
        ])
        .unwrap();
        ForwardCallBuilder::new(Arc::new(config), Arc::new(AbiRegistry::embedded().unwrap()))
    }

    fn args(order: &str) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Uint(U256::from(4u64), 256),
            DynSolValue::String(order.to_string()),
        ]
    }

    #[test]
    fn test_forward_wraps_core_calldata() {
        let call = builder()
            .build(&Network::new("polygon").unwrap(), "isOrderPaid", &args("ord-1"))
            .unwrap();
        assert_eq!(
            call.to.to_string().to_lowercase(),
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(&call.calldata[..4], &abi::selector("forward(bytes)"));

        let outer = abi::decode(&[AbiType::Bytes], &call.calldata[4..]).unwrap();
        let DynSolValue::Bytes(inner) = &outer[0] else {
            panic!("expected bytes argument");
        };
        assert_eq!(&inner[..4], &abi::selector("isOrderPaid(uint256,string)"));
        let decoded = abi::decode(&[AbiType::Uint256, AbiType::String], &inner[4..]).unwrap();
        assert_eq!(decoded, args("ord-1"));
    }

    #[test]
    fn test_unknown_function() {
        let err = builder()
            .build(&Network::new("polygon").unwrap(), "refund", &args("x"))
            .unwrap_err();
        assert!(matches!(err, PayraError::FunctionNotFound(_)));
    }

    #[test]
    fn test_missing_forwarder() {
        let b = builder();
        for net in ["linea", "base"] {
            let err = b
                .build(&Network::new(net).unwrap(), "isOrderPaid", &args("x"))
                .unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_argument_mismatch_is_abi_error() {
        let err = builder()
            .build(
                &Network::new("polygon").unwrap(),
                "isOrderPaid",
                &[DynSolValue::String("4".to_string())],
            )
            .unwrap_err();
        assert!(matches!(err, PayraError::AbiError(_)));
    }

    #[test]
    fn test_decode_forward_result() {
        let registry = AbiRegistry::embedded().unwrap();
        let forward = registry.function("forward").unwrap();
        let paid = registry.function("isOrderPaid").unwrap();

        let inner = abi::encode(&[AbiType::Bool], &[DynSolValue::Bool(true)]).unwrap();
        let raw = abi::encode(&[AbiType::Bytes], &[DynSolValue::Bytes(inner)]).unwrap();
        let values = decode_forward_result(forward, paid, &raw).unwrap();
        assert_eq!(values, vec![DynSolValue::Bool(true)]);

        let garbage = decode_forward_result(forward, paid, &[0u8; 7]).unwrap_err();
        assert!(matches!(garbage, PayraError::AbiError(_)));
    }

    #[test]
    fn test_decode_flattens_single_tuple_output() {
        let forward = FunctionAbi::new("forward", vec![AbiType::Bytes], vec![AbiType::Bytes]);
        let getter = FunctionAbi::new(
            "getOrder",
            vec![],
            vec![AbiType::Tuple(vec![AbiType::Bool, AbiType::Uint256])],
        );
        let tuple = DynSolValue::Tuple(vec![
            DynSolValue::Bool(false),
            DynSolValue::Uint(U256::from(7u64), 256),
        ]);
        let inner = abi::encode(&getter.outputs, &[tuple]).unwrap();
        let raw = abi::encode(&[AbiType::Bytes], &[DynSolValue::Bytes(inner)]).unwrap();
        let values = decode_forward_result(&forward, &getter, &raw).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], DynSolValue::Bool(false));
    }
}
