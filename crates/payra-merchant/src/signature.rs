//! Order signatures verified by the Payra contract.
//!
//! The contract rebuilds the same message on-chain:
//!
//! 1. `abi.encode(token, merchantId, orderId, amountWei, timestamp, payer)`
//! 2. `messageHash = keccak256(encoded)`
//! 3. `digest = keccak256("\x19Ethereum Signed Message:\n32" ++ messageHash)`
//! 4. `ecrecover(digest, v, r, s)` must equal the merchant's signing address.
//!
//! Signatures are emitted as `0x` + r (32 bytes) + s (32 bytes) + v (1 byte),
//! with low `s` and `v` = 27 + recovery id.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::{Deserialize, Serialize};

use crate::abi::{self, AbiType};
use crate::config::PayraConfig;
use crate::constants::{
    ORDER_SIGNATURE_TYPES, SECP256K1_N, SECP256K1_N_DIV_2, SIGNED_MESSAGE_PREFIX,
};
use crate::{Network, PayraError};

/// Fields of an order signature request, as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub token_address: String,
    pub order_id: String,
    /// Amount in the token's smallest unit, as a decimal string.
    pub amount_wei: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub payer_address: String,
}

/// Caller-facing result of a signing request. Never carries a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    /// `"success"` or `"error"`.
    pub status: String,
    pub signature: Option<String>,
    pub message: Option<String>,
}

impl SignatureResponse {
    pub fn success(signature: String) -> Self {
        Self {
            status: "success".to_string(),
            signature: Some(signature),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            signature: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Signs orders with the per-network merchant key. Pure computation; no I/O.
#[derive(Debug, Clone)]
pub struct SignatureGenerator {
    config: Arc<PayraConfig>,
}

impl SignatureGenerator {
    pub fn new(config: Arc<PayraConfig>) -> Self {
        Self { config }
    }

    /// Sign `request` for `network` and return the 132-character hex signature.
    ///
    /// Missing credentials are reported as [`PayraError::MissingCredentials`];
    /// every other failure is a [`PayraError::SignatureError`].
    pub fn generate_signature(
        &self,
        network: &Network,
        request: &SignatureRequest,
    ) -> Result<String, PayraError> {
        let creds = self.config.signing_credentials(network)?;
        let digest = order_digest(creds.merchant_id, request).map_err(PayraError::signature)?;
        let signature = sign_digest(creds.signer, &digest)?;
        tracing::debug!(
            network = %network,
            order_id = %request.order_id,
            "generated order signature"
        );
        Ok(format!("0x{}", alloy::hex::encode(signature.as_bytes())))
    }

    /// Like [`generate_signature`](Self::generate_signature), but always
    /// returns an envelope.
    pub fn generate_signature_response(
        &self,
        network: &str,
        request: &SignatureRequest,
    ) -> SignatureResponse {
        let result = Network::new(network)
            .and_then(|network| self.generate_signature(&network, request));
        match result {
            Ok(signature) => SignatureResponse::success(signature),
            Err(e) => {
                tracing::warn!(network, error = %e, "signature request failed");
                SignatureResponse::error(e.to_string())
            }
        }
    }

    /// Recover the address that produced `signature_hex` over `request`.
    ///
    /// Rejects signatures that are not 65 bytes or carry a high `s`, as the
    /// contract does.
    pub fn recover_signer(
        &self,
        network: &Network,
        request: &SignatureRequest,
        signature_hex: &str,
    ) -> Result<Address, PayraError> {
        let creds = self.config.signing_credentials(network)?;
        let digest = order_digest(creds.merchant_id, request).map_err(PayraError::signature)?;
        recover_from_digest(&digest, signature_hex)
    }
}

/// ABI-encode the order tuple in the order the contract expects.
pub fn encode_order_message(
    merchant_id: U256,
    request: &SignatureRequest,
) -> Result<Vec<u8>, PayraError> {
    let types = AbiType::parse_list(ORDER_SIGNATURE_TYPES)?;
    let values = vec![
        AbiType::Address.coerce_str(&request.token_address)?,
        DynSolValue::Uint(merchant_id, 256),
        DynSolValue::String(request.order_id.clone()),
        AbiType::Uint256.coerce_str(&request.amount_wei)?,
        DynSolValue::Uint(U256::from(request.timestamp), 256),
        AbiType::Address.coerce_str(&request.payer_address)?,
    ];
    abi::encode(&types, &values)
}

/// `keccak256(prefix ++ keccak256(message))`, the hash that actually gets signed.
pub fn order_digest(merchant_id: U256, request: &SignatureRequest) -> Result<B256, PayraError> {
    let encoded = encode_order_message(merchant_id, request)?;
    Ok(prefixed_hash(keccak256(encoded)))
}

fn prefixed_hash(message_hash: B256) -> B256 {
    let mut buf = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    buf.extend_from_slice(message_hash.as_slice());
    keccak256(buf)
}

/// Sign a prehashed digest. The result always has `s <= N/2`.
fn sign_digest(signer: &PrivateKeySigner, digest: &B256) -> Result<Signature, PayraError> {
    let signature = signer
        .sign_hash_sync(digest)
        .map_err(PayraError::signature)?;
    Ok(normalize_s(signature))
}

/// Flip a high-`s` signature to its low-`s` twin, inverting the recovery parity.
fn normalize_s(signature: Signature) -> Signature {
    if signature.s() > SECP256K1_N_DIV_2 {
        Signature::new(signature.r(), SECP256K1_N - signature.s(), !signature.v())
    } else {
        signature
    }
}

fn recover_from_digest(digest: &B256, signature_hex: &str) -> Result<Address, PayraError> {
    let raw = alloy::hex::decode(signature_hex.trim().trim_start_matches("0x"))
        .map_err(PayraError::signature)?;
    if raw.len() != 65 {
        return Err(PayraError::signature(PayraError::AbiError(format!(
            "signature must be 65 bytes, got {}",
            raw.len()
        ))));
    }
    let signature = Signature::from_raw(&raw).map_err(PayraError::signature)?;
    if signature.s() > SECP256K1_N_DIV_2 {
        return Err(PayraError::signature(PayraError::AbiError(
            "high-s signature rejected".to_string(),
        )));
    }
    signature
        .recover_address_from_prehash(digest)
        .map_err(PayraError::signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn request() -> SignatureRequest {
        SignatureRequest {
            token_address: "0xc2132D05D31c914a87C6611C10748AEb04B58e8F".to_string(),
            order_id: "order_19_984723".to_string(),
            amount_wei: "13360000".to_string(),
            timestamp: 1728392929,
            payer_address: "0xc87a3D05D31c914a87C6611C10748AEb0a5e0020".to_string(),
        }
    }

    fn generator() -> SignatureGenerator {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_PRIVATE_KEY", KEY),
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
        ])
        .unwrap();
        SignatureGenerator::new(Arc::new(config))
    }

    fn polygon() -> Network {
        Network::new("polygon").unwrap()
    }

    #[test]
    fn test_order_message_layout() {
        let encoded = encode_order_message(U256::from(4u64), &request()).unwrap();
        // Six head words plus length word and one data word for the order id.
        assert_eq!(encoded.len(), 8 * 32);
        let hex = alloy::hex::encode(&encoded);
        assert_eq!(
            &hex[..64],
            "000000000000000000000000c2132d05d31c914a87c6611c10748aeb04b58e8f"
        );
        // Offset of the dynamic string is 6 * 32.
        assert_eq!(&hex[128..192], &format!("{:064x}", 0xc0));
        assert_eq!(&hex[192..256], &format!("{:064x}", 13_360_000u64));
        assert_eq!(&hex[384..448], &format!("{:064x}", 15));
        assert!(hex[448..].starts_with(&alloy::hex::encode("order_19_984723")));
    }

    #[test]
    fn test_message_and_digest_hashes() {
        let encoded = encode_order_message(U256::from(4u64), &request()).unwrap();
        let message_hash = keccak256(&encoded);
        assert_eq!(
            alloy::hex::encode(message_hash),
            "aafc2839052e62e26a030182684055dc02c2ef23d3962d042ea999426b67e835"
        );
        let digest = order_digest(U256::from(4u64), &request()).unwrap();
        assert_eq!(
            alloy::hex::encode(digest),
            "48c60e247970c8f93ed22798de115d390da439e00b7568d14e0d85400081c63b"
        );
        assert_eq!(digest, alloy::primitives::eip191_hash_message(message_hash));
    }

    #[test]
    fn test_signature_is_deterministic_and_recoverable() {
        let generator = generator();
        let a = generator.generate_signature(&polygon(), &request()).unwrap();
        let b = generator.generate_signature(&polygon(), &request()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 132);
        assert!(a.starts_with("0x"));
        let v = &a[130..];
        assert!(v == "1b" || v == "1c");

        let recovered = generator.recover_signer(&polygon(), &request(), &a).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_signature_changes_with_any_field() {
        let generator = generator();
        let base = generator.generate_signature(&polygon(), &request()).unwrap();

        let mut other = request();
        other.order_id = "order_19_984724".to_string();
        assert_ne!(generator.generate_signature(&polygon(), &other).unwrap(), base);

        let mut other = request();
        other.timestamp += 1;
        assert_ne!(generator.generate_signature(&polygon(), &other).unwrap(), base);
    }

    #[test]
    fn test_normalize_s_flips_high_s() {
        let r = U256::from(1u64);
        let high = SECP256K1_N_DIV_2 + U256::from(1u64);
        let sig = normalize_s(Signature::new(r, high, false));
        assert_eq!(sig.s(), SECP256K1_N - high);
        assert!(sig.v());

        let low = Signature::new(r, U256::from(5u64), true);
        assert_eq!(normalize_s(low), low);
    }

    #[test]
    fn test_recover_rejects_high_s_and_bad_length() {
        let generator = generator();
        let sig = generator.generate_signature(&polygon(), &request()).unwrap();
        let parsed = Signature::from_raw(&alloy::hex::decode(&sig[2..]).unwrap()).unwrap();
        let flipped = Signature::new(parsed.r(), SECP256K1_N - parsed.s(), !parsed.v());
        let flipped_hex = format!("0x{}", alloy::hex::encode(flipped.as_bytes()));

        let err = generator
            .recover_signer(&polygon(), &request(), &flipped_hex)
            .unwrap_err();
        assert!(matches!(err, PayraError::SignatureError { .. }));

        let err = generator
            .recover_signer(&polygon(), &request(), &sig[..128])
            .unwrap_err();
        assert!(err.to_string().contains("65 bytes"));
    }

    #[test]
    fn test_missing_credentials_not_wrapped() {
        let generator = SignatureGenerator::new(Arc::new(PayraConfig::default()));
        let err = generator.generate_signature(&polygon(), &request()).unwrap_err();
        assert!(matches!(err, PayraError::MissingCredentials(_)));
    }

    #[test]
    fn test_bad_inputs_are_signature_errors() {
        let generator = generator();

        let mut bad = request();
        bad.token_address = "0xc2132D05D31c914a87C6611C10748AEb04B58eF".to_string();
        let err = generator.generate_signature(&polygon(), &bad).unwrap_err();
        assert!(matches!(err, PayraError::SignatureError { .. }));

        let mut bad = request();
        bad.amount_wei = "-5".to_string();
        let err = generator.generate_signature(&polygon(), &bad).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_response_envelope() {
        let generator = generator();
        let ok = generator.generate_signature_response("Polygon", &request());
        assert!(ok.is_success());
        assert_eq!(ok.signature.as_ref().map(String::len), Some(132));
        assert!(ok.message.is_none());

        let err = generator.generate_signature_response("linea", &request());
        assert_eq!(err.status, "error");
        assert!(err.signature.is_none());
        assert!(err.message.unwrap().contains("LINEA"));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: SignatureRequest = serde_json::from_str(
            r#"{"tokenAddress":"0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
                "orderId":"order_19_984723","amountWei":"13360000",
                "timestamp":1728392929,
                "payerAddress":"0xc87a3D05D31c914a87C6611C10748AEb0a5e0020"}"#,
        )
        .unwrap();
        assert_eq!(req, request());
    }
}
