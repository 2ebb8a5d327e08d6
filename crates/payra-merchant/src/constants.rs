use std::time::Duration;

use alloy::primitives::U256;

/// Prefix shared by every configuration key (`PAYRA_<NETWORK>_...`).
pub const ENV_PREFIX: &str = "PAYRA";

/// Environment variable pointing at an alternative ABI document.
pub const ENV_ABI_PATH: &str = "PAYRA_ABI_PATH";

/// How long a forwarded read waits for its RPC callback.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connect timeout for the HTTP transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Entry point on the forwarder contract that relays to the core contract.
pub const FORWARD_FUNCTION: &str = "forward";

/// Core function returning `(paid, token, amount, fee, timestamp)` for an order.
pub const ORDER_STATUS_FUNCTION: &str = "getOrderStatus";

/// Core function returning only the paid flag for an order.
pub const IS_ORDER_PAID_FUNCTION: &str = "isOrderPaid";

/// Personal-sign prefix for a 32-byte message hash.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Parameter list the Payra contract re-encodes when verifying an order signature.
/// Order and types must not change.
pub const ORDER_SIGNATURE_TYPES: &str = "(address,uint256,string,uint256,uint256,address)";

/// Default decimals for tokens without an explicit override.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Built-in per-network token decimals, keyed `<NETWORK>_<SYMBOL>`.
pub const KNOWN_TOKEN_DECIMALS: &[(&str, u8)] = &[("POLYGON_USDT", 6), ("POLYGON_USDC", 6)];

/// ABI document shipped with the crate.
pub const DEFAULT_ABI_JSON: &str = include_str!("../abi/payra.json");

/// secp256k1 curve order N.
pub const SECP256K1_N: U256 = U256::from_limbs([
    0xBFD25E8CD0364141,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
]);

/// secp256k1 curve order N / 2. Signatures with s above this are malleable (EIP-2).
pub const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
]);
