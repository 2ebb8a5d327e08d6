//! Per-network configuration, loaded once at startup.
//!
//! Keys follow `PAYRA_<NETWORK>_<FIELD>`:
//!
//! | key | meaning |
//! |-----|---------|
//! | `PAYRA_<N>_PRIVATE_KEY` | merchant signing key (hex) |
//! | `PAYRA_<N>_MERCHANT_ID` | merchant id registered with Payra |
//! | `PAYRA_<N>_CORE_FORWARD_CONTRACT_ADDRESS` | forwarder contract |
//! | `PAYRA_<N>_OCP_GATEWAY_CONTRACT_ADDRESS` | gateway / registry contract |
//! | `PAYRA_<N>_RPC_URL_<i>` | RPC endpoints, `i` = 1, 2, ... (first contiguous run) |
//! | `PAYRA_<N>_<SYMBOL>_DECIMALS` | token decimals override |
//!
//! Malformed values fail loading. Missing values are reported by the
//! operation that needs them, before it touches the network.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use url::Url;

use crate::abi::{parse_address, parse_uint};
use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RPC_TIMEOUT, DEFAULT_TOKEN_DECIMALS, ENV_ABI_PATH,
    ENV_PREFIX, KNOWN_TOKEN_DECIMALS,
};
use crate::{Network, PayraError};

const SUFFIX_PRIVATE_KEY: &str = "_PRIVATE_KEY";
const SUFFIX_MERCHANT_ID: &str = "_MERCHANT_ID";
const SUFFIX_FORWARD_ADDRESS: &str = "_CORE_FORWARD_CONTRACT_ADDRESS";
const SUFFIX_GATEWAY_ADDRESS: &str = "_OCP_GATEWAY_CONTRACT_ADDRESS";
const SUFFIX_DECIMALS: &str = "_DECIMALS";
const RPC_URL_MARKER: &str = "_RPC_URL_";

/// Everything configured for one network. Fields are optional because each
/// operation needs a different subset.
#[derive(Clone, Default)]
pub struct NetworkConfig {
    signer: Option<PrivateKeySigner>,
    pub merchant_id: Option<U256>,
    pub forward_address: Option<Address>,
    pub gateway_address: Option<Address>,
    pub rpc_urls: Vec<Url>,
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("private_key", &self.signer.as_ref().map(|_| "[REDACTED]"))
            .field("merchant_id", &self.merchant_id)
            .field("forward_address", &self.forward_address)
            .field("gateway_address", &self.gateway_address)
            .field("rpc_urls", &self.rpc_urls.len())
            .finish()
    }
}

impl NetworkConfig {
    /// Address derived from the merchant key, if one is configured.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }
}

/// Merchant id and key needed to sign an order.
#[derive(Clone, Copy)]
pub struct SigningCredentials<'a> {
    pub merchant_id: U256,
    pub signer: &'a PrivateKeySigner,
}

impl std::fmt::Debug for SigningCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("merchant_id", &self.merchant_id)
            .field("signer", &self.signer.address())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Everything a forwarded read needs.
#[derive(Debug, Clone, Copy)]
pub struct QueryTarget<'a> {
    pub merchant_id: U256,
    pub forward_address: Address,
    pub rpc_urls: &'a [Url],
}

/// Process-wide configuration. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PayraConfig {
    networks: HashMap<Network, NetworkConfig>,
    token_decimals: HashMap<String, u8>,
    /// How long a read waits for its RPC callback.
    pub rpc_timeout: Duration,
    /// TCP connect timeout for the HTTP transport.
    pub connect_timeout: Duration,
    /// Alternative ABI document; `None` uses the embedded one.
    pub abi_path: Option<PathBuf>,
}

impl Default for PayraConfig {
    fn default() -> Self {
        Self {
            networks: HashMap::new(),
            token_decimals: HashMap::new(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            abi_path: None,
        }
    }
}

impl PayraConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, PayraError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from `(key, value)` pairs. Keys without the `PAYRA_` prefix are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, PayraError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        let mut rpc_urls: HashMap<Network, BTreeMap<u32, Url>> = HashMap::new();
        let prefix = format!("{ENV_PREFIX}_");

        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            if key == ENV_ABI_PATH {
                config.abi_path = Some(PathBuf::from(value));
                continue;
            }
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };

            if let Some(net) = rest.strip_suffix(SUFFIX_PRIVATE_KEY) {
                let signer = PrivateKeySigner::from_str(value)
                    .map_err(|_| PayraError::ConfigError(format!("{key}: invalid private key")))?;
                config.entry(net, key)?.signer = Some(signer);
            } else if let Some(net) = rest.strip_suffix(SUFFIX_MERCHANT_ID) {
                let id = parse_uint(value)
                    .map_err(|e| PayraError::ConfigError(format!("{key}: {e}")))?;
                config.entry(net, key)?.merchant_id = Some(id);
            } else if let Some(net) = rest.strip_suffix(SUFFIX_FORWARD_ADDRESS) {
                let addr = parse_address(value)
                    .map_err(|e| PayraError::ConfigError(format!("{key}: {e}")))?;
                config.entry(net, key)?.forward_address = Some(addr);
            } else if let Some(net) = rest.strip_suffix(SUFFIX_GATEWAY_ADDRESS) {
                let addr = parse_address(value)
                    .map_err(|e| PayraError::ConfigError(format!("{key}: {e}")))?;
                config.entry(net, key)?.gateway_address = Some(addr);
            } else if let Some((net, index)) = split_rpc_url_key(rest) {
                let url = Url::parse(value)
                    .map_err(|e| PayraError::ConfigError(format!("{key}: invalid URL: {e}")))?;
                let network = network_from_key(net, key)?;
                config.networks.entry(network.clone()).or_default();
                rpc_urls.entry(network).or_default().insert(index, url);
            } else if let Some(token) = rest.strip_suffix(SUFFIX_DECIMALS) {
                let decimals: u8 = value.parse().map_err(|_| {
                    PayraError::ConfigError(format!("{key}: invalid decimals {value}"))
                })?;
                config.token_decimals.insert(token.to_string(), decimals);
            }
        }

        for (network, mut indexed) in rpc_urls {
            let mut urls = Vec::new();
            let mut next = 1u32;
            while let Some(url) = indexed.remove(&next) {
                urls.push(url);
                next += 1;
            }
            if !indexed.is_empty() {
                tracing::warn!(
                    network = %network,
                    ignored = indexed.len(),
                    "RPC URLs after a gap in numbering are ignored"
                );
            }
            if let Some(entry) = config.networks.get_mut(&network) {
                entry.rpc_urls = urls;
            }
        }

        tracing::info!(
            networks = config.networks.len(),
            token_overrides = config.token_decimals.len(),
            "loaded Payra configuration"
        );
        Ok(config)
    }

    fn entry(&mut self, net: &str, key: &str) -> Result<&mut NetworkConfig, PayraError> {
        let network = network_from_key(net, key)?;
        Ok(self.networks.entry(network).or_default())
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn network(&self, network: &Network) -> Option<&NetworkConfig> {
        self.networks.get(network)
    }

    /// Configured networks, sorted by name.
    pub fn networks(&self) -> Vec<&Network> {
        let mut names: Vec<_> = self.networks.keys().collect();
        names.sort();
        names
    }

    /// Merchant id and private key for `network`.
    pub fn signing_credentials(
        &self,
        network: &Network,
    ) -> Result<SigningCredentials<'_>, PayraError> {
        let missing = || PayraError::MissingCredentials(network.key().to_string());
        let entry = self.networks.get(network).ok_or_else(missing)?;
        match (entry.merchant_id, entry.signer.as_ref()) {
            (Some(merchant_id), Some(signer)) => Ok(SigningCredentials {
                merchant_id,
                signer,
            }),
            _ => Err(missing()),
        }
    }

    /// Merchant id, forwarder address and RPC endpoints for `network`.
    pub fn query_target(&self, network: &Network) -> Result<QueryTarget<'_>, PayraError> {
        let entry = self.networks.get(network).ok_or_else(|| {
            PayraError::ConfigError(format!("no configuration for network: {}", network.key()))
        })?;
        if entry.rpc_urls.is_empty() {
            return Err(PayraError::ConfigError(format!(
                "no RPC URLs found for network: {}",
                network.key()
            )));
        }
        match (entry.merchant_id, entry.forward_address) {
            (Some(merchant_id), Some(forward_address)) => Ok(QueryTarget {
                merchant_id,
                forward_address,
                rpc_urls: &entry.rpc_urls,
            }),
            _ => Err(PayraError::ConfigError(format!(
                "missing merchant ID or forward contract address for network: {}",
                network.key()
            ))),
        }
    }

    /// Decimals for `symbol` on `network`: configured override, then the
    /// built-in table, then 18.
    pub fn token_decimals(&self, network: &Network, symbol: &str) -> u8 {
        let key = format!("{}_{}", network.key(), symbol.trim().to_ascii_uppercase());
        if let Some(decimals) = self.token_decimals.get(&key) {
            return *decimals;
        }
        KNOWN_TOKEN_DECIMALS
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, decimals)| *decimals)
            .unwrap_or(DEFAULT_TOKEN_DECIMALS)
    }
}

fn network_from_key(net: &str, key: &str) -> Result<Network, PayraError> {
    Network::new(net).map_err(|_| PayraError::ConfigError(format!("{key}: missing network name")))
}

/// `POLYGON_RPC_URL_2` -> `("POLYGON", 2)`.
fn split_rpc_url_key(rest: &str) -> Option<(&str, u32)> {
    let pos = rest.rfind(RPC_URL_MARKER)?;
    let index = &rest[pos + RPC_URL_MARKER.len()..];
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((&rest[..pos], index.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn polygon() -> Network {
        Network::new("polygon").unwrap()
    }

    #[test]
    fn test_full_network_config() {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_PRIVATE_KEY", KEY),
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
            (
                "PAYRA_POLYGON_CORE_FORWARD_CONTRACT_ADDRESS",
                "0x1111111111111111111111111111111111111111",
            ),
            (
                "PAYRA_POLYGON_OCP_GATEWAY_CONTRACT_ADDRESS",
                "0x2222222222222222222222222222222222222222",
            ),
            ("PAYRA_POLYGON_RPC_URL_1", "https://rpc-1.example"),
            ("PAYRA_POLYGON_RPC_URL_2", "https://rpc-2.example"),
            ("UNRELATED", "x"),
        ])
        .unwrap();

        let target = config.query_target(&polygon()).unwrap();
        assert_eq!(target.merchant_id, U256::from(4u64));
        assert_eq!(target.rpc_urls.len(), 2);
        assert_eq!(target.rpc_urls[0].as_str(), "https://rpc-1.example/");

        let creds = config.signing_credentials(&polygon()).unwrap();
        assert_eq!(
            creds.signer.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        let net = config.network(&polygon()).unwrap();
        assert!(net.gateway_address.is_some());
        assert_eq!(
            net.signer_address(),
            Some(creds.signer.address())
        );
    }

    #[test]
    fn test_rpc_urls_stop_at_first_gap() {
        let config = PayraConfig::from_vars([
            ("PAYRA_LINEA_MERCHANT_ID", "1"),
            (
                "PAYRA_LINEA_CORE_FORWARD_CONTRACT_ADDRESS",
                "0x1111111111111111111111111111111111111111",
            ),
            ("PAYRA_LINEA_RPC_URL_1", "https://a.example"),
            ("PAYRA_LINEA_RPC_URL_3", "https://c.example"),
        ])
        .unwrap();
        let target = config.query_target(&Network::new("linea").unwrap()).unwrap();
        assert_eq!(target.rpc_urls.len(), 1);
    }

    #[test]
    fn test_missing_rpc_urls_is_config_error() {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
            (
                "PAYRA_POLYGON_CORE_FORWARD_CONTRACT_ADDRESS",
                "0x1111111111111111111111111111111111111111",
            ),
            ("PAYRA_POLYGON_RPC_URL_2", "https://rpc-2.example"),
        ])
        .unwrap();
        let err = config.query_target(&polygon()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no RPC URLs"));
    }

    #[test]
    fn test_missing_forward_address() {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
            ("PAYRA_POLYGON_RPC_URL_1", "https://rpc-1.example"),
        ])
        .unwrap();
        let err = config.query_target(&polygon()).unwrap_err();
        assert!(matches!(err, PayraError::ConfigError(_)));
    }

    #[test]
    fn test_missing_credentials() {
        let config = PayraConfig::from_vars([("PAYRA_POLYGON_MERCHANT_ID", "4")]).unwrap();
        let err = config.signing_credentials(&polygon()).unwrap_err();
        assert!(matches!(err, PayraError::MissingCredentials(ref n) if n == "POLYGON"));

        let err = config
            .signing_credentials(&Network::new("base").unwrap())
            .unwrap_err();
        assert!(matches!(err, PayraError::MissingCredentials(_)));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_PRIVATE_KEY", "  "),
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
        ])
        .unwrap();
        assert!(config.signing_credentials(&polygon()).is_err());
    }

    #[test]
    fn test_malformed_values_fail_loading() {
        let bad_key = PayraConfig::from_vars([("PAYRA_POLYGON_PRIVATE_KEY", "0xnothex")]);
        let err = bad_key.unwrap_err();
        assert!(err.is_configuration());
        assert!(!err.to_string().contains("nothex"));

        assert!(PayraConfig::from_vars([("PAYRA_POLYGON_MERCHANT_ID", "-4")]).is_err());
        assert!(PayraConfig::from_vars([(
            "PAYRA_POLYGON_CORE_FORWARD_CONTRACT_ADDRESS",
            "0x1234"
        )])
        .is_err());
        assert!(PayraConfig::from_vars([("PAYRA_POLYGON_RPC_URL_1", "not a url")]).is_err());
        assert!(PayraConfig::from_vars([("PAYRA_POLYGON_USDT_DECIMALS", "many")]).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = PayraConfig::from_vars([("PAYRA_POLYGON_PRIVATE_KEY", KEY)]).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }

    #[test]
    fn test_signing_credentials_debug_redacts_key() {
        let config = PayraConfig::from_vars([
            ("PAYRA_POLYGON_PRIVATE_KEY", KEY),
            ("PAYRA_POLYGON_MERCHANT_ID", "4"),
        ])
        .unwrap();
        let creds = config.signing_credentials(&polygon()).unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!debug.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }

    #[test]
    fn test_token_decimals() {
        let config = PayraConfig::from_vars([("PAYRA_POLYGON_DAI_DECIMALS", "18"), ("PAYRA_LINEA_USDT_DECIMALS", "6")]).unwrap();
        assert_eq!(config.token_decimals(&polygon(), "usdt"), 6);
        assert_eq!(config.token_decimals(&polygon(), "USDC"), 6);
        assert_eq!(config.token_decimals(&polygon(), "dai"), 18);
        assert_eq!(config.token_decimals(&polygon(), "WETH"), 18);
        assert_eq!(
            config.token_decimals(&Network::new("linea").unwrap(), "usdt"),
            6
        );
        assert_eq!(
            config.token_decimals(&Network::new("ethereum").unwrap(), "usdt"),
            18
        );
    }

    #[test]
    fn test_abi_path_and_timeouts() {
        let config = PayraConfig::from_vars([("PAYRA_ABI_PATH", "/etc/payra/abi.json")])
            .unwrap()
            .with_rpc_timeout(Duration::from_millis(250));
        assert_eq!(config.abi_path, Some(PathBuf::from("/etc/payra/abi.json")));
        assert_eq!(config.rpc_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_split_rpc_url_key() {
        assert_eq!(split_rpc_url_key("POLYGON_RPC_URL_12"), Some(("POLYGON", 12)));
        assert_eq!(
            split_rpc_url_key("POLYGON_AMOY_RPC_URL_1"),
            Some(("POLYGON_AMOY", 1))
        );
        assert_eq!(split_rpc_url_key("POLYGON_RPC_URL_"), None);
        assert_eq!(split_rpc_url_key("POLYGON_RPC_URL_X"), None);
    }
}
