//! Solidity ABI codec adapter.
//!
//! Wraps `alloy`'s dynamic ABI encoder behind a closed set of parameter types
//! ([`AbiType`]) so that every value is checked against its declared type
//! before any bytes are produced.
//!
//! - [`encode`] / [`decode`]: parameter tuples to and from ABI bytes
//! - [`selector`]: 4-byte function selector of a canonical signature
//! - [`AbiType::coerce_str`] / [`AbiType::coerce_json`]: caller input to typed values

use std::fmt;
use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Address, U256};

use crate::PayraError;

/// Parameter types understood by the Payra contracts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    Address,
    Uint256,
    String,
    Bool,
    Bytes,
    Tuple(Vec<AbiType>),
}

impl AbiType {
    /// Canonical type name as used in function signatures (`uint256`, `(bool,address)`).
    pub fn canonical(&self) -> String {
        match self {
            AbiType::Address => "address".to_string(),
            AbiType::Uint256 => "uint256".to_string(),
            AbiType::String => "string".to_string(),
            AbiType::Bool => "bool".to_string(),
            AbiType::Bytes => "bytes".to_string(),
            AbiType::Tuple(items) => format!("({})", canonical_list(items)),
        }
    }

    /// Parse a comma-separated parameter list such as `(address,uint256,string)`.
    pub fn parse_list(list: &str) -> Result<Vec<AbiType>, PayraError> {
        match list.parse::<AbiType>()? {
            AbiType::Tuple(items) => Ok(items),
            single => Ok(vec![single]),
        }
    }

    fn to_sol_type(&self) -> DynSolType {
        match self {
            AbiType::Address => DynSolType::Address,
            AbiType::Uint256 => DynSolType::Uint(256),
            AbiType::String => DynSolType::String,
            AbiType::Bool => DynSolType::Bool,
            AbiType::Bytes => DynSolType::Bytes,
            AbiType::Tuple(items) => {
                DynSolType::Tuple(items.iter().map(AbiType::to_sol_type).collect())
            }
        }
    }

    /// Whether `value` can be encoded as this type without conversion.
    pub fn matches(&self, value: &DynSolValue) -> bool {
        self.to_sol_type().matches(value)
    }

    /// Convert a caller-supplied string into a value of this type.
    ///
    /// Addresses must be `0x` + 40 hex digits (checksum casing is not
    /// enforced). Integers are decimal or `0x` hex and must be non-negative.
    pub fn coerce_str(&self, raw: &str) -> Result<DynSolValue, PayraError> {
        let raw = raw.trim();
        match self {
            AbiType::Address => parse_address(raw).map(DynSolValue::Address),
            AbiType::Uint256 => parse_uint(raw).map(|v| DynSolValue::Uint(v, 256)),
            AbiType::String => Ok(DynSolValue::String(raw.to_string())),
            AbiType::Bool => match raw {
                "true" | "1" => Ok(DynSolValue::Bool(true)),
                "false" | "0" => Ok(DynSolValue::Bool(false)),
                other => Err(PayraError::AbiError(format!("invalid bool: {other}"))),
            },
            AbiType::Bytes => alloy::hex::decode(raw)
                .map(DynSolValue::Bytes)
                .map_err(|e| PayraError::AbiError(format!("invalid hex bytes {raw}: {e}"))),
            AbiType::Tuple(_) => Err(PayraError::AbiError(format!(
                "cannot read tuple {} from a plain string",
                self.canonical()
            ))),
        }
    }

    /// Convert a JSON argument into a value of this type. Tuples are JSON arrays.
    pub fn coerce_json(&self, raw: &serde_json::Value) -> Result<DynSolValue, PayraError> {
        use serde_json::Value;

        match (self, raw) {
            (AbiType::Tuple(items), Value::Array(values)) => {
                if items.len() != values.len() {
                    return Err(PayraError::AbiError(format!(
                        "tuple {} expects {} values, got {}",
                        self.canonical(),
                        items.len(),
                        values.len()
                    )));
                }
                items
                    .iter()
                    .zip(values)
                    .map(|(ty, v)| ty.coerce_json(v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(DynSolValue::Tuple)
            }
            (AbiType::Bool, Value::Bool(b)) => Ok(DynSolValue::Bool(*b)),
            (AbiType::Uint256, Value::Number(n)) => match n.as_u64() {
                Some(v) => Ok(DynSolValue::Uint(U256::from(v), 256)),
                None => Err(PayraError::AbiError(format!(
                    "{n} cannot be represented as uint256 (pass large values as strings)"
                ))),
            },
            (_, Value::String(s)) => self.coerce_str(s),
            (ty, other) => Err(PayraError::AbiError(format!(
                "cannot read {} from JSON {other}",
                ty.canonical()
            ))),
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for AbiType {
    type Err = PayraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sol = DynSolType::parse(s.trim())
            .map_err(|e| PayraError::AbiError(format!("invalid type {s}: {e}")))?;
        AbiType::try_from(&sol)
    }
}

impl TryFrom<&DynSolType> for AbiType {
    type Error = PayraError;

    fn try_from(ty: &DynSolType) -> Result<Self, Self::Error> {
        match ty {
            DynSolType::Address => Ok(AbiType::Address),
            DynSolType::Uint(256) => Ok(AbiType::Uint256),
            DynSolType::String => Ok(AbiType::String),
            DynSolType::Bool => Ok(AbiType::Bool),
            DynSolType::Bytes => Ok(AbiType::Bytes),
            DynSolType::Tuple(items) => items
                .iter()
                .map(AbiType::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(AbiType::Tuple),
            other => Err(PayraError::AbiError(format!(
                "unsupported ABI type: {}",
                other.sol_type_name()
            ))),
        }
    }
}

/// Join canonical type names with commas and no spaces.
pub fn canonical_list(types: &[AbiType]) -> String {
    types
        .iter()
        .map(AbiType::canonical)
        .collect::<Vec<_>>()
        .join(",")
}

/// First 4 bytes of `keccak256(signature)`, e.g. `transfer(address,uint256)` -> `a9059cbb`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// ABI-encode `values` as a parameter tuple of `types`.
pub fn encode(types: &[AbiType], values: &[DynSolValue]) -> Result<Vec<u8>, PayraError> {
    if types.len() != values.len() {
        return Err(PayraError::AbiError(format!(
            "expected {} values for ({}), got {}",
            types.len(),
            canonical_list(types),
            values.len()
        )));
    }
    for (index, (ty, value)) in types.iter().zip(values).enumerate() {
        if !ty.matches(value) {
            return Err(PayraError::AbiError(format!(
                "value #{index} does not match {ty}: {value:?}"
            )));
        }
    }
    Ok(DynSolValue::Tuple(values.to_vec()).abi_encode_params())
}

/// Decode ABI bytes produced for a parameter tuple of `types`.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<DynSolValue>, PayraError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let tuple = DynSolType::Tuple(types.iter().map(AbiType::to_sol_type).collect());
    let decoded = tuple.abi_decode_params(data).map_err(|e| {
        PayraError::AbiError(format!("failed to decode ({}): {e}", canonical_list(types)))
    })?;
    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

/// Parse `0x` + 40 hex digits into an [`Address`], ignoring checksum casing.
pub fn parse_address(raw: &str) -> Result<Address, PayraError> {
    let hex = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| PayraError::AbiError(format!("address must start with 0x: {raw}")))?;
    if hex.len() != 40 {
        return Err(PayraError::AbiError(format!(
            "address must be 20 bytes (40 hex digits), got {} digits: {raw}",
            hex.len()
        )));
    }
    Address::from_str(&hex.to_ascii_lowercase())
        .map_err(|e| PayraError::AbiError(format!("invalid address {raw}: {e}")))
}

/// Parse a non-negative decimal or `0x` hex integer.
pub fn parse_uint(raw: &str) -> Result<U256, PayraError> {
    if raw.starts_with('-') {
        return Err(PayraError::AbiError(format!(
            "negative value {raw} cannot be encoded as uint256"
        )));
    }
    if raw.is_empty() {
        return Err(PayraError::AbiError("empty uint256 value".to_string()));
    }
    U256::from_str(raw).map_err(|e| PayraError::AbiError(format!("invalid uint256 {raw}: {e}")))
}
