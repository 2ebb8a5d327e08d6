//! Typed view of the static contract-interface document.
//!
//! The JSON ABI is parsed once, every function entry is converted to a
//! [`FunctionAbi`] with typed inputs and outputs, and lookups afterwards are
//! plain map reads. Unsupported types make loading fail instead of surfacing
//! on the first call that touches them.

use std::collections::HashMap;
use std::path::Path;

use alloy::dyn_abi::DynSolValue;
use serde::Deserialize;

use crate::abi::{self, canonical_list, AbiType};
use crate::constants::DEFAULT_ABI_JSON;
use crate::PayraError;

/// One parameter as it appears in a JSON ABI entry.
#[derive(Debug, Clone, Deserialize)]
struct RawParam {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<RawParam>,
}

/// One entry of a JSON ABI array. Only `function` entries are kept.
#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
}

fn default_entry_type() -> String {
    "function".to_string()
}

impl RawParam {
    fn to_abi_type(&self) -> Result<AbiType, PayraError> {
        match self.ty.as_str() {
            "tuple" => self
                .components
                .iter()
                .map(RawParam::to_abi_type)
                .collect::<Result<Vec<_>, _>>()
                .map(AbiType::Tuple),
            other => other.parse(),
        }
    }
}

/// A contract function with typed inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAbi {
    pub name: String,
    pub inputs: Vec<AbiType>,
    pub outputs: Vec<AbiType>,
}

impl FunctionAbi {
    pub fn new(name: impl Into<String>, inputs: Vec<AbiType>, outputs: Vec<AbiType>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
        }
    }

    /// Canonical signature, e.g. `getOrderStatus(uint256,string)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, canonical_list(&self.inputs))
    }

    pub fn selector(&self) -> [u8; 4] {
        abi::selector(&self.signature())
    }

    /// Selector followed by the ABI-encoded arguments, in declared input order.
    pub fn encode_call(&self, args: &[DynSolValue]) -> Result<Vec<u8>, PayraError> {
        let encoded = abi::encode(&self.inputs, args)
            .map_err(|e| PayraError::AbiError(format!("{}: {e}", self.signature())))?;
        let mut calldata = Vec::with_capacity(4 + encoded.len());
        calldata.extend_from_slice(&self.selector());
        calldata.extend_from_slice(&encoded);
        Ok(calldata)
    }

    /// Decode return data against the declared outputs.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, PayraError> {
        abi::decode(&self.outputs, data)
            .map_err(|e| PayraError::AbiError(format!("{} output: {e}", self.name)))
    }
}

/// Function descriptors indexed by name, immutable after loading.
#[derive(Debug, Clone, Default)]
pub struct AbiRegistry {
    functions: HashMap<String, FunctionAbi>,
}

impl AbiRegistry {
    /// Parse a JSON ABI document. Overloads keep the first declaration.
    pub fn from_json(json: &str) -> Result<Self, PayraError> {
        let entries: Vec<RawEntry> = serde_json::from_str(json)?;
        let mut functions = HashMap::new();

        for entry in entries.into_iter().filter(|e| e.kind == "function") {
            let Some(name) = entry.name.filter(|n| !n.is_empty()) else {
                return Err(PayraError::AbiError(
                    "function entry without a name".to_string(),
                ));
            };
            let inputs = entry
                .inputs
                .iter()
                .map(RawParam::to_abi_type)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| PayraError::AbiError(format!("{name} inputs: {e}")))?;
            let outputs = entry
                .outputs
                .iter()
                .map(RawParam::to_abi_type)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| PayraError::AbiError(format!("{name} outputs: {e}")))?;

            if functions.contains_key(&name) {
                tracing::debug!(function = %name, "ignoring overloaded ABI entry");
                continue;
            }
            functions.insert(name.clone(), FunctionAbi::new(name, inputs, outputs));
        }

        tracing::debug!(functions = functions.len(), "loaded ABI document");
        Ok(Self { functions })
    }

    /// Read and parse an ABI document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PayraError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PayraError::ConfigError(format!("cannot read ABI file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The ABI document embedded in the crate.
    pub fn embedded() -> Result<Self, PayraError> {
        Self::from_json(DEFAULT_ABI_JSON)
    }

    pub fn function(&self, name: &str) -> Result<&FunctionAbi, PayraError> {
        self.functions
            .get(name)
            .ok_or_else(|| PayraError::FunctionNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
