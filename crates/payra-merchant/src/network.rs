//! Logical network identifiers.
//!
//! A [`Network`] is the case-insensitive name a caller passes in (`"polygon"`,
//! `"Linea"`, ...). It is stored uppercased, which is also the form used in
//! configuration keys (`PAYRA_POLYGON_MERCHANT_ID`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PayraError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network(String);

impl Network {
    /// Normalize a network name. Fails on empty names or characters that
    /// cannot appear in an environment key.
    pub fn new(name: &str) -> Result<Self, PayraError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PayraError::ConfigError("network name is empty".to_string()));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(PayraError::ConfigError(format!(
                "invalid network name: {trimmed}"
            )));
        }
        Ok(Self(trimmed.replace('-', "_").to_ascii_uppercase()))
    }

    /// Uppercased key fragment, e.g. `POLYGON`.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Build a configuration key `PAYRA_<NETWORK>_<suffix>`.
    pub fn env_key(&self, suffix: &str) -> String {
        format!("{}_{}_{}", crate::constants::ENV_PREFIX, self.0, suffix)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_ascii_lowercase())
    }
}

impl FromStr for Network {
    type Err = PayraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Network::new(&raw).map_err(serde::de::Error::custom)
    }
}
