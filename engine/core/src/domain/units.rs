// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Monetary units and the string encoding used for large integers.
//!
//! All amounts, gas prices and nonces are `U256` internally. At every
//! serialization boundary they are written as decimal strings so that
//! JSON consumers never lose precision.

use alloy_primitives::U256;

/// One gwei expressed in wei.
pub const GWEI: u64 = 1_000_000_000;

/// Convert a whole number of gwei into wei.
pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(GWEI)
}

/// Serialize a `U256` as a decimal string.
///
/// Deserialization accepts decimal strings and `0x`-prefixed hex strings.
pub mod u256_string {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str(s.trim()).map_err(|e| serde::de::Error::custom(format!("invalid integer '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "u256_string")]
        value: U256,
    }

    #[test]
    fn test_gwei_conversion() {
        assert_eq!(gwei(50), U256::from(50_000_000_000u64));
    }

    #[test]
    fn test_large_values_survive_json() {
        let value = U256::MAX - U256::from(7u8);
        let json = serde_json::to_string(&Wrapper { value }).unwrap();
        assert!(json.contains(&value.to_string()));

        let parsed: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value, value);
    }

    #[test]
    fn test_hex_input_accepted() {
        let parsed: Wrapper = serde_json::from_str(r#"{"value":"0xff"}"#).unwrap();
        assert_eq!(parsed.value, U256::from(255u32));
    }
}
