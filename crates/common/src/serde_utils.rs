//! Serde helpers for the hex conventions of test fixtures and trace output:
//! quantities accept both `0x`-prefixed hex and decimal strings (and bare
//! JSON numbers), byte strings are `0x`-prefixed hex.

use serde::{de::Error, Deserialize, Deserializer, Serializer};

pub mod u256 {
    use super::*;
    use ethereum_types::U256;

    pub fn deser_hex_or_dec_str<'de, D>(d: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Quantity {
            Number(u64),
            String(String),
        }

        match Quantity::deserialize(d)? {
            Quantity::Number(value) => Ok(U256::from(value)),
            Quantity::String(s) => parse(&s).map_err(D::Error::custom),
        }
    }

    pub fn serialize_hex_str<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn serialize_dec_str<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub(crate) fn parse(s: &str) -> Result<U256, String> {
        if let Some(hex) = s.strip_prefix("0x") {
            U256::from_str_radix(hex, 16).map_err(|e| format!("invalid hex quantity: {e}"))
        } else {
            U256::from_dec_str(s).map_err(|e| format!("invalid decimal quantity: {e}"))
        }
    }
}

pub mod u64 {
    use super::*;

    pub fn deser_hex_or_dec_str<'de, D>(d: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = super::u256::deser_hex_or_dec_str(d)?;
        if value.bits() > 64 {
            return Err(D::Error::custom("quantity does not fit in 64 bits"));
        }
        Ok(value.low_u64())
    }

    pub fn serialize_hex_str<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{value:#x}"))
    }
}

pub mod bytes {
    use super::*;
    use ::bytes::Bytes;

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        let hex_str = value.strip_prefix("0x").unwrap_or(&value);
        hex::decode(hex_str)
            .map(Bytes::from)
            .map_err(|e| D::Error::custom(format!("invalid hex bytes: {e}")))
    }

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }
}

pub mod storage {
    use super::*;
    use crate::utils::u256_to_h256;
    use ethereum_types::{H256, U256};
    use std::collections::BTreeMap;

    /// Storage keys and values come in every width fixtures use: short hex,
    /// full 32-byte hex, or decimal. Normalize through U256.
    pub fn deserialize<'de, D>(d: D) -> Result<BTreeMap<H256, U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(d)?;
        raw.into_iter()
            .map(|(k, v)| {
                let key = super::u256::parse(&k).map_err(D::Error::custom)?;
                let value = super::u256::parse(&v).map_err(D::Error::custom)?;
                Ok((u256_to_h256(key), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::U256;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Quantities {
        #[serde(deserialize_with = "u256::deser_hex_or_dec_str")]
        a: U256,
        #[serde(deserialize_with = "u64::deser_hex_or_dec_str")]
        b: u64,
    }

    #[test]
    fn hex_and_decimal_quantities() {
        let parsed: Quantities =
            serde_json::from_str(r#"{"a": "0x100", "b": "42"}"#).unwrap();
        assert_eq!(parsed.a, U256::from(256));
        assert_eq!(parsed.b, 42);

        let parsed: Quantities = serde_json::from_str(r#"{"a": 7, "b": "0x2a"}"#).unwrap();
        assert_eq!(parsed.a, U256::from(7));
        assert_eq!(parsed.b, 42);
    }

    #[test]
    fn u64_overflow_is_rejected() {
        let result: Result<Quantities, _> =
            serde_json::from_str(r#"{"a": "0x0", "b": "0x10000000000000000"}"#);
        assert!(result.is_err());
    }
}
