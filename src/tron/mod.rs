//! Tron primitives shared by the wallet flows and the full-node adapter.

use crate::error::{Error, Result};
use ruint::aliases::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod grid;

pub use grid::TronGridProvider;

/// First byte of every mainnet/testnet Tron address payload.
const ADDRESS_PREFIX: u8 = 0x41;

pub const TRC20_APPROVE: &str = "approve(address,uint256)";
pub const TRC20_ALLOWANCE: &str = "allowance(address,address)";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TronAddress {
    base58: String,
    bytes: [u8; 21],
}

impl TronAddress {
    pub fn base58(&self) -> &str {
        &self.base58
    }

    /// `41`-prefixed hex form used by the node API.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The 20-byte account id, as it appears inside ABI words.
    pub fn account_bytes(&self) -> &[u8] {
        &self.bytes[1..]
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let raw = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| Error::InvalidAddress(format!("'{}': {}", value, e)))?;
        let bytes: [u8; 21] = raw
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("'{}' is not 21 bytes", value)))?;
        if bytes[0] != ADDRESS_PREFIX {
            return Err(Error::InvalidAddress(format!("'{}' lacks the 0x41 prefix", value)));
        }
        let base58 = bs58::encode(bytes).with_check().into_string();
        Ok(Self { base58, bytes })
    }
}

impl FromStr for TronAddress {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let raw = bs58::decode(value)
            .with_check(None)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("'{}': {}", value, e)))?;
        let bytes: [u8; 21] = raw
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("'{}' has the wrong length", value)))?;
        if bytes[0] != ADDRESS_PREFIX {
            return Err(Error::InvalidAddress(format!("'{}' is not a Tron address", value)));
        }
        Ok(Self {
            base58: value.to_string(),
            bytes,
        })
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base58)
    }
}

impl fmt::Debug for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TronAddress({})", self.base58)
    }
}

impl Serialize for TronAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.base58)
    }
}

impl<'de> Deserialize<'de> for TronAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(TronAddress),
    Uint256(U256),
}

impl AbiValue {
    fn word(&self) -> [u8; 32] {
        match self {
            AbiValue::Address(address) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.account_bytes());
                word
            }
            AbiValue::Uint256(value) => value.to_be_bytes::<32>(),
        }
    }
}

/// Head-only ABI encoding; every supported type is static.
pub fn encode_parameters(values: &[AbiValue]) -> String {
    values.iter().map(|value| hex::encode(value.word())).collect()
}

/// Reads the first 32-byte word of a constant call result as an unsigned integer.
pub fn decode_uint256(constant_result: &str) -> Result<U256> {
    let trimmed = constant_result.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    let word = trimmed.get(..64).unwrap_or(trimmed);
    U256::from_str_radix(word, 16)
        .map_err(|e| Error::ParseError(format!("constant result '{}': {}", constant_result, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const OWNER: &str = "TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV";

    #[test]
    fn test_base58_to_hex() {
        let address: TronAddress = USDT.parse().unwrap();
        assert_eq!(address.to_hex(), "41a614f803b6fd780986a42c78ec9c7f77e6ded13c");
        assert_eq!(address.base58(), USDT);
    }

    #[test]
    fn test_hex_to_base58() {
        let address = TronAddress::from_hex("411111111111111111111111111111111111111111").unwrap();
        assert_eq!(address.base58(), OWNER);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        assert!("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6u".parse::<TronAddress>().is_err());
        assert!("not-an-address".parse::<TronAddress>().is_err());
    }

    #[test]
    fn test_encode_allowance_call() {
        let owner: TronAddress = OWNER.parse().unwrap();
        let encoded = encode_parameters(&[
            AbiValue::Address(owner),
            AbiValue::Uint256(U256::from(1_000_000u64)),
        ]);
        assert_eq!(encoded.len(), 128);
        assert_eq!(&encoded[..24], "000000000000000000000000");
        assert_eq!(&encoded[24..64], "1111111111111111111111111111111111111111");
        assert!(encoded.ends_with("0f4240"));
    }

    #[test]
    fn test_decode_uint256() {
        let word = format!("{:0>64}", "3b9aca00");
        assert_eq!(decode_uint256(&word).unwrap(), U256::from(1_000_000_000u64));
        assert_eq!(decode_uint256("").unwrap(), U256::ZERO);
        assert_eq!(decode_uint256("0x0").unwrap(), U256::ZERO);
        assert!(decode_uint256("zz").is_err());
    }

    #[test]
    fn test_decode_uint256_non_ascii_result() {
        let mangled = format!("{}é{}", "0".repeat(63), "0".repeat(10));
        assert!(matches!(decode_uint256(&mangled), Err(Error::ParseError(_))));
        assert!(decode_uint256("ффф").is_err());
    }
}
