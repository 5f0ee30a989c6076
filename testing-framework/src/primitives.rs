// File: testing-framework/src/primitives.rs
//
// Chain Primitives
//
// Fixed-size hashes and addresses used across the framework, the Keccak-256
// helper, and the 256-bit integer type that contract values are expressed in.

use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use primitive_types::U256;

/// Size of a [`Hash`] in bytes
pub const HASH_SIZE: usize = 32;

/// Size of an [`Address`] in bytes
pub const ADDRESS_SIZE: usize = 20;

/// 32-byte Keccak-256 digest (block, transaction and code hashes)
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn zero() -> Self {
        Hash::new([0; HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// 20-byte account or contract address
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Default)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub const fn zero() -> Self {
        Address::new([0; ADDRESS_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Take the low 20 bytes of a hash
    pub fn from_hash(hash: &Hash) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&hash.as_bytes()[HASH_SIZE - ADDRESS_SIZE..]);
        Address(bytes)
    }

    /// Address of a contract created by `sender` with account nonce `nonce`
    pub fn contract_address(sender: &Address, nonce: u64) -> Self {
        let mut preimage = Vec::with_capacity(ADDRESS_SIZE + 8);
        preimage.extend_from_slice(sender.as_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        Address::from_hash(&keccak256(&preimage))
    }

    /// Deterministic fixture account for the given index
    ///
    /// The same index always yields the same address, so tests and scenario
    /// files can refer to `accounts[0]` across runs.
    pub fn test_account(index: u64) -> Self {
        let mut preimage = b"account".to_vec();
        preimage.extend_from_slice(&index.to_be_bytes());
        Address::from_hash(&keccak256(&preimage))
    }
}

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash {
    let digest = Keccak256::digest(data);
    let mut bytes = [0u8; HASH_SIZE];
    bytes.copy_from_slice(&digest);
    Hash(bytes)
}

/// Parse a 256-bit unsigned integer from decimal or `0x`-prefixed hex text
pub fn parse_u256(text: &str) -> Result<U256, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty integer".to_string());
    }
    if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex_digits.is_empty() {
            return Err(format!("invalid hex integer '{}'", text));
        }
        return U256::from_str_radix(hex_digits, 16)
            .map_err(|_| format!("invalid hex integer '{}'", text));
    }
    U256::from_dec_str(trimmed).map_err(|_| format!("invalid decimal integer '{}'", text))
}

/// Big-endian 32-byte word of a [`U256`]
pub fn u256_to_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    for (i, byte) in word.iter_mut().enumerate() {
        *byte = value.byte(31 - i);
    }
    word
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], &'static str> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|_| "Invalid hex string")?;
    bytes.try_into().map_err(|_| "Invalid length")
}

impl FromStr for Hash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<HASH_SIZE>(s).map(Hash)
    }
}

impl FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<ADDRESS_SIZE>(s).map(Address)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'a> Deserialize<'a> for Hash {
    fn deserialize<D: Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(SerdeError::custom)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'a> Deserialize<'a> for Address {
    fn deserialize<D: Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(SerdeError::custom)
    }
}

/// Serde adapter for [`U256`] values written as decimal strings
///
/// YAML and JSON numbers lose precision above 2^53, so amounts travel as
/// strings (`"100000000000000000000"`); hex with a `0x` prefix is accepted too.
pub mod u256_string {
    use super::{parse_u256, U256};
    use serde::de::Error as SerdeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'a, D: Deserializer<'a>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_u256(&s).map_err(SerdeError::custom)
    }
}
