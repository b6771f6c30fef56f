//! Base58 check encodings used by EOSIO-style key strings
//!
//! Two checksum flavours are in use:
//! - RIPEMD-160 over `data || suffix`, where the suffix is the curve tag
//!   (`K1`, `R1`, ...). Used by every `PVT_`, `PUB_` and `SEC_` string.
//! - Double SHA-256 over `data`. Only used by legacy WIF private keys.
//!
//! The alphabet itself comes from `bitcoin::base58`.

use bitcoin::base58;
use bitcoin::hashes::{ripemd160, Hash};
use thiserror::Error;

/// Length of the checksum appended before base58 encoding
pub const CHECKSUM_LEN: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("Invalid base58 data: {0}")]
    Decode(String),
    #[error("Base58 data too short for a checksum")]
    TooShort,
    #[error("Base58 checksum mismatch")]
    ChecksumMismatch,
}

fn ripemd160_checksum(data: &[u8], suffix: Option<&str>) -> [u8; CHECKSUM_LEN] {
    let mut buf = Vec::with_capacity(data.len() + suffix.map_or(0, str::len));
    buf.extend_from_slice(data);
    if let Some(suffix) = suffix {
        buf.extend_from_slice(suffix.as_bytes());
    }
    let digest = ripemd160::Hash::hash(&buf).to_byte_array();

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

/// Encode `data` followed by `ripemd160(data || suffix)[..4]`
pub fn encode_ripemd160_check(data: &[u8], suffix: Option<&str>) -> String {
    let mut buf = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&ripemd160_checksum(data, suffix));
    base58::encode(&buf)
}

/// Decode and verify a string produced by [`encode_ripemd160_check`].
///
/// Returns the payload without its checksum.
pub fn decode_ripemd160_check(s: &str, suffix: Option<&str>) -> Result<Vec<u8>, Base58Error> {
    let mut data = base58::decode(s).map_err(|e| Base58Error::Decode(e.to_string()))?;
    if data.len() < CHECKSUM_LEN {
        return Err(Base58Error::TooShort);
    }

    let split = data.len() - CHECKSUM_LEN;
    let expected = ripemd160_checksum(&data[..split], suffix);
    if data[split..] != expected {
        return Err(Base58Error::ChecksumMismatch);
    }

    data.truncate(split);
    Ok(data)
}

/// Encode with the legacy double SHA-256 checksum (WIF)
pub fn encode_sha256d_check(data: &[u8]) -> String {
    base58::encode_check(data)
}

/// Decode with the legacy double SHA-256 checksum (WIF)
pub fn decode_sha256d_check(s: &str) -> Result<Vec<u8>, Base58Error> {
    base58::decode_check(s).map_err(|e| Base58Error::Decode(e.to_string()))
}
