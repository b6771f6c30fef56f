//! Curve-tagged private and public keys
//!
//! Keys are identified by a [`KeyType`] and rendered in the EOSIO string
//! forms `PVT_<type>_<base58>` and `PUB_<type>_<base58>`. Legacy WIF
//! private keys (`5...`) are accepted on input and are always `K1`.
//!
//! Curve arithmetic comes from `secp256k1` (K1) and `p256` (R1).

use std::fmt;
use std::str::FromStr;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::abi::{AbiDecoder, AbiEncoder, AbiError, AbiSerializable};
use crate::base58::{self, Base58Error};

/// Raw private key length for every curve that has one
pub const PRIVATE_KEY_LEN: usize = 32;

/// Compressed SEC1 public key length
pub const PUBLIC_KEY_LEN: usize = 33;

/// Version byte prefixed to legacy WIF private keys
const WIF_VERSION: u8 = 0x80;

/// Trailing flag of compressed WIF private keys
const WIF_COMPRESSED_FLAG: u8 = 0x01;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Unsupported key type: {0}")]
    UnsupportedCurve(String),
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Key bytes are not a valid scalar for the curve")]
    InvalidScalar,
    #[error("Invalid key format: {0}")]
    InvalidFormat(String),
    #[error(transparent)]
    Base58(#[from] Base58Error),
}

impl From<AbiError> for KeyError {
    fn from(e: AbiError) -> Self {
        KeyError::InvalidFormat(e.to_string())
    }
}

/// Curve a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// secp256k1
    K1,
    /// secp256r1 (NIST P-256)
    R1,
    /// WebAuthn; public keys only, there is no private key form
    WA,
}

impl KeyType {
    /// Index used by the binary encoding
    pub fn index(self) -> u8 {
        match self {
            KeyType::K1 => 0,
            KeyType::R1 => 1,
            KeyType::WA => 2,
        }
    }

    pub fn from_index(index: u8) -> Result<Self, KeyError> {
        match index {
            0 => Ok(KeyType::K1),
            1 => Ok(KeyType::R1),
            2 => Ok(KeyType::WA),
            other => Err(KeyError::UnsupportedCurve(format!("index {}", other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::K1 => "K1",
            KeyType::R1 => "R1",
            KeyType::WA => "WA",
        }
    }

    /// Private key length, `None` for curves without a private key form
    pub fn private_key_len(self) -> Option<usize> {
        match self {
            KeyType::K1 | KeyType::R1 => Some(PRIVATE_KEY_LEN),
            KeyType::WA => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "K1" => Ok(KeyType::K1),
            "R1" => Ok(KeyType::R1),
            "WA" => Ok(KeyType::WA),
            other => Err(KeyError::UnsupportedCurve(other.to_string())),
        }
    }
}

/// Compressed public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key_type: KeyType,
    data: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.data
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.key_type.as_str();
        write!(
            f,
            "PUB_{}_{}",
            tag,
            base58::encode_ripemd160_check(&self.data, Some(tag))
        )
    }
}

/// Private key with its derived public key.
///
/// The secret bytes are zeroized on drop. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    key_type: KeyType,
    data: Zeroizing<[u8; PRIVATE_KEY_LEN]>,
    public: PublicKey,
}

impl PrivateKey {
    /// Build a key from raw bytes.
    ///
    /// Fails if the curve has no private key form, if the length is wrong,
    /// or if the bytes are not a valid non-zero scalar below the curve order.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, KeyError> {
        let expected = key_type
            .private_key_len()
            .ok_or_else(|| KeyError::UnsupportedCurve(key_type.to_string()))?;
        if bytes.len() != expected {
            return Err(KeyError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }

        let mut data = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        data.copy_from_slice(bytes);

        let public = PublicKey {
            key_type,
            data: derive_public(key_type, &data)?,
        };

        Ok(Self {
            key_type,
            data,
            public,
        })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.data
    }

    pub fn to_public(&self) -> PublicKey {
        self.public
    }

    /// Legacy WIF form. Only defined for K1 keys.
    pub fn to_wif(&self) -> Result<String, KeyError> {
        if self.key_type != KeyType::K1 {
            return Err(KeyError::UnsupportedCurve(format!(
                "{} keys have no WIF form",
                self.key_type
            )));
        }
        let mut buf = Zeroizing::new(Vec::with_capacity(1 + PRIVATE_KEY_LEN));
        buf.push(WIF_VERSION);
        buf.extend_from_slice(&self.data[..]);
        Ok(base58::encode_sha256d_check(&buf))
    }

    fn from_wif(s: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(base58::decode_sha256d_check(s)?);
        let body = match decoded.len() {
            33 => &decoded[1..],
            34 if decoded[33] == WIF_COMPRESSED_FLAG => &decoded[1..33],
            other => {
                return Err(KeyError::InvalidFormat(format!(
                    "WIF payload of {} bytes",
                    other
                )))
            }
        };
        if decoded[0] != WIF_VERSION {
            return Err(KeyError::InvalidFormat(format!(
                "WIF version byte {:#04x}",
                decoded[0]
            )));
        }
        Self::from_bytes(KeyType::K1, body)
    }
}

fn derive_public(
    key_type: KeyType,
    secret: &[u8; PRIVATE_KEY_LEN],
) -> Result<[u8; PUBLIC_KEY_LEN], KeyError> {
    match key_type {
        KeyType::K1 => {
            let secp = secp256k1::Secp256k1::signing_only();
            let mut sk =
                secp256k1::SecretKey::from_slice(secret).map_err(|_| KeyError::InvalidScalar)?;
            let public = secp256k1::PublicKey::from_secret_key(&secp, &sk).serialize();
            sk.non_secure_erase();
            Ok(public)
        }
        KeyType::R1 => {
            let sk = p256::SecretKey::from_slice(secret).map_err(|_| KeyError::InvalidScalar)?;
            let point = sk.public_key().to_encoded_point(true);
            point
                .as_bytes()
                .try_into()
                .map_err(|_| KeyError::InvalidScalar)
        }
        KeyType::WA => Err(KeyError::UnsupportedCurve(key_type.to_string())),
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_type", &self.key_type)
            .field("public", &self.public.to_string())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.key_type.as_str();
        write!(
            f,
            "PVT_{}_{}",
            tag,
            base58::encode_ripemd160_check(&self.data[..], Some(tag))
        )
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains('_') {
            return Self::from_wif(s);
        }

        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 || parts[0] != "PVT" {
            return Err(KeyError::InvalidFormat(
                "expected PVT_<type>_<data> or a WIF string".to_string(),
            ));
        }
        let key_type: KeyType = parts[1].parse()?;
        let data = Zeroizing::new(base58::decode_ripemd160_check(
            parts[2],
            Some(key_type.as_str()),
        )?);
        Self::from_bytes(key_type, &data)
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AbiSerializable for PrivateKey {
    const ABI_NAME: &'static str = "private_key";
    type Error = KeyError;

    fn to_abi(&self, encoder: &mut AbiEncoder) {
        encoder.write_byte(self.key_type.index());
        encoder.write_array(&self.data[..]);
    }

    fn from_abi(decoder: &mut AbiDecoder<'_>) -> Result<Self, Self::Error> {
        let key_type = KeyType::from_index(decoder.read_byte()?)?;
        let len = key_type
            .private_key_len()
            .ok_or_else(|| KeyError::UnsupportedCurve(key_type.to_string()))?;
        let data = decoder.read_slice(len)?;
        Self::from_bytes(key_type, data)
    }
}
