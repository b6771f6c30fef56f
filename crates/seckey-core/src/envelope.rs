//! Password-encrypted private keys
//!
//! An [`EncryptedPrivateKey`] holds a curve tag, a [`SecurityLevel`], a
//! 4-byte checksum and the encrypted key bytes.
//!
//! # Protocol
//!
//! ```text
//! checksum   = sha256d(utf8(PUB_<type>_...))[..4]
//! iv || key  = scrypt(password, salt = checksum, N, r, p, len = 48)
//! ciphertext = AES-256-CBC(iv, key, private key bytes), no padding
//! ```
//!
//! The checksum is both the KDF salt and the password check on decrypt:
//! a wrong password yields a different key whose checksum does not match.
//! There is no separate MAC.
//!
//! # Deterministic output
//!
//! The salt comes from the public key rather than a random nonce, so
//! encrypting the same key with the same password and level always yields
//! the same string. Nothing needs to be stored besides the envelope itself.
//! The trade-off is that two envelopes can be compared to tell that they
//! hold the same key under the same password and level.
//!
//! # Encodings
//!
//! - String: `SEC_<type>_<base58(level || checksum || ciphertext || check)>`
//!   where `check = ripemd160(payload || type)[..4]`
//! - Binary: `type index || level || checksum || ciphertext`

use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{sha256d, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::abi::{self, AbiDecoder, AbiEncoder, AbiError, AbiSerializable};
use crate::base58::{self, Base58Error};
use crate::cipher::{backend, BackendError, CipherPipeline, CryptoBackend};
use crate::keys::{KeyError, KeyType, PrivateKey};
use crate::security_level::{CostParameters, SecurityLevel, SecurityLevelError};

/// Checksum length in bytes
pub const CHECKSUM_LEN: usize = 4;

/// Leading literal of the string form
const STRING_PREFIX: &str = "SEC";

/// Level byte plus checksum, ahead of the ciphertext
const HEADER_LEN: usize = 1 + CHECKSUM_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Invalid encrypted private key: {0}")]
    InvalidFormat(String),
    #[error("Unsupported key type: {0}")]
    UnsupportedCurve(String),
    #[error(transparent)]
    InvalidSecurityLevel(#[from] SecurityLevelError),
    #[error("Invalid password")]
    InvalidPassword,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Base58(#[from] Base58Error),
}

impl From<AbiError> for EnvelopeError {
    fn from(e: AbiError) -> Self {
        EnvelopeError::InvalidFormat(e.to_string())
    }
}

/// Compute the checksum of a key: first 4 bytes of the double SHA-256 of
/// its public key string.
pub fn key_checksum(key: &PrivateKey) -> [u8; CHECKSUM_LEN] {
    let public = key.to_public().to_string();
    let digest = sha256d::Hash::hash(public.as_bytes()).to_byte_array();

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

/// A private key encrypted under a password.
///
/// Immutable: constructed by [`encrypt`](Self::encrypt) or by decoding, and
/// never modified afterwards.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncryptedPrivateKey {
    key_type: KeyType,
    level: SecurityLevel,
    checksum: [u8; CHECKSUM_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedPrivateKey {
    /// Assemble an envelope from its fields.
    ///
    /// The ciphertext length must equal the private key length of the curve.
    pub fn from_parts(
        key_type: KeyType,
        level: SecurityLevel,
        checksum: [u8; CHECKSUM_LEN],
        ciphertext: Vec<u8>,
    ) -> Result<Self, EnvelopeError> {
        let expected = key_type
            .private_key_len()
            .ok_or_else(|| EnvelopeError::UnsupportedCurve(key_type.to_string()))?;
        if ciphertext.len() != expected {
            return Err(EnvelopeError::InvalidFormat(format!(
                "ciphertext is {} bytes, {} keys need {}",
                ciphertext.len(),
                key_type,
                expected
            )));
        }

        Ok(Self {
            key_type,
            level,
            checksum,
            ciphertext,
        })
    }

    /// Encrypt `key` with the process-wide backend.
    ///
    /// Runs scrypt at the cost given by `level`, which can take seconds.
    /// Output is deterministic for a given key, password and level.
    pub fn encrypt(
        key: &PrivateKey,
        password: &[u8],
        level: SecurityLevel,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<Self, EnvelopeError> {
        Self::encrypt_with(backend(), key, password, level, progress)
    }

    /// Encrypt `key` with an explicit backend
    pub fn encrypt_with(
        backend: &dyn CryptoBackend,
        key: &PrivateKey,
        password: &[u8],
        level: SecurityLevel,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<Self, EnvelopeError> {
        let checksum = key_checksum(key);
        let pipeline = CipherPipeline::new(backend);

        let material =
            pipeline.derive_key_material(password, &checksum, &level.params(), progress)?;
        let ciphertext = pipeline.encrypt(&material, key.as_bytes())?;

        log::debug!("Encrypted {} key at security level {}", key.key_type(), level);
        Self::from_parts(key.key_type(), level, checksum, ciphertext)
    }

    /// Decrypt with the process-wide backend.
    ///
    /// Fails with [`EnvelopeError::InvalidPassword`] when the recovered
    /// key's checksum does not match the stored one.
    pub fn decrypt(
        &self,
        password: &[u8],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<PrivateKey, EnvelopeError> {
        self.decrypt_with(backend(), password, progress)
    }

    /// Decrypt with an explicit backend
    pub fn decrypt_with(
        &self,
        backend: &dyn CryptoBackend,
        password: &[u8],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<PrivateKey, EnvelopeError> {
        let pipeline = CipherPipeline::new(backend);

        let material =
            pipeline.derive_key_material(password, &self.checksum, &self.params(), progress)?;
        let plaintext = pipeline.decrypt(&material, &self.ciphertext)?;

        // Garbage from a wrong password is usually still a valid scalar, but
        // not always.
        let candidate = PrivateKey::from_bytes(self.key_type, &plaintext).map_err(|e| match e {
            KeyError::InvalidScalar => EnvelopeError::InvalidPassword,
            other => other.into(),
        })?;

        if key_checksum(&candidate) != self.checksum {
            log::debug!("Checksum mismatch after decryption");
            return Err(EnvelopeError::InvalidPassword);
        }
        Ok(candidate)
    }

    /// [`encrypt`](Self::encrypt) on tokio's blocking pool.
    ///
    /// Dropping the future does not stop a derivation already running; its
    /// result is discarded.
    pub async fn encrypt_async(
        key: PrivateKey,
        password: Vec<u8>,
        level: SecurityLevel,
        progress: Option<Box<dyn FnMut(f64) + Send>>,
    ) -> Result<Self, EnvelopeError> {
        let password = Zeroizing::new(password);
        tokio::task::spawn_blocking(move || {
            let mut progress = progress;
            let mut report = |fraction: f64| {
                if let Some(callback) = progress.as_mut() {
                    callback(fraction);
                }
            };
            let report: &mut dyn FnMut(f64) = &mut report;
            Self::encrypt(&key, &password, level, Some(report))
        })
        .await
        .map_err(|e| BackendError::Join(e.to_string()))?
    }

    /// [`decrypt`](Self::decrypt) on tokio's blocking pool
    pub async fn decrypt_async(
        &self,
        password: Vec<u8>,
        progress: Option<Box<dyn FnMut(f64) + Send>>,
    ) -> Result<PrivateKey, EnvelopeError> {
        let password = Zeroizing::new(password);
        let envelope = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut progress = progress;
            let mut report = |fraction: f64| {
                if let Some(callback) = progress.as_mut() {
                    callback(fraction);
                }
            };
            let report: &mut dyn FnMut(f64) = &mut report;
            envelope.decrypt(&password, Some(report))
        })
        .await
        .map_err(|e| BackendError::Join(e.to_string()))?
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.level
    }

    /// Cost parameters used for this envelope
    pub fn params(&self) -> CostParameters {
        self.level.params()
    }

    pub fn checksum(&self) -> &[u8; CHECKSUM_LEN] {
        &self.checksum
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Binary encoding: type index, level, checksum, ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        abi::encode(self)
    }

    /// Decode the binary form. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        abi::decode(bytes)
    }

    /// `level || checksum || ciphertext`, shared by both encodings
    fn payload(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        data.push(self.level.value());
        data.extend_from_slice(&self.checksum);
        data.extend_from_slice(&self.ciphertext);
        data
    }

    fn from_payload(key_type: KeyType, data: &[u8]) -> Result<Self, EnvelopeError> {
        if data.len() < HEADER_LEN {
            return Err(EnvelopeError::InvalidFormat(format!(
                "payload of {} bytes is too short",
                data.len()
            )));
        }
        let level = SecurityLevel::new(data[0]);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&data[1..HEADER_LEN]);
        Self::from_parts(key_type, level, checksum, data[HEADER_LEN..].to_vec())
    }
}

impl fmt::Display for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.key_type.as_str();
        write!(
            f,
            "{}_{}_{}",
            STRING_PREFIX,
            tag,
            base58::encode_ripemd160_check(&self.payload(), Some(tag))
        )
    }
}

impl fmt::Debug for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptedPrivateKey")
            .field(&self.to_string())
            .finish()
    }
}

impl FromStr for EncryptedPrivateKey {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 || parts[0] != STRING_PREFIX {
            return Err(EnvelopeError::InvalidFormat(
                "expected SEC_<type>_<data>".to_string(),
            ));
        }

        let key_type: KeyType = parts[1]
            .parse()
            .map_err(|_| EnvelopeError::UnsupportedCurve(parts[1].to_string()))?;
        let data = base58::decode_ripemd160_check(parts[2], Some(key_type.as_str()))?;
        log::trace!("Decoded {} byte SEC payload", data.len());

        Self::from_payload(key_type, &data)
    }
}

impl Serialize for EncryptedPrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EncryptedPrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AbiSerializable for EncryptedPrivateKey {
    const ABI_NAME: &'static str = "encrypted_private_key";
    type Error = EnvelopeError;

    fn to_abi(&self, encoder: &mut AbiEncoder) {
        encoder.write_byte(self.key_type.index());
        encoder.write_array(&self.payload());
    }

    fn from_abi(decoder: &mut AbiDecoder<'_>) -> Result<Self, Self::Error> {
        let index = decoder.read_byte()?;
        let key_type = KeyType::from_index(index)
            .map_err(|_| EnvelopeError::UnsupportedCurve(format!("index {}", index)))?;
        let key_len = key_type
            .private_key_len()
            .ok_or_else(|| EnvelopeError::UnsupportedCurve(key_type.to_string()))?;

        let level = SecurityLevel::new(decoder.read_byte()?);
        let checksum = decoder.read_array::<CHECKSUM_LEN>()?;
        let ciphertext = decoder.read_slice(key_len)?.to_vec();
        log::trace!("Decoded binary {} envelope", key_type);

        Self::from_parts(key_type, level, checksum, ciphertext)
    }
}
