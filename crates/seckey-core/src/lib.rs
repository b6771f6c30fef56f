//! SecKey Core
//!
//! Password-encrypted EOSIO private keys.
//!
//! # Format
//!
//! `SEC_<type>_<base58>` wraps a `PVT_<type>_...` key:
//! - scrypt derives an IV and AES-256 key from the password, salted with a
//!   checksum of the public key
//! - AES-256-CBC without padding encrypts the 32 key bytes
//! - the same checksum detects a wrong password on decrypt
//!
//! The scrypt cost is stored in a single [`SecurityLevel`] byte.

pub mod abi;
pub mod base58;
pub mod cipher;
pub mod envelope;
pub mod keys;
pub mod security_level;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cipher::{backend, install_backend, BackendError, CryptoBackend, RustCryptoBackend};
pub use envelope::{key_checksum, EncryptedPrivateKey, EnvelopeError};
pub use keys::{KeyError, KeyType, PrivateKey, PublicKey};
pub use security_level::{CostParameters, SecurityLevel, SecurityLevelError};

/// Encrypt `key` at the default security level
pub fn encrypt(
    key: &PrivateKey,
    password: &[u8],
    progress: Option<&mut dyn FnMut(f64)>,
) -> Result<EncryptedPrivateKey, EnvelopeError> {
    EncryptedPrivateKey::encrypt(key, password, SecurityLevel::default(), progress)
}

/// Parse a `SEC_...` string and decrypt it
pub fn decrypt(
    encrypted: &str,
    password: &[u8],
    progress: Option<&mut dyn FnMut(f64)>,
) -> Result<PrivateKey, EnvelopeError> {
    let encrypted: EncryptedPrivateKey = encrypted.parse()?;
    encrypted.decrypt(password, progress)
}
