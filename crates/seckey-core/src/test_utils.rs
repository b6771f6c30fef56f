//! Shared test utilities for seckey-core unit tests.
//!
//! Provides a cheap deterministic backend so tests can sweep every security
//! level without running scrypt at gigabyte cost parameters.

use bitcoin::hashes::{sha256, Hash};

use crate::cipher::{BackendError, CryptoBackend, RustCryptoBackend, CIPHER_KEY_LEN, IV_LEN};
use crate::keys::{KeyType, PrivateKey};
use crate::security_level::CostParameters;

/// Stand-in KDF: counter-mode SHA-256 over password, salt and parameters.
/// Cipher calls go to the real AES-CBC implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastBackend;

impl CryptoBackend for FastBackend {
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &CostParameters,
        output: &mut [u8],
        mut progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(), BackendError> {
        let chunks = output.len().div_ceil(32);
        for (i, chunk) in output.chunks_mut(32).enumerate() {
            let mut input = Vec::new();
            input.extend_from_slice(&(i as u32).to_be_bytes());
            input.extend_from_slice(&params.n.to_be_bytes());
            input.extend_from_slice(&params.r.to_be_bytes());
            input.extend_from_slice(&params.p.to_be_bytes());
            input.extend_from_slice(salt);
            input.extend_from_slice(password);
            let digest = sha256::Hash::hash(&input).to_byte_array();
            chunk.copy_from_slice(&digest[..chunk.len()]);

            if let Some(report) = progress.as_deref_mut() {
                report((i + 1) as f64 / chunks as f64);
            }
        }
        Ok(())
    }

    fn encrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError> {
        RustCryptoBackend::new().encrypt_cbc(iv, key, buf)
    }

    fn decrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError> {
        RustCryptoBackend::new().decrypt_cbc(iv, key, buf)
    }
}

/// Deterministic private key from a seed byte.
///
/// The secret is `[0x01, 0x00, ..., 0x00, seed]`, valid on both curves.
pub fn test_key(key_type: KeyType, seed_byte: u8) -> PrivateKey {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x01;
    bytes[31] = seed_byte;
    PrivateKey::from_bytes(key_type, &bytes).unwrap()
}
