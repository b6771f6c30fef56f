//! Key derivation and block cipher pipeline
//!
//! scrypt turns `(password, salt, N, r, p)` into 48 bytes of key material:
//! a 16-byte IV followed by a 32-byte AES-256 key. The private key is then
//! encrypted with AES-256-CBC **without padding**.
//!
//! No padding is only sound because a private key is exactly two cipher
//! blocks long. [`CipherPipeline`] checks block alignment before every
//! cipher call and refuses anything else, so this must not be reused for
//! variable-length plaintext.
//!
//! The primitives sit behind [`CryptoBackend`] so platform-specific
//! implementations can be swapped in. The process-wide backend is set at
//! most once with [`install_backend`], before the first operation; it cannot
//! be replaced afterwards.

use std::fmt;
use std::sync::OnceLock;

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::security_level::CostParameters;

/// Cipher block size
pub const BLOCK_LEN: usize = 16;

/// CBC initialization vector length
pub const IV_LEN: usize = 16;

/// AES-256 key length
pub const CIPHER_KEY_LEN: usize = 32;

/// Total KDF output: IV followed by cipher key
pub const KEY_MATERIAL_LEN: usize = IV_LEN + CIPHER_KEY_LEN;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Key derivation failed: {0}")]
    Kdf(String),
    #[error("Cipher failed: {0}")]
    Cipher(String),
    #[error("Cipher input of {0} bytes is not a non-zero multiple of the block size")]
    Unaligned(usize),
    #[error("A crypto backend is already installed")]
    AlreadyInstalled,
    #[error("Background task failed: {0}")]
    Join(String),
}

/// Key derivation and cipher primitives.
///
/// `derive` may take seconds and gigabytes at high cost parameters. It may
/// report progress as a fraction in `0.0..=1.0`.
pub trait CryptoBackend: Send + Sync {
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &CostParameters,
        output: &mut [u8],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(), BackendError>;

    /// Encrypt `buf` in place. `buf` is block aligned.
    fn encrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError>;

    /// Decrypt `buf` in place. `buf` is block aligned.
    fn decrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError>;
}

/// Default memory ceiling for one scrypt derivation (1 GiB)
pub const DEFAULT_MAX_MEMORY: u64 = 1024 * 1024 * 1024;

/// Default backend built on the RustCrypto `scrypt`, `aes` and `cbc` crates.
///
/// `scrypt` exposes no progress hook, so progress is reported only at the
/// start (0.0) and end (1.0) of a derivation.
///
/// The security level of an envelope is attacker-controlled on decrypt and
/// the top levels ask for hundreds of GiB. Derivations whose working memory
/// exceeds `max_memory` fail with [`BackendError::Kdf`] before anything is
/// allocated.
#[derive(Debug, Clone, Copy)]
pub struct RustCryptoBackend {
    max_memory: u64,
}

impl RustCryptoBackend {
    pub const fn new() -> Self {
        Self::with_max_memory(DEFAULT_MAX_MEMORY)
    }

    pub const fn with_max_memory(max_memory: u64) -> Self {
        Self { max_memory }
    }

    pub fn max_memory(&self) -> u64 {
        self.max_memory
    }

    /// Bytes scrypt allocates: the N-block table plus the p-block buffer
    fn working_memory(params: &CostParameters) -> u64 {
        params.memory_bytes() + 128 * u64::from(params.r) * u64::from(params.p)
    }
}

impl Default for RustCryptoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoBackend for RustCryptoBackend {
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &CostParameters,
        output: &mut [u8],
        mut progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(), BackendError> {
        let needed = Self::working_memory(params);
        if needed > self.max_memory {
            return Err(BackendError::Kdf(format!(
                "N={} r={} p={} needs {} bytes, limit is {}",
                params.n, params.r, params.p, needed, self.max_memory
            )));
        }

        let scrypt_params = scrypt::Params::new(params.log_n(), params.r, params.p, output.len())
            .map_err(|e| BackendError::Kdf(e.to_string()))?;

        if let Some(report) = progress.as_deref_mut() {
            report(0.0);
        }
        scrypt::scrypt(password, salt, &scrypt_params, output)
            .map_err(|e| BackendError::Kdf(e.to_string()))?;
        if let Some(report) = progress.as_deref_mut() {
            report(1.0);
        }
        Ok(())
    }

    fn encrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError> {
        let len = buf.len();
        Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|e| BackendError::Cipher(e.to_string()))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map_err(|_| BackendError::Unaligned(len))?;
        Ok(())
    }

    fn decrypt_cbc(
        &self,
        iv: &[u8; IV_LEN],
        key: &[u8; CIPHER_KEY_LEN],
        buf: &mut [u8],
    ) -> Result<(), BackendError> {
        let len = buf.len();
        Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| BackendError::Cipher(e.to_string()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map_err(|_| BackendError::Unaligned(len))?;
        Ok(())
    }
}

static BACKEND: OnceLock<Box<dyn CryptoBackend>> = OnceLock::new();

/// Install the process-wide backend.
///
/// Must happen before the first encrypt/decrypt. Fails with
/// [`BackendError::AlreadyInstalled`] once a backend is in place, including
/// the default one installed implicitly by [`backend`].
pub fn install_backend<B: CryptoBackend + 'static>(backend: B) -> Result<(), BackendError> {
    BACKEND
        .set(Box::new(backend))
        .map_err(|_| BackendError::AlreadyInstalled)?;
    log::debug!("Installed custom crypto backend");
    Ok(())
}

/// The process-wide backend, [`RustCryptoBackend`] unless one was installed
pub fn backend() -> &'static dyn CryptoBackend {
    BACKEND
        .get_or_init(|| Box::new(RustCryptoBackend::new()))
        .as_ref()
}

/// KDF output split into IV and cipher key. Zeroized on drop.
pub struct KeyMaterial {
    iv: Zeroizing<[u8; IV_LEN]>,
    key: Zeroizing<[u8; CIPHER_KEY_LEN]>,
}

impl KeyMaterial {
    fn split(material: &[u8; KEY_MATERIAL_LEN]) -> Self {
        let mut iv = Zeroizing::new([0u8; IV_LEN]);
        let mut key = Zeroizing::new([0u8; CIPHER_KEY_LEN]);
        iv.copy_from_slice(&material[..IV_LEN]);
        key.copy_from_slice(&material[IV_LEN..]);
        Self { iv, key }
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn key(&self) -> &[u8; CIPHER_KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

/// Stateless pipeline over an injected backend
#[derive(Clone, Copy)]
pub struct CipherPipeline<'a> {
    backend: &'a dyn CryptoBackend,
}

impl<'a> CipherPipeline<'a> {
    pub fn new(backend: &'a dyn CryptoBackend) -> Self {
        Self { backend }
    }

    /// Run the KDF and split its 48-byte output into IV and cipher key
    pub fn derive_key_material(
        &self,
        password: &[u8],
        salt: &[u8],
        params: &CostParameters,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<KeyMaterial, BackendError> {
        log::debug!(
            "Deriving key material: N={} r={} p={} (~{} MiB)",
            params.n,
            params.r,
            params.p,
            params.memory_bytes() / (1024 * 1024)
        );

        let mut material = Zeroizing::new([0u8; KEY_MATERIAL_LEN]);
        self.backend
            .derive(password, salt, params, material.as_mut_slice(), progress)?;
        Ok(KeyMaterial::split(&material))
    }

    pub fn encrypt(
        &self,
        material: &KeyMaterial,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        check_aligned(plaintext.len())?;
        let mut buf = plaintext.to_vec();
        self.backend
            .encrypt_cbc(material.iv(), material.key(), &mut buf)?;
        Ok(buf)
    }

    pub fn decrypt(
        &self,
        material: &KeyMaterial,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        check_aligned(ciphertext.len())?;
        let mut buf = Zeroizing::new(ciphertext.to_vec());
        self.backend
            .decrypt_cbc(material.iv(), material.key(), buf.as_mut_slice())?;
        Ok(buf)
    }
}

fn check_aligned(len: usize) -> Result<(), BackendError> {
    if len == 0 || len % BLOCK_LEN != 0 {
        return Err(BackendError::Unaligned(len));
    }
    Ok(())
}
