//! Command handlers.
//!
//! Input is read line by line: the key (or `SEC_...` string) first, then the
//! password unless one came from the environment.

use anyhow::{Context, Result};
use seckey_core::{EncryptedPrivateKey, PrivateKey, SecurityLevel};
use std::io::{BufRead, Write};
use zeroize::Zeroizing;

/// Secret input for one command
pub struct SecretInput {
    pub subject: Zeroizing<String>,
    pub password: Zeroizing<String>,
}

/// Read the subject line and, unless `env_password` is set, the password line.
pub fn read_input<R: BufRead>(mut input: R, env_password: Option<String>) -> Result<SecretInput> {
    let subject = read_line(&mut input).context("Failed to read key from stdin")?;
    anyhow::ensure!(!subject.is_empty(), "No key given on stdin");

    let password = match env_password {
        Some(password) => Zeroizing::new(password),
        None => read_line(&mut input).context("Failed to read password from stdin")?,
    };

    Ok(SecretInput { subject, password })
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    input.read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

fn log_progress(fraction: f64) {
    log::debug!("Key derivation {:.0}%", fraction * 100.0);
}

/// Encrypt a `PVT_...` or WIF key, writing the `SEC_...` string
pub fn encrypt<W: Write>(secret: &SecretInput, level: SecurityLevel, out: &mut W) -> Result<()> {
    let key: PrivateKey = secret
        .subject
        .trim()
        .parse()
        .context("Invalid private key")?;

    log::info!(
        "Encrypting {} key at security level {} ({} MiB)",
        key.key_type(),
        level,
        level.params().memory_bytes() / (1024 * 1024)
    );
    let mut report = log_progress;
    let progress: &mut dyn FnMut(f64) = &mut report;
    let encrypted =
        EncryptedPrivateKey::encrypt(&key, secret.password.as_bytes(), level, Some(progress))
            .context("Encryption failed")?;

    writeln!(out, "{}", encrypted)?;
    Ok(())
}

/// Decrypt a `SEC_...` string, writing the `PVT_...` key
pub fn decrypt<W: Write>(secret: &SecretInput, out: &mut W) -> Result<()> {
    let encrypted: EncryptedPrivateKey = secret
        .subject
        .trim()
        .parse()
        .context("Invalid encrypted key")?;

    log::info!(
        "Decrypting {} key at security level {}",
        encrypted.key_type(),
        encrypted.security_level()
    );
    let mut report = log_progress;
    let progress: &mut dyn FnMut(f64) = &mut report;
    let key = encrypted
        .decrypt(secret.password.as_bytes(), Some(progress))
        .context("Decryption failed")?;

    let rendered = Zeroizing::new(key.to_string());
    writeln!(out, "{}", rendered.as_str())?;
    Ok(())
}

/// Describe a `SEC_...` string without decrypting it
pub fn inspect<W: Write>(encrypted: &str, out: &mut W) -> Result<()> {
    let encrypted: EncryptedPrivateKey = encrypted
        .trim()
        .parse()
        .context("Invalid encrypted key")?;
    let level = encrypted.security_level();
    let params = encrypted.params();

    writeln!(out, "Key type:       {}", encrypted.key_type())?;
    writeln!(
        out,
        "Security level: {} (0x{:02x})",
        level,
        level.value()
    )?;
    writeln!(
        out,
        "scrypt:         N={} r={} p={} (~{} MiB)",
        params.n,
        params.r,
        params.p,
        params.memory_bytes() / (1024 * 1024)
    )?;
    writeln!(out, "Checksum:       {}", hex::encode(encrypted.checksum()))?;
    writeln!(out, "Binary:         {}", hex::encode(encrypted.to_bytes()))?;
    Ok(())
}
