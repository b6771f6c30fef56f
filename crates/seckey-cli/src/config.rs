//! CLI configuration, parsed from a TOML file plus environment overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use seckey_core::{RustCryptoBackend, SecurityLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log levels accepted by `log_level`
const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub seckey: SeckeySection,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeckeySection {
    /// Level used by `encrypt` when `--level` is not given: a preset name,
    /// a byte, or a `0x` hex string
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Largest scrypt working memory accepted, in MiB
    #[serde(default = "default_max_memory_mib")]
    pub max_memory_mib: u64,

    /// Log level (off, error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SeckeySection {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::default(),
            max_memory_mib: default_max_memory_mib(),
            log_level: default_log_level(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_max_memory_mib() -> u64 {
    1024 // 1 GiB
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SECKEY_SECURITY_LEVEL`
    /// - `SECKEY_MAX_MEMORY_MIB`
    /// - `SECKEY_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("SECKEY_SECURITY_LEVEL") {
            self.seckey.security_level = v
                .parse()
                .with_context(|| format!("SECKEY_SECURITY_LEVEL: {}", v))?;
        }
        if let Some(v) = lookup("SECKEY_MAX_MEMORY_MIB") {
            self.seckey.max_memory_mib = v
                .parse()
                .with_context(|| format!("SECKEY_MAX_MEMORY_MIB: {}", v))?;
        }
        if let Some(v) = lookup("SECKEY_LOG_LEVEL") {
            self.seckey.log_level = v;
        }
        Ok(())
    }

    /// Crypto backend honouring `max_memory_mib`
    pub fn backend(&self) -> RustCryptoBackend {
        RustCryptoBackend::with_max_memory(self.seckey.max_memory_mib.saturating_mul(1024 * 1024))
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.seckey.max_memory_mib > 0,
            "seckey.max_memory_mib must be > 0"
        );

        anyhow::ensure!(
            LOG_LEVELS.contains(&self.seckey.log_level.to_ascii_lowercase().as_str()),
            "seckey.log_level must be one of {}",
            LOG_LEVELS.join(", ")
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
