//! SecKey CLI: encrypt and decrypt EOSIO private keys with a password
//!
//! # Usage
//!
//! ```bash
//! printf '%s\n%s\n' PVT_K1_... 'password' | seckey encrypt --level high
//! printf '%s\n%s\n' SEC_K1_... 'password' | seckey decrypt
//! seckey inspect SEC_K1_...
//! ```

mod commands;
mod config;

use anyhow::{Context, Result};
use seckey_core::SecurityLevel;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "seckey.toml";

enum Command {
    Encrypt { level: Option<SecurityLevel> },
    Decrypt,
    Inspect { encrypted: String },
}

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut command: Option<Command> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--level" | "-l" => {
                i += 1;
                let Some(Command::Encrypt { level }) = command.as_mut() else {
                    anyhow::bail!("--level is only valid after encrypt");
                };
                if i < args.len() {
                    *level = Some(
                        args[i]
                            .parse()
                            .with_context(|| format!("Invalid security level: {}", args[i]))?,
                    );
                } else {
                    anyhow::bail!("--level requires a value");
                }
            }
            "encrypt" if command.is_none() => {
                command = Some(Command::Encrypt { level: None });
            }
            "decrypt" if command.is_none() => {
                command = Some(Command::Decrypt);
            }
            "inspect" if command.is_none() => {
                i += 1;
                if i < args.len() {
                    command = Some(Command::Inspect {
                        encrypted: args[i].clone(),
                    });
                } else {
                    anyhow::bail!("inspect requires a SEC_... argument");
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("seckey {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let Some(command) = command else {
        print_help();
        anyhow::bail!("No command given");
    };

    // Load config; only an explicitly named file has to exist
    let mut cli_config = match &config_path {
        Some(path) => config::CliConfig::from_file(path),
        None => config::CliConfig::from_file_or_default(&PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
    .context("Failed to load config")?;

    cli_config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    cli_config
        .validate()
        .context("Configuration validation failed")?;

    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli_config.seckey.log_level.as_str()),
    )
    .init();

    seckey_core::install_backend(cli_config.backend())
        .context("Failed to install crypto backend")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Encrypt { level } => {
            let level = level.unwrap_or(cli_config.seckey.security_level);
            let secret = commands::read_input(std::io::stdin().lock(), env_password())?;
            commands::encrypt(&secret, level, &mut out)?;
        }
        Command::Decrypt => {
            let secret = commands::read_input(std::io::stdin().lock(), env_password())?;
            commands::decrypt(&secret, &mut out)?;
        }
        Command::Inspect { encrypted } => {
            commands::inspect(&encrypted, &mut out)?;
        }
    }

    Ok(())
}

fn env_password() -> Option<String> {
    std::env::var("SECKEY_PASSWORD").ok()
}

fn print_help() {
    println!(
        r#"SecKey: password-encrypted EOSIO private keys

USAGE:
    seckey [OPTIONS] <COMMAND>

COMMANDS:
    encrypt [--level <L>]   Read a PVT_/WIF key and password from stdin, print SEC_...
    decrypt                 Read a SEC_ key and password from stdin, print PVT_...
    inspect <SEC_...>       Show curve, security level and scrypt cost

OPTIONS:
    -c, --config <PATH>     Config file path (default: ./seckey.toml if present)
    -l, --level <L>         Security level: default, high, paranoid, or 0-255
    -h, --help              Show this help message
    -V, --version           Show version

ENVIRONMENT VARIABLES:
    SECKEY_PASSWORD         Password; stdin then only carries the key
    SECKEY_SECURITY_LEVEL   Default security level (overrides config file)
    SECKEY_MAX_MEMORY_MIB   scrypt memory ceiling in MiB (default: 1024)
    SECKEY_LOG_LEVEL        Log level (overrides config file)

EXAMPLES:
    # Encrypt at a higher cost
    printf '%s\n%s\n' PVT_K1_... 'correct horse' | seckey encrypt --level high

    # Decrypt with the password from the environment
    echo SEC_K1_... | SECKEY_PASSWORD='correct horse' seckey decrypt
"#
    );
}
