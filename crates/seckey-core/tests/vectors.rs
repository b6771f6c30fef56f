//! Known-answer tests against real scrypt.
//!
//! Uses the default RustCrypto backend, so each derivation costs what a
//! real user pays: tens of MiB at the default level, 16 MiB at level 0.
//!
//! Run with: cargo test -p seckey-core --test vectors

use seckey_core::{
    decrypt, encrypt, EncryptedPrivateKey, EnvelopeError, KeyType, PrivateKey, SecurityLevel,
};

const K1_KEY: &str = "PVT_K1_jsufMdV436e3vbj45mUXNESb3juT6LFDj7rpr7Ar3Gajf3f5G";
const R1_KEY: &str = "PVT_R1_jsufMdV436e3vbj45mUXNESb3juT6LFDj7rpr7Ar3GafKBSnk";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Default level
// ============================================================================

#[test]
fn test_default_level_vector() {
    init_logging();
    let key: PrivateKey = K1_KEY.parse().unwrap();

    let encrypted = encrypt(&key, b"foobar", None).unwrap();
    assert_eq!(
        encrypted.to_string(),
        "SEC_K1_8vWLjFLTcvWNKY8wwfMKJJ3Sf278qb5xQgqXFzrRF44ECxACwoC3RPTj"
    );
    assert_eq!(
        hex::encode(encrypted.to_bytes()),
        "00241feb8491b4fd5745396bb401bac0be2c7a85855b3b2b79eaafced1396765e315b7a93fec"
    );

    let decrypted = decrypt(&encrypted.to_string(), b"foobar", None).unwrap();
    assert_eq!(decrypted.to_string(), K1_KEY);

    assert_eq!(
        encrypted.decrypt(b"beef", None),
        Err(EnvelopeError::InvalidPassword)
    );
}

#[test]
fn test_progress_reaches_completion() {
    init_logging();
    let key: PrivateKey = K1_KEY.parse().unwrap();

    let mut seen = Vec::new();
    let mut record = |fraction: f64| seen.push(fraction);
    let progress: &mut dyn FnMut(f64) = &mut record;
    EncryptedPrivateKey::encrypt(&key, b"foobar", SecurityLevel::new(0), Some(progress)).unwrap();

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(1.0));
}

// ============================================================================
// Lowest level, both curves
// ============================================================================

#[test]
fn test_level_zero_k1_vector() {
    init_logging();
    let key: PrivateKey = K1_KEY.parse().unwrap();

    let encrypted =
        EncryptedPrivateKey::encrypt(&key, b"foobar", SecurityLevel::new(0), None).unwrap();
    assert_eq!(
        encrypted.to_string(),
        "SEC_K1_12azPKb7DDshLVBtG6o5Cwc1gy7JnKKhqQ8iT7oeS22UZX45azkaBnPk"
    );
    assert_eq!(
        hex::encode(encrypted.to_bytes()),
        "00001feb849195e479a50a8904cd5b07c533cfba147f8249570cfc1e709e817a01e714d833e5"
    );
    assert_eq!(encrypted.decrypt(b"foobar", None).unwrap(), key);
}

#[test]
fn test_level_zero_r1_vector() {
    init_logging();
    let key: PrivateKey = R1_KEY.parse().unwrap();
    assert_eq!(key.key_type(), KeyType::R1);
    assert_eq!(
        key.to_public().to_string(),
        "PUB_R1_55QV3yHaAMVqkGziEuh4bj6cCq8ZTa1Rzkdzh8iDP4NFjxm6ZP"
    );

    let encrypted =
        EncryptedPrivateKey::encrypt(&key, b"foobar", SecurityLevel::new(0), None).unwrap();
    assert_eq!(
        encrypted.to_string(),
        "SEC_R1_14GbDvSjfJyiXqT2JNxoZtqoAf8vRbHB3bGu7cvHN3S3AeD1AmyfLx9M"
    );
    assert_eq!(
        hex::encode(encrypted.to_bytes()),
        "010041c97d750baefce8c0e627c7fe74908233bab57d0c270d624c63269de130a65322089ee2"
    );

    let parsed: EncryptedPrivateKey = encrypted.to_string().parse().unwrap();
    assert_eq!(parsed.decrypt(b"foobar", None).unwrap().to_string(), R1_KEY);
    assert_eq!(
        parsed.decrypt(b"foobaz", None),
        Err(EnvelopeError::InvalidPassword)
    );
}

#[test]
fn test_legacy_wif_input() {
    init_logging();
    let key: PrivateKey = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3"
        .parse()
        .unwrap();
    assert_eq!(
        key.to_string(),
        "PVT_K1_2bfGi9rYsXQSXXTvJbDAPhHLQUojjaNLomdm3cEJ1XTzMqUt3V"
    );

    let encrypted =
        EncryptedPrivateKey::encrypt(&key, b"", SecurityLevel::new(0), None).unwrap();
    assert_eq!(encrypted.decrypt(b"", None).unwrap(), key);
}

// ============================================================================
// Async
// ============================================================================

#[tokio::test]
async fn test_async_roundtrip() {
    init_logging();
    let key: PrivateKey = K1_KEY.parse().unwrap();

    let encrypted =
        EncryptedPrivateKey::encrypt_async(key.clone(), b"foobar".to_vec(), SecurityLevel::new(0), None)
            .await
            .unwrap();
    assert_eq!(
        encrypted.to_string(),
        "SEC_K1_12azPKb7DDshLVBtG6o5Cwc1gy7JnKKhqQ8iT7oeS22UZX45azkaBnPk"
    );

    let decrypted = encrypted
        .decrypt_async(b"foobar".to_vec(), None)
        .await
        .unwrap();
    assert_eq!(decrypted, key);

    assert_eq!(
        encrypted.decrypt_async(b"wrong".to_vec(), None).await,
        Err(EnvelopeError::InvalidPassword)
    );
}

#[tokio::test]
async fn test_async_progress() {
    use std::sync::{Arc, Mutex};

    init_logging();
    let key: PrivateKey = R1_KEY.parse().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: Box<dyn FnMut(f64) + Send> =
        Box::new(move |fraction| sink.lock().unwrap().push(fraction));

    EncryptedPrivateKey::encrypt_async(key, b"pw".to_vec(), SecurityLevel::new(0), Some(progress))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().copied(), Some(1.0));
}
