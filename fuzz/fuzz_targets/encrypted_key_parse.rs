#![no_main]

use libfuzzer_sys::fuzz_target;
use seckey_core::EncryptedPrivateKey;

fuzz_target!(|data: &[u8]| {
    // Binary form: anything that decodes must re-encode to the same bytes.
    if let Ok(encrypted) = EncryptedPrivateKey::from_bytes(data) {
        assert_eq!(encrypted.to_bytes(), data);
        let _ = encrypted.to_string().parse::<EncryptedPrivateKey>();
    }

    // String form, with and without the prefix to reach the base58 decoder
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(encrypted) = s.parse::<EncryptedPrivateKey>() {
            assert_eq!(
                encrypted.to_string().parse::<EncryptedPrivateKey>().ok(),
                Some(encrypted)
            );
        }
        let _ = format!("SEC_K1_{}", s).parse::<EncryptedPrivateKey>();
    }
});
