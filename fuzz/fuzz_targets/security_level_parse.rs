#![no_main]

use libfuzzer_sys::fuzz_target;
use seckey_core::SecurityLevel;

fuzz_target!(|data: &[u8]| {
    // Parsing must never panic, and every parsed level must pack back from its params.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(level) = s.parse::<SecurityLevel>() {
            assert_eq!(SecurityLevel::from_params(&level.params()), Ok(level));
        }
    }
});
