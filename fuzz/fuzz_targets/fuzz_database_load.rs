#![no_main]
use libfuzzer_sys::fuzz_target;
use qqwry::validation::{validate_bytes, ValidationLevel};

fuzz_target!(|data: &[u8]| {
    // Loading and validating garbage must never panic
    let _ = validate_bytes(data, ValidationLevel::Strict);
    if let Ok(db) = qqwry::Database::from_bytes(data.to_vec()) {
        let _ = db.version();
    }
});
