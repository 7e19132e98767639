#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs.
    if let Ok(batch) = sefaz::distribution::parse_distribution_response(data) {
        let _ = sefaz::distribution::decode_batch(batch);
    }
});
