#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Canonical output must itself canonicalize to the same bytes.
        if let Ok(once) = sefaz::xml::canonicalize_document(s) {
            let text = std::str::from_utf8(&once).expect("canonical output is UTF-8");
            let twice = sefaz::xml::canonicalize_document(text).expect("canonical output parses");
            assert_eq!(once, twice);
        }
    }
});
