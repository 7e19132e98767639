#![no_main]

use libfuzzer_sys::fuzz_target;
use sefaz::core::Nsu;

fuzz_target!(|data: &[u8]| {
    let _ = sefaz::distribution::map_nfe_proc(Nsu(1), "procNFe_v4.00.xsd", data);
});
