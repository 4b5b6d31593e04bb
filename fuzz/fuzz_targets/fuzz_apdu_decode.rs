#![no_main]

use bacstack_core::{decode_apdu, encode_apdu};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(apdu) = decode_apdu(data) else {
        return;
    };
    // Window sizes outside 1..=127 decode but are refused on encode.
    if let Ok(bytes) = encode_apdu(&apdu) {
        assert_eq!(decode_apdu(&bytes).expect("re-encoded apdu decodes"), apdu);
    }
});
