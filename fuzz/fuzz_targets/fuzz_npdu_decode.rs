#![no_main]

use bacstack_core::{decode_npdu, encode_npdu};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(npdu) = decode_npdu(data) else {
        return;
    };
    if let Ok(bytes) = encode_npdu(&npdu) {
        assert_eq!(decode_npdu(&bytes).expect("re-encoded npdu decodes"), npdu);
    }
});
