#![no_main]

use bacstack_core::decode_tag;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cursor = 0;
    while cursor < data.len() {
        match decode_tag(data, cursor) {
            Ok((_, next)) => {
                assert!(next > cursor && next <= data.len());
                cursor = next;
            }
            Err(_) => break,
        }
    }
});
