#![no_main]

use bacstack_core::services::{
    ConfirmedServiceAck, ConfirmedServiceRequest, UnconfirmedServiceRequest,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&choice, body)) = data.split_first() else {
        return;
    };
    let _ = ConfirmedServiceRequest::decode(choice, body);
    let _ = UnconfirmedServiceRequest::decode(choice, body);
    let _ = ConfirmedServiceAck::decode_complex(choice, body);
});
