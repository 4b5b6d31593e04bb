/// Encode/decode functions for BACnet primitive and application data types.
pub mod primitives;
/// Bounds-checked byte reader that tracks its offset for error reporting.
pub mod reader;
/// BACnet tag headers (application, context, opening/closing).
pub mod tag;
/// Owned tagged-value tree with explicit nesting checks.
pub mod tagged;
/// Byte writer for encoding BACnet frames into a caller-owned buffer.
pub mod writer;

use crate::EncodeError;
use alloc::vec;
use alloc::vec::Vec;
use writer::Writer;

const INITIAL_ENCODE_CAPACITY: usize = 512;
const MAX_ENCODE_CAPACITY: usize = 2 * 1024 * 1024;

/// Runs `f` against a scratch buffer, doubling it on `BufferTooSmall`, and
/// returns the written bytes.
pub fn encode_to_vec<F>(mut f: F) -> Result<Vec<u8>, EncodeError>
where
    F: FnMut(&mut Writer<'_>) -> Result<(), EncodeError>,
{
    let mut size = INITIAL_ENCODE_CAPACITY;
    loop {
        let mut buf = vec![0u8; size];
        let mut w = Writer::new(&mut buf);
        match f(&mut w) {
            Ok(()) => {
                let len = w.position();
                buf.truncate(len);
                return Ok(buf);
            }
            Err(EncodeError::BufferTooSmall) if size < MAX_ENCODE_CAPACITY => {
                size = (size * 2).min(MAX_ENCODE_CAPACITY);
            }
            Err(e) => return Err(e),
        }
    }
}
