//! BACnet protocol encoding and decoding in pure Rust.
//!
//! `bacstack-core` turns BACnet network-layer envelopes (NPDUs), application
//! messages (APDUs), tagged values, and service parameters into bytes and
//! back. Everything here is a pure function of its input: no I/O, no clocks,
//! no shared state. The transaction and segmentation machinery that drives
//! these codecs lives in `bacstack-engine`.
//!
//! # Feature flags
//!
//! - **`std`** (default): enables `std::error::Error` implementations.
//! - **`serde`**: derives `Serialize`/`Deserialize` on identifiers, enums and values.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// APDU (Application Protocol Data Unit) kinds and their wire layout.
pub mod apdu;
/// Binary encoding primitives, tag system, and bounded reader/writer.
pub mod encoding;
/// Error types for encoding and decoding operations.
pub mod error;
/// NPDU (Network Protocol Data Unit) encoding and decoding.
pub mod npdu;
/// BACnet service parameter codecs.
pub mod services;
/// Core BACnet data types: object identifiers, property identifiers, values.
pub mod types;

pub use apdu::{decode_apdu, encode_apdu, Apdu};
pub use encoding::tagged::{decode_tag, encode_tag, TaggedValue};
pub use error::{DecodeError, EncodeError};
pub use npdu::{decode_npdu, encode_npdu, Npdu};
