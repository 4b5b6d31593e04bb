use crate::encoding::{encode_to_vec, reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

/// BACnet network layer protocol version (always `0x01`).
pub const NPDU_VERSION: u8 = 0x01;

const CONTROL_NETWORK_MESSAGE: u8 = 0x80;
const CONTROL_RESERVED: u8 = 0x40 | 0x10;
const CONTROL_DESTINATION: u8 = 0x20;
const CONTROL_SOURCE: u8 = 0x08;
const CONTROL_EXPECTING_REPLY: u8 = 0x04;
const CONTROL_PRIORITY: u8 = 0x03;

/// Hop count given to messages this stack originates.
pub const DEFAULT_HOP_COUNT: u8 = 255;
/// DNET value addressing every network.
pub const GLOBAL_BROADCAST_NETWORK: u16 = 0xFFFF;

/// A network number plus MAC address as carried in DNET/DADR or SNET/SADR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NpduAddress {
    pub network: u16,
    /// Empty for a broadcast on `network` (destination only).
    pub mac: Vec<u8>,
}

impl NpduAddress {
    pub fn new(network: u16, mac: impl Into<Vec<u8>>) -> Self {
        Self {
            network,
            mac: mac.into(),
        }
    }
}

/// Routing destination. The hop count only exists alongside a destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NpduDestination {
    pub address: NpduAddress,
    pub hop_count: u8,
}

/// Network-layer message header. `vendor_id` is present iff `message_type`
/// is in the proprietary range (0x80 and above).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkMessage {
    pub message_type: u8,
    pub vendor_id: Option<u16>,
}

/// BACnet Network Protocol Data Unit.
///
/// `payload` holds the APDU, or the network-layer message body when
/// `network_message` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npdu {
    pub expecting_reply: bool,
    pub priority: u8,
    pub destination: Option<NpduDestination>,
    pub source: Option<NpduAddress>,
    pub network_message: Option<NetworkMessage>,
    pub payload: Vec<u8>,
}

impl Npdu {
    /// A local, normal-priority NPDU carrying `apdu`.
    pub fn new(apdu: impl Into<Vec<u8>>) -> Self {
        Self {
            expecting_reply: false,
            priority: 0,
            destination: None,
            source: None,
            network_message: None,
            payload: apdu.into(),
        }
    }

    pub fn with_expecting_reply(mut self, expecting_reply: bool) -> Self {
        self.expecting_reply = expecting_reply;
        self
    }

    pub fn with_destination(mut self, address: NpduAddress) -> Self {
        self.destination = Some(NpduDestination {
            address,
            hop_count: DEFAULT_HOP_COUNT,
        });
        self
    }

    pub fn with_source(mut self, address: NpduAddress) -> Self {
        self.source = Some(address);
        self
    }

    pub fn is_network_message(&self) -> bool {
        self.network_message.is_some()
    }

    fn control(&self) -> Result<u8, EncodeError> {
        if self.priority > CONTROL_PRIORITY {
            return Err(EncodeError::ValueOutOfRange);
        }
        let mut control = self.priority;
        if self.network_message.is_some() {
            control |= CONTROL_NETWORK_MESSAGE;
        }
        if self.destination.is_some() {
            control |= CONTROL_DESTINATION;
        }
        if self.source.is_some() {
            control |= CONTROL_SOURCE;
        }
        if self.expecting_reply {
            control |= CONTROL_EXPECTING_REPLY;
        }
        Ok(control)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(NPDU_VERSION)?;
        w.write_u8(self.control()?)?;

        if let Some(dest) = &self.destination {
            encode_addr(w, &dest.address)?;
        }
        if let Some(src) = &self.source {
            if src.mac.is_empty() {
                return Err(EncodeError::InvalidLength);
            }
            encode_addr(w, src)?;
        }
        if let Some(dest) = &self.destination {
            w.write_u8(dest.hop_count)?;
        }
        if let Some(msg) = self.network_message {
            w.write_u8(msg.message_type)?;
            match (msg.message_type >= 0x80, msg.vendor_id) {
                (true, Some(vendor)) => w.write_be_u16(vendor)?,
                (false, None) => {}
                _ => {
                    return Err(EncodeError::Message(
                        "vendor id must accompany proprietary message types",
                    ))
                }
            }
        }
        w.write_all(&self.payload)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version_at = r.position();
        if r.read_u8()? != NPDU_VERSION {
            return Err(DecodeError::UnsupportedPduType { offset: version_at });
        }

        let control_at = r.position();
        let control = r.read_u8()?;
        if control & CONTROL_RESERVED != 0 {
            return Err(DecodeError::ReservedFieldNonzero { offset: control_at });
        }

        let destination = if control & CONTROL_DESTINATION != 0 {
            Some(decode_addr(r)?)
        } else {
            None
        };
        let source = if control & CONTROL_SOURCE != 0 {
            let at = r.position();
            let addr = decode_addr(r)?;
            if addr.mac.is_empty() {
                return Err(DecodeError::InvalidLength { offset: at + 2 });
            }
            Some(addr)
        } else {
            None
        };
        let destination = match destination {
            Some(address) => Some(NpduDestination {
                address,
                hop_count: r.read_u8()?,
            }),
            None => None,
        };

        let network_message = if control & CONTROL_NETWORK_MESSAGE != 0 {
            let message_type = r.read_u8()?;
            let vendor_id = if message_type >= 0x80 {
                Some(r.read_be_u16()?)
            } else {
                None
            };
            Some(NetworkMessage {
                message_type,
                vendor_id,
            })
        } else {
            None
        };

        Ok(Self {
            expecting_reply: control & CONTROL_EXPECTING_REPLY != 0,
            priority: control & CONTROL_PRIORITY,
            destination,
            source,
            network_message,
            payload: r.rest().to_vec(),
        })
    }
}

fn encode_addr(w: &mut Writer<'_>, addr: &NpduAddress) -> Result<(), EncodeError> {
    let len = u8::try_from(addr.mac.len()).map_err(|_| EncodeError::InvalidLength)?;
    w.write_be_u16(addr.network)?;
    w.write_u8(len)?;
    w.write_all(&addr.mac)
}

fn decode_addr(r: &mut Reader<'_>) -> Result<NpduAddress, DecodeError> {
    let network = r.read_be_u16()?;
    let len = r.read_u8()?;
    let mac = r.read_exact(usize::from(len))?.to_vec();
    Ok(NpduAddress { network, mac })
}

pub fn encode_npdu(npdu: &Npdu) -> Result<Vec<u8>, EncodeError> {
    encode_to_vec(|w| npdu.encode(w))
}

pub fn decode_npdu(buf: &[u8]) -> Result<Npdu, DecodeError> {
    Npdu::decode(&mut Reader::new(buf))
}
