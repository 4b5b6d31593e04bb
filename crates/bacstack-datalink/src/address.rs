use core::fmt;
use std::net::SocketAddr;

/// A BACnet endpoint: network number plus MAC.
///
/// Network 0 is the local network, `0xFFFF` is the global broadcast. An empty
/// MAC is a broadcast on that network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    network: u16,
    mac: Vec<u8>,
}

impl Address {
    pub const LOCAL_NETWORK: u16 = 0;
    pub const GLOBAL_BROADCAST_NETWORK: u16 = 0xFFFF;

    pub fn local(mac: impl Into<Vec<u8>>) -> Self {
        Self::remote(Self::LOCAL_NETWORK, mac)
    }

    pub fn remote(network: u16, mac: impl Into<Vec<u8>>) -> Self {
        Self {
            network,
            mac: mac.into(),
        }
    }

    pub fn local_broadcast() -> Self {
        Self::local(Vec::new())
    }

    pub fn global_broadcast() -> Self {
        Self::remote(Self::GLOBAL_BROADCAST_NETWORK, Vec::new())
    }

    /// Six-octet BACnet/IP style MAC (IPv4 address then port).
    ///
    /// IPv6 socket addresses map to their 16 address octets plus port.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        let mut mac = match addr {
            SocketAddr::V4(v4) => v4.ip().octets().to_vec(),
            SocketAddr::V6(v6) => v6.ip().octets().to_vec(),
        };
        mac.extend_from_slice(&addr.port().to_be_bytes());
        Self::local(mac)
    }

    pub const fn network(&self) -> u16 {
        self.network
    }

    pub fn mac(&self) -> &[u8] {
        &self.mac
    }

    pub const fn is_local(&self) -> bool {
        self.network == Self::LOCAL_NETWORK
    }

    pub fn is_broadcast(&self) -> bool {
        self.mac.is_empty()
    }

    pub fn is_global_broadcast(&self) -> bool {
        self.network == Self::GLOBAL_BROADCAST_NETWORK
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global_broadcast() {
            return f.write_str("*:*");
        }
        write!(f, "{}:", self.network)?;
        if self.mac.is_empty() {
            return f.write_str("*");
        }
        for (i, b) in self.mac.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
