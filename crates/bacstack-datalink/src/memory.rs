//! In-process transport for tests and demos.
//!
//! A [`MemoryNetwork`] is a shared segment; each [`MemoryDataLink`] attached
//! to it owns one MAC. Delivery is immediate, in order, and lossless; frames
//! to an unknown MAC vanish the way a UDP datagram to a dead host does.

use crate::{Address, DataLink, DataLinkError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Largest NPDU a BACnet/IP link carries.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1497;

struct Frame {
    source: Vec<u8>,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Nodes {
    inboxes: HashMap<Vec<u8>, mpsc::UnboundedSender<Frame>>,
}

#[derive(Clone)]
pub struct MemoryNetwork {
    nodes: Arc<Mutex<Nodes>>,
    max_frame_len: usize,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(Mutex::new(Nodes::default())),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    fn nodes(&self) -> MutexGuard<'_, Nodes> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a node with the given MAC.
    pub fn attach(&self, mac: impl Into<Vec<u8>>) -> Result<MemoryDataLink, DataLinkError> {
        let mac = mac.into();
        if mac.is_empty() {
            return Err(DataLinkError::InvalidFrame);
        }
        let mut nodes = self.nodes();
        if nodes.inboxes.contains_key(&mac) {
            return Err(DataLinkError::AddressInUse(Address::local(mac)));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        nodes.inboxes.insert(mac.clone(), tx);
        Ok(MemoryDataLink {
            mac,
            network: self.clone(),
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// Detaches a MAC; its link's `recv` then reports `Closed`.
    pub fn detach(&self, mac: &[u8]) {
        self.nodes().inboxes.remove(mac);
    }

    pub fn node_count(&self) -> usize {
        self.nodes().inboxes.len()
    }

    fn deliver(&self, source: &[u8], dest: &Address, payload: &[u8]) -> Result<(), DataLinkError> {
        if payload.len() > self.max_frame_len {
            return Err(DataLinkError::FrameTooLarge);
        }
        let nodes = self.nodes();
        if dest.is_broadcast() {
            for (mac, inbox) in &nodes.inboxes {
                if mac.as_slice() == source {
                    continue;
                }
                let _ = inbox.send(Frame {
                    source: source.to_vec(),
                    payload: payload.to_vec(),
                });
            }
            return Ok(());
        }
        match nodes.inboxes.get(dest.mac()) {
            Some(inbox) => {
                let _ = inbox.send(Frame {
                    source: source.to_vec(),
                    payload: payload.to_vec(),
                });
            }
            None => log::trace!("memory link: no node at {dest}, frame dropped"),
        }
        Ok(())
    }
}

pub struct MemoryDataLink {
    mac: Vec<u8>,
    network: MemoryNetwork,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryDataLink {
    pub fn mac(&self) -> &[u8] {
        &self.mac
    }

    pub fn address(&self) -> Address {
        Address::local(self.mac.clone())
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Drop for MemoryDataLink {
    fn drop(&mut self) {
        self.network.detach(&self.mac);
    }
}

impl DataLink for MemoryDataLink {
    async fn send(&self, address: &Address, payload: &[u8]) -> Result<(), DataLinkError> {
        self.network.deliver(&self.mac, address, payload)
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Address), DataLinkError> {
        let frame = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(DataLinkError::Closed)?;
        let n = frame.payload.len();
        if n > buf.len() {
            return Err(DataLinkError::FrameTooLarge);
        }
        buf[..n].copy_from_slice(&frame.payload);
        Ok((n, Address::local(frame.source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn unicast_reaches_only_target() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        let b = net.attach([2]).unwrap();
        let c = net.attach([3]).unwrap();

        a.send(&Address::local([2]), &[0xAA, 0xBB]).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, src) = b.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB]);
        assert_eq!(src, Address::local([1]));

        let idle = timeout(Duration::from_millis(20), c.recv(&mut buf)).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_sender() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        let b = net.attach([2]).unwrap();
        let c = net.attach([3]).unwrap();

        a.send(&Address::local_broadcast(), &[7]).await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(b.recv(&mut buf).await.unwrap().0, 1);
        assert_eq!(c.recv(&mut buf).await.unwrap().0, 1);
        let own = timeout(Duration::from_millis(20), a.recv(&mut buf)).await;
        assert!(own.is_err());
    }

    #[tokio::test]
    async fn unknown_destination_is_silently_dropped() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        a.send(&Address::local([9]), &[1]).await.unwrap();
    }

    #[tokio::test]
    async fn oversize_frame_rejected() {
        let net = MemoryNetwork::new().with_max_frame_len(4);
        let a = net.attach([1]).unwrap();
        let _b = net.attach([2]).unwrap();
        let err = a.send(&Address::local([2]), &[0; 5]).await.unwrap_err();
        assert!(matches!(err, DataLinkError::FrameTooLarge));
    }

    #[tokio::test]
    async fn short_receive_buffer_rejected() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        let b = net.attach([2]).unwrap();
        a.send(&Address::local([2]), &[0; 8]).await.unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            b.recv(&mut buf).await,
            Err(DataLinkError::FrameTooLarge)
        ));
    }

    #[test]
    fn duplicate_and_empty_macs_rejected() {
        let net = MemoryNetwork::new();
        let _a = net.attach([1]).unwrap();
        assert!(matches!(
            net.attach([1]),
            Err(DataLinkError::AddressInUse(_))
        ));
        assert!(matches!(
            net.attach(Vec::new()),
            Err(DataLinkError::InvalidFrame)
        ));
    }

    #[tokio::test]
    async fn detach_closes_receiver() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        net.detach(&[1]);
        let mut buf = [0u8; 4];
        assert!(matches!(a.recv(&mut buf).await, Err(DataLinkError::Closed)));
    }

    #[test]
    fn drop_detaches_node() {
        let net = MemoryNetwork::new();
        let a = net.attach([1]).unwrap();
        assert_eq!(net.node_count(), 1);
        drop(a);
        assert_eq!(net.node_count(), 0);
        assert!(net.attach([1]).is_ok());
    }
}
