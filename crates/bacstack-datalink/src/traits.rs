use crate::Address;
use std::future::Future;
use thiserror::Error;

/// Errors that can occur at the data-link layer.
#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large")]
    FrameTooLarge,
    #[error("invalid frame")]
    InvalidFrame,
    #[error("address {0} already attached")]
    AddressInUse(Address),
    #[error("data link closed")]
    Closed,
}

/// Datagram transport keyed by link-level [`Address`].
///
/// Addresses handed to and returned from a data link use the link's own MAC
/// format; an empty MAC means a local broadcast. Network routing fields are
/// the caller's business and travel inside the NPDU.
pub trait DataLink: Send + Sync {
    /// Sends `payload` to the given link address.
    fn send(
        &self,
        address: &Address,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), DataLinkError>> + Send;

    /// Receives a frame into `buf`, returning `(bytes_read, source_address)`.
    ///
    /// Returns [`DataLinkError::Closed`] once no more frames can arrive.
    fn recv(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(usize, Address), DataLinkError>> + Send;
}
