use bacstack_core::services::ServiceError;
use bacstack_core::types::{AbortReason, ErrorClass, ErrorCode, RejectReason};
use bacstack_core::{DecodeError, EncodeError};
use bacstack_datalink::DataLinkError;
use thiserror::Error;

/// A failure reported by the remote device.
///
/// Raw codes are kept as received so vendor-specific values survive; the
/// accessors map them onto the standard enumerations where possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("remote error class {error_class} code {error_code} for service choice {service_choice}")]
    Error {
        service_choice: u8,
        error_class: u32,
        error_code: u32,
    },
    #[error("remote reject reason {reason}")]
    Reject { reason: u8 },
    #[error("remote abort reason {reason} (server={server})")]
    Abort { reason: u8, server: bool },
}

impl ProtocolError {
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Error { error_class, .. } => ErrorClass::from_u32(*error_class),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { error_code, .. } => Some(ErrorCode::from_u32(*error_code)),
            _ => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Reject { reason } => RejectReason::from_u8(*reason),
            _ => None,
        }
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Abort { reason, .. } => AbortReason::from_u8(*reason),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("response did not decode: {0}")]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("request timed out")]
    Timeout,
    #[error("invoke id {invoke_id} already in use toward this peer")]
    InvokeIdInUse { invoke_id: u8 },
    #[error("apdu too long")]
    ApduTooLong,
    #[error("unrecognized service choice {0}")]
    UnrecognizedService(u8),
    #[error("segmentation not supported")]
    SegmentationNotSupported,
    #[error("transaction aborted locally: {0:?}")]
    Aborted(AbortReason),
    #[error("device communication disabled")]
    CommunicationDisabled,
    #[error("unexpected response for service choice {service_choice}")]
    UnexpectedResponse { service_choice: u8 },
    #[error("request cancelled")]
    Cancelled,
    #[error("engine shut down")]
    Shutdown,
}

impl EngineError {
    /// The remote failure, if the peer answered with Error, Reject or Abort.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(p) => Some(p),
            _ => None,
        }
    }
}
