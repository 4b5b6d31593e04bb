//! Service parameter codecs and the closed sets of services this stack
//! speaks.
//!
//! Each service module encodes and decodes only the service data that
//! follows the APDU header. [`ConfirmedServiceRequest`],
//! [`UnconfirmedServiceRequest`] and [`ConfirmedServiceAck`] tie a service
//! choice to its parameters.

pub mod cov_notification;
pub mod device_management;
pub mod i_am;
pub mod read_property;
pub mod read_property_multiple;
pub mod subscribe_cov;
pub mod who_is;
pub mod write_property;

use crate::encoding::{encode_to_vec, reader::Reader, writer::Writer};
use crate::types::RejectReason;
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;
use core::fmt;

pub use cov_notification::{
    CovNotificationRequest, CovPropertyValue, SERVICE_CONFIRMED_COV_NOTIFICATION,
    SERVICE_UNCONFIRMED_COV_NOTIFICATION,
};
pub use device_management::{
    DeviceCommunicationControlRequest, DeviceCommunicationState,
    SERVICE_DEVICE_COMMUNICATION_CONTROL,
};
pub use i_am::{IAmRequest, SERVICE_I_AM};
pub use read_property::{ReadPropertyAck, ReadPropertyRequest, SERVICE_READ_PROPERTY};
pub use read_property_multiple::{
    PropertyReference, PropertyResult, ReadAccessResult, ReadAccessSpec, ReadPropertyMultipleAck,
    ReadPropertyMultipleRequest, ReadResult, SERVICE_READ_PROPERTY_MULTIPLE,
};
pub use subscribe_cov::{SubscribeCovRequest, SERVICE_SUBSCRIBE_COV};
pub use who_is::{WhoIsRequest, SERVICE_WHO_IS};
pub use write_property::{WritePropertyRequest, SERVICE_WRITE_PROPERTY};

/// Why service data could not be turned into service parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// No codec exists for this service choice.
    Unrecognized(u8),
    Malformed(DecodeError),
    /// The parameters decoded but octets remained at `offset`.
    TooManyArguments { offset: usize },
}

impl ServiceError {
    /// The reason a server reports when rejecting a request for this error.
    pub const fn reject_reason(self) -> RejectReason {
        match self {
            Self::Unrecognized(_) => RejectReason::UnrecognizedService,
            Self::TooManyArguments { .. } => RejectReason::TooManyArguments,
            Self::Malformed(DecodeError::TruncatedInput { .. }) => {
                RejectReason::MissingRequiredParameter
            }
            Self::Malformed(DecodeError::InvalidTag { .. }) => RejectReason::InvalidTag,
            Self::Malformed(DecodeError::InvalidLength { .. }) => {
                RejectReason::InvalidParameterDataType
            }
            Self::Malformed(_) => RejectReason::Other,
        }
    }
}

impl From<DecodeError> for ServiceError {
    fn from(e: DecodeError) -> Self {
        Self::Malformed(e)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(choice) => write!(f, "unrecognized service choice {choice}"),
            Self::Malformed(e) => write!(f, "malformed service data: {e}"),
            Self::TooManyArguments { offset } => {
                write!(f, "unexpected service data at offset {offset}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ServiceError {}

fn decode_exact<T>(
    data: &[u8],
    decode: impl FnOnce(&mut Reader<'_>) -> Result<T, DecodeError>,
) -> Result<T, ServiceError> {
    let mut r = Reader::new(data);
    let value = decode(&mut r)?;
    if !r.is_empty() {
        return Err(ServiceError::TooManyArguments {
            offset: r.position(),
        });
    }
    Ok(value)
}

/// A confirmed service request with decoded parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedServiceRequest {
    ReadProperty(ReadPropertyRequest),
    ReadPropertyMultiple(ReadPropertyMultipleRequest),
    WriteProperty(WritePropertyRequest),
    SubscribeCov(SubscribeCovRequest),
    DeviceCommunicationControl(DeviceCommunicationControlRequest),
    ConfirmedCovNotification(CovNotificationRequest),
}

impl ConfirmedServiceRequest {
    pub fn service_choice(&self) -> u8 {
        match self {
            Self::ReadProperty(_) => SERVICE_READ_PROPERTY,
            Self::ReadPropertyMultiple(_) => SERVICE_READ_PROPERTY_MULTIPLE,
            Self::WriteProperty(_) => SERVICE_WRITE_PROPERTY,
            Self::SubscribeCov(_) => SERVICE_SUBSCRIBE_COV,
            Self::DeviceCommunicationControl(_) => SERVICE_DEVICE_COMMUNICATION_CONTROL,
            Self::ConfirmedCovNotification(_) => SERVICE_CONFIRMED_COV_NOTIFICATION,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::ReadProperty(p) => p.encode(w),
            Self::ReadPropertyMultiple(p) => p.encode(w),
            Self::WriteProperty(p) => p.encode(w),
            Self::SubscribeCov(p) => p.encode(w),
            Self::DeviceCommunicationControl(p) => p.encode(w),
            Self::ConfirmedCovNotification(p) => p.encode(w),
        }
    }

    /// Service data octets, ready to go after a Confirmed-Request header.
    pub fn to_service_data(&self) -> Result<Vec<u8>, EncodeError> {
        encode_to_vec(|w| self.encode(w))
    }

    pub fn decode(service_choice: u8, data: &[u8]) -> Result<Self, ServiceError> {
        Ok(match service_choice {
            SERVICE_READ_PROPERTY => {
                Self::ReadProperty(decode_exact(data, ReadPropertyRequest::decode)?)
            }
            SERVICE_READ_PROPERTY_MULTIPLE => {
                Self::ReadPropertyMultiple(decode_exact(data, ReadPropertyMultipleRequest::decode)?)
            }
            SERVICE_WRITE_PROPERTY => {
                Self::WriteProperty(decode_exact(data, WritePropertyRequest::decode)?)
            }
            SERVICE_SUBSCRIBE_COV => {
                Self::SubscribeCov(decode_exact(data, SubscribeCovRequest::decode)?)
            }
            SERVICE_DEVICE_COMMUNICATION_CONTROL => Self::DeviceCommunicationControl(
                decode_exact(data, DeviceCommunicationControlRequest::decode)?,
            ),
            SERVICE_CONFIRMED_COV_NOTIFICATION => {
                Self::ConfirmedCovNotification(decode_exact(data, CovNotificationRequest::decode)?)
            }
            other => return Err(ServiceError::Unrecognized(other)),
        })
    }
}

/// An unconfirmed service request with decoded parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum UnconfirmedServiceRequest {
    IAm(IAmRequest),
    WhoIs(WhoIsRequest),
    UnconfirmedCovNotification(CovNotificationRequest),
}

impl UnconfirmedServiceRequest {
    pub fn service_choice(&self) -> u8 {
        match self {
            Self::IAm(_) => SERVICE_I_AM,
            Self::WhoIs(_) => SERVICE_WHO_IS,
            Self::UnconfirmedCovNotification(_) => SERVICE_UNCONFIRMED_COV_NOTIFICATION,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::IAm(p) => p.encode(w),
            Self::WhoIs(p) => p.encode(w),
            Self::UnconfirmedCovNotification(p) => p.encode(w),
        }
    }

    pub fn to_service_data(&self) -> Result<Vec<u8>, EncodeError> {
        encode_to_vec(|w| self.encode(w))
    }

    pub fn decode(service_choice: u8, data: &[u8]) -> Result<Self, ServiceError> {
        Ok(match service_choice {
            SERVICE_I_AM => Self::IAm(decode_exact(data, IAmRequest::decode)?),
            SERVICE_WHO_IS => Self::WhoIs(decode_exact(data, WhoIsRequest::decode)?),
            SERVICE_UNCONFIRMED_COV_NOTIFICATION => Self::UnconfirmedCovNotification(
                decode_exact(data, CovNotificationRequest::decode)?,
            ),
            other => return Err(ServiceError::Unrecognized(other)),
        })
    }
}

/// The successful result of a confirmed request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedServiceAck {
    SimpleAck { service_choice: u8 },
    ReadProperty(ReadPropertyAck),
    ReadPropertyMultiple(ReadPropertyMultipleAck),
}

impl ConfirmedServiceAck {
    pub fn service_choice(&self) -> u8 {
        match self {
            Self::SimpleAck { service_choice } => *service_choice,
            Self::ReadProperty(_) => SERVICE_READ_PROPERTY,
            Self::ReadPropertyMultiple(_) => SERVICE_READ_PROPERTY_MULTIPLE,
        }
    }

    /// Service data of the Complex-ACK carrying this result. A simple
    /// acknowledgement has none.
    pub fn to_service_data(&self) -> Result<Option<Vec<u8>>, EncodeError> {
        match self {
            Self::SimpleAck { .. } => Ok(None),
            Self::ReadProperty(p) => encode_to_vec(|w| p.encode(w)).map(Some),
            Self::ReadPropertyMultiple(p) => encode_to_vec(|w| p.encode(w)).map(Some),
        }
    }

    /// Decodes the service data of a (reassembled) Complex-ACK.
    pub fn decode_complex(service_choice: u8, data: &[u8]) -> Result<Self, ServiceError> {
        Ok(match service_choice {
            SERVICE_READ_PROPERTY => {
                Self::ReadProperty(decode_exact(data, ReadPropertyAck::decode)?)
            }
            SERVICE_READ_PROPERTY_MULTIPLE => {
                Self::ReadPropertyMultiple(decode_exact(data, ReadPropertyMultipleAck::decode)?)
            }
            other => return Err(ServiceError::Unrecognized(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectId, ObjectType, PropertyId};

    #[test]
    fn dispatches_on_service_choice() {
        let data = [0x0C, 0x02, 0x00, 0x00, 0x7B, 0x19, 0x4D];
        let req = ConfirmedServiceRequest::decode(SERVICE_READ_PROPERTY, &data).unwrap();
        assert_eq!(
            req,
            ConfirmedServiceRequest::ReadProperty(ReadPropertyRequest::new(
                ObjectId::new(ObjectType::Device, 123),
                PropertyId::ObjectName
            ))
        );
        assert_eq!(req.to_service_data().unwrap(), data);
    }

    #[test]
    fn unknown_choice() {
        let err = ConfirmedServiceRequest::decode(0x1D, &[]).unwrap_err();
        assert_eq!(err, ServiceError::Unrecognized(0x1D));
        assert_eq!(err.reject_reason(), RejectReason::UnrecognizedService);
    }

    #[test]
    fn trailing_octets_are_too_many_arguments() {
        let data = [0x0C, 0x02, 0x00, 0x00, 0x7B, 0x19, 0x4D, 0x21, 0x00];
        let err = ConfirmedServiceRequest::decode(SERVICE_READ_PROPERTY, &data).unwrap_err();
        assert_eq!(err, ServiceError::TooManyArguments { offset: 7 });
        assert_eq!(err.reject_reason(), RejectReason::TooManyArguments);
    }

    #[test]
    fn missing_parameter_maps_to_reject_reason() {
        let err =
            ConfirmedServiceRequest::decode(SERVICE_READ_PROPERTY, &[0x0C, 0x02]).unwrap_err();
        assert_eq!(err.reject_reason(), RejectReason::MissingRequiredParameter);
    }
}
