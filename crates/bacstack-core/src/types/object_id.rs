use crate::types::ObjectType;
use crate::EncodeError;
use core::fmt;

/// A packed BACnet object identifier: a 10-bit object type over a 22-bit
/// instance number, matching the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(u32);

impl ObjectId {
    pub const MAX_INSTANCE: u32 = 0x3F_FFFF;
    /// Instance number meaning "any instance" in device-addressed services.
    pub const WILDCARD_INSTANCE: u32 = Self::MAX_INSTANCE;
    const MAX_TYPE: u16 = 0x03FF;

    /// Packs a type and instance, masking both to their field widths.
    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self(
            (((object_type.to_u16() & Self::MAX_TYPE) as u32) << 22)
                | (instance & Self::MAX_INSTANCE),
        )
    }

    /// Packs a type and instance, rejecting parts that do not fit.
    pub const fn try_new(object_type: ObjectType, instance: u32) -> Result<Self, EncodeError> {
        if object_type.to_u16() > Self::MAX_TYPE || instance > Self::MAX_INSTANCE {
            return Err(EncodeError::ValueOutOfRange);
        }
        Ok(Self::new(object_type, instance))
    }

    /// The device object with the wildcard instance, as used by Who-Has
    /// style addressing and ReadProperty on "this device".
    pub const fn wildcard_device() -> Self {
        Self::new(ObjectType::Device, Self::WILDCARD_INSTANCE)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn object_type(self) -> ObjectType {
        ObjectType::from_u16(((self.0 >> 22) & 0x03FF) as u16)
    }

    pub const fn instance(self) -> u32 {
        self.0 & Self::MAX_INSTANCE
    }

    pub const fn is_wildcard(self) -> bool {
        self.instance() == Self::WILDCARD_INSTANCE
            || self.object_type().to_u16() == ObjectType::WILDCARD_CODE
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?},{}", self.object_type(), self.instance())
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectId;
    use crate::types::ObjectType;
    use crate::EncodeError;

    #[test]
    fn packs_type_and_instance() {
        let id = ObjectId::new(ObjectType::Device, 123);
        assert_eq!(id.raw(), 0x0200_007B);
        assert_eq!(id.object_type(), ObjectType::Device);
        assert_eq!(id.instance(), 123);
    }

    #[test]
    fn checked_constructor_rejects_overflow() {
        assert_eq!(
            ObjectId::try_new(ObjectType::AnalogInput, 1 << 22),
            Err(EncodeError::ValueOutOfRange)
        );
        assert_eq!(
            ObjectId::try_new(ObjectType::Proprietary(1024), 0),
            Err(EncodeError::ValueOutOfRange)
        );
        assert!(ObjectId::try_new(ObjectType::Proprietary(1023), 0).is_ok());
    }

    #[test]
    fn wildcards() {
        assert!(ObjectId::wildcard_device().is_wildcard());
        assert!(!ObjectId::new(ObjectType::Device, 1).is_wildcard());
    }
}
