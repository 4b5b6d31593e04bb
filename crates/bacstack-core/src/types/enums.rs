/// Segmentation capability advertised in I-Am and used to size transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Segmentation {
    SegmentedBoth = 0,
    SegmentedTransmit = 1,
    SegmentedReceive = 2,
    NoSegmentation = 3,
}

impl Segmentation {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::SegmentedBoth),
            1 => Some(Self::SegmentedTransmit),
            2 => Some(Self::SegmentedReceive),
            3 => Some(Self::NoSegmentation),
            _ => None,
        }
    }

    pub const fn can_transmit(self) -> bool {
        matches!(self, Self::SegmentedBoth | Self::SegmentedTransmit)
    }

    pub const fn can_receive(self) -> bool {
        matches!(self, Self::SegmentedBoth | Self::SegmentedReceive)
    }
}

/// Maximum APDU length code carried in a Confirmed-Request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MaxApdu {
    UpTo50 = 0,
    UpTo128 = 1,
    UpTo206 = 2,
    UpTo480 = 3,
    UpTo1024 = 4,
    UpTo1476 = 5,
}

impl MaxApdu {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::UpTo50),
            1 => Some(Self::UpTo128),
            2 => Some(Self::UpTo206),
            3 => Some(Self::UpTo480),
            4 => Some(Self::UpTo1024),
            5 => Some(Self::UpTo1476),
            _ => None,
        }
    }

    pub const fn octets(self) -> usize {
        match self {
            Self::UpTo50 => 50,
            Self::UpTo128 => 128,
            Self::UpTo206 => 206,
            Self::UpTo480 => 480,
            Self::UpTo1024 => 1024,
            Self::UpTo1476 => 1476,
        }
    }

    /// Largest code whose length does not exceed `len`.
    pub const fn from_octets(len: usize) -> Self {
        if len >= 1476 {
            Self::UpTo1476
        } else if len >= 1024 {
            Self::UpTo1024
        } else if len >= 480 {
            Self::UpTo480
        } else if len >= 206 {
            Self::UpTo206
        } else if len >= 128 {
            Self::UpTo128
        } else {
            Self::UpTo50
        }
    }
}

/// Maximum number of segments a requester will accept in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MaxSegments {
    Unspecified = 0,
    Two = 1,
    Four = 2,
    Eight = 3,
    Sixteen = 4,
    ThirtyTwo = 5,
    SixtyFour = 6,
    MoreThanSixtyFour = 7,
}

impl MaxSegments {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Two),
            2 => Some(Self::Four),
            3 => Some(Self::Eight),
            4 => Some(Self::Sixteen),
            5 => Some(Self::ThirtyTwo),
            6 => Some(Self::SixtyFour),
            7 => Some(Self::MoreThanSixtyFour),
            _ => None,
        }
    }

    /// Segment limit, or `None` when the peer did not state one.
    pub const fn count(self) -> Option<usize> {
        match self {
            Self::Unspecified | Self::MoreThanSixtyFour => None,
            Self::Two => Some(2),
            Self::Four => Some(4),
            Self::Eight => Some(8),
            Self::Sixteen => Some(16),
            Self::ThirtyTwo => Some(32),
            Self::SixtyFour => Some(64),
        }
    }

    /// Largest code whose count does not exceed `count`.
    pub const fn from_count(count: usize) -> Self {
        match count {
            0 | 1 => Self::Unspecified,
            2 | 3 => Self::Two,
            4..=7 => Self::Four,
            8..=15 => Self::Eight,
            16..=31 => Self::Sixteen,
            32..=63 => Self::ThirtyTwo,
            64 => Self::SixtyFour,
            _ => Self::MoreThanSixtyFour,
        }
    }
}

/// BACnet error class reported in Error PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorClass {
    Device = 0,
    Object = 1,
    Property = 2,
    Resources = 3,
    Security = 4,
    Services = 5,
    Vt = 6,
    Communication = 7,
}

impl ErrorClass {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Device),
            1 => Some(Self::Object),
            2 => Some(Self::Property),
            3 => Some(Self::Resources),
            4 => Some(Self::Security),
            5 => Some(Self::Services),
            6 => Some(Self::Vt),
            7 => Some(Self::Communication),
            _ => None,
        }
    }
}

numbered_enum! {
    /// BACnet error code reported in Error PDUs.
    pub enum ErrorCode(u32) via to_u32 / from_u32 {
        Other = 0,
        ConfigurationInProgress = 2,
        DeviceBusy = 3,
        DynamicCreationNotSupported = 4,
        FileAccessDenied = 5,
        InconsistentParameters = 7,
        InconsistentSelectionCriterion = 8,
        InvalidDataType = 9,
        InvalidFileAccessMethod = 10,
        InvalidFileStartPosition = 11,
        InvalidParameterDataType = 13,
        InvalidTimeStamp = 14,
        MissingRequiredParameter = 16,
        NoObjectsOfSpecifiedType = 17,
        NoSpaceForObject = 18,
        NoSpaceToAddListElement = 19,
        NoSpaceToWriteProperty = 20,
        NoVtSessionsAvailable = 21,
        PropertyIsNotAList = 22,
        ObjectDeletionNotPermitted = 23,
        ObjectIdentifierAlreadyExists = 24,
        OperationalProblem = 25,
        PasswordFailure = 26,
        ReadAccessDenied = 27,
        ServiceRequestDenied = 29,
        Timeout = 30,
        UnknownObject = 31,
        UnknownProperty = 32,
        UnknownVtClass = 34,
        UnknownVtSession = 35,
        UnsupportedObjectType = 36,
        ValueOutOfRange = 37,
        VtSessionAlreadyClosed = 38,
        VtSessionTerminationFailure = 39,
        WriteAccessDenied = 40,
        CharacterSetNotSupported = 41,
        InvalidArrayIndex = 42,
        CovSubscriptionFailed = 43,
        NotCovProperty = 44,
        OptionalFunctionalityNotSupported = 45,
        InvalidConfigurationData = 46,
        DatatypeNotSupported = 47,
        DuplicateName = 48,
        DuplicateObjectId = 49,
        PropertyIsNotAnArray = 50,
        AbortBufferOverflow = 51,
        AbortInvalidApduInThisState = 52,
        AbortPreemptedByHigherPriorityTask = 53,
        AbortSegmentationNotSupported = 54,
        AbortProprietary = 55,
        AbortOther = 56,
        InvalidTag = 57,
        NetworkDown = 58,
        RejectBufferOverflow = 59,
        RejectInconsistentParameters = 60,
        RejectInvalidParameterDataType = 61,
        RejectInvalidTag = 62,
        RejectMissingRequiredParameter = 63,
        RejectParameterOutOfRange = 64,
        RejectTooManyArguments = 65,
        RejectUndefinedEnumeration = 66,
        RejectUnrecognizedService = 67,
        RejectProprietary = 68,
        RejectOther = 69,
        UnknownDevice = 70,
        UnknownRoute = 71,
        ValueNotInitialized = 72,
        InvalidEventState = 73,
        NoAlarmConfigured = 74,
        LogBufferFull = 75,
        LoggedValuePurged = 76,
        NoPropertySpecified = 77,
        NotConfiguredForTriggeredLogging = 78,
        UnknownSubscription = 79,
        ParameterOutOfRange = 80,
        ListElementNotFound = 81,
        Busy = 82,
        CommunicationDisabled = 83,
    }
    fallback Proprietary
}

/// Reason codes carried in a Reject PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RejectReason {
    Other = 0,
    BufferOverflow = 1,
    InconsistentParameters = 2,
    InvalidParameterDataType = 3,
    InvalidTag = 4,
    MissingRequiredParameter = 5,
    ParameterOutOfRange = 6,
    TooManyArguments = 7,
    UndefinedEnumeration = 8,
    UnrecognizedService = 9,
}

impl RejectReason {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Other),
            1 => Some(Self::BufferOverflow),
            2 => Some(Self::InconsistentParameters),
            3 => Some(Self::InvalidParameterDataType),
            4 => Some(Self::InvalidTag),
            5 => Some(Self::MissingRequiredParameter),
            6 => Some(Self::ParameterOutOfRange),
            7 => Some(Self::TooManyArguments),
            8 => Some(Self::UndefinedEnumeration),
            9 => Some(Self::UnrecognizedService),
            _ => None,
        }
    }
}

/// Reason codes carried in an Abort PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AbortReason {
    Other = 0,
    BufferOverflow = 1,
    InvalidApduInThisState = 2,
    PreemptedByHigherPriorityTask = 3,
    SegmentationNotSupported = 4,
    SecurityError = 5,
    InsufficientSecurity = 6,
    WindowSizeOutOfRange = 7,
    ApplicationExceededReplyTime = 8,
    OutOfResources = 9,
    TsmTimeout = 10,
    ApduTooLong = 11,
}

impl AbortReason {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Other),
            1 => Some(Self::BufferOverflow),
            2 => Some(Self::InvalidApduInThisState),
            3 => Some(Self::PreemptedByHigherPriorityTask),
            4 => Some(Self::SegmentationNotSupported),
            5 => Some(Self::SecurityError),
            6 => Some(Self::InsufficientSecurity),
            7 => Some(Self::WindowSizeOutOfRange),
            8 => Some(Self::ApplicationExceededReplyTime),
            9 => Some(Self::OutOfResources),
            10 => Some(Self::TsmTimeout),
            11 => Some(Self::ApduTooLong),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_apdu_octets() {
        assert_eq!(MaxApdu::UpTo1476.octets(), 1476);
        assert_eq!(MaxApdu::from_octets(1000), MaxApdu::UpTo480);
        assert_eq!(MaxApdu::from_octets(10), MaxApdu::UpTo50);
        assert_eq!(MaxApdu::from_u8(6), None);
    }

    #[test]
    fn max_segments_count() {
        assert_eq!(MaxSegments::from_count(16).count(), Some(16));
        assert_eq!(MaxSegments::from_count(20), MaxSegments::Sixteen);
        assert_eq!(MaxSegments::Unspecified.count(), None);
        assert_eq!(MaxSegments::from_count(300), MaxSegments::MoreThanSixtyFour);
    }

    #[test]
    fn error_code_vendor_range() {
        assert_eq!(ErrorCode::from_u32(83), ErrorCode::CommunicationDisabled);
        assert_eq!(ErrorCode::from_u32(300), ErrorCode::Proprietary(300));
    }

    #[test]
    fn segmentation_directions() {
        assert!(Segmentation::SegmentedBoth.can_receive());
        assert!(!Segmentation::SegmentedTransmit.can_receive());
        assert!(Segmentation::SegmentedTransmit.can_transmit());
    }
}
