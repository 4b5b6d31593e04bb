numbered_enum! {
    /// BACnet object type codes.
    ///
    /// Codes without a standard name (vendor-specific types start at 128) are
    /// carried by [`Proprietary`](Self::Proprietary).
    pub enum ObjectType(u16) via to_u16 / from_u16 {
        AnalogInput = 0,
        AnalogOutput = 1,
        AnalogValue = 2,
        BinaryInput = 3,
        BinaryOutput = 4,
        BinaryValue = 5,
        Calendar = 6,
        Command = 7,
        Device = 8,
        EventEnrollment = 9,
        File = 10,
        Group = 11,
        Loop = 12,
        MultiStateInput = 13,
        MultiStateOutput = 14,
        NotificationClass = 15,
        Program = 16,
        Schedule = 17,
        Averaging = 18,
        MultiStateValue = 19,
        TrendLog = 20,
        LifeSafetyPoint = 21,
        LifeSafetyZone = 22,
        Accumulator = 23,
        PulseConverter = 24,
        EventLog = 25,
        GlobalGroup = 26,
        TrendLogMultiple = 27,
        LoadControl = 28,
        StructuredView = 29,
        AccessDoor = 30,
        Timer = 31,
        AccessCredential = 32,
        AccessPoint = 33,
        AccessRights = 34,
        AccessUser = 35,
        AccessZone = 36,
        CredentialDataInput = 37,
        NetworkSecurity = 38,
        BitstringValue = 39,
        CharacterstringValue = 40,
        DatePatternValue = 41,
        DateValue = 42,
        DatetimePatternValue = 43,
        DatetimeValue = 44,
        IntegerValue = 45,
        LargeAnalogValue = 46,
        OctetstringValue = 47,
        PositiveIntegerValue = 48,
        TimePatternValue = 49,
        TimeValue = 50,
        NotificationForwarder = 51,
        AlertEnrollment = 52,
        Channel = 53,
        LightingOutput = 54,
        BinaryLightingOutput = 55,
        NetworkPort = 56,
        ElevatorGroup = 57,
        Escalator = 58,
        Lift = 59,
    }
    fallback Proprietary
}

impl ObjectType {
    /// The object-type code reserved for "any type" in device-addressed services.
    pub const WILDCARD_CODE: u16 = 1023;

    /// Object types whose present value is a REAL, and so take a COV increment.
    pub const fn is_analog(self) -> bool {
        matches!(
            self,
            Self::AnalogInput
                | Self::AnalogOutput
                | Self::AnalogValue
                | Self::LargeAnalogValue
                | Self::Loop
        )
    }

    /// Object types with change-of-value criteria, and so accept SubscribeCOV.
    pub const fn supports_cov(self) -> bool {
        matches!(
            self,
            Self::AnalogInput
                | Self::AnalogOutput
                | Self::AnalogValue
                | Self::LargeAnalogValue
                | Self::IntegerValue
                | Self::PositiveIntegerValue
                | Self::LightingOutput
                | Self::BinaryInput
                | Self::BinaryOutput
                | Self::BinaryValue
                | Self::LifeSafetyPoint
                | Self::LifeSafetyZone
                | Self::MultiStateInput
                | Self::MultiStateOutput
                | Self::MultiStateValue
                | Self::OctetstringValue
                | Self::CharacterstringValue
                | Self::TimeValue
                | Self::DatetimeValue
                | Self::DateValue
                | Self::TimePatternValue
                | Self::DatePatternValue
                | Self::DatetimePatternValue
                | Self::AccessPoint
                | Self::CredentialDataInput
                | Self::LoadControl
                | Self::PulseConverter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectType;

    #[test]
    fn known_and_vendor_codes() {
        assert_eq!(ObjectType::from_u16(8), ObjectType::Device);
        assert_eq!(ObjectType::Device.to_u16(), 8);
        assert_eq!(ObjectType::from_u16(600), ObjectType::Proprietary(600));
        assert_eq!(ObjectType::Proprietary(600).to_u16(), 600);
    }

    #[test]
    fn cov_capable_types() {
        assert!(ObjectType::AnalogInput.supports_cov());
        assert!(ObjectType::MultiStateValue.supports_cov());
        assert!(!ObjectType::Device.supports_cov());
        assert!(!ObjectType::File.supports_cov());
        assert!(!ObjectType::Proprietary(600).supports_cov());
    }
}
