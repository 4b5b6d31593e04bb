numbered_enum! {
    /// BACnet property identifiers.
    ///
    /// Standard properties this stack reads or writes are named; everything
    /// else round-trips through [`Proprietary`](Self::Proprietary).
    pub enum PropertyId(u32) via to_u32 / from_u32 {
        AckedTransitions = 0,
        AckRequired = 1,
        ActiveText = 4,
        /// Pseudo-property selecting every property in ReadPropertyMultiple.
        All = 8,
        ApduSegmentTimeout = 10,
        ApduTimeout = 11,
        ApplicationSoftwareVersion = 12,
        NotificationClass = 17,
        CovIncrement = 22,
        Deadband = 25,
        Description = 28,
        DeviceAddressBinding = 30,
        DeviceType = 31,
        EventEnable = 35,
        EventState = 36,
        FirmwareRevision = 44,
        HighLimit = 45,
        InactiveText = 46,
        LimitEnable = 52,
        LocalDate = 56,
        LocalTime = 57,
        Location = 58,
        LowLimit = 59,
        MaxApduLengthAccepted = 62,
        MaxPresValue = 65,
        MinPresValue = 69,
        ModelName = 70,
        NumberOfApduRetries = 73,
        NumberOfStates = 74,
        ObjectIdentifier = 75,
        ObjectList = 76,
        ObjectName = 77,
        ObjectType = 79,
        /// Pseudo-property selecting the optional properties.
        Optional = 80,
        OutOfService = 81,
        Polarity = 84,
        PresentValue = 85,
        Priority = 86,
        PriorityArray = 87,
        ProtocolObjectTypesSupported = 96,
        ProtocolServicesSupported = 97,
        ProtocolVersion = 98,
        Reliability = 103,
        RelinquishDefault = 104,
        /// Pseudo-property selecting the required properties.
        Required = 105,
        Resolution = 106,
        SegmentationSupported = 107,
        StateText = 110,
        StatusFlags = 111,
        SystemStatus = 112,
        TimeDelay = 113,
        Units = 117,
        UtcOffset = 119,
        VendorIdentifier = 120,
        VendorName = 121,
        ProtocolRevision = 139,
        ActiveCovSubscriptions = 152,
        DatabaseRevision = 155,
        MaxSegmentsAccepted = 167,
        PropertyList = 371,
    }
    fallback Proprietary
}

impl PropertyId {
    /// True for `All`, `Required` and `Optional`, which name property groups
    /// rather than a single property.
    pub const fn is_group(self) -> bool {
        matches!(self, Self::All | Self::Required | Self::Optional)
    }
}

#[cfg(test)]
mod tests {
    use super::PropertyId;

    #[test]
    fn groups() {
        assert!(PropertyId::All.is_group());
        assert!(!PropertyId::PresentValue.is_group());
        assert_eq!(PropertyId::from_u32(85), PropertyId::PresentValue);
        assert_eq!(PropertyId::from_u32(5000), PropertyId::Proprietary(5000));
    }
}
