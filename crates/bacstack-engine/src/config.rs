use bacstack_core::apdu::SegmentHeader;
use bacstack_core::types::{MaxApdu, MaxSegments, ObjectId, ObjectType, Segmentation};
use std::time::Duration;

/// Engine tuning and local device identity.
///
/// Loading this from a file is up to the host; with the `serde` feature the
/// struct (de)serializes with durations as milliseconds and every field
/// optional.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub device_instance: u32,
    pub vendor_id: u16,
    pub max_apdu: MaxApdu,
    pub segmentation: Segmentation,
    pub max_segments: MaxSegments,
    /// Window proposed when sending segments and granted when receiving them.
    pub window_size: u8,
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub apdu_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub segment_timeout: Duration,
    pub apdu_retries: u8,
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub application_timeout: Duration,
    pub max_reassembly_len: usize,
    pub max_subscriptions: usize,
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub cov_sweep_interval: Duration,
    pub renew_lifetime_on_notify: bool,
    /// Required in DeviceCommunicationControl requests when set.
    pub dcc_password: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_instance: 0,
            vendor_id: 0,
            max_apdu: MaxApdu::UpTo1476,
            segmentation: Segmentation::SegmentedBoth,
            max_segments: MaxSegments::SixtyFour,
            window_size: 2,
            apdu_timeout: Duration::from_secs(3),
            segment_timeout: Duration::from_secs(2),
            apdu_retries: 3,
            application_timeout: Duration::from_secs(2),
            max_reassembly_len: 1024 * 1024,
            max_subscriptions: 256,
            cov_sweep_interval: Duration::from_secs(1),
            renew_lifetime_on_notify: false,
            dcc_password: None,
        }
    }
}

impl EngineConfig {
    pub fn new(device_instance: u32) -> Self {
        Self {
            device_instance,
            ..Self::default()
        }
    }

    pub fn device_id(&self) -> ObjectId {
        ObjectId::new(ObjectType::Device, self.device_instance)
    }

    pub fn with_vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self
    }

    pub fn with_max_apdu(mut self, max_apdu: MaxApdu) -> Self {
        self.max_apdu = max_apdu;
        self
    }

    pub fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = segmentation;
        self
    }

    pub fn with_max_segments(mut self, max_segments: MaxSegments) -> Self {
        self.max_segments = max_segments;
        self
    }

    pub fn with_window_size(mut self, window_size: u8) -> Self {
        self.window_size = window_size.clamp(1, SegmentHeader::MAX_WINDOW_SIZE);
        self
    }

    pub fn with_apdu_timeout(mut self, timeout: Duration) -> Self {
        self.apdu_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.segment_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_apdu_retries(mut self, retries: u8) -> Self {
        self.apdu_retries = retries;
        self
    }

    pub fn with_application_timeout(mut self, timeout: Duration) -> Self {
        self.application_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_max_reassembly_len(mut self, len: usize) -> Self {
        self.max_reassembly_len = len;
        self
    }

    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    pub fn with_cov_sweep_interval(mut self, interval: Duration) -> Self {
        self.cov_sweep_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_renew_lifetime_on_notify(mut self, renew: bool) -> Self {
        self.renew_lifetime_on_notify = renew;
        self
    }

    pub fn with_dcc_password(mut self, password: impl Into<String>) -> Self {
        self.dcc_password = Some(password.into());
        self
    }

    /// Window actually used on the wire; zero in a hand-built config means 1.
    pub(crate) fn effective_window(&self) -> u8 {
        self.window_size.clamp(1, SegmentHeader::MAX_WINDOW_SIZE)
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.apdu_timeout, Duration::from_secs(3));
        assert_eq!(cfg.segment_timeout, Duration::from_secs(2));
        assert_eq!(cfg.apdu_retries, 3);
        assert!(!cfg.renew_lifetime_on_notify);
    }

    #[test]
    fn builders_clamp() {
        let cfg = EngineConfig::new(42)
            .with_window_size(0)
            .with_apdu_timeout(Duration::ZERO);
        assert_eq!(cfg.window_size, 1);
        assert_eq!(cfg.apdu_timeout, Duration::from_millis(1));
        assert_eq!(cfg.device_id(), ObjectId::new(ObjectType::Device, 42));
        assert_eq!(EngineConfig::new(1).with_window_size(200).window_size, 127);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_milliseconds() {
        let cfg = EngineConfig::new(7).with_apdu_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["apdu_timeout"], 1500);
        assert_eq!(json["device_instance"], 7);

        let partial: EngineConfig =
            serde_json::from_str(r#"{"device_instance": 9, "segment_timeout": 250}"#).unwrap();
        assert_eq!(partial.device_instance, 9);
        assert_eq!(partial.segment_timeout, Duration::from_millis(250));
        assert_eq!(partial.apdu_retries, 3);
    }
}
