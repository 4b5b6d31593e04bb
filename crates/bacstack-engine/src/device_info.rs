use bacstack_core::services::IAmRequest;
use bacstack_core::types::{MaxApdu, MaxSegments, ObjectId, Segmentation};
use bacstack_datalink::Address;
use std::collections::HashMap;

/// What we know about a peer's transfer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    pub device_id: Option<ObjectId>,
    /// Largest APDU the peer accepts, in octets.
    pub max_apdu: usize,
    pub segmentation: Segmentation,
    pub max_segments: MaxSegments,
    pub vendor_id: Option<u32>,
}

impl Default for DeviceInfo {
    /// Assumed for peers never heard from: the largest BACnet/IP APDU and
    /// full segmentation support.
    fn default() -> Self {
        Self {
            device_id: None,
            max_apdu: MaxApdu::UpTo1476.octets(),
            segmentation: Segmentation::SegmentedBoth,
            max_segments: MaxSegments::Unspecified,
            vendor_id: None,
        }
    }
}

impl DeviceInfo {
    pub fn from_i_am(i_am: &IAmRequest) -> Self {
        Self {
            device_id: Some(i_am.device_id),
            max_apdu: usize::try_from(i_am.max_apdu)
                .unwrap_or(usize::MAX)
                .max(MaxApdu::UpTo50.octets()),
            segmentation: i_am.segmentation,
            max_segments: MaxSegments::Unspecified,
            vendor_id: Some(i_am.vendor_id),
        }
    }
}

/// Per-peer capabilities plus the router that reaches each remote network.
#[derive(Debug, Default)]
pub struct DeviceInfoCache {
    peers: HashMap<Address, DeviceInfo>,
    routers: HashMap<u16, Address>,
}

impl DeviceInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known capabilities, or permissive defaults for a stranger.
    pub fn get(&self, peer: &Address) -> DeviceInfo {
        self.peers.get(peer).copied().unwrap_or_default()
    }

    pub fn contains(&self, peer: &Address) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn learn_i_am(&mut self, peer: Address, i_am: &IAmRequest) {
        let mut info = DeviceInfo::from_i_am(i_am);
        if let Some(known) = self.peers.get(&peer) {
            info.max_segments = known.max_segments;
        }
        self.peers.insert(peer, info);
    }

    /// Updates limits from the header of a Confirmed-Request the peer sent.
    pub fn learn_request(
        &mut self,
        peer: &Address,
        max_apdu: MaxApdu,
        max_segments: MaxSegments,
        segmented_response_accepted: bool,
    ) {
        let info = self.peers.entry(peer.clone()).or_default();
        info.max_apdu = max_apdu.octets();
        info.max_segments = max_segments;
        if !segmented_response_accepted {
            info.segmentation = match info.segmentation {
                Segmentation::SegmentedBoth => Segmentation::SegmentedTransmit,
                Segmentation::SegmentedReceive => Segmentation::NoSegmentation,
                other => other,
            };
        }
    }

    pub fn remove(&mut self, peer: &Address) -> Option<DeviceInfo> {
        self.peers.remove(peer)
    }

    /// Address of the device with this instance, if it has announced itself.
    pub fn find_by_instance(&self, instance: u32) -> Option<(&Address, &DeviceInfo)> {
        self.peers
            .iter()
            .find(|(_, info)| info.device_id.is_some_and(|id| id.instance() == instance))
    }

    pub fn learn_router(&mut self, network: u16, router: Address) {
        if self.routers.get(&network) != Some(&router) {
            log::debug!("network {network} reachable via {router}");
            self.routers.insert(network, router);
        }
    }

    pub fn router_for(&self, network: u16) -> Option<&Address> {
        self.routers.get(&network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bacstack_core::types::ObjectType;

    fn i_am(instance: u32, max_apdu: u32, segmentation: Segmentation) -> IAmRequest {
        IAmRequest {
            device_id: ObjectId::new(ObjectType::Device, instance),
            max_apdu,
            segmentation,
            vendor_id: 260,
        }
    }

    #[test]
    fn unknown_peer_gets_permissive_defaults() {
        let cache = DeviceInfoCache::new();
        let info = cache.get(&Address::local([1]));
        assert_eq!(info.max_apdu, 1476);
        assert!(info.segmentation.can_receive());
        assert_eq!(info.max_segments.count(), None);
    }

    #[test]
    fn i_am_sets_capabilities() {
        let mut cache = DeviceInfoCache::new();
        let peer = Address::local([9]);
        cache.learn_i_am(peer.clone(), &i_am(77, 480, Segmentation::NoSegmentation));
        let info = cache.get(&peer);
        assert_eq!(info.max_apdu, 480);
        assert_eq!(info.segmentation, Segmentation::NoSegmentation);
        assert_eq!(info.vendor_id, Some(260));
        assert_eq!(cache.find_by_instance(77).map(|(a, _)| a), Some(&peer));
        assert!(cache.find_by_instance(78).is_none());
    }

    #[test]
    fn request_header_refines_limits() {
        let mut cache = DeviceInfoCache::new();
        let peer = Address::remote(5, [1]);
        cache.learn_request(&peer, MaxApdu::UpTo206, MaxSegments::Four, false);
        let info = cache.get(&peer);
        assert_eq!(info.max_apdu, 206);
        assert_eq!(info.max_segments.count(), Some(4));
        assert!(!info.segmentation.can_receive());
        assert!(info.segmentation.can_transmit());
    }

    #[test]
    fn tiny_i_am_max_apdu_is_raised_to_minimum() {
        let mut cache = DeviceInfoCache::new();
        let peer = Address::local([2]);
        cache.learn_i_am(peer.clone(), &i_am(1, 10, Segmentation::SegmentedBoth));
        assert_eq!(cache.get(&peer).max_apdu, 50);
    }

    #[test]
    fn routers() {
        let mut cache = DeviceInfoCache::new();
        assert!(cache.router_for(7).is_none());
        cache.learn_router(7, Address::local([0x0A]));
        assert_eq!(cache.router_for(7), Some(&Address::local([0x0A])));
        cache.learn_router(7, Address::local([0x0B]));
        assert_eq!(cache.router_for(7), Some(&Address::local([0x0B])));
    }
}
