//! Change-of-value subscriptions held by the local device.

use crate::store::{ObjectStore, PropertyError};
use bacstack_core::services::{CovNotificationRequest, CovPropertyValue};
use bacstack_core::types::{ErrorClass, ErrorCode, ObjectId, PropertyId};
use bacstack_datalink::Address;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Identity of a subscription; subscribing again with the same key replaces
/// the existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriptionKey {
    pub subscriber: Address,
    pub process_id: u32,
    pub object_id: ObjectId,
}

impl SubscriptionKey {
    pub fn new(subscriber: Address, process_id: u32, object_id: ObjectId) -> Self {
        Self {
            subscriber,
            process_id,
            object_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub key: SubscriptionKey,
    pub confirmed: bool,
    /// `None` subscribes indefinitely.
    pub lifetime: Option<Duration>,
    pub expires_at: Option<Instant>,
    pub cov_increment: Option<f32>,
    /// Present value carried by the last notification sent, seeded with the
    /// value at subscription time.
    pub last_reported: Option<f32>,
}

impl SubscriptionInfo {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Seconds left as reported in notifications; 0 for indefinite, so a
    /// finite subscription never reports less than 1.
    pub fn time_remaining(&self, now: Instant) -> u32 {
        self.expires_at.map_or(0, |at| {
            let secs = at.saturating_duration_since(now).as_secs().max(1);
            u32::try_from(secs).unwrap_or(u32::MAX)
        })
    }
}

/// Properties carried by every notification.
pub const REPORTED_PROPERTIES: [PropertyId; 2] = [PropertyId::PresentValue, PropertyId::StatusFlags];

pub fn is_reported(property_id: PropertyId) -> bool {
    REPORTED_PROPERTIES.contains(&property_id)
}

/// The list of values for a notification on `object_id`: its current
/// PresentValue and StatusFlags. Values in `changed` win over the store's;
/// properties the object lacks are left out.
pub async fn reported_values<S: ObjectStore>(
    store: &S,
    object_id: ObjectId,
    changed: &[CovPropertyValue],
) -> Vec<CovPropertyValue> {
    let mut values = Vec::with_capacity(REPORTED_PROPERTIES.len());
    for property_id in REPORTED_PROPERTIES {
        if let Some(v) = changed.iter().find(|v| v.property_id == property_id) {
            values.push(v.clone());
            continue;
        }
        match store.read_property(object_id, property_id, None).await {
            Ok(value) => values.push(CovPropertyValue::new(property_id, value)),
            Err(e) => log::trace!("{object_id:?} has no {property_id:?} to report: {e}"),
        }
    }
    values
}

/// A notification to send for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct CovNotice {
    pub subscriber: Address,
    pub confirmed: bool,
    pub request: CovNotificationRequest,
}

#[derive(Debug)]
pub struct SubscriptionRegistry {
    capacity: usize,
    renew_on_notify: bool,
    entries: HashMap<SubscriptionKey, SubscriptionInfo>,
    by_object: HashMap<ObjectId, HashSet<SubscriptionKey>>,
}

impl SubscriptionRegistry {
    pub fn new(capacity: usize, renew_on_notify: bool) -> Self {
        Self {
            capacity,
            renew_on_notify,
            entries: HashMap::new(),
            by_object: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subscribe(
        &mut self,
        key: SubscriptionKey,
        confirmed: bool,
        lifetime: Option<Duration>,
        cov_increment: Option<f32>,
        baseline: Option<f32>,
        now: Instant,
    ) -> Result<&SubscriptionInfo, PropertyError> {
        if !self.entries.contains_key(&key) {
            self.sweep(now);
            if self.entries.len() >= self.capacity {
                return Err(PropertyError::new(
                    ErrorClass::Resources,
                    ErrorCode::NoSpaceToAddListElement,
                ));
            }
        }
        log::debug!(
            "cov subscribe {} process {} on {:?} lifetime {lifetime:?}",
            key.subscriber,
            key.process_id,
            key.object_id
        );
        self.by_object
            .entry(key.object_id)
            .or_default()
            .insert(key.clone());
        let info = SubscriptionInfo {
            key: key.clone(),
            confirmed,
            lifetime,
            expires_at: lifetime.map(|l| now + l),
            cov_increment,
            last_reported: baseline,
        };
        let slot = self.entries.entry(key).or_insert_with(|| info.clone());
        *slot = info;
        Ok(slot)
    }

    pub fn unsubscribe(&mut self, key: &SubscriptionKey) -> Option<SubscriptionInfo> {
        let info = self.entries.remove(key)?;
        if let Some(keys) = self.by_object.get_mut(&key.object_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_object.remove(&key.object_id);
            }
        }
        Some(info)
    }

    /// The live subscription for `key`; an expired one is removed instead.
    pub fn lookup(&mut self, key: &SubscriptionKey, now: Instant) -> Option<&SubscriptionInfo> {
        if self.entries.get(key)?.is_expired(now) {
            self.unsubscribe(key);
            return None;
        }
        self.entries.get(key)
    }

    /// Live subscriptions on one object.
    pub fn for_object(&self, object_id: ObjectId, now: Instant) -> Vec<&SubscriptionInfo> {
        let mut found: Vec<&SubscriptionInfo> = self
            .by_object
            .get(&object_id)
            .into_iter()
            .flatten()
            .filter_map(|key| self.entries.get(key))
            .filter(|info| !info.is_expired(now))
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        found
    }

    /// Removes expired subscriptions, returning how many went.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<SubscriptionKey> = self
            .entries
            .values()
            .filter(|info| info.is_expired(now))
            .map(|info| info.key.clone())
            .collect();
        for key in &expired {
            log::debug!("cov subscription {} process {} expired", key.subscriber, key.process_id);
            self.unsubscribe(key);
        }
        expired.len()
    }

    pub fn remove_subscriber(&mut self, subscriber: &Address) -> usize {
        let keys: Vec<SubscriptionKey> = self
            .entries
            .keys()
            .filter(|key| &key.subscriber == subscriber)
            .cloned()
            .collect();
        for key in &keys {
            self.unsubscribe(key);
        }
        keys.len()
    }

    /// Fans a change of the `changed` properties out to every subscription on
    /// `object_id`, each notification carrying `reported`.
    ///
    /// Only PresentValue and StatusFlags changes are reported. A
    /// subscription with an increment skips PresentValue changes smaller than
    /// it relative to the last value it was sent; a StatusFlags change always
    /// goes out.
    pub fn notify(
        &mut self,
        device_id: ObjectId,
        object_id: ObjectId,
        changed: &[PropertyId],
        reported: &[CovPropertyValue],
        now: Instant,
    ) -> Vec<CovNotice> {
        if !changed.iter().copied().any(is_reported) {
            return Vec::new();
        }
        let present = reported
            .iter()
            .find(|v| v.property_id == PropertyId::PresentValue)
            .and_then(|v| v.value.as_real());
        let status_changed = changed.contains(&PropertyId::StatusFlags);

        let mut keys: Vec<SubscriptionKey> = self
            .by_object
            .get(&object_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();

        let mut notices = Vec::new();
        for key in keys {
            let Some(info) = self.entries.get_mut(&key) else {
                continue;
            };
            if info.is_expired(now) {
                self.unsubscribe(&key);
                continue;
            }
            if let (Some(increment), Some(value), false) =
                (info.cov_increment, present, status_changed)
            {
                if info.last_reported.is_some_and(|last| (value - last).abs() < increment) {
                    continue;
                }
            }
            if present.is_some() {
                info.last_reported = present;
            }
            if self.renew_on_notify {
                info.expires_at = info.lifetime.map(|l| now + l);
            }
            notices.push(CovNotice {
                subscriber: key.subscriber.clone(),
                confirmed: info.confirmed,
                request: CovNotificationRequest {
                    subscriber_process_id: key.process_id,
                    initiating_device_id: device_id,
                    monitored_object_id: object_id,
                    time_remaining_seconds: info.time_remaining(now),
                    values: reported.to_vec(),
                },
            });
        }
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use bacstack_core::types::{AnyValue, BitString, DataValue, ObjectType};

    fn ai() -> ObjectId {
        ObjectId::new(ObjectType::AnalogInput, 0)
    }

    fn device() -> ObjectId {
        ObjectId::new(ObjectType::Device, 1)
    }

    fn key(mac: u8, process_id: u32) -> SubscriptionKey {
        SubscriptionKey::new(Address::local([mac]), process_id, ai())
    }

    fn pv(value: f32) -> Vec<CovPropertyValue> {
        vec![CovPropertyValue::new(
            PropertyId::PresentValue,
            AnyValue::single(DataValue::Real(value)),
        )]
    }

    fn flags(in_alarm: bool) -> CovPropertyValue {
        CovPropertyValue::new(
            PropertyId::StatusFlags,
            AnyValue::single(DataValue::BitString(BitString::from_bits(&[
                in_alarm, false, false, false,
            ]))),
        )
    }

    const PV: &[PropertyId] = &[PropertyId::PresentValue];

    #[test]
    fn lifetime_expires() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, Some(Duration::from_secs(60)), None, None, now)
            .unwrap();
        assert!(reg.lookup(&key(1, 7), now + Duration::from_secs(59)).is_some());
        assert!(reg.lookup(&key(1, 7), now + Duration::from_secs(60)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn resubscribe_replaces() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, Some(Duration::from_secs(10)), None, None, now)
            .unwrap();
        let later = now + Duration::from_secs(5);
        let info = reg
            .subscribe(key(1, 7), true, Some(Duration::from_secs(10)), None, None, later)
            .unwrap();
        assert!(info.confirmed);
        assert_eq!(info.expires_at, Some(later + Duration::from_secs(10)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.for_object(ai(), later).len(), 1);
    }

    #[test]
    fn capacity_is_enforced_for_new_keys() {
        let mut reg = SubscriptionRegistry::new(1, false);
        let now = Instant::now();
        reg.subscribe(key(1, 1), false, None, None, None, now).unwrap();
        let err = reg
            .subscribe(key(2, 1), false, None, None, None, now)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoSpaceToAddListElement);
        assert_eq!(err.class, ErrorClass::Resources);
        // Refreshing an existing key still works at capacity.
        reg.subscribe(key(1, 1), true, None, None, None, now).unwrap();
    }

    #[test]
    fn notify_fans_out_with_time_remaining() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, Some(Duration::from_secs(60)), None, None, now)
            .unwrap();
        reg.subscribe(key(2, 9), true, None, None, None, now).unwrap();

        let notices = reg.notify(device(), ai(), PV, &pv(73.0), now + Duration::from_secs(20));
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].subscriber, Address::local([1]));
        assert!(!notices[0].confirmed);
        assert_eq!(notices[0].request.time_remaining_seconds, 40);
        assert_eq!(notices[0].request.subscriber_process_id, 7);
        assert_eq!(notices[0].request.initiating_device_id, device());
        assert!(notices[1].confirmed);
        assert_eq!(notices[1].request.time_remaining_seconds, 0);
    }

    #[test]
    fn finite_lifetime_never_reports_zero() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, Some(Duration::from_secs(60)), None, None, now)
            .unwrap();
        let last_moment = now + Duration::from_millis(59_600);
        let notices = reg.notify(device(), ai(), PV, &pv(1.0), last_moment);
        assert_eq!(notices[0].request.time_remaining_seconds, 1);
    }

    #[test]
    fn unmonitored_properties_are_ignored() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, None, None, None, now).unwrap();
        assert!(reg
            .notify(device(), ai(), &[PropertyId::Description], &pv(1.0), now)
            .is_empty());
    }

    #[test]
    fn increment_measured_from_value_at_subscription() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, None, Some(1.0), Some(70.0), now)
            .unwrap();
        assert!(reg.notify(device(), ai(), PV, &pv(70.1), now).is_empty());
        assert!(reg.notify(device(), ai(), PV, &pv(70.9), now).is_empty());
        assert_eq!(reg.notify(device(), ai(), PV, &pv(71.0), now).len(), 1);
        assert!(reg.notify(device(), ai(), PV, &pv(71.5), now).is_empty());

        // Status flag changes always go out, carrying both values.
        let mut reported = pv(71.6);
        reported.push(flags(true));
        let notices = reg.notify(device(), ai(), &[PropertyId::StatusFlags], &reported, now);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].request.values, reported);
    }

    #[test]
    fn without_baseline_first_change_reports() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 7), false, None, Some(1.0), None, now).unwrap();
        assert_eq!(reg.notify(device(), ai(), PV, &pv(70.0), now).len(), 1);
        assert!(reg.notify(device(), ai(), PV, &pv(70.5), now).is_empty());
    }

    #[test]
    fn renew_on_notify_extends_lifetime() {
        let mut reg = SubscriptionRegistry::new(8, true);
        let now = Instant::now();
        let life = Duration::from_secs(60);
        reg.subscribe(key(1, 7), false, Some(life), None, None, now).unwrap();
        let later = now + Duration::from_secs(50);
        reg.notify(device(), ai(), PV, &pv(1.0), later);
        assert!(reg.lookup(&key(1, 7), now + Duration::from_secs(100)).is_some());
    }

    #[test]
    fn sweep_and_remove_subscriber() {
        let mut reg = SubscriptionRegistry::new(8, false);
        let now = Instant::now();
        reg.subscribe(key(1, 1), false, Some(Duration::from_secs(1)), None, None, now)
            .unwrap();
        reg.subscribe(key(1, 2), false, None, None, None, now).unwrap();
        reg.subscribe(key(2, 1), false, None, None, None, now).unwrap();
        assert_eq!(reg.sweep(now + Duration::from_secs(1)), 1);
        assert_eq!(reg.remove_subscriber(&Address::local([1])), 1);
        assert_eq!(reg.len(), 1);
        assert!(reg.unsubscribe(&key(2, 1)).is_some());
        assert!(reg.for_object(ai(), now).is_empty());
    }

    #[tokio::test]
    async fn reported_values_fill_in_from_store() {
        let store = MemoryObjectStore::new();
        store.add_object(ai(), "ai").await;
        store
            .set_property(ai(), PropertyId::PresentValue, AnyValue::single(DataValue::Real(20.0)))
            .await
            .unwrap();
        store
            .set_property(ai(), PropertyId::StatusFlags, flags(false).value)
            .await
            .unwrap();

        let values = reported_values(&store, ai(), &pv(21.5)).await;
        assert_eq!(values, vec![pv(21.5).remove(0), flags(false)]);

        let bare = ObjectId::new(ObjectType::BinaryValue, 3);
        store.add_object(bare, "bv").await;
        let values = reported_values(&store, bare, &[flags(true)]).await;
        assert_eq!(values, vec![flags(true)]);
    }
}
