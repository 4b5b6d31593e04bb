//! The object model the dispatcher serves from.
//!
//! The engine only needs property-level access, expressed by [`ObjectStore`].
//! [`MemoryObjectStore`] is a small map-backed implementation for tests,
//! demos and simple devices.

use bacstack_core::encoding::tagged::TaggedValue;
use bacstack_core::types::{AnyValue, DataValue, ErrorClass, ErrorCode, ObjectId, PropertyId};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};
use tokio::sync::RwLock;

/// A property access failure, reported to the peer as an Error PDU or an
/// error entry in a ReadPropertyMultiple result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{class:?}: {code:?}")]
pub struct PropertyError {
    pub class: ErrorClass,
    pub code: ErrorCode,
}

impl PropertyError {
    pub const fn new(class: ErrorClass, code: ErrorCode) -> Self {
        Self { class, code }
    }

    pub const fn unknown_object() -> Self {
        Self::new(ErrorClass::Object, ErrorCode::UnknownObject)
    }

    pub const fn unknown_property() -> Self {
        Self::new(ErrorClass::Property, ErrorCode::UnknownProperty)
    }

    pub const fn write_access_denied() -> Self {
        Self::new(ErrorClass::Property, ErrorCode::WriteAccessDenied)
    }

    pub const fn invalid_array_index() -> Self {
        Self::new(ErrorClass::Property, ErrorCode::InvalidArrayIndex)
    }

    pub const fn not_an_array() -> Self {
        Self::new(ErrorClass::Property, ErrorCode::PropertyIsNotAnArray)
    }
}

/// Property-level access to the local device's objects.
///
/// Methods are async so implementations can sit on slow storage; the engine
/// runs each call in its own task.
pub trait ObjectStore: Send + Sync + 'static {
    fn read_property(
        &self,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
    ) -> impl Future<Output = Result<AnyValue, PropertyError>> + Send;

    fn write_property(
        &self,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
        value: AnyValue,
        priority: Option<u8>,
    ) -> impl Future<Output = Result<(), PropertyError>> + Send;

    /// Properties present on the object, used to expand ALL / REQUIRED /
    /// OPTIONAL in ReadPropertyMultiple.
    fn property_list(
        &self,
        object_id: ObjectId,
    ) -> impl Future<Output = Result<Vec<PropertyId>, PropertyError>> + Send;
}

/// Receives every property change made through a store.
pub trait ValueChangeListener: Send + Sync {
    fn on_value_changed(&self, object_id: ObjectId, property_id: PropertyId, value: &AnyValue);
}

/// Properties every object answers that never appear in its PropertyList.
const IMPLICIT_PROPERTIES: [PropertyId; 4] = [
    PropertyId::ObjectIdentifier,
    PropertyId::ObjectName,
    PropertyId::ObjectType,
    PropertyId::PropertyList,
];

fn is_array_property(property_id: PropertyId) -> bool {
    matches!(
        property_id,
        PropertyId::ObjectList | PropertyId::PropertyList | PropertyId::PriorityArray
    )
}

fn read_element(
    property_id: PropertyId,
    value: AnyValue,
    array_index: Option<u32>,
) -> Result<AnyValue, PropertyError> {
    let Some(index) = array_index else {
        return Ok(value);
    };
    if !is_array_property(property_id) && value.0.len() == 1 {
        return Err(PropertyError::not_an_array());
    }
    if index == 0 {
        let len = u32::try_from(value.0.len()).unwrap_or(u32::MAX);
        return Ok(AnyValue::single(DataValue::Unsigned(len)));
    }
    usize::try_from(index - 1)
        .ok()
        .and_then(|i| value.0.get(i).cloned())
        .map(|element| AnyValue(vec![element]))
        .ok_or(PropertyError::invalid_array_index())
}

type Objects = HashMap<ObjectId, BTreeMap<PropertyId, AnyValue>>;

/// Map-backed [`ObjectStore`].
///
/// `PropertyList` and a device's `ObjectList` are computed on read.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<Objects>,
    listeners: SyncRwLock<Vec<Arc<dyn ValueChangeListener>>>,
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore").finish_non_exhaustive()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for changes made with [`set_property`] or by
    /// remote writes.
    ///
    /// [`set_property`]: Self::set_property
    pub fn add_listener(&self, listener: Arc<dyn ValueChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Creates (or resets) an object with its identifying properties.
    pub async fn add_object(&self, object_id: ObjectId, name: impl Into<String>) {
        let mut props = BTreeMap::new();
        props.insert(
            PropertyId::ObjectIdentifier,
            AnyValue::single(DataValue::ObjectId(object_id)),
        );
        props.insert(
            PropertyId::ObjectName,
            AnyValue::single(DataValue::CharacterString(name.into())),
        );
        props.insert(
            PropertyId::ObjectType,
            AnyValue::single(DataValue::Enumerated(u32::from(
                object_id.object_type().to_u16(),
            ))),
        );
        self.objects.write().await.insert(object_id, props);
    }

    pub async fn remove_object(&self, object_id: ObjectId) -> bool {
        self.objects.write().await.remove(&object_id).is_some()
    }

    pub async fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.read().await.keys().copied().collect();
        ids.sort_by_key(|id| id.raw());
        ids
    }

    /// Local update of a property, creating it if absent. Listeners hear
    /// about it only when the value actually changed.
    pub async fn set_property(
        &self,
        object_id: ObjectId,
        property_id: PropertyId,
        value: AnyValue,
    ) -> Result<(), PropertyError> {
        let changed = {
            let mut objects = self.objects.write().await;
            let props = objects
                .get_mut(&object_id)
                .ok_or(PropertyError::unknown_object())?;
            let previous = props.insert(property_id, value.clone());
            previous.as_ref() != Some(&value)
        };
        if changed {
            self.notify(object_id, property_id, &value);
        }
        Ok(())
    }

    fn notify(&self, object_id: ObjectId, property_id: PropertyId, value: &AnyValue) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_value_changed(object_id, property_id, value);
        }
    }

    fn computed(objects: &Objects, object_id: ObjectId, property_id: PropertyId) -> Option<AnyValue> {
        let props = objects.get(&object_id)?;
        match property_id {
            PropertyId::PropertyList => Some(AnyValue::list(
                props
                    .keys()
                    .filter(|p| !IMPLICIT_PROPERTIES.contains(p))
                    .map(|p| DataValue::Enumerated(p.to_u32())),
            )),
            PropertyId::ObjectList
                if object_id.object_type() == bacstack_core::types::ObjectType::Device
                    && !props.contains_key(&PropertyId::ObjectList) =>
            {
                let mut ids: Vec<ObjectId> = objects.keys().copied().collect();
                ids.sort_by_key(|id| id.raw());
                Some(AnyValue::list(ids.into_iter().map(DataValue::ObjectId)))
            }
            _ => None,
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn read_property(
        &self,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
    ) -> Result<AnyValue, PropertyError> {
        let objects = self.objects.read().await;
        let props = objects
            .get(&object_id)
            .ok_or(PropertyError::unknown_object())?;
        let value = match Self::computed(&objects, object_id, property_id) {
            Some(value) => value,
            None => props
                .get(&property_id)
                .cloned()
                .ok_or(PropertyError::unknown_property())?,
        };
        read_element(property_id, value, array_index)
    }

    async fn write_property(
        &self,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
        value: AnyValue,
        _priority: Option<u8>,
    ) -> Result<(), PropertyError> {
        if matches!(
            property_id,
            PropertyId::ObjectIdentifier | PropertyId::ObjectType | PropertyId::PropertyList
        ) {
            return Err(PropertyError::write_access_denied());
        }
        let stored = {
            let mut objects = self.objects.write().await;
            let props = objects
                .get_mut(&object_id)
                .ok_or(PropertyError::unknown_object())?;
            let current = props
                .get_mut(&property_id)
                .ok_or(PropertyError::unknown_property())?;

            let updated = match array_index {
                None => value,
                Some(_) if !is_array_property(property_id) && current.0.len() == 1 => {
                    return Err(PropertyError::not_an_array());
                }
                Some(0) => return Err(PropertyError::write_access_denied()),
                Some(index) => {
                    let [element]: [TaggedValue; 1] = value.0.try_into().map_err(|_| {
                        PropertyError::new(ErrorClass::Property, ErrorCode::InvalidDataType)
                    })?;
                    let mut list = current.clone();
                    let slot = usize::try_from(index - 1)
                        .ok()
                        .and_then(|i| list.0.get_mut(i))
                        .ok_or(PropertyError::invalid_array_index())?;
                    *slot = element;
                    list
                }
            };
            if *current == updated {
                None
            } else {
                *current = updated.clone();
                Some(updated)
            }
        };
        if let Some(value) = stored {
            self.notify(object_id, property_id, &value);
        }
        Ok(())
    }

    async fn property_list(&self, object_id: ObjectId) -> Result<Vec<PropertyId>, PropertyError> {
        let objects = self.objects.read().await;
        let props = objects
            .get(&object_id)
            .ok_or(PropertyError::unknown_object())?;
        let mut list: Vec<PropertyId> = props.keys().copied().collect();
        if !list.contains(&PropertyId::PropertyList) {
            list.push(PropertyId::PropertyList);
        }
        Ok(list)
    }
}
