//! Maps decoded service requests onto the object store and registry.
//!
//! Handlers never touch engine state directly. Anything that must change
//! it (a new subscription, a DCC state, a learned device) comes back as an
//! [`Effect`] next to the response, and the engine applies it in its loop.

use crate::config::EngineConfig;
use crate::store::{ObjectStore, PropertyError};
use crate::subscription::SubscriptionKey;
use crate::transaction::{Indication, ServerResponse};
use bacstack_core::services::{
    ConfirmedServiceAck, ConfirmedServiceRequest, CovNotificationRequest,
    DeviceCommunicationControlRequest, DeviceCommunicationState, IAmRequest, PropertyResult,
    ReadAccessResult, ReadAccessSpec, ReadPropertyAck, ReadPropertyMultipleAck,
    ReadPropertyRequest, ReadResult, SubscribeCovRequest, UnconfirmedServiceRequest,
    WritePropertyRequest,
};
use bacstack_core::types::{AbortReason, ErrorClass, ErrorCode, ObjectId, PropertyId};
use bacstack_datalink::Address;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Properties answered for REQUIRED in ReadPropertyMultiple, when present.
const REQUIRED_PROPERTIES: [PropertyId; 9] = [
    PropertyId::ObjectIdentifier,
    PropertyId::ObjectName,
    PropertyId::ObjectType,
    PropertyId::PresentValue,
    PropertyId::StatusFlags,
    PropertyId::EventState,
    PropertyId::OutOfService,
    PropertyId::Units,
    PropertyId::PropertyList,
];

/// A change to engine state requested by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Subscribe {
        key: SubscriptionKey,
        confirmed: bool,
        lifetime: Option<Duration>,
        cov_increment: Option<f32>,
        /// PresentValue when the subscription was made.
        baseline: Option<f32>,
    },
    Unsubscribe(SubscriptionKey),
    CommunicationControl {
        state: DeviceCommunicationState,
        duration: Option<Duration>,
    },
    CovNotification {
        notification: CovNotificationRequest,
        confirmed: bool,
    },
    LearnDevice(IAmRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub response: ServerResponse,
    pub effect: Option<Effect>,
}

impl Completion {
    pub fn respond(response: ServerResponse) -> Self {
        Self {
            response,
            effect: None,
        }
    }

    fn with_effect(response: ServerResponse, effect: Effect) -> Self {
        Self {
            response,
            effect: Some(effect),
        }
    }
}

pub enum Outcome {
    Immediate(Completion),
    /// Runs off the engine loop; the result is posted back when ready.
    Deferred(BoxFuture<'static, Completion>),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(c) => f.debug_tuple("Immediate").field(c).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnconfirmedOutcome {
    pub reply: Option<UnconfirmedServiceRequest>,
    pub effect: Option<Effect>,
}

impl From<PropertyError> for ServerResponse {
    fn from(e: PropertyError) -> Self {
        Self::Error {
            class: e.class,
            code: e.code,
        }
    }
}

fn complex_ack(ack: ConfirmedServiceAck) -> ServerResponse {
    match ack.to_service_data() {
        Ok(Some(data)) => ServerResponse::ComplexAck(data),
        Ok(None) => ServerResponse::SimpleAck,
        Err(e) => {
            log::warn!("failed to encode {} ack: {e}", ack.service_choice());
            ServerResponse::Abort(AbortReason::Other)
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher<S> {
    store: Arc<S>,
    i_am: IAmRequest,
    dcc_password: Option<String>,
}

impl<S: ObjectStore> Dispatcher<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            store,
            i_am: IAmRequest {
                device_id: config.device_id(),
                max_apdu: u32::try_from(config.max_apdu.octets()).unwrap_or(u32::MAX),
                segmentation: config.segmentation,
                vendor_id: u32::from(config.vendor_id),
            },
            dcc_password: config.dcc_password.clone(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The I-Am this device answers Who-Is with.
    pub fn i_am(&self) -> IAmRequest {
        self.i_am
    }

    fn local_object(&self, object_id: ObjectId) -> ObjectId {
        if object_id == ObjectId::wildcard_device() {
            self.i_am.device_id
        } else {
            object_id
        }
    }

    pub fn dispatch(&self, indication: &Indication) -> Outcome {
        let request =
            match ConfirmedServiceRequest::decode(indication.service_choice, &indication.service_data)
            {
                Ok(request) => request,
                Err(e) => {
                    log::debug!(
                        "rejecting service {} from {}: {e}",
                        indication.service_choice,
                        indication.peer
                    );
                    return Outcome::Immediate(Completion::respond(ServerResponse::Reject(
                        e.reject_reason(),
                    )));
                }
            };

        match request {
            ConfirmedServiceRequest::ReadProperty(req) => self.read_property(req),
            ConfirmedServiceRequest::ReadPropertyMultiple(req) => {
                self.read_property_multiple(req.specs)
            }
            ConfirmedServiceRequest::WriteProperty(req) => self.write_property(req),
            ConfirmedServiceRequest::SubscribeCov(req) => {
                self.subscribe_cov(indication.peer.clone(), req)
            }
            ConfirmedServiceRequest::DeviceCommunicationControl(req) => {
                Outcome::Immediate(self.communication_control(req))
            }
            ConfirmedServiceRequest::ConfirmedCovNotification(notification) => {
                Outcome::Immediate(Completion::with_effect(
                    ServerResponse::SimpleAck,
                    Effect::CovNotification {
                        notification,
                        confirmed: true,
                    },
                ))
            }
        }
    }

    pub fn dispatch_unconfirmed(
        &self,
        peer: &Address,
        service_choice: u8,
        service_data: &[u8],
    ) -> UnconfirmedOutcome {
        let request = match UnconfirmedServiceRequest::decode(service_choice, service_data) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("dropping unconfirmed service {service_choice} from {peer}: {e}");
                return UnconfirmedOutcome::default();
            }
        };
        match request {
            UnconfirmedServiceRequest::WhoIs(who_is) => UnconfirmedOutcome {
                reply: who_is
                    .matches(self.i_am.device_id.instance())
                    .then_some(UnconfirmedServiceRequest::IAm(self.i_am)),
                effect: None,
            },
            UnconfirmedServiceRequest::IAm(i_am) => UnconfirmedOutcome {
                reply: None,
                effect: Some(Effect::LearnDevice(i_am)),
            },
            UnconfirmedServiceRequest::UnconfirmedCovNotification(notification) => {
                UnconfirmedOutcome {
                    reply: None,
                    effect: Some(Effect::CovNotification {
                        notification,
                        confirmed: false,
                    }),
                }
            }
        }
    }

    fn read_property(&self, req: ReadPropertyRequest) -> Outcome {
        let store = Arc::clone(&self.store);
        let object_id = self.local_object(req.object_id);
        Outcome::Deferred(Box::pin(async move {
            let response = match store
                .read_property(object_id, req.property_id, req.array_index)
                .await
            {
                Ok(value) => complex_ack(ConfirmedServiceAck::ReadProperty(ReadPropertyAck {
                    object_id,
                    property_id: req.property_id,
                    array_index: req.array_index,
                    value,
                })),
                Err(e) => e.into(),
            };
            Completion::respond(response)
        }))
    }

    fn read_property_multiple(&self, specs: Vec<ReadAccessSpec>) -> Outcome {
        let store = Arc::clone(&self.store);
        let specs: Vec<ReadAccessSpec> = specs
            .into_iter()
            .map(|spec| ReadAccessSpec {
                object_id: self.local_object(spec.object_id),
                ..spec
            })
            .collect();
        Outcome::Deferred(Box::pin(async move {
            let mut results = Vec::with_capacity(specs.len());
            for spec in specs {
                results.push(read_access(store.as_ref(), spec).await);
            }
            Completion::respond(complex_ack(ConfirmedServiceAck::ReadPropertyMultiple(
                ReadPropertyMultipleAck { results },
            )))
        }))
    }

    fn write_property(&self, req: WritePropertyRequest) -> Outcome {
        if req.priority.is_some_and(|p| !(1..=16).contains(&p)) {
            return Outcome::Immediate(Completion::respond(ServerResponse::Error {
                class: ErrorClass::Services,
                code: ErrorCode::ParameterOutOfRange,
            }));
        }
        let store = Arc::clone(&self.store);
        let object_id = self.local_object(req.object_id);
        Outcome::Deferred(Box::pin(async move {
            let result = store
                .write_property(
                    object_id,
                    req.property_id,
                    req.array_index,
                    req.value,
                    req.priority,
                )
                .await;
            Completion::respond(match result {
                Ok(()) => ServerResponse::SimpleAck,
                Err(e) => e.into(),
            })
        }))
    }

    fn subscribe_cov(&self, peer: Address, req: SubscribeCovRequest) -> Outcome {
        let key = SubscriptionKey::new(peer, req.subscriber_process_id, req.monitored_object_id);
        if req.is_cancellation() {
            return Outcome::Immediate(Completion::with_effect(
                ServerResponse::SimpleAck,
                Effect::Unsubscribe(key),
            ));
        }
        let store = Arc::clone(&self.store);
        Outcome::Deferred(Box::pin(async move {
            if let Err(e) = store.property_list(key.object_id).await {
                return Completion::respond(e.into());
            }
            if !key.object_id.object_type().supports_cov() {
                log::debug!("no cov criteria for {:?}", key.object_id);
                return Completion::respond(ServerResponse::Error {
                    class: ErrorClass::Services,
                    code: ErrorCode::CovSubscriptionFailed,
                });
            }
            let cov_increment = store
                .read_property(key.object_id, PropertyId::CovIncrement, None)
                .await
                .ok()
                .and_then(|v| v.as_real());
            let baseline = store
                .read_property(key.object_id, PropertyId::PresentValue, None)
                .await
                .ok()
                .and_then(|v| v.as_real());
            let lifetime = req
                .lifetime_seconds
                .filter(|s| *s > 0)
                .map(|s| Duration::from_secs(u64::from(s)));
            Completion::with_effect(
                ServerResponse::SimpleAck,
                Effect::Subscribe {
                    key,
                    confirmed: req.issue_confirmed_notifications.unwrap_or(false),
                    lifetime,
                    cov_increment,
                    baseline,
                },
            )
        }))
    }

    fn communication_control(&self, req: DeviceCommunicationControlRequest) -> Completion {
        if let Some(expected) = &self.dcc_password {
            if req.password.as_deref() != Some(expected.as_str()) {
                return Completion::respond(ServerResponse::Error {
                    class: ErrorClass::Security,
                    code: ErrorCode::PasswordFailure,
                });
            }
        }
        let duration = req
            .time_duration_minutes
            .map(|m| Duration::from_secs(u64::from(m) * 60));
        Completion::with_effect(
            ServerResponse::SimpleAck,
            Effect::CommunicationControl {
                state: req.enable_disable,
                duration,
            },
        )
    }
}

/// Which of `present` a group pseudo-property selects.
fn expand_group(group: PropertyId, present: &[PropertyId]) -> Vec<PropertyId> {
    present
        .iter()
        .copied()
        .filter(|p| match group {
            PropertyId::Required => REQUIRED_PROPERTIES.contains(p),
            PropertyId::Optional => !REQUIRED_PROPERTIES.contains(p),
            _ => true,
        })
        .collect()
}

async fn read_one<S: ObjectStore>(
    store: &S,
    object_id: ObjectId,
    property_id: PropertyId,
    array_index: Option<u32>,
) -> PropertyResult {
    let result = match store.read_property(object_id, property_id, array_index).await {
        Ok(value) => ReadResult::Value(value),
        Err(e) => ReadResult::Error {
            error_class: e.class.to_u32(),
            error_code: e.code.to_u32(),
        },
    };
    PropertyResult {
        property_id,
        array_index,
        result,
    }
}

async fn read_access<S: ObjectStore>(store: &S, spec: ReadAccessSpec) -> ReadAccessResult {
    let mut results = Vec::new();
    for reference in spec.properties {
        if !reference.property_id.is_group() {
            results.push(
                read_one(store, spec.object_id, reference.property_id, reference.array_index)
                    .await,
            );
            continue;
        }
        match store.property_list(spec.object_id).await {
            Ok(present) => {
                for property_id in expand_group(reference.property_id, &present) {
                    results.push(read_one(store, spec.object_id, property_id, None).await);
                }
            }
            Err(e) => results.push(PropertyResult {
                property_id: reference.property_id,
                array_index: None,
                result: ReadResult::Error {
                    error_class: e.class.to_u32(),
                    error_code: e.code.to_u32(),
                },
            }),
        }
    }
    ReadAccessResult {
        object_id: spec.object_id,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use bacstack_core::services::{
        PropertyReference, ReadPropertyMultipleRequest, WhoIsRequest,
        SERVICE_READ_PROPERTY, SERVICE_READ_PROPERTY_MULTIPLE,
    };
    use bacstack_core::types::{
        AnyValue, DataValue, MaxApdu, MaxSegments, ObjectType, RejectReason,
    };

    fn ai() -> ObjectId {
        ObjectId::new(ObjectType::AnalogInput, 0)
    }

    fn peer() -> Address {
        Address::local([5])
    }

    async fn dispatcher(config: EngineConfig) -> Dispatcher<MemoryObjectStore> {
        let store = MemoryObjectStore::new();
        store.add_object(config.device_id(), "dev").await;
        store.add_object(ai(), "Zone Temp").await;
        store
            .set_property(ai(), PropertyId::PresentValue, AnyValue::single(DataValue::Real(72.5)))
            .await
            .unwrap();
        store
            .set_property(ai(), PropertyId::CovIncrement, AnyValue::single(DataValue::Real(0.5)))
            .await
            .unwrap();
        Dispatcher::new(Arc::new(store), &config)
    }

    fn indication(request: &ConfirmedServiceRequest) -> Indication {
        Indication {
            peer: peer(),
            invoke_id: 1,
            service_choice: request.service_choice(),
            service_data: request.to_service_data().unwrap(),
            segmented_response_accepted: true,
            max_segments: MaxSegments::Unspecified,
            max_apdu: MaxApdu::UpTo1476,
        }
    }

    async fn run(outcome: Outcome) -> Completion {
        match outcome {
            Outcome::Immediate(c) => c,
            Outcome::Deferred(f) => f.await,
        }
    }

    fn ack_data(completion: &Completion) -> &[u8] {
        match &completion.response {
            ServerResponse::ComplexAck(data) => data,
            other => panic!("expected complex ack, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_property_answers_value() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let req = ConfirmedServiceRequest::ReadProperty(ReadPropertyRequest::new(
            ai(),
            PropertyId::PresentValue,
        ));
        let done = run(d.dispatch(&indication(&req))).await;
        let ack = ConfirmedServiceAck::decode_complex(SERVICE_READ_PROPERTY, ack_data(&done))
            .unwrap();
        let ConfirmedServiceAck::ReadProperty(ack) = ack else {
            panic!("wrong ack");
        };
        assert_eq!(ack.value.as_real(), Some(72.5));
    }

    #[tokio::test]
    async fn read_property_error_and_wildcard_device() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let req = ConfirmedServiceRequest::ReadProperty(ReadPropertyRequest::new(
            ai(),
            PropertyId::Units,
        ));
        let done = run(d.dispatch(&indication(&req))).await;
        assert_eq!(
            done.response,
            ServerResponse::Error {
                class: ErrorClass::Property,
                code: ErrorCode::UnknownProperty
            }
        );

        let req = ConfirmedServiceRequest::ReadProperty(ReadPropertyRequest::new(
            ObjectId::wildcard_device(),
            PropertyId::ObjectIdentifier,
        ));
        let done = run(d.dispatch(&indication(&req))).await;
        let ConfirmedServiceAck::ReadProperty(ack) =
            ConfirmedServiceAck::decode_complex(SERVICE_READ_PROPERTY, ack_data(&done)).unwrap()
        else {
            panic!("wrong ack");
        };
        assert_eq!(ack.object_id, ObjectId::new(ObjectType::Device, 9));
    }

    #[tokio::test]
    async fn read_property_multiple_expands_all() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let req = ConfirmedServiceRequest::ReadPropertyMultiple(ReadPropertyMultipleRequest {
            specs: vec![
                ReadAccessSpec {
                    object_id: ai(),
                    properties: vec![PropertyReference::new(PropertyId::All)],
                },
                ReadAccessSpec {
                    object_id: ObjectId::new(ObjectType::AnalogInput, 99),
                    properties: vec![PropertyReference::new(PropertyId::PresentValue)],
                },
            ],
        });
        let done = run(d.dispatch(&indication(&req))).await;
        let ConfirmedServiceAck::ReadPropertyMultiple(ack) = ConfirmedServiceAck::decode_complex(
            SERVICE_READ_PROPERTY_MULTIPLE,
            ack_data(&done),
        )
        .unwrap() else {
            panic!("wrong ack");
        };
        let names: Vec<PropertyId> = ack.results[0]
            .results
            .iter()
            .map(|r| r.property_id)
            .collect();
        assert!(names.contains(&PropertyId::PresentValue));
        assert!(names.contains(&PropertyId::PropertyList));
        assert!(ack.results[0]
            .results
            .iter()
            .all(|r| matches!(r.result, ReadResult::Value(_))));
        assert_eq!(
            ack.results[1].results[0].result,
            ReadResult::Error {
                error_class: ErrorClass::Object.to_u32(),
                error_code: ErrorCode::UnknownObject.to_u32(),
            }
        );
    }

    #[test]
    fn required_and_optional_split() {
        let present = [
            PropertyId::ObjectName,
            PropertyId::PresentValue,
            PropertyId::Description,
        ];
        assert_eq!(
            expand_group(PropertyId::Required, &present),
            vec![PropertyId::ObjectName, PropertyId::PresentValue]
        );
        assert_eq!(
            expand_group(PropertyId::Optional, &present),
            vec![PropertyId::Description]
        );
    }

    #[tokio::test]
    async fn write_property_checks_priority() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let mut wp = WritePropertyRequest {
            object_id: ai(),
            property_id: PropertyId::PresentValue,
            array_index: None,
            value: AnyValue::single(DataValue::Real(80.0)),
            priority: Some(17),
        };
        let done = run(d.dispatch(&indication(&ConfirmedServiceRequest::WriteProperty(
            wp.clone(),
        ))))
        .await;
        assert_eq!(
            done.response,
            ServerResponse::Error {
                class: ErrorClass::Services,
                code: ErrorCode::ParameterOutOfRange
            }
        );

        wp.priority = Some(8);
        let done = run(d.dispatch(&indication(&ConfirmedServiceRequest::WriteProperty(wp)))).await;
        assert_eq!(done.response, ServerResponse::SimpleAck);
        let value = d
            .store()
            .read_property(ai(), PropertyId::PresentValue, None)
            .await
            .unwrap();
        assert_eq!(value.as_real(), Some(80.0));
    }

    #[tokio::test]
    async fn subscribe_seeds_increment_and_baseline() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let req = ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::new(
            7,
            ai(),
            false,
            Some(60),
        ));
        let done = run(d.dispatch(&indication(&req))).await;
        assert_eq!(done.response, ServerResponse::SimpleAck);
        assert_eq!(
            done.effect,
            Some(Effect::Subscribe {
                key: SubscriptionKey::new(peer(), 7, ai()),
                confirmed: false,
                lifetime: Some(Duration::from_secs(60)),
                cov_increment: Some(0.5),
                baseline: Some(72.5),
            })
        );

        let cancel = ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::cancel(7, ai()));
        let done = run(d.dispatch(&indication(&cancel))).await;
        assert_eq!(
            done.effect,
            Some(Effect::Unsubscribe(SubscriptionKey::new(peer(), 7, ai())))
        );

        let missing = ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::new(
            7,
            ObjectId::new(ObjectType::AnalogInput, 42),
            false,
            None,
        ));
        let done = run(d.dispatch(&indication(&missing))).await;
        assert!(done.effect.is_none());
        assert!(matches!(
            done.response,
            ServerResponse::Error {
                code: ErrorCode::UnknownObject,
                ..
            }
        ));

        let device = ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::new(
            7,
            ObjectId::new(ObjectType::Device, 9),
            false,
            None,
        ));
        let done = run(d.dispatch(&indication(&device))).await;
        assert!(done.effect.is_none());
        assert_eq!(
            done.response,
            ServerResponse::Error {
                class: ErrorClass::Services,
                code: ErrorCode::CovSubscriptionFailed
            }
        );
    }

    #[tokio::test]
    async fn communication_control_password() {
        let d = dispatcher(EngineConfig::new(9).with_dcc_password("secret")).await;
        let wrong = DeviceCommunicationControlRequest::new(DeviceCommunicationState::Disable)
            .with_password("guess");
        let done = run(d.dispatch(&indication(
            &ConfirmedServiceRequest::DeviceCommunicationControl(wrong),
        )))
        .await;
        assert_eq!(
            done.response,
            ServerResponse::Error {
                class: ErrorClass::Security,
                code: ErrorCode::PasswordFailure
            }
        );

        let right = DeviceCommunicationControlRequest::new(DeviceCommunicationState::Disable)
            .with_password("secret")
            .with_duration_minutes(5);
        let done = run(d.dispatch(&indication(
            &ConfirmedServiceRequest::DeviceCommunicationControl(right),
        )))
        .await;
        assert_eq!(
            done.effect,
            Some(Effect::CommunicationControl {
                state: DeviceCommunicationState::Disable,
                duration: Some(Duration::from_secs(300)),
            })
        );
    }

    #[tokio::test]
    async fn unknown_and_malformed_requests_are_rejected() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let mut ind = indication(&ConfirmedServiceRequest::ReadProperty(
            ReadPropertyRequest::new(ai(), PropertyId::PresentValue),
        ));
        ind.service_choice = 0x1F;
        let done = run(d.dispatch(&ind)).await;
        assert_eq!(
            done.response,
            ServerResponse::Reject(RejectReason::UnrecognizedService)
        );

        ind.service_choice = SERVICE_READ_PROPERTY;
        ind.service_data.push(0x00);
        let done = run(d.dispatch(&ind)).await;
        assert_eq!(
            done.response,
            ServerResponse::Reject(RejectReason::TooManyArguments)
        );
    }

    #[tokio::test]
    async fn who_is_gets_i_am_in_range_only() {
        let d = dispatcher(EngineConfig::new(9)).await;
        let who_is = |req: WhoIsRequest| {
            UnconfirmedServiceRequest::WhoIs(req)
                .to_service_data()
                .unwrap()
        };
        let out = d.dispatch_unconfirmed(&peer(), 0x08, &who_is(WhoIsRequest::global()));
        assert_eq!(out.reply, Some(UnconfirmedServiceRequest::IAm(d.i_am())));
        let out = d.dispatch_unconfirmed(&peer(), 0x08, &who_is(WhoIsRequest::range(10, 20)));
        assert!(out.reply.is_none());

        let i_am = UnconfirmedServiceRequest::IAm(d.i_am())
            .to_service_data()
            .unwrap();
        let out = d.dispatch_unconfirmed(&peer(), 0x00, &i_am);
        assert_eq!(out.effect, Some(Effect::LearnDevice(d.i_am())));

        assert_eq!(
            d.dispatch_unconfirmed(&peer(), 0x08, &[0xFF]),
            UnconfirmedOutcome::default()
        );
    }
}
