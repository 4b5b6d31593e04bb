use crate::engine::{Command, EngineEvent};
use crate::error::EngineError;
use crate::store::ValueChangeListener;
use crate::subscription::{SubscriptionInfo, SubscriptionKey};
use crate::transaction::ConfirmedAck;
use bacstack_core::services::{
    ConfirmedServiceAck, ConfirmedServiceRequest, CovPropertyValue,
    DeviceCommunicationControlRequest, DeviceCommunicationState, PropertyReference,
    ReadAccessResult, ReadAccessSpec, ReadPropertyMultipleRequest, ReadPropertyRequest,
    SubscribeCovRequest, UnconfirmedServiceRequest, WhoIsRequest, WritePropertyRequest,
};
use bacstack_core::types::{AnyValue, ObjectId, PropertyId, Segmentation};
use bacstack_datalink::Address;
use futures_util::future::join_all;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A device that answered a Who-Is.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    pub address: Address,
    pub device_id: ObjectId,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u32,
}

/// Cheap, cloneable handle to a running [`Engine`](crate::Engine).
///
/// Every call is posted to the engine loop. Once the engine stops, calls
/// fail with [`EngineError::Shutdown`].
#[derive(Debug, Clone)]
pub struct BacnetClient {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<EngineEvent>,
    request_ids: Arc<AtomicU64>,
}

impl BacnetClient {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        events: broadcast::Sender<EngineEvent>,
        request_ids: Arc<AtomicU64>,
    ) -> Self {
        Self {
            commands,
            events,
            request_ids,
        }
    }

    fn post(&self, command: Command) -> Result<(), EngineError> {
        self.commands.send(command).map_err(|_| EngineError::Shutdown)
    }

    /// Subscribes to I-Am and COV notification events. Slow receivers miss
    /// events rather than stalling the engine.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sends a confirmed request and returns a handle to its outcome.
    /// Dropping the handle cancels the transaction.
    pub fn start_request(
        &self,
        peer: Address,
        request: &ConfirmedServiceRequest,
    ) -> Result<PendingRequest, EngineError> {
        self.start_raw(peer, None, request.service_choice(), request.to_service_data()?)
    }

    /// Like [`start_request`](Self::start_request) but with a caller-chosen
    /// invoke id. Fails with [`EngineError::InvokeIdInUse`] if that id is
    /// still outstanding toward `peer`.
    pub fn start_request_with_invoke_id(
        &self,
        peer: Address,
        invoke_id: u8,
        request: &ConfirmedServiceRequest,
    ) -> Result<PendingRequest, EngineError> {
        self.start_raw(
            peer,
            Some(invoke_id),
            request.service_choice(),
            request.to_service_data()?,
        )
    }

    fn start_raw(
        &self,
        peer: Address,
        invoke_id: Option<u8>,
        service_choice: u8,
        service_data: Vec<u8>,
    ) -> Result<PendingRequest, EngineError> {
        let request_id = self.request_ids.fetch_add(1, Ordering::Relaxed);
        let (waiter, rx) = oneshot::channel();
        self.post(Command::Request {
            request_id,
            peer,
            invoke_id,
            service_choice,
            service_data,
            waiter,
        })?;
        Ok(PendingRequest {
            request_id,
            service_choice,
            commands: self.commands.clone(),
            rx,
            finished: false,
        })
    }

    /// Sends a confirmed request and waits for its decoded result.
    pub async fn execute_request(
        &self,
        peer: Address,
        request: ConfirmedServiceRequest,
    ) -> Result<ConfirmedServiceAck, EngineError> {
        let pending = self.start_request(peer, &request)?;
        pending.await_decoded().await
    }

    /// Runs several requests concurrently. Results come back in input
    /// order and fail independently.
    pub async fn execute_requests<I>(&self, requests: I) -> Vec<Result<ConfirmedServiceAck, EngineError>>
    where
        I: IntoIterator<Item = (Address, ConfirmedServiceRequest)>,
    {
        join_all(
            requests
                .into_iter()
                .map(|(peer, request)| self.execute_request(peer, request)),
        )
        .await
    }

    pub async fn read_property(
        &self,
        peer: Address,
        object_id: ObjectId,
        property_id: PropertyId,
    ) -> Result<AnyValue, EngineError> {
        self.read_property_index(peer, object_id, property_id, None)
            .await
    }

    pub async fn read_property_index(
        &self,
        peer: Address,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
    ) -> Result<AnyValue, EngineError> {
        let mut request = ReadPropertyRequest::new(object_id, property_id);
        request.array_index = array_index;
        match self
            .execute_request(peer, ConfirmedServiceRequest::ReadProperty(request))
            .await?
        {
            ConfirmedServiceAck::ReadProperty(ack) => Ok(ack.value),
            other => Err(EngineError::UnexpectedResponse {
                service_choice: other.service_choice(),
            }),
        }
    }

    /// Reads several properties of several objects in one transaction.
    pub async fn read_property_multiple(
        &self,
        peer: Address,
        specs: Vec<(ObjectId, Vec<PropertyId>)>,
    ) -> Result<Vec<ReadAccessResult>, EngineError> {
        let specs = specs
            .into_iter()
            .map(|(object_id, properties)| ReadAccessSpec {
                object_id,
                properties: properties.into_iter().map(PropertyReference::new).collect(),
            })
            .collect();
        let request = ConfirmedServiceRequest::ReadPropertyMultiple(ReadPropertyMultipleRequest {
            specs,
        });
        match self.execute_request(peer, request).await? {
            ConfirmedServiceAck::ReadPropertyMultiple(ack) => Ok(ack.results),
            other => Err(EngineError::UnexpectedResponse {
                service_choice: other.service_choice(),
            }),
        }
    }

    pub async fn write_property(
        &self,
        peer: Address,
        object_id: ObjectId,
        property_id: PropertyId,
        value: AnyValue,
        priority: Option<u8>,
    ) -> Result<(), EngineError> {
        let request = ConfirmedServiceRequest::WriteProperty(WritePropertyRequest {
            object_id,
            property_id,
            array_index: None,
            value,
            priority,
        });
        self.execute_request(peer, request).await.map(|_| ())
    }

    /// Subscribes `process_id` to changes of `object_id` on `peer`. A
    /// lifetime of `None` asks for an indefinite subscription.
    pub async fn subscribe_cov(
        &self,
        peer: Address,
        process_id: u32,
        object_id: ObjectId,
        confirmed: bool,
        lifetime: Option<Duration>,
    ) -> Result<(), EngineError> {
        let lifetime_seconds =
            lifetime.map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX).max(1));
        let request = ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::new(
            process_id,
            object_id,
            confirmed,
            lifetime_seconds,
        ));
        self.execute_request(peer, request).await.map(|_| ())
    }

    pub async fn unsubscribe_cov(
        &self,
        peer: Address,
        process_id: u32,
        object_id: ObjectId,
    ) -> Result<(), EngineError> {
        let request =
            ConfirmedServiceRequest::SubscribeCov(SubscribeCovRequest::cancel(process_id, object_id));
        self.execute_request(peer, request).await.map(|_| ())
    }

    pub async fn device_communication_control(
        &self,
        peer: Address,
        state: DeviceCommunicationState,
        duration_minutes: Option<u16>,
        password: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut request = DeviceCommunicationControlRequest::new(state);
        if let Some(minutes) = duration_minutes {
            request = request.with_duration_minutes(minutes);
        }
        if let Some(password) = password {
            request = request.with_password(password);
        }
        self.execute_request(
            peer,
            ConfirmedServiceRequest::DeviceCommunicationControl(request),
        )
        .await
        .map(|_| ())
    }

    /// Broadcasts (or unicasts) a Who-Is, optionally limited to an
    /// inclusive instance range.
    pub async fn who_is(&self, peer: Address, range: Option<(u32, u32)>) -> Result<(), EngineError> {
        let who_is = match range {
            Some((low, high)) => WhoIsRequest::range(low, high),
            None => WhoIsRequest::global(),
        };
        self.send_unconfirmed(peer, UnconfirmedServiceRequest::WhoIs(who_is))
            .await
    }

    pub async fn send_unconfirmed(
        &self,
        peer: Address,
        request: UnconfirmedServiceRequest,
    ) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Unconfirmed {
            peer,
            request,
            reply,
        })?;
        rx.await.map_err(|_| EngineError::Shutdown)?
    }

    /// Sends a Who-Is and collects the I-Am answers heard within `wait`.
    /// A device answering twice is listed once.
    pub async fn discover(
        &self,
        peer: Address,
        range: Option<(u32, u32)>,
        wait: Duration,
    ) -> Result<Vec<DiscoveredDevice>, EngineError> {
        let mut events = self.events();
        self.who_is(peer, range).await?;

        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => break,
                Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    log::debug!("discovery missed {missed} events");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Ok(Ok(event)) => event,
            };
            let EngineEvent::IAm { source, i_am } = event else {
                continue;
            };
            if range.is_some_and(|(low, high)| {
                !(low..=high).contains(&i_am.device_id.instance())
            }) {
                continue;
            }
            if devices.iter().any(|d| d.device_id == i_am.device_id) {
                continue;
            }
            devices.push(DiscoveredDevice {
                address: source,
                device_id: i_am.device_id,
                max_apdu: i_am.max_apdu,
                segmentation: i_am.segmentation,
                vendor_id: i_am.vendor_id,
            });
        }
        Ok(devices)
    }

    /// Tells subscribers of `object_id` on this device that properties
    /// changed.
    pub fn notify_value_change(
        &self,
        object_id: ObjectId,
        values: Vec<CovPropertyValue>,
    ) -> Result<(), EngineError> {
        self.post(Command::ValueChanged { object_id, values })
    }

    /// Looks up a subscription held by this device. Expired entries are
    /// pruned and reported as absent.
    pub async fn lookup_subscription(
        &self,
        key: SubscriptionKey,
    ) -> Result<Option<SubscriptionInfo>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::LookupSubscription { key, reply })?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// Drops everything known about `peer`: cached capabilities and the
    /// subscriptions it holds here.
    pub fn forget_device(&self, peer: Address) -> Result<(), EngineError> {
        self.post(Command::ForgetDevice(peer))
    }

    /// Stops the engine. Outstanding requests fail with
    /// [`EngineError::Shutdown`].
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

impl ValueChangeListener for BacnetClient {
    fn on_value_changed(&self, object_id: ObjectId, property_id: PropertyId, value: &AnyValue) {
        let values = vec![CovPropertyValue::new(property_id, value.clone())];
        if self.notify_value_change(object_id, values).is_err() {
            log::debug!("engine stopped; change of {object_id:?} not reported");
        }
    }
}

/// A confirmed request in flight.
///
/// Resolves to the raw acknowledgement. Dropping it before it resolves
/// cancels the transaction.
#[derive(Debug)]
pub struct PendingRequest {
    request_id: u64,
    service_choice: u8,
    commands: mpsc::UnboundedSender<Command>,
    rx: oneshot::Receiver<Result<ConfirmedAck, EngineError>>,
    finished: bool,
}

impl PendingRequest {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn service_choice(&self) -> u8 {
        self.service_choice
    }

    /// Aborts the transaction locally. A late response is discarded.
    pub fn cancel(self) {
        drop(self);
    }

    /// Waits for the acknowledgement and decodes its service data.
    pub async fn await_decoded(self) -> Result<ConfirmedServiceAck, EngineError> {
        let service_choice = self.service_choice;
        match self.await? {
            ConfirmedAck::Simple {
                service_choice: acked,
            } if acked == service_choice => Ok(ConfirmedServiceAck::SimpleAck { service_choice }),
            ConfirmedAck::Complex {
                service_choice: acked,
                service_data,
            } if acked == service_choice => {
                Ok(ConfirmedServiceAck::decode_complex(acked, &service_data)?)
            }
            ConfirmedAck::Simple { service_choice }
            | ConfirmedAck::Complex { service_choice, .. } => {
                Err(EngineError::UnexpectedResponse { service_choice })
            }
        }
    }
}

impl Future for PendingRequest {
    type Output = Result<ConfirmedAck, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(result)) => result,
            Poll::Ready(Err(_)) => Err(EngineError::Shutdown),
        };
        self.finished = true;
        Poll::Ready(result)
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.commands.send(Command::Cancel(self.request_id));
        }
    }
}
