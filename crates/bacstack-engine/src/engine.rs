//! The event loop tying transport, transactions and services together.
//!
//! Everything that mutates engine state happens inside [`Engine::run`]:
//! inbound frames, commands from [`BacnetClient`] handles, handler
//! completions and timers are interleaved in one `select!`, so the tables
//! need no locking.

use crate::client::BacnetClient;
use crate::config::EngineConfig;
use crate::device_info::DeviceInfoCache;
use crate::dispatcher::{Completion, Dispatcher, Effect, Outcome};
use crate::error::EngineError;
use crate::store::{ObjectStore, PropertyError};
use crate::subscription::{
    is_reported, reported_values, CovNotice, SubscriptionInfo, SubscriptionKey,
    SubscriptionRegistry,
};
use crate::transaction::{
    Action, ConfirmedAck, Indication, OutgoingRequest, ServerState, TransactionManager,
};
use bacstack_core::apdu::{Apdu, UnconfirmedRequest};
use bacstack_core::npdu::{NpduAddress, GLOBAL_BROADCAST_NETWORK};
use bacstack_core::services::{
    ConfirmedServiceRequest, CovNotificationRequest, CovPropertyValue, DeviceCommunicationState,
    IAmRequest, UnconfirmedServiceRequest, SERVICE_CONFIRMED_COV_NOTIFICATION,
    SERVICE_DEVICE_COMMUNICATION_CONTROL,
};
use bacstack_core::types::{ObjectId, PropertyId};
use bacstack_core::{decode_apdu, decode_npdu, encode_apdu, encode_npdu, EncodeError, Npdu};
use bacstack_datalink::{Address, DataLink, DataLinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

/// Largest frame the engine reads from the transport.
const RECV_BUFFER_LEN: usize = 2048;
const EVENT_CAPACITY: usize = 64;

/// Something the application may want to observe.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    IAm {
        source: Address,
        i_am: IAmRequest,
    },
    CovNotification {
        source: Address,
        confirmed: bool,
        notification: CovNotificationRequest,
    },
}

pub(crate) type Waiter = oneshot::Sender<Result<ConfirmedAck, EngineError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Request {
        request_id: u64,
        peer: Address,
        invoke_id: Option<u8>,
        service_choice: u8,
        service_data: Vec<u8>,
        waiter: Waiter,
    },
    Cancel(u64),
    Unconfirmed {
        peer: Address,
        request: UnconfirmedServiceRequest,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    ValueChanged {
        object_id: ObjectId,
        values: Vec<CovPropertyValue>,
    },
    LookupSubscription {
        key: SubscriptionKey,
        reply: oneshot::Sender<Option<SubscriptionInfo>>,
    },
    ForgetDevice(Address),
    Shutdown,
}

impl Command {
    /// Answers a command that will never run.
    fn refuse(self, error: impl Fn() -> EngineError) {
        match self {
            Self::Request { waiter, .. } => {
                let _ = waiter.send(Err(error()));
            }
            Self::Unconfirmed { reply, .. } => {
                let _ = reply.send(Err(error()));
            }
            Self::LookupSubscription { reply, .. } => {
                let _ = reply.send(None);
            }
            Self::Cancel(_)
            | Self::ValueChanged { .. }
            | Self::ForgetDevice(_)
            | Self::Shutdown => {}
        }
    }
}

type HandlerResult = (Address, u8, Completion);

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One local BACnet device's protocol engine.
pub struct Engine<D, S> {
    datalink: D,
    config: EngineConfig,
    dispatcher: Dispatcher<S>,
    transactions: TransactionManager<Waiter>,
    devices: DeviceInfoCache,
    subscriptions: SubscriptionRegistry,
    commands: mpsc::UnboundedReceiver<Command>,
    handler_tx: mpsc::UnboundedSender<HandlerResult>,
    handler_rx: mpsc::UnboundedReceiver<HandlerResult>,
    events: broadcast::Sender<EngineEvent>,
    request_ids: Arc<AtomicU64>,
    communication: DeviceCommunicationState,
    communication_until: Option<Instant>,
}

impl<D, S> std::fmt::Debug for Engine<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("device_id", &self.config.device_id())
            .field("clients", &self.transactions.client_count())
            .field("servers", &self.transactions.server_count())
            .field("subscriptions", &self.subscriptions.len())
            .field("communication", &self.communication)
            .finish_non_exhaustive()
    }
}

impl<D: DataLink, S: ObjectStore> Engine<D, S> {
    /// Builds an engine and the first handle to it. Nothing happens until
    /// [`run`](Self::run) is polled.
    pub fn new(datalink: D, store: Arc<S>, config: EngineConfig) -> (Self, BacnetClient) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (handler_tx, handler_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let request_ids = Arc::new(AtomicU64::new(1));
        let client = BacnetClient::new(command_tx, events.clone(), Arc::clone(&request_ids));
        let engine = Self {
            datalink,
            dispatcher: Dispatcher::new(store, &config),
            transactions: TransactionManager::new(config.clone()),
            devices: DeviceInfoCache::new(),
            subscriptions: SubscriptionRegistry::new(
                config.max_subscriptions,
                config.renew_lifetime_on_notify,
            ),
            config,
            commands,
            handler_tx,
            handler_rx,
            events,
            request_ids,
            communication: DeviceCommunicationState::Enable,
            communication_until: None,
        };
        (engine, client)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        self.dispatcher.store()
    }

    /// Runs until every client handle is dropped, `shutdown` is called, or
    /// the transport closes. Outstanding requests then fail with
    /// [`EngineError::Shutdown`].
    pub async fn run(mut self) -> Result<(), EngineError> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let mut sweep = tokio::time::interval(self.config.cov_sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("engine for {:?} running", self.config.device_id());

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                received = self.datalink.recv(&mut buf) => match received {
                    Ok((len, source)) => self.handle_frame(&buf[..len], source).await,
                    Err(DataLinkError::Closed) => {
                        self.shut_down();
                        return Err(DataLinkError::Closed.into());
                    }
                    Err(e) => log::warn!("datalink receive failed: {e}"),
                },
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        self.shut_down();
                        return Ok(());
                    }
                    Some(command) => self.handle_command(command).await,
                },
                Some((peer, invoke_id, completion)) = self.handler_rx.recv() => {
                    self.complete(peer, invoke_id, completion).await;
                }
                () = sleep_until(deadline) => self.on_timer().await,
                _ = sweep.tick() => {
                    let removed = self.subscriptions.sweep(Instant::now());
                    if removed > 0 {
                        log::debug!("swept {removed} expired cov subscriptions");
                    }
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.transactions.next_deadline(), self.communication_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn shut_down(&mut self) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            command.refuse(|| EngineError::Shutdown);
        }
        for action in self.transactions.abort_all() {
            if let Action::Deliver { waiter, result } = action {
                let _ = waiter.send(result);
            }
        }
        log::debug!("engine for {:?} stopped", self.config.device_id());
    }

    fn initiation_allowed(&self) -> bool {
        self.communication == DeviceCommunicationState::Enable
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();
        if self.communication_until.is_some_and(|at| at <= now) {
            log::debug!("communication control duration elapsed; enabling");
            self.communication = DeviceCommunicationState::Enable;
            self.communication_until = None;
        }
        let actions = self.transactions.on_timeout(now);
        self.perform(actions).await;
    }

    async fn handle_frame(&mut self, frame: &[u8], link_source: Address) {
        log::trace!("rx {} octets from {link_source}", frame.len());
        let npdu = match decode_npdu(frame) {
            Ok(npdu) => npdu,
            Err(e) => {
                log::debug!("dropping frame from {link_source}: {e}");
                return;
            }
        };
        if npdu.is_network_message() {
            log::debug!("ignoring network layer message from {link_source}");
            return;
        }
        if let Some(dest) = &npdu.destination {
            if dest.address.network != GLOBAL_BROADCAST_NETWORK {
                log::debug!(
                    "dropping frame for network {} from {link_source}",
                    dest.address.network
                );
                return;
            }
        }
        let peer = match npdu.source {
            Some(source) => {
                self.devices.learn_router(source.network, link_source);
                Address::remote(source.network, source.mac)
            }
            None => link_source,
        };
        match decode_apdu(&npdu.payload) {
            Ok(apdu) => self.handle_apdu(peer, apdu).await,
            Err(e) => log::debug!("dropping apdu from {peer}: {e}"),
        }
    }

    async fn handle_apdu(&mut self, peer: Address, apdu: Apdu) {
        match apdu {
            Apdu::UnconfirmedRequest(request) => self.handle_unconfirmed(peer, request).await,
            Apdu::ConfirmedRequest(request) => {
                if self.communication == DeviceCommunicationState::Disable
                    && request.service_choice != SERVICE_DEVICE_COMMUNICATION_CONTROL
                {
                    log::debug!(
                        "communication disabled; dropping service {} from {peer}",
                        request.service_choice
                    );
                    return;
                }
                self.devices.learn_request(
                    &peer,
                    request.max_apdu,
                    request.max_segments,
                    request.segmented_response_accepted,
                );
                let actions = self.transactions.handle_apdu(
                    &peer,
                    Apdu::ConfirmedRequest(request),
                    Instant::now(),
                );
                self.perform(actions).await;
            }
            other => {
                let actions = self.transactions.handle_apdu(&peer, other, Instant::now());
                self.perform(actions).await;
            }
        }
    }

    async fn handle_unconfirmed(&mut self, peer: Address, request: UnconfirmedRequest) {
        if self.communication == DeviceCommunicationState::Disable {
            log::debug!("communication disabled; dropping unconfirmed service from {peer}");
            return;
        }
        let outcome =
            self.dispatcher
                .dispatch_unconfirmed(&peer, request.service_choice, &request.service_data);
        if let Some(effect) = outcome.effect {
            if let Err(e) = self.apply_effect(&peer, effect) {
                log::debug!("unconfirmed service from {peer} not applied: {e}");
            }
        }
        if let Some(reply) = outcome.reply {
            // I-Am replies go out even while initiation is disabled.
            let target = if peer.is_local() {
                Address::local_broadcast()
            } else {
                Address::global_broadcast()
            };
            if let Err(e) = self.send_unconfirmed(&target, &reply).await {
                log::warn!("failed to answer {peer}: {e}");
            }
        }
    }

    /// Starts a handler for a complete indication. Its result comes back
    /// through the handler channel, even when it is immediate.
    fn dispatch(&mut self, indication: Indication) {
        let (peer, invoke_id) = (indication.peer.clone(), indication.invoke_id);
        match self.dispatcher.dispatch(&indication) {
            Outcome::Immediate(completion) => {
                let _ = self.handler_tx.send((peer, invoke_id, completion));
            }
            Outcome::Deferred(handler) => {
                let tx = self.handler_tx.clone();
                tokio::spawn(async move {
                    let completion = handler.await;
                    let _ = tx.send((peer, invoke_id, completion));
                });
            }
        }
    }

    async fn complete(&mut self, peer: Address, invoke_id: u8, completion: Completion) {
        if self.transactions.server_state(&peer, invoke_id) != Some(ServerState::AwaitingHandler) {
            log::debug!("discarding late handler result for {invoke_id} from {peer}");
            return;
        }
        let mut response = completion.response;
        if let Some(effect) = completion.effect {
            if let Err(e) = self.apply_effect(&peer, effect) {
                response = e.into();
            }
        }
        let actions = self
            .transactions
            .respond(&peer, invoke_id, response, Instant::now());
        self.perform(actions).await;
    }

    fn apply_effect(&mut self, peer: &Address, effect: Effect) -> Result<(), PropertyError> {
        let now = Instant::now();
        match effect {
            Effect::Subscribe {
                key,
                confirmed,
                lifetime,
                cov_increment,
                baseline,
            } => {
                self.subscriptions
                    .subscribe(key, confirmed, lifetime, cov_increment, baseline, now)?;
            }
            Effect::Unsubscribe(key) => {
                self.subscriptions.unsubscribe(&key);
            }
            Effect::CommunicationControl { state, duration } => {
                log::debug!("communication control from {peer}: {state:?} for {duration:?}");
                self.communication = state;
                self.communication_until = match state {
                    DeviceCommunicationState::Enable => None,
                    _ => duration.map(|d| now + d),
                };
            }
            Effect::CovNotification {
                notification,
                confirmed,
            } => {
                let _ = self.events.send(EngineEvent::CovNotification {
                    source: peer.clone(),
                    confirmed,
                    notification,
                });
            }
            Effect::LearnDevice(i_am) => {
                self.devices.learn_i_am(peer.clone(), &i_am);
                let _ = self.events.send(EngineEvent::IAm {
                    source: peer.clone(),
                    i_am,
                });
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Request {
                request_id,
                peer,
                invoke_id,
                service_choice,
                service_data,
                waiter,
            } => {
                if !self.initiation_allowed() {
                    let _ = waiter.send(Err(EngineError::CommunicationDisabled));
                    return;
                }
                let request = OutgoingRequest {
                    request_id,
                    peer_info: self.devices.get(&peer),
                    peer,
                    invoke_id,
                    service_choice,
                    service_data,
                    waiter,
                };
                let actions = self.transactions.send_request(request, Instant::now());
                self.perform(actions).await;
            }
            Command::Cancel(request_id) => {
                let actions = self.transactions.cancel(request_id);
                self.perform(actions).await;
            }
            Command::Unconfirmed {
                peer,
                request,
                reply,
            } => {
                let result = if self.initiation_allowed() {
                    self.send_unconfirmed(&peer, &request).await
                } else {
                    Err(EngineError::CommunicationDisabled)
                };
                let _ = reply.send(result);
            }
            Command::ValueChanged { object_id, values } => {
                if !self.initiation_allowed() {
                    log::debug!("communication disabled; cov notifications suppressed");
                    return;
                }
                let changed: Vec<PropertyId> = values.iter().map(|v| v.property_id).collect();
                if !changed.iter().copied().any(is_reported)
                    || self.subscriptions.for_object(object_id, Instant::now()).is_empty()
                {
                    return;
                }
                let reported = reported_values(self.store().as_ref(), object_id, &values).await;
                let notices = self.subscriptions.notify(
                    self.config.device_id(),
                    object_id,
                    &changed,
                    &reported,
                    Instant::now(),
                );
                for notice in notices {
                    self.send_notice(notice).await;
                }
            }
            Command::LookupSubscription { key, reply } => {
                let found = self.subscriptions.lookup(&key, Instant::now()).cloned();
                let _ = reply.send(found);
            }
            Command::ForgetDevice(peer) => {
                self.devices.remove(&peer);
                let removed = self.subscriptions.remove_subscriber(&peer);
                log::debug!("forgot {peer} and {removed} of its subscriptions");
            }
            Command::Shutdown => {}
        }
    }

    async fn send_notice(&mut self, notice: CovNotice) {
        let CovNotice {
            subscriber,
            confirmed,
            request,
        } = notice;
        if !confirmed {
            let request = UnconfirmedServiceRequest::UnconfirmedCovNotification(request);
            if let Err(e) = self.send_unconfirmed(&subscriber, &request).await {
                log::warn!("cov notification to {subscriber} failed: {e}");
            }
            return;
        }
        let service_data = match ConfirmedServiceRequest::ConfirmedCovNotification(request)
            .to_service_data()
        {
            Ok(data) => data,
            Err(e) => {
                log::warn!("cov notification to {subscriber} not encodable: {e}");
                return;
            }
        };
        // Nobody awaits the acknowledgement; failures are only logged.
        let (waiter, _) = oneshot::channel();
        let request = OutgoingRequest {
            request_id: self.request_ids.fetch_add(1, Ordering::Relaxed),
            peer_info: self.devices.get(&subscriber),
            peer: subscriber,
            invoke_id: None,
            service_choice: SERVICE_CONFIRMED_COV_NOTIFICATION,
            service_data,
            waiter,
        };
        let actions = self.transactions.send_request(request, Instant::now());
        self.perform(actions).await;
    }

    async fn perform(&mut self, actions: Vec<Action<Waiter>>) {
        for action in actions {
            match action {
                Action::Send { peer, apdu } => self.send_apdu(&peer, &apdu).await,
                Action::Deliver { waiter, result } => {
                    if let Err(e) = &result {
                        log::debug!("request finished with {e}");
                    }
                    // A dropped receiver means the caller stopped waiting.
                    let _ = waiter.send(result);
                }
                Action::Dispatch(indication) => self.dispatch(indication),
            }
        }
    }

    async fn send_unconfirmed(
        &self,
        peer: &Address,
        request: &UnconfirmedServiceRequest,
    ) -> Result<(), EngineError> {
        let apdu = Apdu::UnconfirmedRequest(UnconfirmedRequest::new(
            request.service_choice(),
            request.to_service_data()?,
        ));
        let (link, frame) = self.frame(peer, &apdu)?;
        self.datalink.send(&link, &frame).await?;
        Ok(())
    }

    async fn send_apdu(&self, peer: &Address, apdu: &Apdu) {
        match self.frame(peer, apdu) {
            Ok((link, frame)) => {
                log::trace!("tx {} octets to {peer} via {link}", frame.len());
                if let Err(e) = self.datalink.send(&link, &frame).await {
                    log::warn!("send to {peer} failed: {e}");
                }
            }
            Err(e) => log::warn!("could not encode apdu for {peer}: {e}"),
        }
    }

    /// Wraps `apdu` in an NPDU and picks the link-level next hop.
    fn frame(&self, peer: &Address, apdu: &Apdu) -> Result<(Address, Vec<u8>), EncodeError> {
        let mut npdu = Npdu::new(encode_apdu(apdu)?)
            .with_expecting_reply(matches!(apdu, Apdu::ConfirmedRequest(_)));
        let link = if peer.is_local() {
            peer.clone()
        } else {
            npdu = npdu.with_destination(NpduAddress::new(peer.network(), peer.mac()));
            if peer.is_global_broadcast() {
                Address::local_broadcast()
            } else {
                self.devices
                    .router_for(peer.network())
                    .cloned()
                    .unwrap_or_else(Address::local_broadcast)
            }
        };
        Ok((link, encode_npdu(&npdu)?))
    }
}
