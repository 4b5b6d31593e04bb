//! Transaction state machines for confirmed services.
//!
//! [`TransactionManager`] is sans-IO: every input (an APDU from a peer, a
//! handler result, the passage of time) returns a list of [`Action`]s for the
//! engine to carry out. It owns the invoke-id table for both directions and
//! never blocks. The waiter type `W` is whatever the caller wants handed back
//! when a client transaction ends; the engine uses a oneshot sender.

use crate::config::EngineConfig;
use crate::device_info::DeviceInfo;
use crate::error::{EngineError, ProtocolError};
use crate::segmentation::{
    segment_size, split, AckInfo, AckOutcome, Reassembler, ReassemblyError, SegmentSender,
    SegmentStep, COMPLEX_ACK_SEGMENT_OVERHEAD, CONFIRMED_REQUEST_SEGMENT_OVERHEAD,
};
use bacstack_core::apdu::{
    AbortPdu, Apdu, ComplexAck, ConfirmedRequest, ErrorPdu, RejectPdu, SegmentAck, SegmentHeader,
    SimpleAck,
};
use bacstack_core::types::{AbortReason, ErrorClass, ErrorCode, MaxApdu, MaxSegments, RejectReason};
use bacstack_datalink::Address;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub type TransactionKey = (Address, u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    AwaitingSegmentAck,
    SegmentedRequestInProgress,
    AwaitingResponse,
    SegmentedResponseInProgress,
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    SegmentedRequestInProgress,
    AwaitingHandler,
    SegmentedResponseInProgress,
}

/// Successful end of a client transaction, before service decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmedAck {
    Simple {
        service_choice: u8,
    },
    Complex {
        service_choice: u8,
        service_data: Vec<u8>,
    },
}

/// A confirmed request the local application wants sent.
#[derive(Debug)]
pub struct OutgoingRequest<W> {
    /// Caller-chosen handle used for cancellation.
    pub request_id: u64,
    pub peer: Address,
    /// Pin a specific invoke id instead of allocating one.
    pub invoke_id: Option<u8>,
    pub service_choice: u8,
    pub service_data: Vec<u8>,
    pub peer_info: DeviceInfo,
    pub waiter: W,
}

/// A complete (reassembled if needed) confirmed request from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indication {
    pub peer: Address,
    pub invoke_id: u8,
    pub service_choice: u8,
    pub service_data: Vec<u8>,
    pub segmented_response_accepted: bool,
    pub max_segments: MaxSegments,
    pub max_apdu: MaxApdu,
}

/// What a service handler produced for an [`Indication`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerResponse {
    SimpleAck,
    ComplexAck(Vec<u8>),
    Error { class: ErrorClass, code: ErrorCode },
    Reject(RejectReason),
    Abort(AbortReason),
}

#[derive(Debug)]
pub enum Action<W> {
    Send { peer: Address, apdu: Apdu },
    Deliver {
        waiter: W,
        result: Result<ConfirmedAck, EngineError>,
    },
    Dispatch(Indication),
}

#[derive(Debug)]
struct ClientTransaction<W> {
    request_id: u64,
    state: ClientState,
    /// Header fields, plus the whole service data when unsegmented.
    template: ConfirmedRequest,
    sender: Option<SegmentSender>,
    reassembler: Option<Reassembler>,
    retry_count: u8,
    deadline: Instant,
    waiter: W,
}

impl<W> ClientTransaction<W> {
    fn request_segment(&self, index: usize) -> Option<Apdu> {
        let sender = self.sender.as_ref()?;
        let (header, data) = sender.segment(index);
        Some(Apdu::ConfirmedRequest(ConfirmedRequest {
            segment: Some(header),
            service_data: data.to_vec(),
            ..self.template.clone()
        }))
    }

    fn all_segments_sent(&self) -> bool {
        self.sender
            .as_ref()
            .map_or(true, |s| s.outstanding().end >= s.len())
    }
}

#[derive(Debug)]
struct ServerTransaction {
    state: ServerState,
    service_choice: u8,
    segmented_response_accepted: bool,
    max_segments: MaxSegments,
    max_apdu: MaxApdu,
    reassembler: Option<Reassembler>,
    sender: Option<SegmentSender>,
    retry_count: u8,
    deadline: Instant,
}

impl ServerTransaction {
    fn response_segment(&self, invoke_id: u8, index: usize) -> Option<Apdu> {
        let sender = self.sender.as_ref()?;
        let (header, data) = sender.segment(index);
        Some(Apdu::ComplexAck(ComplexAck {
            invoke_id,
            segment: Some(header),
            service_choice: self.service_choice,
            service_data: data.to_vec(),
        }))
    }
}

fn segment_ack(server: bool, invoke_id: u8, ack: AckInfo) -> Apdu {
    Apdu::SegmentAck(SegmentAck {
        negative: ack.negative,
        server,
        invoke_id,
        sequence_number: ack.sequence_number,
        actual_window_size: ack.window_size,
    })
}

fn abort(server: bool, invoke_id: u8, reason: AbortReason) -> Apdu {
    Apdu::Abort(AbortPdu {
        server,
        invoke_id,
        reason: reason.to_u8(),
    })
}

/// Invoke-id tables and the per-transaction state machines.
#[derive(Debug)]
pub struct TransactionManager<W> {
    config: EngineConfig,
    clients: HashMap<TransactionKey, ClientTransaction<W>>,
    servers: HashMap<TransactionKey, ServerTransaction>,
    next_invoke: HashMap<Address, u8>,
}

impl<W> TransactionManager<W> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clients: HashMap::new(),
            servers: HashMap::new(),
            next_invoke: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn client_state(&self, peer: &Address, invoke_id: u8) -> Option<ClientState> {
        self.clients
            .get(&(peer.clone(), invoke_id))
            .map(|tx| tx.state)
    }

    pub fn server_state(&self, peer: &Address, invoke_id: u8) -> Option<ServerState> {
        self.servers
            .get(&(peer.clone(), invoke_id))
            .map(|tx| tx.state)
    }

    /// Invoke ids of client transactions still open toward `peer`.
    pub fn active_invoke_ids(&self, peer: &Address) -> Vec<u8> {
        let mut ids: Vec<u8> = self
            .clients
            .keys()
            .filter(|(p, _)| p == peer)
            .map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Earliest timer across all transactions.
    pub fn next_deadline(&self) -> Option<Instant> {
        let clients = self.clients.values().map(|tx| tx.deadline);
        let servers = self.servers.values().map(|tx| tx.deadline);
        clients.chain(servers).min()
    }

    fn allocate_invoke_id(&mut self, peer: &Address, pinned: Option<u8>) -> Result<u8, EngineError> {
        if let Some(invoke_id) = pinned {
            if self.clients.contains_key(&(peer.clone(), invoke_id)) {
                return Err(EngineError::InvokeIdInUse { invoke_id });
            }
            return Ok(invoke_id);
        }
        let counter = self.next_invoke.entry(peer.clone()).or_insert(0);
        let start = *counter;
        for offset in 0..=u8::MAX {
            let candidate = start.wrapping_add(offset);
            if !self.clients.contains_key(&(peer.clone(), candidate)) {
                *counter = candidate.wrapping_add(1);
                return Ok(candidate);
            }
        }
        Err(EngineError::InvokeIdInUse { invoke_id: start })
    }

    /// Starts a client transaction. Failures that happen before anything is
    /// sent come back as a `Deliver` of the error.
    pub fn send_request(&mut self, request: OutgoingRequest<W>, now: Instant) -> Vec<Action<W>> {
        let OutgoingRequest {
            request_id,
            peer,
            invoke_id,
            service_choice,
            service_data,
            peer_info,
            waiter,
        } = request;

        let invoke_id = match self.allocate_invoke_id(&peer, invoke_id) {
            Ok(id) => id,
            Err(e) => {
                return vec![Action::Deliver {
                    waiter,
                    result: Err(e),
                }]
            }
        };

        let mut template = ConfirmedRequest {
            segmented_response_accepted: self.config.segmentation.can_receive(),
            max_segments: self.config.max_segments,
            max_apdu: self.config.max_apdu,
            invoke_id,
            segment: None,
            service_choice,
            service_data: Vec::new(),
        };

        let mut actions = Vec::new();
        let fits = ConfirmedRequest::header_len(false) + service_data.len() <= peer_info.max_apdu;
        let tx = if fits {
            template.service_data = service_data;
            actions.push(Action::Send {
                peer: peer.clone(),
                apdu: Apdu::ConfirmedRequest(template.clone()),
            });
            ClientTransaction {
                request_id,
                state: ClientState::AwaitingResponse,
                template,
                sender: None,
                reassembler: None,
                retry_count: 0,
                deadline: now + self.config.apdu_timeout,
                waiter,
            }
        } else {
            match self.plan_segmented_request(&service_data, &peer_info) {
                Ok(segments) => {
                    let mut tx = ClientTransaction {
                        request_id,
                        state: ClientState::AwaitingSegmentAck,
                        template,
                        sender: Some(SegmentSender::new(segments, self.config.effective_window())),
                        reassembler: None,
                        retry_count: 0,
                        deadline: now + self.config.segment_timeout,
                        waiter,
                    };
                    let window = tx.sender.as_mut().map(SegmentSender::next_window);
                    for index in window.into_iter().flatten() {
                        if let Some(apdu) = tx.request_segment(index) {
                            actions.push(Action::Send {
                                peer: peer.clone(),
                                apdu,
                            });
                        }
                    }
                    tx
                }
                Err(e) => {
                    return vec![Action::Deliver {
                        waiter,
                        result: Err(e),
                    }]
                }
            }
        };

        log::debug!(
            "invoke {invoke_id} to {peer}: service {service_choice} -> {:?}",
            tx.state
        );
        self.clients.insert((peer, invoke_id), tx);
        actions
    }

    fn plan_segmented_request(
        &self,
        service_data: &[u8],
        peer_info: &DeviceInfo,
    ) -> Result<Vec<Vec<u8>>, EngineError> {
        if !self.config.segmentation.can_transmit() || !peer_info.segmentation.can_receive() {
            return Err(EngineError::SegmentationNotSupported);
        }
        let size = segment_size(peer_info.max_apdu, CONFIRMED_REQUEST_SEGMENT_OVERHEAD);
        let segments = split(service_data, size).ok_or(EngineError::ApduTooLong)?;
        if let Some(limit) = peer_info.max_segments.count() {
            if segments.len() > limit {
                return Err(EngineError::ApduTooLong);
            }
        }
        Ok(segments)
    }

    /// Abandons the transaction started with `request_id`. A response that
    /// arrives later finds no transaction and is dropped.
    pub fn cancel(&mut self, request_id: u64) -> Vec<Action<W>> {
        let key = self
            .clients
            .iter()
            .find(|(_, tx)| tx.request_id == request_id)
            .map(|(key, _)| key.clone());
        let mut actions = Vec::new();
        if let Some(key) = key {
            log::debug!("invoke {} to {}: cancelled", key.1, key.0);
            self.finish_client(&key, Err(EngineError::Cancelled), &mut actions);
        }
        actions
    }

    /// Ends every transaction; clients see [`EngineError::Shutdown`].
    pub fn abort_all(&mut self) -> Vec<Action<W>> {
        self.servers.clear();
        self.clients
            .drain()
            .map(|(_, tx)| Action::Deliver {
                waiter: tx.waiter,
                result: Err(EngineError::Shutdown),
            })
            .collect()
    }

    /// Feeds an APDU received from `peer`. Unconfirmed requests are not
    /// transactional and produce nothing.
    pub fn handle_apdu(&mut self, peer: &Address, apdu: Apdu, now: Instant) -> Vec<Action<W>> {
        let mut actions = Vec::new();
        match apdu {
            Apdu::ConfirmedRequest(req) => self.server_request(peer, req, now, &mut actions),
            Apdu::SegmentAck(ack) if ack.server => {
                self.client_segment_ack(peer, ack, now, &mut actions)
            }
            Apdu::SegmentAck(ack) => self.server_segment_ack(peer, ack, now, &mut actions),
            Apdu::SimpleAck(ack) => {
                let key = (peer.clone(), ack.invoke_id);
                let result = ConfirmedAck::Simple {
                    service_choice: ack.service_choice,
                };
                self.client_unsegmented_ack(&key, result, &mut actions);
            }
            Apdu::ComplexAck(ack) => self.client_complex_ack(peer, ack, now, &mut actions),
            Apdu::Error(err) => {
                let key = (peer.clone(), err.invoke_id);
                let error = ProtocolError::Error {
                    service_choice: err.service_choice,
                    error_class: err.error_class,
                    error_code: err.error_code,
                };
                self.client_failure(&key, error, &mut actions);
            }
            Apdu::Reject(rej) => {
                let key = (peer.clone(), rej.invoke_id);
                let error = ProtocolError::Reject { reason: rej.reason };
                self.client_failure(&key, error, &mut actions);
            }
            Apdu::Abort(ab) if ab.server => {
                let key = (peer.clone(), ab.invoke_id);
                let error = ProtocolError::Abort {
                    reason: ab.reason,
                    server: true,
                };
                self.client_failure(&key, error, &mut actions);
            }
            Apdu::Abort(ab) => {
                if let Some(tx) = self.servers.remove(&(peer.clone(), ab.invoke_id)) {
                    log::debug!(
                        "indication {} from {peer}: client aborted in {:?}",
                        ab.invoke_id,
                        tx.state
                    );
                }
            }
            Apdu::UnconfirmedRequest(_) => {}
        }
        actions
    }

    fn finish_client(
        &mut self,
        key: &TransactionKey,
        result: Result<ConfirmedAck, EngineError>,
        actions: &mut Vec<Action<W>>,
    ) {
        if let Some(tx) = self.clients.remove(key) {
            let end = if result.is_ok() {
                ClientState::Complete
            } else {
                ClientState::Aborted
            };
            log::debug!("invoke {} to {}: {:?} -> {end:?}", key.1, key.0, tx.state);
            actions.push(Action::Deliver {
                waiter: tx.waiter,
                result,
            });
        }
    }

    /// Aborts locally and tells the peer why.
    fn abort_client(
        &mut self,
        key: &TransactionKey,
        reason: AbortReason,
        error: EngineError,
        actions: &mut Vec<Action<W>>,
    ) {
        if self.clients.contains_key(key) {
            actions.push(Action::Send {
                peer: key.0.clone(),
                apdu: abort(false, key.1, reason),
            });
            self.finish_client(key, Err(error), actions);
        }
    }

    fn client_failure(
        &mut self,
        key: &TransactionKey,
        error: ProtocolError,
        actions: &mut Vec<Action<W>>,
    ) {
        if !self.clients.contains_key(key) {
            log::debug!("{error} from {} for unknown invoke {}", key.0, key.1);
            return;
        }
        self.finish_client(key, Err(EngineError::Protocol(error)), actions);
    }

    fn client_unsegmented_ack(
        &mut self,
        key: &TransactionKey,
        result: ConfirmedAck,
        actions: &mut Vec<Action<W>>,
    ) {
        let Some(tx) = self.clients.get(key) else {
            log::debug!("ack from {} for unknown invoke {}; dropped", key.0, key.1);
            return;
        };
        let acceptable = match tx.state {
            ClientState::AwaitingResponse => true,
            ClientState::SegmentedRequestInProgress => tx.all_segments_sent(),
            _ => false,
        };
        if acceptable {
            self.finish_client(key, Ok(result), actions);
        } else {
            let reason = AbortReason::InvalidApduInThisState;
            self.abort_client(key, reason, EngineError::Aborted(reason), actions);
        }
    }

    fn client_complex_ack(
        &mut self,
        peer: &Address,
        ack: ComplexAck,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        let key = (peer.clone(), ack.invoke_id);
        let Some(segment) = ack.segment else {
            let result = ConfirmedAck::Complex {
                service_choice: ack.service_choice,
                service_data: ack.service_data,
            };
            self.client_unsegmented_ack(&key, result, actions);
            return;
        };

        let segment_timeout = self.config.segment_timeout;
        let can_receive = self.config.segmentation.can_receive();
        let local_window = self.config.effective_window();
        let max_len = self.config.max_reassembly_len;

        let Some(tx) = self.clients.get_mut(&key) else {
            log::debug!("segment from {peer} for unknown invoke {}", ack.invoke_id);
            return;
        };

        let step = match tx.state {
            ClientState::AwaitingResponse | ClientState::SegmentedRequestInProgress
                if tx.state == ClientState::AwaitingResponse || tx.all_segments_sent() =>
            {
                if !can_receive {
                    let reason = AbortReason::SegmentationNotSupported;
                    self.abort_client(&key, reason, EngineError::SegmentationNotSupported, actions);
                    return;
                }
                if !segment.window_in_range() {
                    let reason = AbortReason::WindowSizeOutOfRange;
                    self.abort_client(&key, reason, EngineError::Aborted(reason), actions);
                    return;
                }
                match Reassembler::start(&segment, &ack.service_data, local_window, max_len) {
                    Ok((reassembler, step)) => {
                        log::debug!(
                            "invoke {} to {peer}: {:?} -> SegmentedResponseInProgress",
                            ack.invoke_id,
                            tx.state
                        );
                        tx.state = ClientState::SegmentedResponseInProgress;
                        tx.reassembler = Some(reassembler);
                        Ok(step)
                    }
                    Err(e) => Err(e),
                }
            }
            ClientState::SegmentedResponseInProgress => match tx.reassembler.as_mut() {
                Some(reassembler) => reassembler.push(&segment, &ack.service_data),
                None => Err(ReassemblyError::NotFirstSegment),
            },
            _ => Err(ReassemblyError::NotFirstSegment),
        };

        match step {
            Ok(SegmentStep::Pending) => tx.deadline = now + segment_timeout,
            Ok(SegmentStep::Ack(info)) => {
                tx.deadline = now + segment_timeout;
                actions.push(Action::Send {
                    peer: peer.clone(),
                    apdu: segment_ack(false, ack.invoke_id, info),
                });
            }
            Ok(SegmentStep::Complete(info)) => {
                actions.push(Action::Send {
                    peer: peer.clone(),
                    apdu: segment_ack(false, ack.invoke_id, info),
                });
                let service_data = tx
                    .reassembler
                    .take()
                    .map(Reassembler::into_payload)
                    .unwrap_or_default();
                let result = ConfirmedAck::Complex {
                    service_choice: ack.service_choice,
                    service_data,
                };
                self.finish_client(&key, Ok(result), actions);
            }
            Err(ReassemblyError::TooLong) => {
                self.abort_client(&key, AbortReason::ApduTooLong, EngineError::ApduTooLong, actions)
            }
            Err(ReassemblyError::NotFirstSegment) => {
                let reason = AbortReason::InvalidApduInThisState;
                self.abort_client(&key, reason, EngineError::Aborted(reason), actions);
            }
        }
    }

    fn client_segment_ack(
        &mut self,
        peer: &Address,
        ack: SegmentAck,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        let key = (peer.clone(), ack.invoke_id);
        let apdu_timeout = self.config.apdu_timeout;
        let segment_timeout = self.config.segment_timeout;
        let Some(tx) = self.clients.get_mut(&key) else {
            log::debug!("segment-ack from {peer} for unknown invoke {}", ack.invoke_id);
            return;
        };
        if !matches!(
            tx.state,
            ClientState::AwaitingSegmentAck | ClientState::SegmentedRequestInProgress
        ) {
            log::debug!("invoke {}: segment-ack ignored in {:?}", ack.invoke_id, tx.state);
            return;
        }
        if !(1..=SegmentHeader::MAX_WINDOW_SIZE).contains(&ack.actual_window_size) {
            let reason = AbortReason::WindowSizeOutOfRange;
            self.abort_client(&key, reason, EngineError::Aborted(reason), actions);
            return;
        }
        let Some(sender) = tx.sender.as_mut() else {
            return;
        };

        match sender.on_ack(ack.sequence_number, ack.actual_window_size, ack.negative) {
            AckOutcome::Duplicate => tx.deadline = now + segment_timeout,
            AckOutcome::Complete => {
                log::debug!("invoke {}: {:?} -> AwaitingResponse", ack.invoke_id, tx.state);
                tx.state = ClientState::AwaitingResponse;
                tx.retry_count = 0;
                tx.deadline = now + apdu_timeout;
            }
            AckOutcome::Advanced => {
                tx.state = ClientState::SegmentedRequestInProgress;
                tx.retry_count = 0;
                tx.deadline = now + segment_timeout;
                let window = sender.next_window();
                for index in window {
                    if let Some(apdu) = tx.request_segment(index) {
                        actions.push(Action::Send {
                            peer: peer.clone(),
                            apdu,
                        });
                    }
                }
            }
        }
    }

    fn server_request(
        &mut self,
        peer: &Address,
        req: ConfirmedRequest,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        let key = (peer.clone(), req.invoke_id);
        if self.servers.contains_key(&key) {
            self.server_existing(&key, req, now, actions);
            return;
        }

        let Some(segment) = req.segment else {
            self.dispatch(key, req, now, actions);
            return;
        };

        let refuse = if !self.config.segmentation.can_receive() {
            Some(AbortReason::SegmentationNotSupported)
        } else if !segment.window_in_range() {
            Some(AbortReason::WindowSizeOutOfRange)
        } else {
            None
        };
        if let Some(reason) = refuse {
            actions.push(Action::Send {
                peer: peer.clone(),
                apdu: abort(true, req.invoke_id, reason),
            });
            return;
        }

        let started = Reassembler::start(
            &segment,
            &req.service_data,
            self.config.effective_window(),
            self.config.max_reassembly_len,
        );
        match started {
            Ok((reassembler, SegmentStep::Complete(info))) => {
                actions.push(Action::Send {
                    peer: peer.clone(),
                    apdu: segment_ack(true, req.invoke_id, info),
                });
                let service_data = reassembler.into_payload();
                self.dispatch(
                    key,
                    ConfirmedRequest {
                        segment: None,
                        service_data,
                        ..req
                    },
                    now,
                    actions,
                );
            }
            Ok((reassembler, step)) => {
                if let SegmentStep::Ack(info) = step {
                    actions.push(Action::Send {
                        peer: peer.clone(),
                        apdu: segment_ack(true, req.invoke_id, info),
                    });
                }
                log::debug!(
                    "indication {} from {peer}: -> SegmentedRequestInProgress",
                    req.invoke_id
                );
                self.servers.insert(
                    key,
                    ServerTransaction {
                        state: ServerState::SegmentedRequestInProgress,
                        service_choice: req.service_choice,
                        segmented_response_accepted: req.segmented_response_accepted,
                        max_segments: req.max_segments,
                        max_apdu: req.max_apdu,
                        reassembler: Some(reassembler),
                        sender: None,
                        retry_count: 0,
                        deadline: now + self.config.segment_timeout,
                    },
                );
            }
            Err(e) => {
                let reason = match e {
                    ReassemblyError::NotFirstSegment => AbortReason::InvalidApduInThisState,
                    ReassemblyError::TooLong => AbortReason::ApduTooLong,
                };
                actions.push(Action::Send {
                    peer: peer.clone(),
                    apdu: abort(true, req.invoke_id, reason),
                });
            }
        }
    }

    /// A Confirmed-Request for a (peer, invoke id) we already hold.
    fn server_existing(
        &mut self,
        key: &TransactionKey,
        req: ConfirmedRequest,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        let segment_timeout = self.config.segment_timeout;
        let application_timeout = self.config.application_timeout;
        let Some(tx) = self.servers.get_mut(key) else {
            return;
        };
        match (tx.state, req.segment) {
            (ServerState::SegmentedRequestInProgress, Some(segment)) => {
                let step = match tx.reassembler.as_mut() {
                    Some(reassembler) => reassembler.push(&segment, &req.service_data),
                    None => Err(ReassemblyError::NotFirstSegment),
                };
                match step {
                    Ok(SegmentStep::Pending) => tx.deadline = now + segment_timeout,
                    Ok(SegmentStep::Ack(info)) => {
                        tx.deadline = now + segment_timeout;
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu: segment_ack(true, key.1, info),
                        });
                    }
                    Ok(SegmentStep::Complete(info)) => {
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu: segment_ack(true, key.1, info),
                        });
                        let service_data = tx
                            .reassembler
                            .take()
                            .map(Reassembler::into_payload)
                            .unwrap_or_default();
                        tx.state = ServerState::AwaitingHandler;
                        tx.deadline = now + application_timeout;
                        actions.push(Action::Dispatch(Indication {
                            peer: key.0.clone(),
                            invoke_id: key.1,
                            service_choice: tx.service_choice,
                            service_data,
                            segmented_response_accepted: tx.segmented_response_accepted,
                            max_segments: tx.max_segments,
                            max_apdu: tx.max_apdu,
                        }));
                    }
                    Err(e) => {
                        let reason = match e {
                            ReassemblyError::NotFirstSegment => AbortReason::InvalidApduInThisState,
                            ReassemblyError::TooLong => AbortReason::ApduTooLong,
                        };
                        self.servers.remove(key);
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu: abort(true, key.1, reason),
                        });
                    }
                }
            }
            (ServerState::SegmentedResponseInProgress, _) => {
                // Client retransmitted its request: repeat what it is missing.
                log::debug!("indication {} from {}: retransmitting response window", key.1, key.0);
                let range = tx.sender.as_ref().map(SegmentSender::outstanding);
                for index in range.into_iter().flatten() {
                    if let Some(apdu) = tx.response_segment(key.1, index) {
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu,
                        });
                    }
                }
                tx.deadline = now + segment_timeout;
            }
            (state, _) => {
                log::debug!("indication {} from {}: duplicate in {state:?} dropped", key.1, key.0);
            }
        }
    }

    fn dispatch(
        &mut self,
        key: TransactionKey,
        req: ConfirmedRequest,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        actions.push(Action::Dispatch(Indication {
            peer: key.0.clone(),
            invoke_id: key.1,
            service_choice: req.service_choice,
            service_data: req.service_data,
            segmented_response_accepted: req.segmented_response_accepted,
            max_segments: req.max_segments,
            max_apdu: req.max_apdu,
        }));
        self.servers.insert(
            key,
            ServerTransaction {
                state: ServerState::AwaitingHandler,
                service_choice: req.service_choice,
                segmented_response_accepted: req.segmented_response_accepted,
                max_segments: req.max_segments,
                max_apdu: req.max_apdu,
                reassembler: None,
                sender: None,
                retry_count: 0,
                deadline: now + self.config.application_timeout,
            },
        );
    }

    /// Hands a handler's result to the indication it answers. Results for
    /// indications that timed out or were aborted are dropped.
    pub fn respond(
        &mut self,
        peer: &Address,
        invoke_id: u8,
        response: ServerResponse,
        now: Instant,
    ) -> Vec<Action<W>> {
        let key = (peer.clone(), invoke_id);
        let mut actions = Vec::new();
        let Some(tx) = self.servers.get(&key) else {
            log::debug!("late result for indication {invoke_id} from {peer} discarded");
            return actions;
        };
        if tx.state != ServerState::AwaitingHandler {
            log::debug!("result for indication {invoke_id} in {:?} discarded", tx.state);
            return actions;
        }
        let service_choice = tx.service_choice;

        let apdu = match response {
            ServerResponse::SimpleAck => Apdu::SimpleAck(SimpleAck {
                invoke_id,
                service_choice,
            }),
            ServerResponse::Error { class, code } => {
                Apdu::Error(ErrorPdu::new(invoke_id, service_choice, class, code))
            }
            ServerResponse::Reject(reason) => Apdu::Reject(RejectPdu {
                invoke_id,
                reason: reason.to_u8(),
            }),
            ServerResponse::Abort(reason) => abort(true, invoke_id, reason),
            ServerResponse::ComplexAck(service_data) => {
                return self.respond_complex(key, service_data, now);
            }
        };
        self.servers.remove(&key);
        actions.push(Action::Send {
            peer: peer.clone(),
            apdu,
        });
        actions
    }

    fn respond_complex(
        &mut self,
        key: TransactionKey,
        service_data: Vec<u8>,
        now: Instant,
    ) -> Vec<Action<W>> {
        let mut actions = Vec::new();
        let window = self.config.effective_window();
        let can_transmit = self.config.segmentation.can_transmit();
        let own_max = self.config.max_apdu.octets();
        let segment_timeout = self.config.segment_timeout;
        let Some(tx) = self.servers.get_mut(&key) else {
            return actions;
        };
        let (peer, invoke_id) = (key.0.clone(), key.1);
        let limit = tx.max_apdu.octets().min(own_max);

        if ComplexAck::header_len(false) + service_data.len() <= limit {
            actions.push(Action::Send {
                peer,
                apdu: Apdu::ComplexAck(ComplexAck {
                    invoke_id,
                    segment: None,
                    service_choice: tx.service_choice,
                    service_data,
                }),
            });
            self.servers.remove(&key);
            return actions;
        }

        let segments = if !tx.segmented_response_accepted || !can_transmit {
            Err(AbortReason::SegmentationNotSupported)
        } else {
            split(&service_data, segment_size(limit, COMPLEX_ACK_SEGMENT_OVERHEAD))
                .filter(|s| tx.max_segments.count().map_or(true, |max| s.len() <= max))
                .ok_or(AbortReason::BufferOverflow)
        };
        match segments {
            Ok(segments) => {
                let mut sender = SegmentSender::new(segments, window);
                let first = sender.next_window();
                tx.sender = Some(sender);
                tx.state = ServerState::SegmentedResponseInProgress;
                tx.retry_count = 0;
                tx.deadline = now + segment_timeout;
                log::debug!("indication {invoke_id} from {peer}: -> SegmentedResponseInProgress");
                for index in first {
                    if let Some(apdu) = tx.response_segment(invoke_id, index) {
                        actions.push(Action::Send {
                            peer: peer.clone(),
                            apdu,
                        });
                    }
                }
            }
            Err(reason) => {
                log::debug!("indication {invoke_id} from {peer}: response refused ({reason:?})");
                self.servers.remove(&key);
                actions.push(Action::Send {
                    peer,
                    apdu: abort(true, invoke_id, reason),
                });
            }
        }
        actions
    }

    fn server_segment_ack(
        &mut self,
        peer: &Address,
        ack: SegmentAck,
        now: Instant,
        actions: &mut Vec<Action<W>>,
    ) {
        let key = (peer.clone(), ack.invoke_id);
        let segment_timeout = self.config.segment_timeout;
        let Some(tx) = self.servers.get_mut(&key) else {
            log::debug!("segment-ack from {peer} for unknown indication {}", ack.invoke_id);
            return;
        };
        if tx.state != ServerState::SegmentedResponseInProgress {
            return;
        }
        if !(1..=SegmentHeader::MAX_WINDOW_SIZE).contains(&ack.actual_window_size) {
            self.servers.remove(&key);
            actions.push(Action::Send {
                peer: peer.clone(),
                apdu: abort(true, ack.invoke_id, AbortReason::WindowSizeOutOfRange),
            });
            return;
        }
        let Some(sender) = tx.sender.as_mut() else {
            return;
        };
        match sender.on_ack(ack.sequence_number, ack.actual_window_size, ack.negative) {
            AckOutcome::Duplicate => tx.deadline = now + segment_timeout,
            AckOutcome::Complete => {
                log::debug!("indication {} from {peer}: response delivered", ack.invoke_id);
                self.servers.remove(&key);
            }
            AckOutcome::Advanced => {
                tx.retry_count = 0;
                tx.deadline = now + segment_timeout;
                let window = sender.next_window();
                for index in window {
                    if let Some(apdu) = tx.response_segment(ack.invoke_id, index) {
                        actions.push(Action::Send {
                            peer: peer.clone(),
                            apdu,
                        });
                    }
                }
            }
        }
    }

    /// Fires every timer due at or before `now`.
    pub fn on_timeout(&mut self, now: Instant) -> Vec<Action<W>> {
        let mut actions = Vec::new();
        let due: Vec<TransactionKey> = self
            .clients
            .iter()
            .filter(|(_, tx)| tx.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in due {
            self.client_timeout(&key, now, &mut actions);
        }

        let due: Vec<TransactionKey> = self
            .servers
            .iter()
            .filter(|(_, tx)| tx.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in due {
            self.server_timeout(&key, now, &mut actions);
        }
        actions
    }

    fn client_timeout(&mut self, key: &TransactionKey, now: Instant, actions: &mut Vec<Action<W>>) {
        let retries = self.config.apdu_retries;
        let apdu_timeout = self.config.apdu_timeout;
        let segment_timeout = self.config.segment_timeout;
        let Some(tx) = self.clients.get_mut(key) else {
            return;
        };

        match tx.state {
            ClientState::AwaitingResponse
            | ClientState::AwaitingSegmentAck
            | ClientState::SegmentedRequestInProgress
                if tx.retry_count < retries =>
            {
                tx.retry_count += 1;
                log::debug!(
                    "invoke {} to {}: timeout in {:?}, retry {}/{retries}",
                    key.1,
                    key.0,
                    tx.state,
                    tx.retry_count
                );
                let restart = tx.state == ClientState::AwaitingResponse;
                match tx.sender.as_mut() {
                    None => {
                        tx.deadline = now + apdu_timeout;
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu: Apdu::ConfirmedRequest(tx.template.clone()),
                        });
                    }
                    Some(sender) => {
                        if restart {
                            sender.restart();
                            sender.next_window();
                            tx.state = ClientState::AwaitingSegmentAck;
                        }
                        let range = sender.outstanding();
                        tx.deadline = now + segment_timeout;
                        for index in range {
                            if let Some(apdu) = tx.request_segment(index) {
                                actions.push(Action::Send {
                                    peer: key.0.clone(),
                                    apdu,
                                });
                            }
                        }
                    }
                }
            }
            ClientState::SegmentedResponseInProgress => {
                log::debug!("invoke {} to {}: segmented response stalled", key.1, key.0);
                actions.push(Action::Send {
                    peer: key.0.clone(),
                    apdu: abort(false, key.1, AbortReason::TsmTimeout),
                });
                self.finish_client(key, Err(EngineError::Timeout), actions);
            }
            _ => {
                log::debug!("invoke {} to {}: retries exhausted", key.1, key.0);
                self.finish_client(key, Err(EngineError::Timeout), actions);
            }
        }
    }

    fn server_timeout(&mut self, key: &TransactionKey, now: Instant, actions: &mut Vec<Action<W>>) {
        let retries = self.config.apdu_retries;
        let segment_timeout = self.config.segment_timeout;
        let Some(tx) = self.servers.get_mut(key) else {
            return;
        };
        match tx.state {
            ServerState::AwaitingHandler => {
                log::warn!(
                    "indication {} from {}: handler exceeded reply time",
                    key.1,
                    key.0
                );
                self.servers.remove(key);
                actions.push(Action::Send {
                    peer: key.0.clone(),
                    apdu: abort(true, key.1, AbortReason::ApplicationExceededReplyTime),
                });
            }
            ServerState::SegmentedResponseInProgress if tx.retry_count < retries => {
                tx.retry_count += 1;
                tx.deadline = now + segment_timeout;
                let range = tx.sender.as_ref().map(SegmentSender::outstanding);
                for index in range.into_iter().flatten() {
                    if let Some(apdu) = tx.response_segment(key.1, index) {
                        actions.push(Action::Send {
                            peer: key.0.clone(),
                            apdu,
                        });
                    }
                }
            }
            state => {
                log::debug!("indication {} from {}: timed out in {state:?}", key.1, key.0);
                self.servers.remove(key);
            }
        }
    }
}

/// Time between the first send and the `Timeout` of an unanswered,
/// unsegmented request.
pub fn total_request_time(config: &EngineConfig) -> Duration {
    config.apdu_timeout * (u32::from(config.apdu_retries) + 1)
}
