//! Splitting oversized service data into segments and putting it back
//! together.
//!
//! Both halves are plain state machines: they never touch a socket or a
//! clock. The transaction manager decides when to send and when to give up.

use bacstack_core::apdu::{ComplexAck, ConfirmedRequest, SegmentHeader};
use std::ops::Range;

/// Header octets of a segmented Confirmed-Request.
pub const CONFIRMED_REQUEST_SEGMENT_OVERHEAD: usize = ConfirmedRequest::header_len(true);
/// Header octets of a segmented Complex-ACK.
pub const COMPLEX_ACK_SEGMENT_OVERHEAD: usize = ComplexAck::header_len(true);
/// Sequence numbers are one octet.
pub const MAX_SEGMENT_COUNT: usize = 256;

/// Service data octets that fit in one segment.
pub fn segment_size(max_apdu: usize, overhead: usize) -> usize {
    max_apdu.saturating_sub(overhead).max(1)
}

/// Number of segments `len` octets need; an empty payload is one segment.
pub fn segment_count(len: usize, segment_size: usize) -> usize {
    len.div_ceil(segment_size.max(1)).max(1)
}

/// Splits `payload` into chunks of at most `segment_size` octets.
///
/// Returns `None` when more than [`MAX_SEGMENT_COUNT`] segments would be
/// needed.
pub fn split(payload: &[u8], segment_size: usize) -> Option<Vec<Vec<u8>>> {
    let size = segment_size.max(1);
    if segment_count(payload.len(), size) > MAX_SEGMENT_COUNT {
        return None;
    }
    if payload.is_empty() {
        return Some(vec![Vec::new()]);
    }
    Some(payload.chunks(size).map(<[u8]>::to_vec).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window moved; send the next one.
    Advanced,
    /// Every segment is acknowledged.
    Complete,
    /// Nothing new was acknowledged.
    Duplicate,
}

/// Sending side of a segmented transfer.
#[derive(Debug, Clone)]
pub struct SegmentSender {
    segments: Vec<Vec<u8>>,
    window: u8,
    acked: usize,
    sent_end: usize,
    granted: bool,
}

impl SegmentSender {
    pub fn new(segments: Vec<Vec<u8>>, proposed_window: u8) -> Self {
        Self {
            segments,
            window: proposed_window.clamp(1, SegmentHeader::MAX_WINDOW_SIZE),
            acked: 0,
            sent_end: 0,
            granted: false,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn window_size(&self) -> u8 {
        self.window
    }

    pub fn acked(&self) -> usize {
        self.acked
    }

    pub fn is_complete(&self) -> bool {
        self.acked >= self.segments.len()
    }

    /// Segment `index` with the header fields it travels with.
    pub fn segment(&self, index: usize) -> (SegmentHeader, &[u8]) {
        let header = SegmentHeader {
            sequence_number: index as u8,
            window_size: self.window,
            more_follows: index + 1 < self.segments.len(),
        };
        let data = self.segments.get(index).map_or(&[][..], Vec::as_slice);
        (header, data)
    }

    /// Next batch to put on the wire. Before the receiver has granted a
    /// window only segment 0 goes out.
    pub fn next_window(&mut self) -> Range<usize> {
        let span = if self.granted {
            usize::from(self.window)
        } else {
            1
        };
        let end = (self.acked + span).min(self.segments.len());
        self.sent_end = end;
        self.acked..end
    }

    /// Segments sent but not yet acknowledged.
    pub fn outstanding(&self) -> Range<usize> {
        self.acked..self.sent_end.max(self.acked)
    }

    /// Starts over from segment 0, as when the whole request is retried.
    pub fn restart(&mut self) {
        self.acked = 0;
        self.sent_end = 0;
        self.granted = false;
    }

    /// Applies a Segment-ACK naming `sequence_number` as the last segment the
    /// peer holds in order.
    ///
    /// The window only ever shrinks: the peer's `actual_window` caps it.
    pub fn on_ack(&mut self, sequence_number: u8, actual_window: u8, negative: bool) -> AckOutcome {
        let lowest = if negative {
            self.acked.saturating_sub(1)
        } else {
            self.acked
        };
        let Some(index) = (lowest..self.sent_end)
            .rev()
            .find(|i| *i as u8 == sequence_number)
        else {
            return AckOutcome::Duplicate;
        };
        if index + 1 == self.acked && !negative {
            return AckOutcome::Duplicate;
        }

        self.acked = index + 1;
        self.granted = true;
        self.window = self.window.min(actual_window.max(1));
        if self.is_complete() {
            AckOutcome::Complete
        } else {
            AckOutcome::Advanced
        }
    }
}

/// Contents of a Segment-ACK to send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckInfo {
    pub negative: bool,
    pub sequence_number: u8,
    pub window_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStep {
    /// Segment buffered; no acknowledgement due yet.
    Pending,
    Ack(AckInfo),
    /// Final segment received; send this acknowledgement and take the payload.
    Complete(AckInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
    /// A transfer must open with sequence number 0.
    NotFirstSegment,
    /// The payload outgrew the configured limit.
    TooLong,
}

/// Receiving side of a segmented transfer.
#[derive(Debug, Clone)]
pub struct Reassembler {
    payload: Vec<u8>,
    last_seq: u8,
    window: u8,
    in_window: u8,
    max_len: usize,
}

impl Reassembler {
    /// Opens a transfer with its first segment. The first segment is always
    /// acknowledged immediately; that acknowledgement grants the window.
    pub fn start(
        first: &SegmentHeader,
        data: &[u8],
        local_window: u8,
        max_len: usize,
    ) -> Result<(Self, SegmentStep), ReassemblyError> {
        if first.sequence_number != 0 {
            return Err(ReassemblyError::NotFirstSegment);
        }
        if data.len() > max_len {
            return Err(ReassemblyError::TooLong);
        }
        let window = first
            .window_size
            .clamp(1, SegmentHeader::MAX_WINDOW_SIZE)
            .min(local_window.max(1));
        let this = Self {
            payload: data.to_vec(),
            last_seq: 0,
            window,
            in_window: 0,
            max_len,
        };
        let ack = this.ack(false);
        let step = if first.more_follows {
            SegmentStep::Ack(ack)
        } else {
            SegmentStep::Complete(ack)
        };
        Ok((this, step))
    }

    pub fn window_size(&self) -> u8 {
        self.window
    }

    pub fn last_sequence(&self) -> u8 {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Acknowledgement for the current in-order position.
    pub fn ack(&self, negative: bool) -> AckInfo {
        AckInfo {
            negative,
            sequence_number: self.last_seq,
            window_size: self.window,
        }
    }

    pub fn push(
        &mut self,
        header: &SegmentHeader,
        data: &[u8],
    ) -> Result<SegmentStep, ReassemblyError> {
        let seq = header.sequence_number;
        if seq != self.last_seq.wrapping_add(1) {
            self.in_window = 0;
            // Within the last half of the sequence space: already have it.
            let duplicate = self.last_seq.wrapping_sub(seq) < 128;
            return Ok(SegmentStep::Ack(self.ack(!duplicate)));
        }

        if self.payload.len().saturating_add(data.len()) > self.max_len {
            return Err(ReassemblyError::TooLong);
        }
        self.payload.extend_from_slice(data);
        self.last_seq = seq;
        self.in_window += 1;

        if !header.more_follows {
            self.in_window = 0;
            return Ok(SegmentStep::Complete(self.ack(false)));
        }
        if self.in_window >= self.window {
            self.in_window = 0;
            return Ok(SegmentStep::Ack(self.ack(false)));
        }
        Ok(SegmentStep::Pending)
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(seq: u8, window: u8, more: bool) -> SegmentHeader {
        SegmentHeader {
            sequence_number: seq,
            window_size: window,
            more_follows: more,
        }
    }

    #[test]
    fn split_counts() {
        assert_eq!(split(&[], 10).unwrap().len(), 1);
        assert_eq!(split(&[0; 10], 10).unwrap().len(), 1);
        assert_eq!(split(&[0; 11], 10).unwrap().len(), 2);
        assert_eq!(split(&[0; 2560], 10).unwrap().len(), 256);
        assert!(split(&[0; 2561], 10).is_none());
    }

    #[test]
    fn segment_size_subtracts_header() {
        assert_eq!(segment_size(480, CONFIRMED_REQUEST_SEGMENT_OVERHEAD), 474);
        assert_eq!(segment_size(480, COMPLEX_ACK_SEGMENT_OVERHEAD), 475);
        assert_eq!(segment_size(3, 5), 1);
    }

    #[test]
    fn sender_waits_for_grant_then_uses_window() {
        let mut tx = SegmentSender::new(vec![vec![0]; 5], 3);
        assert_eq!(tx.next_window(), 0..1);
        assert_eq!(tx.on_ack(0, 2, false), AckOutcome::Advanced);
        assert_eq!(tx.window_size(), 2);
        assert_eq!(tx.next_window(), 1..3);
        assert_eq!(tx.on_ack(2, 2, false), AckOutcome::Advanced);
        assert_eq!(tx.next_window(), 3..5);
        assert_eq!(tx.on_ack(4, 2, false), AckOutcome::Complete);
    }

    #[test]
    fn sender_never_grows_window() {
        let mut tx = SegmentSender::new(vec![vec![0]; 10], 2);
        tx.next_window();
        tx.on_ack(0, 5, false);
        assert_eq!(tx.window_size(), 2);
        tx.next_window();
        tx.on_ack(2, 1, false);
        assert_eq!(tx.window_size(), 1);
        tx.next_window();
        tx.on_ack(3, 4, false);
        assert_eq!(tx.window_size(), 1);
    }

    #[test]
    fn sender_ignores_stale_ack() {
        let mut tx = SegmentSender::new(vec![vec![0]; 4], 2);
        tx.next_window();
        tx.on_ack(0, 2, false);
        assert_eq!(tx.next_window(), 1..3);
        assert_eq!(tx.on_ack(0, 2, false), AckOutcome::Duplicate);
        assert_eq!(tx.on_ack(9, 2, false), AckOutcome::Duplicate);
        assert_eq!(tx.outstanding(), 1..3);
    }

    #[test]
    fn negative_ack_rewinds_to_gap() {
        let mut tx = SegmentSender::new(vec![vec![0]; 6], 3);
        tx.next_window();
        tx.on_ack(0, 3, false);
        assert_eq!(tx.next_window(), 1..4);
        // Peer holds only segment 1.
        assert_eq!(tx.on_ack(1, 3, true), AckOutcome::Advanced);
        assert_eq!(tx.next_window(), 2..5);
        // Peer lost everything after 1 again.
        assert_eq!(tx.on_ack(1, 3, true), AckOutcome::Advanced);
        assert_eq!(tx.next_window(), 2..5);
    }

    #[test]
    fn segment_headers() {
        let tx = SegmentSender::new(vec![vec![1], vec![2]], 4);
        let (h0, d0) = tx.segment(0);
        assert_eq!(h0, header(0, 4, true));
        assert_eq!(d0, &[1]);
        let (h1, _) = tx.segment(1);
        assert!(!h1.more_follows);
    }

    #[test]
    fn reassembly_acks_first_and_each_window_end() {
        let (mut rx, step) = Reassembler::start(&header(0, 2, true), b"ab", 4, 1024).unwrap();
        assert_eq!(
            step,
            SegmentStep::Ack(AckInfo {
                negative: false,
                sequence_number: 0,
                window_size: 2
            })
        );
        assert_eq!(rx.push(&header(1, 2, true), b"cd").unwrap(), SegmentStep::Pending);
        assert!(matches!(
            rx.push(&header(2, 2, true), b"ef").unwrap(),
            SegmentStep::Ack(AckInfo { sequence_number: 2, .. })
        ));
        assert!(matches!(
            rx.push(&header(3, 2, false), b"g").unwrap(),
            SegmentStep::Complete(AckInfo { sequence_number: 3, .. })
        ));
        assert_eq!(rx.into_payload(), b"abcdefg");
    }

    #[test]
    fn window_is_min_of_proposed_and_local() {
        let (rx, _) = Reassembler::start(&header(0, 8, true), b"", 3, 64).unwrap();
        assert_eq!(rx.window_size(), 3);
        let (rx, _) = Reassembler::start(&header(0, 1, true), b"", 3, 64).unwrap();
        assert_eq!(rx.window_size(), 1);
    }

    #[test]
    fn duplicate_gets_positive_reack_and_gap_gets_negative() {
        let (mut rx, _) = Reassembler::start(&header(0, 4, true), b"a", 4, 64).unwrap();
        rx.push(&header(1, 4, true), b"b").unwrap();

        let dup = rx.push(&header(1, 4, true), b"b").unwrap();
        assert_eq!(dup, SegmentStep::Ack(rx.ack(false)));
        let gap = rx.push(&header(3, 4, true), b"d").unwrap();
        assert_eq!(
            gap,
            SegmentStep::Ack(AckInfo {
                negative: true,
                sequence_number: 1,
                window_size: 4
            })
        );
        // Reassembly continues where it left off.
        rx.push(&header(2, 4, false), b"c").unwrap();
        assert_eq!(rx.into_payload(), b"abc");
    }

    #[test]
    fn reassembly_limits() {
        assert_eq!(
            Reassembler::start(&header(1, 2, true), b"", 2, 10).unwrap_err(),
            ReassemblyError::NotFirstSegment
        );
        let (mut rx, _) = Reassembler::start(&header(0, 2, true), &[0; 6], 2, 10).unwrap();
        assert_eq!(
            rx.push(&header(1, 2, true), &[0; 5]).unwrap_err(),
            ReassemblyError::TooLong
        );
    }

    #[test]
    fn single_segment_transfer_completes_at_start() {
        let (_, step) = Reassembler::start(&header(0, 2, false), b"x", 2, 10).unwrap();
        assert!(matches!(step, SegmentStep::Complete(_)));
    }

    proptest! {
        #[test]
        fn split_then_reassemble_is_identity(
            payload in prop::collection::vec(any::<u8>(), 0..4096),
            max_segment in 1usize..600,
            window in 1u8..=127,
        ) {
            let segments = split(&payload, max_segment);
            let expected = segment_count(payload.len(), max_segment);
            prop_assume!(expected <= MAX_SEGMENT_COUNT);
            let segments = segments.unwrap();
            prop_assert_eq!(segments.len(), expected);
            prop_assert!(segments.iter().all(|s| s.len() <= max_segment));

            let mut tx = SegmentSender::new(segments, window);
            let (first, data) = tx.segment(0);
            let (mut rx, mut step) =
                Reassembler::start(&first, data, window, usize::MAX).unwrap();
            let mut index = 1;
            while !matches!(step, SegmentStep::Complete(_)) {
                let (h, d) = tx.segment(index);
                step = rx.push(&h, d).unwrap();
                index += 1;
            }
            prop_assert_eq!(index, tx.len());
            prop_assert_eq!(rx.into_payload(), payload);
        }
    }
}
