//! Bookkeeping for the one request in flight on the bus.
//!
//! The tracker owns the receive buffer. Bytes are fed in as they arrive and the
//! tracker decides when they add up to the response it is waiting for. Frames
//! from other devices or for other objects are dropped, and so is line noise.

use log::{debug, trace};
use thiserror::Error;

use crate::{
    Duration, Instant,
    frame::{Frame, FrameError, MAX_FRAME_LEN, START_BYTE, decode_frame},
    registry::SubscriptionHandle,
    types::{ServiceId, SubscriptionKey, ValueFormat},
};

/// Room for a whole frame plus the start of the next one.
pub const RX_BUFFER_LEN: usize = 2 * MAX_FRAME_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    AwaitingResponse,
    /// The response arrived and its value was decoded.
    Matched,
    TimedOut,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    #[error("A request is already in flight")]
    Busy,
    #[error("No request is in flight")]
    NotPending,
}

/// The request currently on the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRequest {
    pub handle: SubscriptionHandle,
    pub key: SubscriptionKey,
    pub format: ValueFormat,
    pub sent_at: Instant,
    pub deadline: Instant,
    /// Attempts made so far beyond the first.
    pub retries: u8,
}

impl PendingRequest {
    /// 1 for the first transmission.
    pub fn attempt(&self) -> u8 {
        self.retries.saturating_add(1)
    }

    /// Whether `frame` answers this request.
    pub fn is_answered_by(&self, frame: &Frame) -> bool {
        frame.is_response()
            && frame.service() == Some(ServiceId::ReadProperty)
            && frame.source == self.key.address as u32
            && frame.object_type == u16::from(self.key.object)
            && frame.object_id == self.key.parameter as u32
            && frame.property_id == u16::from(self.key.property())
    }
}

/// Outcome of feeding bytes into the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Received {
    /// Nothing conclusive yet.
    Waiting,
    /// The awaited response, decoded but not scaled.
    Matched(f32),
    /// The awaited response arrived but is unusable, e.g. a device error.
    Rejected(FrameError),
}

pub struct RequestTracker {
    state: TrackerState,
    pending: Option<PendingRequest>,
    rx: heapless::Vec<u8, RX_BUFFER_LEN>,
    timeout: Duration,
    discarded: u32,
}

impl RequestTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: TrackerState::Idle,
            pending: None,
            rx: heapless::Vec::new(),
            timeout,
            discarded: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Frames and noise thrown away since creation.
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Start tracking a request that was just sent.
    pub fn issue(
        &mut self,
        handle: SubscriptionHandle,
        key: SubscriptionKey,
        format: ValueFormat,
        now: Instant,
    ) -> Result<&PendingRequest, TrackerError> {
        if self.pending.is_some() {
            return Err(TrackerError::Busy);
        }
        self.rx.clear();
        self.state = TrackerState::AwaitingResponse;
        Ok(self.pending.insert(PendingRequest {
            handle,
            key,
            format,
            sent_at: now,
            deadline: now + self.timeout,
            retries: 0,
        }))
    }

    /// Record that the pending request was sent again.
    pub fn retry(&mut self, now: Instant) -> Result<&PendingRequest, TrackerError> {
        let timeout = self.timeout;
        let pending = self.pending.as_mut().ok_or(TrackerError::NotPending)?;
        pending.retries = pending.retries.saturating_add(1);
        pending.sent_at = now;
        pending.deadline = now + timeout;

        self.rx.clear();
        self.state = TrackerState::AwaitingResponse;
        Ok(pending)
    }

    /// Stop tracking, whatever the outcome.
    pub fn complete(&mut self) -> Option<PendingRequest> {
        self.state = TrackerState::Idle;
        self.rx.clear();
        self.pending.take()
    }

    /// Check the deadline. Returns `true` once, when the request times out.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        if self.state != TrackerState::AwaitingResponse {
            return false;
        }
        let Some(pending) = &self.pending else {
            return false;
        };
        if now <= pending.deadline {
            return false;
        }
        debug!("{} timed out at {} ms", pending.key, now.ticks());
        self.state = TrackerState::TimedOut;
        true
    }

    pub fn on_bytes_received(&mut self, bytes: &[u8]) -> Received {
        if self.state != TrackerState::AwaitingResponse {
            if !bytes.is_empty() {
                trace!("Ignoring {} bytes in state {:?}", bytes.len(), self.state);
            }
            return Received::Waiting;
        }
        trace!("RX {:02x?}", bytes);

        if self.rx.extend_from_slice(bytes).is_err() {
            // Nothing in the buffer has made sense so far, start over.
            debug!("Receive buffer overflow, dropping {} bytes", self.rx.len());
            self.discarded = self.discarded.wrapping_add(1);
            self.rx.clear();
            let tail = &bytes[bytes.len().saturating_sub(RX_BUFFER_LEN)..];
            let _ = self.rx.extend_from_slice(tail);
        }

        self.scan()
    }

    fn scan(&mut self) -> Received {
        let Some(pending) = self.pending else {
            return Received::Waiting;
        };

        loop {
            match decode_frame(&self.rx) {
                Ok(frame) => {
                    self.consume(frame.len());
                    if !pending.is_answered_by(&frame) {
                        debug!(
                            "Discarding frame from {} for object {} while waiting for {}",
                            frame.source, frame.object_id, pending.key
                        );
                        self.discarded = self.discarded.wrapping_add(1);
                        continue;
                    }
                    return match frame.into_response().and_then(|r| r.value(pending.format)) {
                        Ok(raw) => {
                            self.state = TrackerState::Matched;
                            Received::Matched(raw)
                        }
                        Err(error) => Received::Rejected(error),
                    };
                }
                Err(FrameError::Incomplete) => return Received::Waiting,
                Err(error) => {
                    trace!("Resynchronising after: {error}");
                    self.discarded = self.discarded.wrapping_add(1);
                    self.resync();
                }
            }
        }
    }

    /// Drop the current start byte and skip ahead to the next candidate.
    fn resync(&mut self) {
        let skip = self
            .rx
            .iter()
            .skip(1)
            .position(|&byte| byte == START_BYTE)
            .map_or(self.rx.len(), |position| position + 1);
        self.consume(skip);
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.rx.len());
        self.rx.rotate_left(count);
        self.rx.truncate(self.rx.len() - count);
    }
}
