//! The polling engine.
//!
//! [`Engine::tick`] is called from the host's main loop. Each call does a small,
//! bounded amount of work and returns at once:
//!
//! * when idle and the pacing gap has passed, send the next request;
//! * when waiting, feed received bytes to the tracker, publish a matched value,
//!   or retry / give up on a failed attempt.
//!
//! There is never more than one request on the bus.

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::{
    Instant,
    config::{PollConfig, SensorConfig},
    error::{Error, Result},
    frame::{FrameError, MAX_FRAME_LEN},
    registry::{RegistryError, SubscriptionHandle, SubscriptionRegistry},
    scheduler::PollScheduler,
    sink::Sink,
    tracker::{PendingRequest, Received, RequestTracker, TrackerState},
    transport::Transport,
    types::SubscriptionKey,
};

/// Bytes pulled from the transport per read.
const READ_CHUNK_LEN: usize = 32;
/// Upper bound on reads per tick, so a babbling line can't stall the host.
const MAX_READS_PER_TICK: usize = MAX_FRAME_LEN * 2 / READ_CHUNK_LEN;

/// Whether the bus has been answering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No poll has finished yet.
    #[default]
    Unknown,
    /// The most recent poll was answered.
    Online,
    /// The most recent poll ran out of attempts.
    Offline,
}

/// Why an attempt failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    #[error("no response in time")]
    Timeout,
    #[error("{0}")]
    Frame(FrameError),
}

/// What a call to [`Engine::tick`] did, if anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollEvent {
    /// A request was sent for the first time this round.
    Requested { key: SubscriptionKey },
    /// A value was decoded and handed to `sinks` sinks.
    Delivered {
        key: SubscriptionKey,
        raw: f32,
        sinks: usize,
    },
    /// An attempt failed and the request was sent again.
    Retrying {
        key: SubscriptionKey,
        attempt: u8,
        failure: Failure,
    },
    /// Every attempt failed; the subscription is skipped until next round.
    Exhausted {
        key: SubscriptionKey,
        attempts: u8,
        failure: Failure,
    },
}

/// Counters since the engine was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    /// Requests sent, retries included.
    pub requests: u32,
    pub retries: u32,
    pub delivered: u32,
    pub exhausted: u32,
    /// Frames and noise dropped while waiting for responses.
    pub discarded: u32,
}

/// Polls up to `N` values over `T`, each with up to `K` sinks.
pub struct Engine<'a, T: Transport, const N: usize = 64, const K: usize = 4> {
    transport: T,
    registry: SubscriptionRegistry<'a, N, K>,
    tracker: RequestTracker,
    scheduler: PollScheduler,
    config: PollConfig,
    link: LinkStatus,
    stats: PollStats,
}

impl<'a, T: Transport, const N: usize, const K: usize> Engine<'a, T, N, K> {
    pub fn new(transport: T, config: PollConfig) -> Self {
        Self {
            transport,
            registry: SubscriptionRegistry::new(),
            tracker: RequestTracker::new(config.response_timeout),
            scheduler: PollScheduler::new(&config),
            config,
            link: LinkStatus::default(),
            stats: PollStats::default(),
        }
    }

    /// Subscribe `sink` to the value described by `sensor`.
    ///
    /// Call before the first tick. A key that is already registered gains
    /// another sink instead of another poll.
    pub fn register(
        &mut self,
        sensor: &SensorConfig,
        sink: &'a dyn Sink,
    ) -> core::result::Result<SubscriptionHandle, RegistryError> {
        let handle = self.registry.register_sensor(sensor, sink)?;
        debug!("Registered {} as subscription {}", sensor.key(), handle.index());
        Ok(handle)
    }

    pub fn registry(&self) -> &SubscriptionRegistry<'a, N, K> {
        &self.registry
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link
    }

    pub fn stats(&self) -> PollStats {
        PollStats {
            discarded: self.tracker.discarded(),
            ..self.stats
        }
    }

    /// The request on the bus right now.
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.tracker.pending()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back, e.g. to reopen it after an error.
    pub fn release(self) -> T {
        self.transport
    }

    /// Log the registered subscriptions and timing.
    pub fn log_config(&self) {
        info!("Studer SCOM:");
        info!("  Serial: 115200 baud, 8 data bits, even parity, 1 stop bit");
        info!(
            "  Response timeout: {} ms, max attempts: {}",
            self.config.response_timeout.to_millis(),
            self.config.max_attempts()
        );
        info!(
            "  Request gap: {} ms, cycle gap: {} ms",
            self.config.request_gap.to_millis(),
            self.config.cycle_gap.to_millis()
        );
        info!("  Subscriptions: {}", self.registry.len());
        for subscription in self.registry.iter() {
            info!(
                "    {} {:?} -> {} sink(s)",
                subscription.key(),
                subscription.format(),
                subscription.bindings().len()
            );
        }
    }

    /// Advance the engine. `now` must come from a monotonic millisecond clock.
    ///
    /// Only transport failures are returned as errors.
    pub fn tick(&mut self, now: Instant) -> Result<Option<PollEvent>, T::Error> {
        match self.tracker.state() {
            TrackerState::Idle => self.start_next(now),
            _ => self.service_pending(now),
        }
    }

    fn start_next(&mut self, now: Instant) -> Result<Option<PollEvent>, T::Error> {
        let Some(handle) = self.scheduler.next(self.registry.len(), now) else {
            return Ok(None);
        };
        let Some(subscription) = self.registry.get(handle) else {
            return Ok(None);
        };
        let (key, format) = (subscription.key(), subscription.format());

        self.send(&key)?;
        self.tracker.issue(handle, key, format, now)?;
        Ok(Some(PollEvent::Requested { key }))
    }

    fn service_pending(&mut self, now: Instant) -> Result<Option<PollEvent>, T::Error> {
        let mut chunk = [0u8; READ_CHUNK_LEN];
        for _ in 0..MAX_READS_PER_TICK {
            let count = self
                .transport
                .read_available(&mut chunk)
                .map_err(Error::SerialError)?;
            if count == 0 {
                break;
            }
            match self.tracker.on_bytes_received(&chunk[..count]) {
                Received::Waiting => {}
                Received::Matched(raw) => return Ok(self.deliver(raw, now)),
                Received::Rejected(error) => return self.fail_attempt(Failure::Frame(error), now),
            }
        }

        if self.tracker.on_tick(now) {
            return self.fail_attempt(Failure::Timeout, now);
        }
        Ok(None)
    }

    fn deliver(&mut self, raw: f32, now: Instant) -> Option<PollEvent> {
        let pending = self.tracker.complete()?;
        let sinks = self
            .registry
            .get(pending.handle)
            .map_or(0, |subscription| subscription.deliver(raw));
        debug!("{} = {} (attempt {})", pending.key, raw, pending.attempt());

        self.stats.delivered = self.stats.delivered.wrapping_add(1);
        self.set_link(LinkStatus::Online);
        self.scheduler.advance(self.registry.len(), now);

        Some(PollEvent::Delivered {
            key: pending.key,
            raw,
            sinks,
        })
    }

    fn fail_attempt(&mut self, failure: Failure, now: Instant) -> Result<Option<PollEvent>, T::Error> {
        let Some(pending) = self.tracker.pending().copied() else {
            return Ok(None);
        };

        if pending.retries < self.config.max_retries {
            debug!("{} attempt {} failed: {}", pending.key, pending.attempt(), failure);
            // Armed before sending, so a failed write still times out and retries.
            let attempt = self.tracker.retry(now)?.attempt();
            self.stats.retries = self.stats.retries.wrapping_add(1);
            self.send(&pending.key)?;
            return Ok(Some(PollEvent::Retrying {
                key: pending.key,
                attempt,
                failure,
            }));
        }

        self.tracker.complete();
        warn!(
            "{} skipped after {} attempts: {}",
            pending.key,
            pending.attempt(),
            failure
        );
        self.stats.exhausted = self.stats.exhausted.wrapping_add(1);
        self.set_link(LinkStatus::Offline);
        self.scheduler.advance(self.registry.len(), now);

        Ok(Some(PollEvent::Exhausted {
            key: pending.key,
            attempts: pending.attempt(),
            failure,
        }))
    }

    /// Put a fresh request on the wire, dropping anything left over from earlier exchanges.
    fn send(&mut self, key: &SubscriptionKey) -> Result<(), T::Error> {
        let mut chunk = [0u8; READ_CHUNK_LEN];
        for _ in 0..MAX_READS_PER_TICK {
            let count = self
                .transport
                .read_available(&mut chunk)
                .map_err(Error::SerialError)?;
            if count == 0 {
                break;
            }
            trace!("Flushing {} stale bytes", count);
        }

        let frame = key.encode_request();
        trace!("TX {}: {:02x?}", key, frame);
        self.transport.send(&frame).map_err(Error::SerialError)?;
        self.stats.requests = self.stats.requests.wrapping_add(1);
        Ok(())
    }

    fn set_link(&mut self, status: LinkStatus) {
        if self.link == status {
            return;
        }
        match status {
            LinkStatus::Online => info!("Studer bus is answering"),
            LinkStatus::Offline => warn!("Studer bus stopped answering"),
            LinkStatus::Unknown => {}
        }
        self.link = status;
    }
}
