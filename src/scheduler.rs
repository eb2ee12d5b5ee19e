//! Round-robin order and pacing of polls.
//!
//! Subscriptions are visited in registration order, one at a time. After each
//! one the bus is left alone for the request gap. After the last one of a round
//! the cycle gap is added on top.

use crate::{Duration, Instant, config::PollConfig, registry::SubscriptionHandle};

/// Where the round-robin currently stands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCursor {
    position: usize,
    rounds: u32,
}

impl ScheduleCursor {
    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed passes over all subscriptions.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Move past the current subscription. Returns `true` when a round ends.
    pub fn advance(&mut self, len: usize) -> bool {
        if len == 0 {
            self.position = 0;
            return false;
        }
        self.position = (self.position + 1) % len;
        if self.position == 0 {
            self.rounds = self.rounds.wrapping_add(1);
            return true;
        }
        false
    }
}

pub struct PollScheduler {
    cursor: ScheduleCursor,
    next_due: Option<Instant>,
    request_gap: Duration,
    cycle_gap: Duration,
}

impl PollScheduler {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            cursor: ScheduleCursor::default(),
            next_due: None,
            request_gap: config.request_gap,
            cycle_gap: config.cycle_gap,
        }
    }

    pub fn cursor(&self) -> &ScheduleCursor {
        &self.cursor
    }

    /// Earliest time the next poll may start. `None` means right away.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// The subscription to poll now, if the bus has rested long enough.
    pub fn next(&self, len: usize, now: Instant) -> Option<SubscriptionHandle> {
        if len == 0 {
            return None;
        }
        if let Some(due) = self.next_due {
            if now < due {
                return None;
            }
        }
        // The registry may have grown since the cursor last moved.
        Some(SubscriptionHandle::new(self.cursor.position % len))
    }

    /// The current subscription is finished, successfully or not.
    pub fn advance(&mut self, len: usize, now: Instant) {
        let gap = if self.cursor.advance(len) {
            self.request_gap + self.cycle_gap
        } else {
            self.request_gap
        };
        self.next_due = Some(now + gap);
    }
}
