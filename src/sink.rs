//! Consumers of decoded values.

use core::cell::Cell;

/// Anything that wants to be told about a new value.
///
/// Sinks are shared by reference between the registry and the host, hence
/// `&self`. They are called from inside [`Engine::tick`](crate::engine::Engine::tick)
/// and must not block.
pub trait Sink {
    fn publish(&self, value: f32);
}

impl<F: Fn(f32)> Sink for F {
    fn publish(&self, value: f32) {
        self(value)
    }
}

/// Keeps the most recent value, for hosts that read values on their own schedule.
#[derive(Debug, Default)]
pub struct LatestValue {
    value: Cell<Option<f32>>,
    updates: Cell<u32>,
}

impl LatestValue {
    pub const fn new() -> Self {
        Self {
            value: Cell::new(None),
            updates: Cell::new(0),
        }
    }

    /// `None` until the first successful poll.
    pub fn get(&self) -> Option<f32> {
        self.value.get()
    }

    /// Number of values published so far.
    pub fn updates(&self) -> u32 {
        self.updates.get()
    }
}

impl Sink for LatestValue {
    fn publish(&self, value: f32) {
        self.value.set(Some(value));
        self.updates.set(self.updates.get().wrapping_add(1));
    }
}
