//! Which values are polled and who receives them.
//!
//! Each distinct [`SubscriptionKey`] is polled once per round no matter how many
//! sinks want it. Every sink keeps its own scale, so one poll of the input
//! power can feed a W sensor and an inverted grid sensor at once.

use core::fmt;

use thiserror::Error;

use crate::{
    config::SensorConfig,
    scaling::Scale,
    sink::Sink,
    types::{SubscriptionKey, ValueFormat},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No room for another subscription")]
    Full,
    #[error("No room for another sink on {0}")]
    SinksFull(SubscriptionKey),
    /// The same value can not be read in two different formats.
    #[error("{0} is already registered with a different format")]
    FormatConflict(SubscriptionKey),
}

/// Position of a subscription in the registry. Stable for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(usize);

impl SubscriptionHandle {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> usize {
        self.0
    }
}

/// A sink together with the scale applied before it sees a value.
#[derive(Clone, Copy)]
pub struct Binding<'a> {
    sink: &'a dyn Sink,
    scale: Scale,
}

impl<'a> Binding<'a> {
    pub fn new(sink: &'a dyn Sink, scale: Scale) -> Self {
        Self { sink, scale }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    fn publish(&self, raw: f32) {
        self.sink.publish(self.scale.apply(raw));
    }
}

impl fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("scale", &self.scale).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Subscription<'a, const K: usize> {
    key: SubscriptionKey,
    format: ValueFormat,
    bindings: heapless::Vec<Binding<'a>, K>,
}

impl<'a, const K: usize> Subscription<'a, K> {
    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    pub fn format(&self) -> ValueFormat {
        self.format
    }

    pub fn bindings(&self) -> &[Binding<'a>] {
        &self.bindings
    }

    /// Hand a decoded value to every sink. Returns how many were called.
    pub fn deliver(&self, raw: f32) -> usize {
        for binding in &self.bindings {
            binding.publish(raw);
        }
        self.bindings.len()
    }
}

/// Up to `N` subscriptions with up to `K` sinks each.
pub struct SubscriptionRegistry<'a, const N: usize, const K: usize> {
    subscriptions: heapless::Vec<Subscription<'a, K>, N>,
}

impl<'a, const N: usize, const K: usize> Default for SubscriptionRegistry<'a, N, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize, const K: usize> SubscriptionRegistry<'a, N, K> {
    pub const fn new() -> Self {
        Self {
            subscriptions: heapless::Vec::new(),
        }
    }

    /// Attach `sink` to the value identified by `key`.
    ///
    /// Registering a key which is already present adds a sink to the existing
    /// subscription and returns its handle; the value is still polled once.
    pub fn register(
        &mut self,
        key: SubscriptionKey,
        format: ValueFormat,
        scale: Scale,
        sink: &'a dyn Sink,
    ) -> Result<SubscriptionHandle, RegistryError> {
        let binding = Binding::new(sink, scale);

        if let Some(handle) = self.find(&key) {
            let subscription = &mut self.subscriptions[handle.index()];
            if subscription.format != format {
                return Err(RegistryError::FormatConflict(key));
            }
            subscription
                .bindings
                .push(binding)
                .map_err(|_| RegistryError::SinksFull(key))?;
            return Ok(handle);
        }

        let mut bindings = heapless::Vec::new();
        bindings.push(binding).map_err(|_| RegistryError::SinksFull(key))?;
        self.subscriptions
            .push(Subscription {
                key,
                format,
                bindings,
            })
            .map_err(|_| RegistryError::Full)?;

        Ok(SubscriptionHandle::new(self.subscriptions.len() - 1))
    }

    pub fn register_sensor(
        &mut self,
        sensor: &SensorConfig,
        sink: &'a dyn Sink,
    ) -> Result<SubscriptionHandle, RegistryError> {
        self.register(sensor.key(), sensor.format(), sensor.scale(), sink)
    }

    pub fn find(&self, key: &SubscriptionKey) -> Option<SubscriptionHandle> {
        self.subscriptions
            .iter()
            .position(|s| s.key == *key)
            .map(SubscriptionHandle::new)
    }

    pub fn get(&self, handle: SubscriptionHandle) -> Option<&Subscription<'a, K>> {
        self.subscriptions.get(handle.index())
    }

    /// Subscriptions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription<'a, K>> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
