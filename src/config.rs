//! What to poll, and how fast.
//!
//! Both configurations are validated once when they are built, so the engine
//! never has to check them again at runtime.

use thiserror::Error;

use crate::{
    Duration,
    scaling::Scale,
    types::{MAX_ADDRESS, ObjectType, SubscriptionKey, ValueFormat},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Device address {0} is out of range (0 - 715)")]
    AddressOutOfRange(u16),
    #[error("Objects of type {0:?} hold no pollable value")]
    UnreadableObject(ObjectType),
    #[error("Multiplier must be a finite number")]
    InvalidMultiplier,
    #[error("Response timeout must be greater than zero")]
    ZeroTimeout,
}

/// One value to poll and how to scale it. Use [`SensorConfigBuilder`] to create one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    key: SubscriptionKey,
    format: ValueFormat,
    scale: Scale,
}

impl SensorConfig {
    /// A user info read as a float and published unscaled.
    pub fn user_info(address: u16, parameter: u16) -> Result<Self, ConfigError> {
        SensorConfigBuilder::new(address, parameter).build()
    }

    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    pub fn format(&self) -> ValueFormat {
        self.format
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }
}

/// Use this type to create a [`SensorConfig`].
pub struct SensorConfigBuilder {
    address: u16,
    parameter: u16,
    object: ObjectType,
    format: ValueFormat,
    multiply: f32,
}

impl SensorConfigBuilder {
    pub fn new(address: u16, parameter: u16) -> SensorConfigBuilder {
        SensorConfigBuilder {
            address,
            parameter,
            object: ObjectType::UserInfo,
            format: ValueFormat::default(),
            multiply: 1.0,
        }
    }

    /// Validate and build.
    pub fn build(self) -> Result<SensorConfig, ConfigError> {
        if self.address > MAX_ADDRESS {
            return Err(ConfigError::AddressOutOfRange(self.address));
        }
        if !self.object.is_readable() {
            return Err(ConfigError::UnreadableObject(self.object));
        }
        let scale = Scale::new(self.multiply);
        if !scale.is_valid() {
            return Err(ConfigError::InvalidMultiplier);
        }

        Ok(SensorConfig {
            key: SubscriptionKey::new(self.address, self.object, self.parameter),
            format: self.format,
            scale,
        })
    }

    /// Poll a parameter instead of a user info.
    pub fn parameter(mut self) -> Self {
        self.object = ObjectType::Parameter;
        self
    }

    pub fn with_object(mut self, object: ObjectType) -> Self {
        self.object = object;
        self
    }

    /// Set how the property data is interpreted.
    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the multiplier applied before publishing.
    pub fn with_multiply(mut self, multiply: f32) -> Self {
        self.multiply = multiply;
        self
    }
}

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// How long to wait for a response before the attempt fails.
    pub response_timeout: Duration,
    /// Attempts after the first before a subscription is skipped for this round.
    pub max_retries: u8,
    /// Pause after each finished subscription.
    pub request_gap: Duration,
    /// Additional pause after the last subscription of a round.
    pub cycle_gap: Duration,
}

impl PollConfig {
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::millis(300);
    pub const DEFAULT_MAX_RETRIES: u8 = 2;
    pub const DEFAULT_REQUEST_GAP: Duration = Duration::millis(10);
    pub const DEFAULT_CYCLE_GAP: Duration = Duration::millis(100);

    /// Total number of attempts made for one subscription per round.
    pub fn max_attempts(&self) -> u8 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            request_gap: Self::DEFAULT_REQUEST_GAP,
            cycle_gap: Self::DEFAULT_CYCLE_GAP,
        }
    }
}

/// Use this type to tune a [`PollConfig`].
///
/// Slow consumers can stretch the request gap, e.g. to 500 ms, without
/// touching the timeout.
#[derive(Default)]
pub struct PollConfigBuilder {
    config: PollConfig,
}

impl PollConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let's build it!
    pub fn build(self) -> Result<PollConfig, ConfigError> {
        if self.config.response_timeout.ticks() == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(self.config)
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn with_request_gap(mut self, gap: Duration) -> Self {
        self.config.request_gap = gap;
        self
    }

    pub fn with_cycle_gap(mut self, gap: Duration) -> Self {
        self.config.cycle_gap = gap;
        self
    }
}
