//! This crate polls values from Studer Innotec solar installations over the SCOM protocol.
//!
//! It talks to an Xcom-232i gateway, which relays requests to the devices on the
//! Studer bus: Xtender inverters (addresses 101..), VarioTrack (301..) and
//! VarioString (701..) charge controllers, BSP battery monitors (601) and so on.
//!
//! It supports `no-std` environments by use of the `no-std` feature flag. Nothing
//! allocates; all capacities are const generics.
//!
//! How it fits together:
//! * [`SensorConfig`](config::SensorConfig) names one value and how to scale it.
//! * [`Engine`](engine::Engine) owns the serial [`Transport`](transport::Transport) and
//!   polls every registered value round-robin, one request at a time.
//! * Every decoded value is published to the [`Sink`](sink::Sink)s registered for it.
//!
//! The host calls [`Engine::tick`](engine::Engine::tick) from its main loop with
//! a millisecond timestamp. The engine never blocks and never sleeps.
//!
//! The serial port used for the Xcom-232i should be configured like so:
//! * Baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: Even

#![cfg_attr(feature = "no-std", no_std)]

pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod registry;
pub mod scaling;
pub mod scheduler;
pub mod sink;
pub mod tracker;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;

/// Milliseconds since some arbitrary start, wrapping after ~49 days.
pub type Instant = fugit::TimerInstantU32<1000>;
pub type Duration = fugit::MillisDurationU32;

pub use config::{PollConfig, PollConfigBuilder, SensorConfig, SensorConfigBuilder};
pub use engine::{Engine, LinkStatus, PollEvent, PollStats};
pub use error::Error;
pub use sink::{LatestValue, Sink};
pub use types::{ObjectType, SubscriptionKey, ValueFormat};
