//! Our error types for the SCOM engine.
//!
//! Frame and timeout failures never show up here: they are retried inside the
//! engine and reported through [`PollEvent`](crate::engine::PollEvent). What
//! remains is fatal to the engine and has to be handled by the host.

use thiserror::Error;

use crate::{registry::RegistryError, tracker::TrackerError};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Studer SCOM communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    /// The serial channel failed. The host should reopen it and restart the engine.
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Subscription registry error: {0}")]
    Registry(RegistryError),
    #[error("Request tracking error: {0}")]
    Tracker(TrackerError),
}

impl<I: embedded_io::Error> From<RegistryError> for Error<I> {
    fn from(err: RegistryError) -> Self {
        Error::Registry(err)
    }
}

impl<I: embedded_io::Error> From<TrackerError> for Error<I> {
    fn from(err: TrackerError) -> Self {
        Error::Tracker(err)
    }
}
