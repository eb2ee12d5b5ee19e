//! The byte channel the engine talks over.

use embedded_io::{ErrorType, Read, ReadReady, Write};

/// A half-duplex byte channel to the Studer bus, usually a UART at 115200 8E1.
///
/// Both operations must return promptly. Any error is treated as fatal by the
/// engine.
pub trait Transport {
    type Error: embedded_io::Error;

    /// Queue a whole frame for transmission.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Copy whatever bytes have already arrived into `buf`. Returns `0` when
    /// nothing is waiting, never blocks.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<S> Transport for S
where
    S: Read + Write + ReadReady,
{
    type Error = <S as ErrorType>::Error;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.write_all(frame)?;
        self.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() || !self.read_ready()? {
            return Ok(0);
        }
        self.read(buf)
    }
}
