//! We use this mocking module in unit tests to emulate a serial port with a Studer bus behind it.
//!
//! Replies are scripted per request: every `flush()` completes one request and
//! releases the next queued reply into the read buffer.

use thiserror::Error;

use crate::frame::{CHECKSUM_LEN, HEADER_LEN, MAX_FRAME_LEN, SERVICE_HEADER_LEN, START_BYTE, checksum};
use crate::types::{DeviceError, MASTER_ADDRESS, ObjectType, ServiceId};

/// A frame built by the helpers below.
pub type TestFrame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// What the bus does after one request. `None` is a device that stays silent.
type Reply = Option<TestFrame>;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 1024>,
    /// Buffer containing data waiting to be read
    read_buffer: heapless::Vec<u8, 512>,
    /// Current position in the read buffer
    read_position: usize,
    /// Replies released one per flushed request
    replies: heapless::Deque<Reply, 32>,
    /// Number of successful flushes
    frames_written: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("Simulated timeout")]
    Timeout,
    /// Simulated buffer overflow
    #[error("Simulated buffer overflow")]
    BufferOverflow,
    /// Simulated invalid data error
    #[error("Simulated invalid data")]
    InvalidData,
    /// Generic simulated error for testing
    #[error("Simulated error")]
    SimulatedError,
    /// Would block - no data available
    #[error("Would block")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::InvalidData => embedded_io::ErrorKind::InvalidData,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.frames_written += 1;
        if let Some(Some(reply)) = self.replies.pop_front() {
            self.push_read_data(&reply)?;
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = core::cmp::min(buf.len(), available_bytes);

        buf[..bytes_to_read]
            .copy_from_slice(&self.read_buffer[self.read_position..self.read_position + bytes_to_read]);

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(self.read_position < self.read_buffer.len())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            replies: heapless::Deque::new(),
            frames_written: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.push_read_data(data)
    }

    /// Append data behind whatever has not been read yet
    pub fn push_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        // Drop the consumed part first so long tests don't run out of room.
        self.read_buffer.rotate_left(self.read_position);
        let unread = self.read_buffer.len() - self.read_position;
        self.read_buffer.truncate(unread);
        self.read_position = 0;

        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Answer the next unanswered request with `frame`
    pub fn queue_reply(&mut self, frame: &[u8]) -> Result<(), MockSerialError> {
        let frame = TestFrame::from_slice(frame).map_err(|_| MockSerialError::BufferOverflow)?;
        self.replies
            .push_back(Some(frame))
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Leave the next unanswered request without a reply
    pub fn queue_silence(&mut self) -> Result<(), MockSerialError> {
        self.replies
            .push_back(None)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Number of requests completed with a flush
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Split the written data into the individual request frames
    pub fn written_frames(&self) -> impl Iterator<Item = &[u8]> {
        self.write_buffer.chunks(crate::frame::READ_REQUEST_LEN)
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
        self.frames_written = 0;
    }

    /// Reset the read position to the beginning of the read buffer
    pub fn reset_read_position(&mut self) {
        self.read_position = 0;
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

/// Build a read-property response as a device at `address` would send it.
pub fn response_frame(
    frame_flags: u8,
    address: u16,
    service_flags: u8,
    object: ObjectType,
    parameter: u16,
    data: &[u8],
) -> TestFrame {
    let data_len = SERVICE_HEADER_LEN + data.len();
    let mut frame = TestFrame::new();

    frame.push(START_BYTE).unwrap();
    frame.push(frame_flags).unwrap();
    frame.extend_from_slice(&(address as u32).to_le_bytes()).unwrap();
    frame.extend_from_slice(&MASTER_ADDRESS.to_le_bytes()).unwrap();
    frame.extend_from_slice(&(data_len as u16).to_le_bytes()).unwrap();
    let header_checksum = checksum(&frame[1..12]);
    frame.extend_from_slice(&header_checksum).unwrap();

    frame.push(service_flags).unwrap();
    frame.push(ServiceId::ReadProperty as u8).unwrap();
    frame.extend_from_slice(&u16::from(object).to_le_bytes()).unwrap();
    frame.extend_from_slice(&(parameter as u32).to_le_bytes()).unwrap();
    frame
        .extend_from_slice(&u16::from(object.value_property()).to_le_bytes())
        .unwrap();
    frame.extend_from_slice(data).unwrap();
    let data_checksum = checksum(&frame[HEADER_LEN..]);
    frame.extend_from_slice(&data_checksum).unwrap();

    assert_eq!(frame.len(), HEADER_LEN + data_len + CHECKSUM_LEN);
    frame
}

/// A successful user info response carrying `data`.
pub fn value_response(address: u16, parameter: u16, data: &[u8]) -> TestFrame {
    response_frame(0x00, address, 0x02, ObjectType::UserInfo, parameter, data)
}

/// An error response carrying the code of `error`.
pub fn error_response(address: u16, object: ObjectType, parameter: u16, error: DeviceError) -> TestFrame {
    response_frame(0x00, address, 0x03, object, parameter, &u16::from(error).to_le_bytes())
}

/// Show the engine's logs in test output, e.g. with `RUST_LOG=trace cargo test`.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{READ_REQUEST_LEN, decode_frame};
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.read_position, 0);
        assert_eq!(mock.frames_written(), 0);
        assert!(!mock.should_error_on_write);
        assert!(!mock.should_error_on_read);
    }

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b"Hello, World!";

        let result = mock.write(test_data);
        assert_eq!(result, Ok(test_data.len()));
        assert_eq!(mock.written_data(), test_data);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 1100];

        let result = mock.write(&large_data);
        assert_eq!(result, Err(MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_flush_counts_frames() {
        let mut mock = MockSerial::new();
        mock.write(&[0u8; READ_REQUEST_LEN]).unwrap();
        mock.flush().unwrap();
        mock.write(&[0u8; READ_REQUEST_LEN]).unwrap();
        mock.flush().unwrap();

        assert_eq!(mock.frames_written(), 2);
        assert_eq!(mock.written_frames().count(), 2);
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Long response data").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer), Ok(5));
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_read_would_block_after_data_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hi").unwrap();

        let mut buffer = [0u8; 10];
        assert!(mock.read_ready().unwrap());
        assert_eq!(mock.read(&mut buffer), Ok(2));

        assert!(!mock.read_ready().unwrap());
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::WouldBlock));
    }

    #[test]
    fn test_replies_released_per_flush() {
        let mut mock = MockSerial::new();
        mock.queue_silence().unwrap();
        mock.queue_reply(b"second").unwrap();

        mock.flush().unwrap();
        assert!(!mock.read_ready().unwrap());

        mock.flush().unwrap();
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Ok(6));
        assert_eq!(&buffer[..6], b"second");

        // Nothing scripted: the bus stays quiet.
        mock.flush().unwrap();
        assert!(!mock.read_ready().unwrap());
    }

    #[test]
    fn test_push_read_data_appends_unread() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hello").unwrap();

        let mut buffer = [0u8; 3];
        mock.read(&mut buffer).unwrap();
        mock.push_read_data(b" World").unwrap();

        let mut buffer = [0u8; 16];
        assert_eq!(mock.read(&mut buffer), Ok(8));
        assert_eq!(&buffer[..8], b"lo World");
    }

    #[test]
    fn test_write_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);

        assert_eq!(mock.write(b"test"), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.flush(), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.frames_written(), 0);
    }

    #[test]
    fn test_read_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"test data").unwrap();
        mock.set_read_error(true);

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.read_ready(), Err(MockSerialError::SimulatedError));

        mock.set_read_error(false);
        mock.reset_read_position();
        assert_eq!(mock.read(&mut buffer), Ok(9));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(MockSerialError::Timeout.kind(), embedded_io::ErrorKind::TimedOut));
        assert!(matches!(MockSerialError::BufferOverflow.kind(), embedded_io::ErrorKind::OutOfMemory));
        assert!(matches!(MockSerialError::InvalidData.kind(), embedded_io::ErrorKind::InvalidData));
        assert!(matches!(MockSerialError::SimulatedError.kind(), embedded_io::ErrorKind::Other));
    }

    #[test]
    fn test_clear_written_data() {
        let mut mock = MockSerial::new();
        mock.write(b"test data").unwrap();
        mock.flush().unwrap();

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
        assert_eq!(mock.frames_written(), 0);
    }

    #[test]
    fn test_built_frames_decode() {
        let frame = value_response(101, 3000, &48.5f32.to_le_bytes());
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.source, 101);
        assert_eq!(decoded.destination, MASTER_ADDRESS);
        assert!(decoded.is_response());
        assert!(!decoded.service_flags.is_error());

        let frame = error_response(101, ObjectType::Parameter, 1107, DeviceError::AccessDenied);
        let decoded = decode_frame(&frame).unwrap();
        assert!(decoded.service_flags.is_error());
        assert_eq!(decoded.object(), Some(ObjectType::Parameter));
        assert_eq!(decoded.data.as_slice(), &[0x2B, 0x00]);
    }
}
