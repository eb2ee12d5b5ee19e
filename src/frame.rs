//! Encoding and decoding of SCOM frames.
//!
//! Every frame is laid out as follows, all multi-byte fields little-endian:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 1    | start byte, always `0xAA` |
//! | 1      | 1    | frame flags, see [`FrameFlags`] |
//! | 2      | 4    | source address |
//! | 6      | 4    | destination address |
//! | 10     | 2    | length of the frame data |
//! | 12     | 2    | checksum over bytes `1..12` |
//! | 14     | 1    | service flags, see [`ServiceFlags`] |
//! | 15     | 1    | service id |
//! | 16     | 2    | object type |
//! | 18     | 4    | object id |
//! | 22     | 2    | property id |
//! | 24     | n    | property data |
//! | 24 + n | 2    | checksum over the frame data |
//!
//! Nothing in here performs I/O or keeps state.

use modular_bitfield::prelude::*;
use thiserror::Error;

use crate::types::{DeviceError, MASTER_ADDRESS, ObjectType, PropertyId, ServiceId, ValueFormat};

pub const START_BYTE: u8 = 0xAA;
pub const HEADER_LEN: usize = 14;
pub const CHECKSUM_LEN: usize = 2;
/// Service flags, service id, object type, object id and property id.
pub const SERVICE_HEADER_LEN: usize = 10;
/// Largest frame we are prepared to buffer.
pub const MAX_FRAME_LEN: usize = 128;
pub const READ_REQUEST_LEN: usize = HEADER_LEN + SERVICE_HEADER_LEN + CHECKSUM_LEN;
pub const MAX_PROPERTY_DATA_LEN: usize = MAX_FRAME_LEN - READ_REQUEST_LEN;

/// Status flags the Xcom gateway reports in every response header.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags {
    pub messages_pending: bool,
    pub new_datalogger_file: bool,
    pub sd_card_full: bool,
    pub sd_card_present: bool,
    pub datalogger_supported: bool,
    #[skip]
    __: B3,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceFlags {
    /// Set when the property data holds an error code instead of a value.
    pub is_error: bool,
    pub is_response: bool,
    #[skip]
    __: B6,
}

/// Reasons a byte buffer could not be turned into a usable response.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed frame")]
    Malformed,
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("Device reported an error: {0}")]
    ErrorFrame(DeviceError),
    /// More bytes are needed before the frame can be judged.
    #[error("Incomplete frame")]
    Incomplete,
}

/// Studer's two byte checksum, a Fletcher-16 variant seeded with `0xFF`.
pub fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let (a, b) = bytes.iter().fold((0xFFu8, 0x00u8), |(a, b), &byte| {
        let a = a.wrapping_add(byte);
        (a, b.wrapping_add(a))
    });
    [a, b]
}

/// Build a read-property request addressed to `address`.
pub fn encode_read_request(
    address: u32,
    object: ObjectType,
    object_id: u32,
    property: PropertyId,
) -> [u8; READ_REQUEST_LEN] {
    let mut frame = [0u8; READ_REQUEST_LEN];

    frame[0] = START_BYTE;
    frame[1..2].copy_from_slice(&FrameFlags::new().into_bytes());
    frame[2..6].copy_from_slice(&MASTER_ADDRESS.to_le_bytes());
    frame[6..10].copy_from_slice(&address.to_le_bytes());
    frame[10..12].copy_from_slice(&(SERVICE_HEADER_LEN as u16).to_le_bytes());
    let header_checksum = checksum(&frame[1..12]);
    frame[12..14].copy_from_slice(&header_checksum);

    frame[14..15].copy_from_slice(&ServiceFlags::new().into_bytes());
    frame[15] = ServiceId::ReadProperty as u8;
    frame[16..18].copy_from_slice(&u16::from(object).to_le_bytes());
    frame[18..22].copy_from_slice(&object_id.to_le_bytes());
    frame[22..24].copy_from_slice(&u16::from(property).to_le_bytes());
    let data_checksum = checksum(&frame[14..24]);
    frame[24..26].copy_from_slice(&data_checksum);

    frame
}

/// One structurally valid frame, request or response.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub flags: FrameFlags,
    pub source: u32,
    pub destination: u32,
    pub service_flags: ServiceFlags,
    pub service_id: u8,
    pub object_type: u16,
    pub object_id: u32,
    pub property_id: u16,
    pub data: heapless::Vec<u8, MAX_PROPERTY_DATA_LEN>,
    len: usize,
}

impl Frame {
    /// Number of bytes this frame occupied on the wire.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_response(&self) -> bool {
        self.service_flags.is_response()
    }

    pub fn service(&self) -> Option<ServiceId> {
        ServiceId::from_repr(self.service_id)
    }

    pub fn object(&self) -> Option<ObjectType> {
        ObjectType::from_repr(self.object_type)
    }

    /// Check this frame is a successful response.
    ///
    /// Error responses carry the device's error code in their property data.
    pub fn into_response(self) -> Result<Response, FrameError> {
        if !self.service_flags.is_response() {
            return Err(FrameError::Malformed);
        }
        if self.service_flags.is_error() {
            if self.data.len() < 2 {
                return Err(FrameError::Malformed);
            }
            let code = le_u16(&self.data, 0);
            return Err(FrameError::ErrorFrame(DeviceError::from(code)));
        }
        Ok(Response { frame: self })
    }
}

/// A successful response whose value has not been interpreted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    frame: Frame,
}

impl Response {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Address of the device which answered.
    pub fn source(&self) -> u32 {
        self.frame.source
    }

    pub fn object_id(&self) -> u32 {
        self.frame.object_id
    }

    /// Interpret the property data as a number.
    ///
    /// Trailing bytes beyond the width of `format` are ignored.
    pub fn value(&self, format: ValueFormat) -> Result<f32, FrameError> {
        let data = self.frame.data.as_slice();
        if data.len() < format.width() {
            return Err(FrameError::Malformed);
        }
        let value = match format {
            ValueFormat::Float => f32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ValueFormat::Int32 => le_u32(data, 0) as i32 as f32,
            ValueFormat::UInt32 => le_u32(data, 0) as f32,
            ValueFormat::UInt16 => le_u16(data, 0) as f32,
            ValueFormat::Bool => {
                if data[0] != 0 {
                    1.0
                } else {
                    0.0
                }
            }
        };
        Ok(value)
    }
}

/// Decode the frame at the start of `buf`.
///
/// Bytes after the frame are left alone; see [`Frame::len`].
pub fn decode_frame(buf: &[u8]) -> Result<Frame, FrameError> {
    match buf.first() {
        None => return Err(FrameError::Incomplete),
        Some(&START_BYTE) => {}
        Some(_) => return Err(FrameError::Malformed),
    }
    if buf.len() < HEADER_LEN {
        return Err(FrameError::Incomplete);
    }
    if checksum(&buf[1..12])[..] != buf[12..HEADER_LEN] {
        return Err(FrameError::ChecksumMismatch);
    }

    let data_len = le_u16(buf, 10) as usize;
    if data_len < SERVICE_HEADER_LEN || HEADER_LEN + data_len + CHECKSUM_LEN > MAX_FRAME_LEN {
        return Err(FrameError::Malformed);
    }
    let len = HEADER_LEN + data_len + CHECKSUM_LEN;
    if buf.len() < len {
        return Err(FrameError::Incomplete);
    }

    let data_end = HEADER_LEN + data_len;
    let data = &buf[HEADER_LEN..data_end];
    if checksum(data)[..] != buf[data_end..len] {
        return Err(FrameError::ChecksumMismatch);
    }

    let mut property_data = heapless::Vec::new();
    property_data
        .extend_from_slice(&data[SERVICE_HEADER_LEN..])
        .map_err(|_| FrameError::Malformed)?;

    Ok(Frame {
        flags: FrameFlags::from_bytes([buf[1]]),
        source: le_u32(buf, 2),
        destination: le_u32(buf, 6),
        service_flags: ServiceFlags::from_bytes([data[0]]),
        service_id: data[1],
        object_type: le_u16(data, 2),
        object_id: le_u32(data, 4),
        property_id: le_u16(data, 8),
        data: property_data,
        len,
    })
}

/// Decode a response frame, turning error responses into [`FrameError::ErrorFrame`].
pub fn decode_response(buf: &[u8]) -> Result<Response, FrameError> {
    decode_frame(buf)?.into_response()
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
