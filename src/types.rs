//! This module contains the SCOM wire-level enumerations and the identity of a polled value.

use core::fmt;

use strum_macros::{EnumIter, FromRepr};
use thiserror::Error;

/// Highest device address accepted on a Studer installation.
pub const MAX_ADDRESS: u16 = 715;

/// Address used by this engine as the bus master.
pub const MASTER_ADDRESS: u32 = 1;

/// Kinds of objects a SCOM device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter)]
#[repr(u16)]
pub enum ObjectType {
    /// Read-only measurement values, e.g. battery voltage (3000).
    UserInfo = 0x0001,
    /// Configurable settings, e.g. 1107 maximum grid current.
    Parameter = 0x0002,
    Message = 0x0003,
    Datalog = 0x0004,
    DataTransfer = 0x0005,
}

impl ObjectType {
    /// Whether a numeric value can be polled from this object type.
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::UserInfo | Self::Parameter)
    }

    /// Property which holds the current value of this object type.
    pub const fn value_property(self) -> PropertyId {
        match self {
            Self::Parameter => PropertyId::ParameterValueQsp,
            _ => PropertyId::UserInfoValue,
        }
    }
}

impl From<ObjectType> for u16 {
    fn from(value: ObjectType) -> Self {
        value as u16
    }
}

/// Services carried in the frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter)]
#[repr(u8)]
pub enum ServiceId {
    ReadProperty = 0x01,
    /// Never sent by this crate, only recognised.
    WriteProperty = 0x02,
}

/// Properties of user infos and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter)]
#[repr(u16)]
pub enum PropertyId {
    /// __R__ - Value of a user info.
    UserInfoValue = 0x0001,
    /// __R/W__ - Value of a parameter, stored in flash.
    ParameterValueQsp = 0x0005,
    /// __R__ - Minimum of a parameter.
    ParameterMinQsp = 0x0006,
    /// __R__ - Maximum of a parameter.
    ParameterMaxQsp = 0x0007,
    /// __R__ - User level needed to change a parameter.
    ParameterLevelQsp = 0x0008,
    /// __R/W__ - Value of a parameter, not stored in flash.
    ParameterUnsavedValueQsp = 0x000D,
}

impl From<PropertyId> for u16 {
    fn from(value: PropertyId) -> Self {
        value as u16
    }
}

/// Error codes reported by a device in an error response.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("invalid frame")]
    InvalidFrame,
    #[error("device not found")]
    DeviceNotFound,
    #[error("response timeout")]
    ResponseTimeout,
    #[error("service not supported")]
    ServiceNotSupported,
    #[error("invalid service argument")]
    InvalidServiceArgument,
    #[error("gateway busy")]
    GatewayBusy,
    #[error("type not supported")]
    TypeNotSupported,
    #[error("object id not found")]
    ObjectIdNotFound,
    #[error("property not supported")]
    PropertyNotSupported,
    #[error("invalid data length")]
    InvalidDataLength,
    #[error("property is read only")]
    PropertyIsReadOnly,
    #[error("invalid data")]
    InvalidData,
    #[error("data too small")]
    DataTooSmall,
    #[error("data too big")]
    DataTooBig,
    #[error("write property failed")]
    WritePropertyFailed,
    #[error("read property failed")]
    ReadPropertyFailed,
    #[error("access denied")]
    AccessDenied,
    #[error("object not supported")]
    ObjectNotSupported,
    #[error("multicast read not supported")]
    MulticastReadNotSupported,
    #[error("object property invalid")]
    ObjectPropertyInvalid,
    #[error("file or directory not present")]
    FileOrDirNotPresent,
    #[error("file corrupted")]
    FileCorrupted,
    #[error("invalid shell argument")]
    InvalidShellArgument,
    #[error("unknown error code {0:#06x}")]
    Unknown(u16),
}

impl From<u16> for DeviceError {
    fn from(value: u16) -> Self {
        use DeviceError as DE;
        match value {
            0x0001 => DE::InvalidFrame,
            0x0002 => DE::DeviceNotFound,
            0x0003 => DE::ResponseTimeout,
            0x0011 => DE::ServiceNotSupported,
            0x0012 => DE::InvalidServiceArgument,
            0x0013 => DE::GatewayBusy,
            0x0021 => DE::TypeNotSupported,
            0x0022 => DE::ObjectIdNotFound,
            0x0023 => DE::PropertyNotSupported,
            0x0024 => DE::InvalidDataLength,
            0x0025 => DE::PropertyIsReadOnly,
            0x0026 => DE::InvalidData,
            0x0027 => DE::DataTooSmall,
            0x0028 => DE::DataTooBig,
            0x0029 => DE::WritePropertyFailed,
            0x002A => DE::ReadPropertyFailed,
            0x002B => DE::AccessDenied,
            0x002C => DE::ObjectNotSupported,
            0x002D => DE::MulticastReadNotSupported,
            0x002E => DE::ObjectPropertyInvalid,
            0x002F => DE::FileOrDirNotPresent,
            0x0030 => DE::FileCorrupted,
            0x0081 => DE::InvalidShellArgument,
            other => DE::Unknown(other),
        }
    }
}

impl From<DeviceError> for u16 {
    fn from(value: DeviceError) -> Self {
        use DeviceError as DE;
        match value {
            DE::InvalidFrame => 0x0001,
            DE::DeviceNotFound => 0x0002,
            DE::ResponseTimeout => 0x0003,
            DE::ServiceNotSupported => 0x0011,
            DE::InvalidServiceArgument => 0x0012,
            DE::GatewayBusy => 0x0013,
            DE::TypeNotSupported => 0x0021,
            DE::ObjectIdNotFound => 0x0022,
            DE::PropertyNotSupported => 0x0023,
            DE::InvalidDataLength => 0x0024,
            DE::PropertyIsReadOnly => 0x0025,
            DE::InvalidData => 0x0026,
            DE::DataTooSmall => 0x0027,
            DE::DataTooBig => 0x0028,
            DE::WritePropertyFailed => 0x0029,
            DE::ReadPropertyFailed => 0x002A,
            DE::AccessDenied => 0x002B,
            DE::ObjectNotSupported => 0x002C,
            DE::MulticastReadNotSupported => 0x002D,
            DE::ObjectPropertyInvalid => 0x002E,
            DE::FileOrDirNotPresent => 0x002F,
            DE::FileCorrupted => 0x0030,
            DE::InvalidShellArgument => 0x0081,
            DE::Unknown(raw) => raw,
        }
    }
}

/// How the property data of a response is interpreted.
///
/// User infos are always reported as [`ValueFormat::Float`]. Parameters use the
/// format listed for them in the Studer parameter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter)]
pub enum ValueFormat {
    /// IEEE-754 single precision, little-endian.
    #[default]
    Float,
    /// Signed 32 bit, little-endian.
    Int32,
    /// Unsigned 32 bit, little-endian. Also used for long enums.
    UInt32,
    /// Unsigned 16 bit, little-endian. Used for short enums.
    UInt16,
    /// A single byte, `0` is false.
    Bool,
}

impl ValueFormat {
    /// Number of property data bytes a value in this format occupies.
    pub const fn width(self) -> usize {
        match self {
            Self::Float | Self::Int32 | Self::UInt32 => 4,
            Self::UInt16 => 2,
            Self::Bool => 1,
        }
    }
}

/// Identity of one polled value: which object of which device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Device address, `0..=715`.
    pub address: u16,
    pub object: ObjectType,
    /// Object id, e.g. user info `3136`.
    pub parameter: u16,
}

impl SubscriptionKey {
    pub const fn new(address: u16, object: ObjectType, parameter: u16) -> Self {
        Self {
            address,
            object,
            parameter,
        }
    }

    /// Shorthand for the common case of polling a user info.
    pub const fn user_info(address: u16, parameter: u16) -> Self {
        Self::new(address, ObjectType::UserInfo, parameter)
    }

    pub const fn property(&self) -> PropertyId {
        self.object.value_property()
    }

    /// Build the read request frame for this value.
    pub fn encode_request(&self) -> [u8; crate::frame::READ_REQUEST_LEN] {
        crate::frame::encode_read_request(
            self.address as u32,
            self.object,
            self.parameter as u32,
            self.property(),
        )
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object {
            ObjectType::Parameter => write!(f, "{}/P{}", self.address, self.parameter),
            _ => write!(f, "{}/{}", self.address, self.parameter),
        }
    }
}
