use thiserror::Error;

/// A single transfer that went wrong on the HID endpoint.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("HID transfer failed: {0}")]
    Hid(String),

    #[error("unexpected reply: expected message type {expected:#04x}, got {actual:#04x}")]
    UnexpectedReply { expected: u8, actual: u8 },

    #[error("reply too short: expected {expected} bytes, got {actual}")]
    ShortReply { expected: usize, actual: usize },

    #[error("device task did not complete: {0}")]
    Task(String),
}

impl From<hidapi::HidError> for DeviceError {
    fn from(err: hidapi::HidError) -> Self {
        DeviceError::Hid(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DeviceError {
    fn from(err: tokio::task::JoinError) -> Self {
        DeviceError::Task(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("No device detected")]
    NoDeviceAttached,

    #[error("device error: {0}")]
    TransientDeviceError(#[from] DeviceError),

    #[error("Repeated attempts to access the device failed ({attempts} attempts)")]
    DeviceUnreachable { attempts: u32 },

    #[error("The firmware installed on the device is not supported ({description:?})")]
    UnsupportedFirmware { description: String },

    #[error("The device did not respond correctly and the configuration may not have been applied (byte {offset}: sent {sent}, received {received:?}). Please try again.")]
    ConfigurationMismatch {
        offset: usize,
        sent: u8,
        received: Option<u8>,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
