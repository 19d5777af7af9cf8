//! Hardware-facing collaborator interfaces
//!
//! The evaluator drives a CAN transport, a serial-attached device, a GPIO
//! controller, and the operator's console through these traits and never
//! learns which concrete device family sits behind them. Real drivers live
//! out of tree; the in-tree implementations in [`doubles`] are loopback/null
//! stand-ins for tests and dry runs.

pub mod doubles;

pub use doubles::{LoopbackCan, NullGpio, NullSerial, ScriptedConsole, StdinConsole};

use crate::config::constants::limits::MAX_FRAME_DATA_LEN;
use crate::logging::codes::{self, Code};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy shared by every device family
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("could not open device \"{selector}\": {reason}")]
    OpenFailed { selector: String, reason: String },

    #[error("device is not connected")]
    NotConnected,

    #[error("no frame received within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("received frame of {len} bytes is shorter than its header claims")]
    ShortFrame { len: usize },

    #[error("device i/o failed: {detail}")]
    Io { detail: String },
}

impl DeviceError {
    pub fn open_failed(selector: &str, reason: &str) -> Self {
        Self::OpenFailed {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(detail: impl Into<String>) -> Self {
        Self::Io {
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            Self::OpenFailed { .. } => codes::device::OPEN_FAILED,
            Self::NotConnected => codes::device::NOT_CONNECTED,
            Self::Timeout { .. } => codes::device::READ_TIMEOUT,
            Self::ShortFrame { .. } => codes::device::SHORT_FRAME,
            Self::Io { .. } => codes::device::IO_FAILED,
        }
    }
}

/// One CAN bus frame: identifier, logical length, up to 8 data bytes, and
/// the receive timestamp where the adapter provides one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub len: u8,
    pub bytes: [u8; MAX_FRAME_DATA_LEN],
    pub timestamp: Option<DateTime<Utc>>,
}

impl CanFrame {
    pub fn new(id: u32, data: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_FRAME_DATA_LEN];
        let take = data.len().min(MAX_FRAME_DATA_LEN);
        bytes[..take].copy_from_slice(&data[..take]);
        Self {
            id,
            len: take as u8,
            bytes,
            timestamp: None,
        }
    }

    /// Data bytes up to the logical length
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// A CAN bus adapter. Two real families implement this out of tree (a
/// native-socket bus and a USB adapter); the evaluator cannot tell them
/// apart.
pub trait CanTransport {
    fn open(&mut self, selector: &str, bit_rate: u32) -> Result<(), DeviceError>;
    fn close(&mut self) -> Result<(), DeviceError>;
    fn send(&mut self, frame: &CanFrame) -> Result<(), DeviceError>;
    /// Block until a frame arrives or `timeout` elapses
    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, DeviceError>;
    fn list_devices(&self) -> Vec<String>;
}

/// Line-oriented traffic with a named serial-attached device
pub trait SerialDevice {
    fn tx_line(&mut self, line: &str) -> Result<(), DeviceError>;
    fn rx_line(&mut self) -> Result<String, DeviceError>;
}

/// Digital and analog pin access on a serial-attached GPIO controller
pub trait GpioDevice {
    fn digital_read(&mut self, pin: i64) -> Result<i64, DeviceError>;
    fn digital_write(&mut self, pin: i64, value: i64) -> Result<(), DeviceError>;
    fn analog_read(&mut self, pin: i64) -> Result<i64, DeviceError>;
    fn analog_write(&mut self, pin: i64, value: i64) -> Result<(), DeviceError>;
}

/// The operator sitting at the bench, reached through `prompt`
pub trait OperatorConsole {
    fn read_line(&mut self) -> Result<String, DeviceError>;
}

/// The full device complement one script run drives
pub struct Devices {
    pub can: Box<dyn CanTransport>,
    pub serial: Box<dyn SerialDevice>,
    pub gpio: Box<dyn GpioDevice>,
    pub console: Box<dyn OperatorConsole>,
}

impl Devices {
    /// Loopback/null complement used by tests and dry runs
    pub fn loopback() -> Self {
        Self {
            can: Box::new(LoopbackCan::new()),
            serial: Box::new(NullSerial::new()),
            gpio: Box::new(NullGpio::new()),
            console: Box::new(ScriptedConsole::new(Vec::new())),
        }
    }
}
