//! Loopback and null device implementations
//!
//! Stand-ins for the real adapters: unit and integration tests run scripts
//! against these, and the runner falls back to them when no hardware is
//! configured.

use super::{CanFrame, CanTransport, DeviceError, GpioDevice, OperatorConsole, SerialDevice};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::io::BufRead;
use std::time::Duration;

/// A CAN transport that hands every sent frame back on the next receive
#[derive(Debug, Default)]
pub struct LoopbackCan {
    open: bool,
    pending: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
}

impl LoopbackCan {
    pub fn new() -> Self {
        Self {
            open: true,
            pending: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Every frame sent so far, oldest first
    pub fn sent_frames(&self) -> &[CanFrame] {
        &self.sent
    }

    /// Queue a frame as if a remote node had transmitted it
    pub fn inject(&mut self, frame: CanFrame) {
        self.pending.push_back(frame);
    }
}

impl CanTransport for LoopbackCan {
    fn open(&mut self, _selector: &str, _bit_rate: u32) -> Result<(), DeviceError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.open = false;
        Ok(())
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotConnected);
        }
        self.sent.push(frame.clone());
        let mut echo = frame.clone();
        echo.timestamp = Some(Utc::now());
        self.pending.push_back(echo);
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, DeviceError> {
        if !self.open {
            return Err(DeviceError::NotConnected);
        }
        self.pending.pop_front().ok_or(DeviceError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        })
    }

    fn list_devices(&self) -> Vec<String> {
        vec!["loopback0".to_string()]
    }
}

/// A serial device that swallows writes and replays queued lines
#[derive(Debug, Default)]
pub struct NullSerial {
    queued: VecDeque<String>,
    transmitted: Vec<String>,
}

impl NullSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_line(&mut self, line: &str) {
        self.queued.push_back(line.to_string());
    }

    pub fn transmitted(&self) -> &[String] {
        &self.transmitted
    }
}

impl SerialDevice for NullSerial {
    fn tx_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.transmitted.push(line.to_string());
        Ok(())
    }

    fn rx_line(&mut self) -> Result<String, DeviceError> {
        Ok(self.queued.pop_front().unwrap_or_default())
    }
}

/// A GPIO controller backed by a pin map: writes store, reads return the
/// stored value or zero
#[derive(Debug, Default)]
pub struct NullGpio {
    pins: HashMap<i64, i64>,
}

impl NullGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pin(&mut self, pin: i64, value: i64) {
        self.pins.insert(pin, value);
    }

    pub fn pin(&self, pin: i64) -> i64 {
        self.pins.get(&pin).copied().unwrap_or(0)
    }
}

impl GpioDevice for NullGpio {
    fn digital_read(&mut self, pin: i64) -> Result<i64, DeviceError> {
        Ok(self.pin(pin))
    }

    fn digital_write(&mut self, pin: i64, value: i64) -> Result<(), DeviceError> {
        self.pins.insert(pin, value);
        Ok(())
    }

    fn analog_read(&mut self, pin: i64) -> Result<i64, DeviceError> {
        Ok(self.pin(pin))
    }

    fn analog_write(&mut self, pin: i64, value: i64) -> Result<(), DeviceError> {
        self.pins.insert(pin, value);
        Ok(())
    }
}

/// An operator whose answers are scripted up front; an exhausted script
/// answers with an empty line
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    lines: VecDeque<String>,
}

impl ScriptedConsole {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: lines.into(),
        }
    }
}

impl OperatorConsole for ScriptedConsole {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        Ok(self.lines.pop_front().unwrap_or_default())
    }
}

/// The real operator, on stdin
#[derive(Debug, Default)]
pub struct StdinConsole;

impl OperatorConsole for StdinConsole {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| DeviceError::io(e.to_string()))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
