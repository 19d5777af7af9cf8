//! CAN message runtime value

use crate::config::constants::limits::MAX_FRAME_DATA_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by byte-indexed access on a CAN message.
///
/// The reference design signalled an out-of-range write with a byte-sized
/// sentinel indistinguishable from the value 255; a distinct error type
/// closes that hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CanMessageError {
    #[error("index {index} out of range for message of length {len}")]
    IndexOutOfRange { index: i64, len: u8 },

    #[error("cannot assign length {requested}: CAN frames carry at most {max} bytes")]
    LengthOutOfRange { requested: i64, max: usize },

    #[error("byte value {value} exceeds 0xFF")]
    ByteOutOfRange { value: i64 },
}

/// A CAN message value: up to 8 data bytes, a settable logical length, and a
/// validity flag recording whether its literal parsed cleanly.
///
/// An invalid message is still usable as a value; the type checker treats it
/// as ill-typed wherever its content would matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanMessage {
    bytes: [u8; MAX_FRAME_DATA_LEN],
    len: u8,
    valid: bool,
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            bytes: [0; MAX_FRAME_DATA_LEN],
            len: 0,
            valid: true,
        }
    }
}

impl CanMessage {
    /// Build a message from raw bytes, e.g. a received frame
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut msg = Self::default();
        let take = data.len().min(MAX_FRAME_DATA_LEN);
        msg.bytes[..take].copy_from_slice(&data[..take]);
        msg.len = take as u8;
        msg
    }

    /// Parse a `|`-delimited byte list, e.g. `"1|2|3"` or `"0x10|255"`.
    ///
    /// N tokens always give length N. A token that does not parse as an
    /// integer, or a value above 0xFF, marks the message invalid instead of
    /// failing construction.
    pub fn parse(input: &str) -> Self {
        let mut msg = Self::default();
        let tokens: Vec<&str> = input.split('|').collect();
        msg.len = tokens.len().min(MAX_FRAME_DATA_LEN) as u8;

        if tokens.len() > MAX_FRAME_DATA_LEN {
            msg.valid = false;
            return msg;
        }

        for (i, token) in tokens.iter().enumerate() {
            let token = token.trim();
            let parsed = if let Some(hex) = token.strip_prefix("0x") {
                i64::from_str_radix(hex, 16)
            } else {
                token.parse::<i64>()
            };

            match parsed {
                Ok(value) if (0..=0xFF).contains(&value) => {
                    msg.bytes[i] = value as u8;
                }
                _ => {
                    msg.valid = false;
                    return msg;
                }
            }
        }

        msg
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Logical length in bytes (0..=8)
    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Data bytes up to the logical length
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Byte at `index`, range-checked against the logical length
    pub fn get(&self, index: i64) -> Result<u8, CanMessageError> {
        if index < 0 || index >= self.len as i64 {
            return Err(CanMessageError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(self.bytes[index as usize])
    }

    /// Overwrite the byte at `index`
    pub fn set_byte(&mut self, index: i64, value: i64) -> Result<(), CanMessageError> {
        if index < 0 || index >= self.len as i64 {
            return Err(CanMessageError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        if !(0..=0xFF).contains(&value) {
            return Err(CanMessageError::ByteOutOfRange { value });
        }
        self.bytes[index as usize] = value as u8;
        Ok(())
    }

    /// Reassign the logical length (0..=8)
    pub fn set_len(&mut self, new_len: i64) -> Result<(), CanMessageError> {
        if !(0..=MAX_FRAME_DATA_LEN as i64).contains(&new_len) {
            return Err(CanMessageError::LengthOutOfRange {
                requested: new_len,
                max: MAX_FRAME_DATA_LEN,
            });
        }
        self.len = new_len as u8;
        Ok(())
    }
}

impl fmt::Display for CanMessage {
    /// Hex rendering of the logical data bytes. Not required to round-trip
    /// through [`CanMessage::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.data().iter().map(|b| format!("{:x}", b)).collect();
        write!(f, "{}", rendered.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_simple_list() {
        let msg = CanMessage::parse("1|2|3");
        assert!(msg.is_valid());
        assert_eq!(msg.len(), 3);
        assert_eq!(msg.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_parse_hex_tokens() {
        let msg = CanMessage::parse("0x10|0xFF");
        assert!(msg.is_valid());
        assert_eq!(msg.data(), &[0x10, 0xFF]);
    }

    #[test]
    fn test_parse_byte_above_ff_is_invalid() {
        let msg = CanMessage::parse("1|999|3");
        assert!(!msg.is_valid());
        assert_eq!(msg.len(), 3);
    }

    #[test]
    fn test_parse_garbage_token_is_invalid() {
        let msg = CanMessage::parse("1|banana|3");
        assert!(!msg.is_valid());
    }

    #[test]
    fn test_parse_too_many_tokens_is_invalid() {
        let msg = CanMessage::parse("1|2|3|4|5|6|7|8|9");
        assert!(!msg.is_valid());
    }

    #[test]
    fn test_get_out_of_range() {
        let msg = CanMessage::parse("1|2");
        assert_eq!(msg.get(1), Ok(2));
        assert_matches!(msg.get(2), Err(CanMessageError::IndexOutOfRange { .. }));
        assert_matches!(msg.get(-1), Err(CanMessageError::IndexOutOfRange { .. }));
    }

    #[test]
    fn test_set_byte_rejects_range_violations() {
        let mut msg = CanMessage::parse("1|2|3");
        assert_eq!(msg.set_byte(1, 0xAB), Ok(()));
        assert_eq!(msg.get(1), Ok(0xAB));
        assert_matches!(
            msg.set_byte(5, 1),
            Err(CanMessageError::IndexOutOfRange { .. })
        );
        assert_matches!(
            msg.set_byte(0, 300),
            Err(CanMessageError::ByteOutOfRange { value: 300 })
        );
    }

    #[test]
    fn test_set_len_bounds() {
        let mut msg = CanMessage::parse("1|2|3");
        assert_eq!(msg.set_len(8), Ok(()));
        assert_matches!(
            msg.set_len(9),
            Err(CanMessageError::LengthOutOfRange { requested: 9, .. })
        );
    }

    #[test]
    fn test_display_is_hex() {
        let msg = CanMessage::parse("10|255");
        assert_eq!(msg.to_string(), "a|ff");
    }
}
