//! Compile-time constants for the PER engine

pub mod script {
    /// File extension carried by every PER script
    pub const SCRIPT_EXTENSION: &str = "pers";

    /// Extension of the parse artifact emitted by the grammar front end,
    /// appended to the full script filename (`foo.pers` -> `foo.pers.ast.json`)
    pub const PARSE_ARTIFACT_SUFFIX: &str = "ast.json";
}

pub mod limits {
    /// Maximum number of data bytes in a CAN frame
    pub const MAX_FRAME_DATA_LEN: usize = 8;

    /// Milliseconds to wait for a specific CAN message to arrive
    pub const CAN_READ_TIMEOUT_MS: u64 = 1500;

    /// Maximum routine call nesting before a runtime error is reported
    /// instead of overflowing the host stack
    pub const MAX_CALL_DEPTH: usize = 64;
}

/// Reserved global variables pre-seeded into every global scope.
pub mod reserved {
    use crate::object::ObjectType;

    /// Path of the serial traffic log
    pub const SERIAL_LOG_FILE: &str = "SERIAL_LOG_FILE";
    /// Result of the most recent read-style built-in (or assignment)
    pub const RETVAL: &str = "RETVAL";
    /// Path of the script output log
    pub const LOG_FILE: &str = "LOG_FILE";
    /// Nonzero enables per-statement tracing
    pub const VERBOSE: &str = "VERBOSE";
    /// Selector of the generic serial device
    pub const SERIAL_DEVICE: &str = "SERIAL_DEVICE";
    /// Selector of the GPIO controller device
    pub const GPIO_DEVICE: &str = "GPIO_DEVICE";

    /// Every reserved key with its fixed type. RETVAL is the one reserved
    /// binding whose type may change on each assignment.
    pub const RESERVED_GLOBALS: [(&str, ObjectType); 6] = [
        (SERIAL_LOG_FILE, ObjectType::String),
        (RETVAL, ObjectType::None),
        (LOG_FILE, ObjectType::String),
        (VERBOSE, ObjectType::Integer),
        (SERIAL_DEVICE, ObjectType::String),
        (GPIO_DEVICE, ObjectType::String),
    ];

    /// Check whether `name` is one of the reserved global keys
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_GLOBALS.iter().any(|(key, _)| *key == name)
    }

    /// Fixed type of a reserved key, if `name` is reserved.
    /// Returns `None` for RETVAL as well: its type is not fixed.
    pub fn fixed_type(name: &str) -> Option<ObjectType> {
        if name == RETVAL {
            return None;
        }
        RESERVED_GLOBALS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, ty)| *ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_lookup() {
        assert!(reserved::is_reserved("RETVAL"));
        assert!(reserved::is_reserved("VERBOSE"));
        assert!(!reserved::is_reserved("COUNT"));
    }

    #[test]
    fn test_retval_type_is_not_fixed() {
        assert_eq!(reserved::fixed_type("RETVAL"), None);
        assert_eq!(
            reserved::fixed_type("VERBOSE"),
            Some(crate::object::ObjectType::Integer)
        );
    }
}
