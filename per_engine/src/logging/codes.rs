//! Diagnostic code registry for the PER engine
//!
//! Every logged error carries a stable code so log output can be grepped and
//! correlated across runs. Codes are grouped by engine stage: E1xx static
//! analysis, E2xx evaluation, E3xx devices, E9xx internal.

/// A stable diagnostic code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static analysis (type checking) codes
pub mod check {
    use super::Code;

    pub const UNDECLARED_IDENTIFIER: Code = Code::new("E100");
    pub const DUPLICATE_DECLARATION: Code = Code::new("E101");
    pub const TYPE_MISMATCH: Code = Code::new("E102");
    pub const NOT_CALLABLE: Code = Code::new("E103");
    pub const UNDEFINED_ROUTINE: Code = Code::new("E104");
    pub const EXPECT_WITHOUT_READ: Code = Code::new("E105");
    pub const INVALID_MESSAGE_LITERAL: Code = Code::new("E106");
    pub const RESERVED_TYPE_VIOLATION: Code = Code::new("E107");
    pub const MALFORMED_NODE: Code = Code::new("E108");
}

/// Evaluation (runtime) codes
pub mod runtime {
    use super::Code;

    pub const INDEX_OUT_OF_RANGE: Code = Code::new("E200");
    pub const LENGTH_OUT_OF_RANGE: Code = Code::new("E201");
    pub const EXPECTATION_FAILED: Code = Code::new("E202");
    pub const ASSERTION_FAILED: Code = Code::new("E203");
    pub const CALL_DEPTH_EXCEEDED: Code = Code::new("E204");
    pub const DIVISION_BY_ZERO: Code = Code::new("E205");
}

/// Device collaborator codes
pub mod device {
    use super::Code;

    pub const OPEN_FAILED: Code = Code::new("E300");
    pub const READ_TIMEOUT: Code = Code::new("E301");
    pub const SHORT_FRAME: Code = Code::new("E302");
    pub const IO_FAILED: Code = Code::new("E303");
    pub const NOT_CONNECTED: Code = Code::new("E304");
}

/// Internal engine codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("E900");
}

/// Informational codes
pub mod info {
    use super::Code;

    pub const GENERIC: Code = Code::new("I000");
    pub const ANALYSIS_COMPLETE: Code = Code::new("I100");
    pub const TEST_PASSED: Code = Code::new("I200");
    pub const TEST_FAILED: Code = Code::new("I201");
    pub const RUN_COMPLETE: Code = Code::new("I202");
}

/// Human-readable category for a code, derived from its prefix
pub fn get_category(code: &str) -> &'static str {
    match code.get(..2) {
        Some("E1") => "StaticAnalysis",
        Some("E2") => "Runtime",
        Some("E3") => "Device",
        Some("E9") => "System",
        Some("I0") | Some("I1") | Some("I2") => "Info",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(check::TYPE_MISMATCH.as_str(), "E102");
        assert_eq!(format!("{}", runtime::ASSERTION_FAILED), "E203");
    }

    #[test]
    fn test_category_from_prefix() {
        assert_eq!(get_category("E105"), "StaticAnalysis");
        assert_eq!(get_category("E301"), "Device");
        assert_eq!(get_category("I200"), "Info");
        assert_eq!(get_category("X999"), "Unknown");
    }
}
