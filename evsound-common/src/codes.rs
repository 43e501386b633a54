//! Event-sound error codes
//!
//! The numeric values are part of the cross-boundary contract with the
//! native backend and scripting bindings. They must never be renumbered.

use serde::{Deserialize, Serialize};

/// Status code reported by the backend or the coordinator.
///
/// Discriminants match the backend's C enumeration (`0` success, negative
/// values for errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    NotSupported = -1,
    Invalid = -2,
    State = -3,
    OutOfMemory = -4,
    NoDriver = -5,
    System = -6,
    Corrupt = -7,
    TooBig = -8,
    NotFound = -9,
    Destroyed = -10,
    Canceled = -11,
    NotAvailable = -12,
    Access = -13,
    Io = -14,
    Internal = -15,
    Disabled = -16,
    Forked = -17,
    Disconnected = -18,
}

impl ErrorCode {
    /// All codes in numeric order (Success first)
    pub const ALL: [ErrorCode; 19] = [
        ErrorCode::Success,
        ErrorCode::NotSupported,
        ErrorCode::Invalid,
        ErrorCode::State,
        ErrorCode::OutOfMemory,
        ErrorCode::NoDriver,
        ErrorCode::System,
        ErrorCode::Corrupt,
        ErrorCode::TooBig,
        ErrorCode::NotFound,
        ErrorCode::Destroyed,
        ErrorCode::Canceled,
        ErrorCode::NotAvailable,
        ErrorCode::Access,
        ErrorCode::Io,
        ErrorCode::Internal,
        ErrorCode::Disabled,
        ErrorCode::Forked,
        ErrorCode::Disconnected,
    ];

    /// Stable numeric identity
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a code by its numeric identity
    pub fn from_code(code: i32) -> Option<ErrorCode> {
        // ALL is ordered so that index == -code
        if code > 0 {
            return None;
        }
        Self::ALL.get(code.unsigned_abs() as usize).copied()
    }

    /// Human-readable message, same wording as the backend's strerror table
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::NotSupported => "Operation not supported",
            ErrorCode::Invalid => "Invalid argument",
            ErrorCode::State => "Invalid state",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::NoDriver => "No such driver",
            ErrorCode::System => "System error",
            ErrorCode::Corrupt => "File or data corrupt",
            ErrorCode::TooBig => "File or data too large",
            ErrorCode::NotFound => "File or data not found",
            ErrorCode::Destroyed => "Destroyed",
            ErrorCode::Canceled => "Canceled",
            ErrorCode::NotAvailable => "Not available",
            ErrorCode::Access => "Access forbidden",
            ErrorCode::Io => "IO error",
            ErrorCode::Internal => "Internal error",
            ErrorCode::Disabled => "Sound disabled",
            ErrorCode::Forked => "Process forked",
            ErrorCode::Disconnected => "Disconnected",
        }
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// Capability errors: expected and recoverable, callers treat them as
    /// soft failures.
    pub fn is_soft(self) -> bool {
        matches!(self, ErrorCode::NotSupported | ErrorCode::Disabled)
    }

    /// Environmental errors after which a context should be considered
    /// unusable.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorCode::NoDriver | ErrorCode::System | ErrorCode::OutOfMemory
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        code.code()
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = i32;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        ErrorCode::from_code(value).ok_or(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_identities_are_stable() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotSupported.code(), -1);
        assert_eq!(ErrorCode::Destroyed.code(), -10);
        assert_eq!(ErrorCode::Canceled.code(), -11);
        assert_eq!(ErrorCode::Disconnected.code(), -18);
    }

    #[test]
    fn test_all_table_matches_discriminants() {
        for (index, code) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(code.code(), -(index as i32));
            assert_eq!(ErrorCode::from_code(code.code()), Some(*code));
        }
    }

    #[test]
    fn test_from_code_out_of_range() {
        assert_eq!(ErrorCode::from_code(1), None);
        assert_eq!(ErrorCode::from_code(-19), None);
        assert_eq!(ErrorCode::try_from(-42), Err(-42));
        assert_eq!(ErrorCode::try_from(-16), Ok(ErrorCode::Disabled));
    }

    #[test]
    fn test_classification() {
        assert!(ErrorCode::NotSupported.is_soft());
        assert!(ErrorCode::Disabled.is_soft());
        assert!(!ErrorCode::Invalid.is_soft());

        assert!(ErrorCode::NoDriver.is_fatal());
        assert!(ErrorCode::System.is_fatal());
        assert!(!ErrorCode::Canceled.is_fatal());
    }

    #[test]
    fn test_display_uses_message_table() {
        assert_eq!(ErrorCode::NotSupported.to_string(), "Operation not supported");
        assert_eq!(ErrorCode::Disabled.to_string(), "Sound disabled");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ErrorCode::NotSupported).unwrap();
        assert_eq!(json, "\"NOT_SUPPORTED\"");
        let parsed: ErrorCode = serde_json::from_str("\"NOT_FOUND\"").unwrap();
        assert_eq!(parsed, ErrorCode::NotFound);
    }
}
