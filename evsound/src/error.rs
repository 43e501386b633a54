//! Error types for evsound
//!
//! Every variant maps to a stable [`ErrorCode`] so callers can branch on
//! the same numeric identities the native backend uses.

use crate::backend::RequestId;
use evsound_common::ErrorCode;
use thiserror::Error;

/// Main error type for the evsound library
#[derive(Error, Debug)]
pub enum Error {
    /// Backend reported a synchronous failure
    #[error("Backend error: {0}")]
    Backend(ErrorCode),

    /// Request id already has a pending request
    #[error("Request {0} is already pending")]
    AlreadyPending(RequestId),

    /// Malformed request or properties
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Property bag rejected
    #[error("Property error: {0}")]
    Property(#[from] evsound_common::Error),

    /// Context torn down
    #[error("Context destroyed")]
    Destroyed,

    /// Sounds switched off via canberra.enable
    #[error("Sounds disabled")]
    Disabled,
}

impl Error {
    /// Error for a code reported by a driver
    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Destroyed => Error::Destroyed,
            ErrorCode::Disabled => Error::Disabled,
            other => Error::Backend(other),
        }
    }

    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Backend(code) => *code,
            Error::AlreadyPending(_) | Error::Invalid(_) => ErrorCode::Invalid,
            Error::Property(evsound_common::Error::Io(_)) => ErrorCode::Io,
            Error::Property(_) => ErrorCode::Invalid,
            Error::Destroyed => ErrorCode::Destroyed,
            Error::Disabled => ErrorCode::Disabled,
        }
    }

    /// Capability error callers should tolerate
    pub fn is_soft(&self) -> bool {
        self.code().is_soft()
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Error::from_code(code)
    }
}

/// Convenience Result type using evsound Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Error::AlreadyPending(3).code(), ErrorCode::Invalid);
        assert_eq!(Error::Destroyed.code(), ErrorCode::Destroyed);
        assert_eq!(Error::Backend(ErrorCode::NoDriver).code(), ErrorCode::NoDriver);
        assert_eq!(
            Error::Property(evsound_common::Error::InvalidPropertyName("x y".into())).code(),
            ErrorCode::Invalid
        );
    }

    #[test]
    fn test_from_code_uses_dedicated_variants() {
        assert!(matches!(Error::from_code(ErrorCode::Destroyed), Error::Destroyed));
        assert!(matches!(Error::from_code(ErrorCode::Disabled), Error::Disabled));
        assert!(matches!(
            Error::from_code(ErrorCode::NotSupported),
            Error::Backend(ErrorCode::NotSupported)
        ));
    }

    #[test]
    fn test_soft_errors() {
        assert!(Error::Backend(ErrorCode::NotSupported).is_soft());
        assert!(Error::Disabled.is_soft());
        assert!(!Error::Destroyed.is_soft());
    }
}
