/*!
Error handling for PKCS#11 session management.

Two kinds of failure reach the caller: local precondition violations that are
detected before anything crosses the native boundary, and provider errors
reported by the token module itself. Provider errors are surfaced unchanged
and never retried here, since a wrong PIN counts towards the token's lockout.
*/

use std::fmt;
use std::io;
use thiserror::Error;

use crate::core::constants::rv;
use crate::core::session::state::UserType;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The principal is already authenticated on this session
    #[error("The {0} is already logged in")]
    AlreadyLoggedIn(UserType),

    /// Error reported by the underlying token module
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Operation issued on a session or slot after it was destroyed
    #[error("{0} has been destroyed")]
    Destroyed(&'static str),

    /// PIN could not be translated into the token's byte encoding
    #[error("Invalid PIN: {0}")]
    InvalidPin(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure reported by the native token module.
///
/// Carries the raw `CK_RV` so callers can distinguish lockout-relevant
/// conditions, plus a descriptive message for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Raw PKCS#11 return value
    pub code: u64,
    /// Description supplied by the module or derived from the code
    pub message: String,
}

impl ProviderError {
    /// Create a provider error with an explicit message
    pub fn new<S: Into<String>>(code: u64, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a provider error whose message is the symbolic name of `code`
    pub fn from_code(code: u64) -> Self {
        Self::new(code, rv::name(code))
    }

    /// Symbolic `CKR_*` name of the code, if it is a well-known one
    pub fn code_name(&self) -> &'static str {
        rv::name(self.code)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PKCS#11 error {} (0x{:08x}): {}",
            self.code_name(),
            self.code,
            self.message
        )
    }
}

impl std::error::Error for ProviderError {}

/// Create a provider error result from a `CK_RV`
#[macro_export]
macro_rules! provider_err {
    ($code:expr) => {
        Err($crate::core::error::Error::Provider(
            $crate::core::error::ProviderError::from_code($code),
        ))
    };
    ($code:expr, $($arg:tt)+) => {
        Err($crate::core::error::Error::Provider(
            $crate::core::error::ProviderError::new($code, format!($($arg)+)),
        ))
    };
}

/// Create a use-after-destroy error result
#[macro_export]
macro_rules! destroyed_err {
    ($what:expr) => {
        Err($crate::core::error::Error::Destroyed($what))
    };
}

/// Create an invalid argument error result
#[macro_export]
macro_rules! invalid_arg_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::InvalidArgument($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::InvalidArgument(format!($fmt, $($arg)*)))
    };
}

/// Convert from Error to io::Error (for compatibility)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::AlreadyLoggedIn(_) => io::Error::new(io::ErrorKind::AlreadyExists, error.to_string()),
            Error::Provider(e) => match e.code {
                rv::CKR_PIN_INCORRECT | rv::CKR_PIN_LOCKED | rv::CKR_USER_NOT_LOGGED_IN => {
                    io::Error::new(io::ErrorKind::PermissionDenied, e)
                }
                rv::CKR_TOKEN_NOT_PRESENT | rv::CKR_DEVICE_REMOVED | rv::CKR_SLOT_ID_INVALID => {
                    io::Error::new(io::ErrorKind::NotFound, e)
                }
                _ => io::Error::new(io::ErrorKind::Other, e),
            },
            Error::Destroyed(_) => io::Error::new(io::ErrorKind::NotConnected, error.to_string()),
            Error::InvalidPin(_) | Error::InvalidArgument(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyLoggedIn(UserType::User);
        assert_eq!(format!("{}", err), "The user is already logged in");

        let err = Error::AlreadyLoggedIn(UserType::So);
        assert_eq!(format!("{}", err), "The security officer is already logged in");

        let err = Error::Destroyed("Session");
        assert_eq!(format!("{}", err), "Session has been destroyed");
    }

    #[test]
    fn test_provider_error_names_code() {
        let err = ProviderError::from_code(rv::CKR_PIN_INCORRECT);
        assert_eq!(err.code_name(), "CKR_PIN_INCORRECT");
        assert!(format!("{}", err).contains("0x000000a0"));

        let err = ProviderError::new(0x8000_0001, "vendor failure");
        assert_eq!(err.code_name(), "CKR_VENDOR_DEFINED");
        assert!(format!("{}", err).contains("vendor failure"));
    }

    #[test]
    fn test_provider_err_macro() {
        let result: Result<()> = provider_err!(rv::CKR_SESSION_COUNT);
        match result {
            Err(Error::Provider(e)) => assert_eq!(e.code, rv::CKR_SESSION_COUNT),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::from(Error::Provider(ProviderError::from_code(rv::CKR_PIN_LOCKED)));
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);

        let io_err = io::Error::from(Error::Destroyed("Session"));
        assert_eq!(io_err.kind(), io::ErrorKind::NotConnected);
    }
}
