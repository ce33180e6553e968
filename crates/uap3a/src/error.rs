//! Error types for the processing shim.

use std::fmt;

use crate::config::ConfigError;
use crate::frame::FrameError;

/// Non-zero status code returned by the processing engine.
///
/// The shim never interprets engine codes; they are carried to the caller
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineError {
    code: i32,
}

impl EngineError {
    /// Wraps a raw engine status. `code` should be non-zero.
    pub const fn new(code: i32) -> Self {
        Self { code }
    }

    /// The raw engine status code.
    pub const fn code(self) -> i32 {
        self.code
    }

    /// Converts a raw engine status into a `Result`. Zero is success.
    pub fn check(code: i32) -> Result<(), Self> {
        if code == 0 { Ok(()) } else { Err(Self::new(code)) }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine returned status {}", self.code)
    }
}

impl std::error::Error for EngineError {}

/// Errors reported by the service, processor and C façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A handle was null, stale, or did not match the live service.
    InvalidHandle,
    /// The service has not been initialized yet.
    NotInitialized,
    /// The processor's engine has already been released.
    Released,
    /// No reference frame was supplied and the reference mode requires one.
    MissingReference,
    /// An audio frame failed layout validation.
    Frame(FrameError),
    /// A flat configuration could not be mapped.
    Config(ConfigError),
    /// The engine rejected a call.
    Engine(EngineError),
}

impl Error {
    /// Status code reported through the C API for this error.
    ///
    /// Engine failures keep their original code.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHandle | Self::MissingReference => -1,
            Self::NotInitialized | Self::Released => -2,
            Self::Frame(_) => -3,
            Self::Config(_) => -4,
            Self::Engine(err) => err.code(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "invalid handle"),
            Self::NotInitialized => write!(f, "service is not initialized"),
            Self::Released => write!(f, "processor engine already released"),
            Self::MissingReference => write!(f, "reference frame is required"),
            Self::Frame(err) => write!(f, "invalid audio frame: {err}"),
            Self::Config(err) => write!(f, "invalid processor config: {err}"),
            Self::Engine(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_check_treats_zero_as_success() {
        assert_eq!(EngineError::check(0), Ok(()));
        assert_eq!(EngineError::check(-7), Err(EngineError::new(-7)));
        assert_eq!(EngineError::check(3), Err(EngineError::new(3)));
    }

    #[test]
    fn codes_match_c_api() {
        assert_eq!(Error::InvalidHandle.code(), -1);
        assert_eq!(Error::MissingReference.code(), -1);
        assert_eq!(Error::NotInitialized.code(), -2);
        assert_eq!(Error::Released.code(), -2);
        assert_eq!(Error::Frame(FrameError::NullBuffer).code(), -3);
        assert_eq!(
            Error::Config(ConfigError::UnknownVariant {
                field: "reference_mode",
                value: 9,
            })
            .code(),
            -4
        );
        assert_eq!(Error::Engine(EngineError::new(-1001)).code(), -1001);
    }
}
