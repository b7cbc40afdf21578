/*!
Session configuration.

This module provides the options applied when a session is opened: the
open mode and how PINs are encoded for the token.
*/

use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};
use crate::core::session::state::OpenMode;

/// Byte encoding the token module expects for PINs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum PinEncoding {
    /// UTF-8, as recommended for `CK_UTF8CHAR` PINs
    #[default]
    Utf8,
    /// ISO 8859-1, for legacy tokens that treat PINs as single-byte strings
    Latin1,
}

impl PinEncoding {
    /// Name of the encoding as a string
    pub fn name(&self) -> &'static str {
        match self {
            PinEncoding::Utf8 => "utf-8",
            PinEncoding::Latin1 => "latin-1",
        }
    }
}

impl fmt::Display for PinEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PinEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(PinEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(PinEncoding::Latin1),
            other => Err(Error::InvalidArgument(format!("unknown PIN encoding '{}'", other))),
        }
    }
}

/// Configuration for opening a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Mode the session is opened in
    pub mode: OpenMode,
    /// Encoding used to translate PINs into bytes
    pub pin_encoding: PinEncoding,
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a read-only session
    pub fn read_only() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            ..Self::default()
        }
    }

    /// Configuration for a read-write session
    pub fn read_write() -> Self {
        Self {
            mode: OpenMode::ReadWrite,
            ..Self::default()
        }
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the PIN encoding
    pub fn with_pin_encoding(mut self, pin_encoding: PinEncoding) -> Self {
        self.pin_encoding = pin_encoding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.mode, OpenMode::ReadWrite);
        assert_eq!(config.pin_encoding, PinEncoding::Utf8);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(SessionConfig::read_only().mode, OpenMode::ReadOnly);
        assert_eq!(SessionConfig::read_write().mode, OpenMode::ReadWrite);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::read_only()
            .with_pin_encoding(PinEncoding::Latin1)
            .with_mode(OpenMode::ReadWrite);
        assert_eq!(config.mode, OpenMode::ReadWrite);
        assert_eq!(config.pin_encoding, PinEncoding::Latin1);
    }

    #[test]
    fn test_pin_encoding_from_str() {
        assert_eq!("UTF-8".parse::<PinEncoding>(), Ok(PinEncoding::Utf8));
        assert_eq!("iso-8859-1".parse::<PinEncoding>(), Ok(PinEncoding::Latin1));
        assert!("ebcdic".parse::<PinEncoding>().is_err());
        assert_eq!(PinEncoding::Latin1.to_string(), "latin-1");
    }
}
