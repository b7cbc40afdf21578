/*!
PIN translation.

Converts a caller-supplied PIN into the exact bytes the token module expects.
An absent PIN stays absent: tokens with a protected authentication path take
the PIN on the device itself, and the native login receives a null buffer.
*/

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

use crate::core::config::PinEncoding;
use crate::core::error::{Error, Result};

/// PIN bytes ready for the native login call, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct PinBytes(Zeroizing<Vec<u8>>);

impl PinBytes {
    /// Wrap raw PIN bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        PinBytes(Zeroizing::new(bytes))
    }

    /// Bytes as passed to the native layer
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the PIN is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PinBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinBytes({} bytes)", self.len())
    }
}

/// Translate a PIN into its native byte encoding.
///
/// `None` is passed through unchanged for protected authentication paths.
pub fn translate_pin(pin: Option<&str>, encoding: PinEncoding) -> Result<Option<PinBytes>> {
    let Some(pin) = pin else {
        return Ok(None);
    };

    let bytes = match encoding {
        PinEncoding::Utf8 => pin.as_bytes().to_vec(),
        PinEncoding::Latin1 => {
            let mut bytes = Vec::<u8>::with_capacity(pin.len());
            for c in pin.chars() {
                let code = u32::from(c);
                if code > 0xFF {
                    bytes.zeroize();
                    return Err(Error::InvalidPin(format!(
                        "character U+{:04X} is not representable in Latin-1",
                        code
                    )));
                }
                bytes.push(code as u8);
            }
            bytes
        }
    };

    Ok(Some(PinBytes::new(bytes)))
}
