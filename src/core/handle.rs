/*!
Opaque native handles.

Handles live in the token module's address space and are never dereferenced
here. The zero value is the invalid sentinel, so a destroyed resource is
detected by comparing against [`Handle::NULL`].
*/

use std::fmt;

use crate::core::constants::NULL_HANDLE;

/// Opaque identifier issued by the native token module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Handle(u64);

impl Handle {
    /// The invalid handle
    pub const NULL: Handle = Handle(NULL_HANDLE);

    /// Wrap a raw native value
    pub const fn new(raw: u64) -> Self {
        Handle(raw)
    }

    /// Raw value as passed across the native boundary
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the invalid sentinel
    pub const fn is_null(self) -> bool {
        self.0 == NULL_HANDLE
    }

    /// Take the value, leaving the sentinel behind
    pub fn take(&mut self) -> Handle {
        std::mem::replace(self, Handle::NULL)
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Handle(raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NULL")
        } else {
            write!(f, "0x{:x}", self.0)
        }
    }
}
