//! Core components of PKCS#11 session management.
//!
//! This module contains the session and slot types, the native module
//! boundary, lifecycle bookkeeping, PIN translation and error handling.

// Session management
pub mod session;

// Slots and token properties
pub mod slot;

// Native token module boundary
pub mod module;

// Recording mock of the native boundary
pub mod mock;

// Opaque native handles
pub mod handle;

// One-shot teardown and parent/child registry
pub mod lifecycle;

// PIN translation
pub mod pin;

// Session configuration
pub mod config;

// Values shared with pkcs11t.h
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::config::{PinEncoding, SessionConfig};
pub use self::error::{Error, ProviderError, Result};
pub use self::handle::Handle;
pub use self::lifecycle::{Destroyable, Lifecycle, ResourceId, ResourceRegistry};
pub use self::module::{ModuleResult, TokenModule};
pub use self::session::{OpenMode, Session, SessionStatus, UserType};
pub use self::slot::{Slot, TokenInfo};
