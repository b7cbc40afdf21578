/*!
Session management for PKCS#11 tokens.

This module provides the session type, its login state machine, and the
principal and open mode types shared with the native boundary.
*/

// Login state tracking
pub mod state;

// Session type
#[allow(clippy::module_inception)]
pub mod session;

// Re-export main session types
pub use self::session::Session;
pub use self::state::{LoginState, OpenMode, SessionStatus, UserType};
