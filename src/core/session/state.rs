/*!
Login state tracking for a PKCS#11 session.

This module defines the principals a session can authenticate, the open
modes, and the state manager that guards login transitions.
*/

use std::fmt;

use crate::core::constants::{login_type, open_mode};
use crate::core::error::{Error, Result};

/// Principal presenting a PIN to the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum UserType {
    /// Security officer (`CKU_SO`)
    So,
    /// Regular user (`CKU_USER`)
    User,
}

impl UserType {
    /// Login type discriminator sent to the native layer
    pub fn login_type(self) -> u64 {
        match self {
            UserType::So => login_type::SO,
            UserType::User => login_type::USER,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::So => write!(f, "security officer"),
            UserType::User => write!(f, "user"),
        }
    }
}

/// Mode a session is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum OpenMode {
    /// Read-only session
    ReadOnly,
    /// Read-write session
    #[default]
    ReadWrite,
}

impl OpenMode {
    /// Mode selector sent to the native open call
    pub fn as_raw(self) -> i32 {
        match self {
            OpenMode::ReadOnly => open_mode::READ_ONLY,
            OpenMode::ReadWrite => open_mode::READ_WRITE,
        }
    }
}

impl TryFrom<i32> for OpenMode {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            open_mode::READ_ONLY => Ok(OpenMode::ReadOnly),
            open_mode::READ_WRITE => Ok(OpenMode::ReadWrite),
            other => crate::invalid_arg_err!("unknown open mode {}", other),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::ReadOnly => write!(f, "read-only"),
            OpenMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Snapshot of a session as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionStatus {
    /// Session is open
    Open {
        /// Whether the user is logged in
        user: bool,
        /// Whether the security officer is logged in
        so: bool,
    },
    /// Session has been destroyed
    Destroyed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open { user, so } => write!(f, "Open(user={}, so={})", user, so),
            SessionStatus::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Login state manager
///
/// Tracks which principals this session believes are logged in. It reflects
/// the session's own transition history only, never the live token state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginState {
    user: bool,
    so: bool,
}

impl LoginState {
    /// Create a state with nobody logged in
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `user_type` is logged in
    pub fn is_logged_in(&self, user_type: UserType) -> bool {
        match user_type {
            UserType::User => self.user,
            UserType::So => self.so,
        }
    }

    /// Whether any principal is logged in
    pub fn any_logged_in(&self) -> bool {
        self.user || self.so
    }

    /// Check that a login for `user_type` may be attempted
    pub fn check_can_login(&self, user_type: UserType) -> Result<()> {
        if self.is_logged_in(user_type) {
            return Err(Error::AlreadyLoggedIn(user_type));
        }
        Ok(())
    }

    /// Record a successful login
    pub fn transition_to_logged_in(&mut self, user_type: UserType) {
        match user_type {
            UserType::User => self.user = true,
            UserType::So => self.so = true,
        }
    }

    /// Record a logout; the token logs out every principal at once
    pub fn transition_to_logged_out(&mut self) {
        self.user = false;
        self.so = false;
    }

    /// Status snapshot for an open session
    pub fn status(&self) -> SessionStatus {
        SessionStatus::Open {
            user: self.user,
            so: self.so,
        }
    }
}
