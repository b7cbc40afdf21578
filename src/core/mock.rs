/*!
In-process mock of a token module.

[`MockModule`] records every call that crosses the native boundary and keeps
just enough token state to answer like a real module: a PIN per principal,
the set of open sessions, and who is logged in. Failures can be injected per
operation to exercise provider error paths.
*/

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::core::constants::rv;
use crate::core::error::ProviderError;
use crate::core::handle::Handle;
use crate::core::module::{ModuleResult, TokenModule};
use crate::core::session::state::{OpenMode, UserType};

/// First session handle issued by the mock
const FIRST_SESSION_HANDLE: u64 = 0x1000;

/// Kind of native call, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `open_session`
    Open,
    /// `login`
    Login,
    /// `logout`
    Logout,
    /// `close_session`
    Close,
}

/// A recorded native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    /// Session open
    Open {
        provider: Handle,
        slot: Handle,
        mode: OpenMode,
    },
    /// Login with the PIN bytes as received
    Login {
        session: Handle,
        user_type: UserType,
        pin: Option<Vec<u8>>,
    },
    /// Logout
    Logout { session: Handle },
    /// Session close
    Close { session: Handle },
}

impl NativeCall {
    /// Kind of this call
    pub fn kind(&self) -> CallKind {
        match self {
            NativeCall::Open { .. } => CallKind::Open,
            NativeCall::Login { .. } => CallKind::Login,
            NativeCall::Logout { .. } => CallKind::Logout,
            NativeCall::Close { .. } => CallKind::Close,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<NativeCall>,
    next_session: u64,
    open_sessions: HashSet<Handle>,
    user_pin: Vec<u8>,
    so_pin: Vec<u8>,
    protected_auth_path: bool,
    user_logged_in: bool,
    so_logged_in: bool,
    fail_next: Vec<(CallKind, u64)>,
}

impl MockState {
    fn take_failure(&mut self, kind: CallKind) -> Option<ProviderError> {
        let pos = self.fail_next.iter().position(|(k, _)| *k == kind)?;
        let (_, code) = self.fail_next.remove(pos);
        Some(ProviderError::from_code(code))
    }

    fn check_session(&self, session: Handle) -> ModuleResult<()> {
        if self.open_sessions.contains(&session) {
            Ok(())
        } else {
            Err(ProviderError::from_code(rv::CKR_SESSION_HANDLE_INVALID))
        }
    }
}

/// Recording mock of a PKCS#11 token module
#[derive(Debug)]
pub struct MockModule {
    state: Mutex<MockState>,
}

impl Default for MockModule {
    fn default() -> Self {
        Self::new("1234", "87654321")
    }
}

impl MockModule {
    /// Create a mock token with the given user and SO PINs
    pub fn new(user_pin: &str, so_pin: &str) -> Self {
        Self {
            state: Mutex::new(MockState {
                next_session: FIRST_SESSION_HANDLE,
                user_pin: user_pin.as_bytes().to_vec(),
                so_pin: so_pin.as_bytes().to_vec(),
                ..MockState::default()
            }),
        }
    }

    /// Make the token accept logins without an in-band PIN
    pub fn with_protected_auth_path(self) -> Self {
        self.lock().protected_auth_path = true;
        self
    }

    /// Fail the next call of `kind` with `code`
    pub fn fail_next(&self, kind: CallKind, code: u64) {
        self.lock().fail_next.push((kind, code));
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<NativeCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `kind`
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    /// Total number of recorded calls
    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of sessions currently open on the token
    pub fn open_session_count(&self) -> usize {
        self.lock().open_sessions.len()
    }

    /// Whether the token itself considers `user_type` logged in
    pub fn token_logged_in(&self, user_type: UserType) -> bool {
        let state = self.lock();
        match user_type {
            UserType::User => state.user_logged_in,
            UserType::So => state.so_logged_in,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panic inside a test must not hide the recorded calls
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenModule for MockModule {
    fn open_session(&self, provider: Handle, slot: Handle, mode: OpenMode) -> ModuleResult<Handle> {
        let mut state = self.lock();
        state.calls.push(NativeCall::Open { provider, slot, mode });
        if let Some(err) = state.take_failure(CallKind::Open) {
            return Err(err);
        }
        if provider.is_null() || slot.is_null() {
            return Err(ProviderError::from_code(rv::CKR_SLOT_ID_INVALID));
        }

        let session = Handle::new(state.next_session);
        state.next_session += 1;
        state.open_sessions.insert(session);
        Ok(session)
    }

    fn login(
        &self,
        _provider: Handle,
        _slot: Handle,
        session: Handle,
        user_type: UserType,
        pin: Option<&[u8]>,
    ) -> ModuleResult<()> {
        let mut state = self.lock();
        state.calls.push(NativeCall::Login {
            session,
            user_type,
            pin: pin.map(<[u8]>::to_vec),
        });
        if let Some(err) = state.take_failure(CallKind::Login) {
            return Err(err);
        }
        state.check_session(session)?;

        let (already, expected) = match user_type {
            UserType::User => (state.user_logged_in, &state.user_pin),
            UserType::So => (state.so_logged_in, &state.so_pin),
        };
        if already {
            return Err(ProviderError::from_code(rv::CKR_USER_ALREADY_LOGGED_IN));
        }
        match pin {
            None if !state.protected_auth_path => {
                return Err(ProviderError::from_code(rv::CKR_ARGUMENTS_BAD));
            }
            Some(pin) if pin != expected.as_slice() => {
                return Err(ProviderError::from_code(rv::CKR_PIN_INCORRECT));
            }
            _ => {}
        }

        match user_type {
            UserType::User => state.user_logged_in = true,
            UserType::So => state.so_logged_in = true,
        }
        Ok(())
    }

    fn logout(&self, _provider: Handle, _slot: Handle, session: Handle) -> ModuleResult<()> {
        let mut state = self.lock();
        state.calls.push(NativeCall::Logout { session });
        if let Some(err) = state.take_failure(CallKind::Logout) {
            return Err(err);
        }
        state.check_session(session)?;
        if !state.user_logged_in && !state.so_logged_in {
            return Err(ProviderError::from_code(rv::CKR_USER_NOT_LOGGED_IN));
        }

        state.user_logged_in = false;
        state.so_logged_in = false;
        Ok(())
    }

    fn close_session(&self, _provider: Handle, _slot: Handle, session: Handle) -> ModuleResult<()> {
        let mut state = self.lock();
        state.calls.push(NativeCall::Close { session });
        // A real module closes the session even when it reports an error
        let removed = state.open_sessions.remove(&session);
        if state.open_sessions.is_empty() {
            state.user_logged_in = false;
            state.so_logged_in = false;
        }
        if let Some(err) = state.take_failure(CallKind::Close) {
            return Err(err);
        }
        if !removed {
            return Err(ProviderError::from_code(rv::CKR_SESSION_HANDLE_INVALID));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDER: Handle = Handle::new(1);
    const SLOT: Handle = Handle::new(2);

    #[test]
    fn test_open_issues_distinct_handles() {
        let module = MockModule::default();
        let a = module.open_session(PROVIDER, SLOT, OpenMode::ReadOnly).unwrap();
        let b = module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).unwrap();
        assert_ne!(a, b);
        assert_eq!(module.open_session_count(), 2);
        assert_eq!(module.call_count(CallKind::Open), 2);
    }

    #[test]
    fn test_login_checks_pin() {
        let module = MockModule::default();
        let session = module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).unwrap();

        let err = module
            .login(PROVIDER, SLOT, session, UserType::User, Some(&b"0000"[..]))
            .unwrap_err();
        assert_eq!(err.code, rv::CKR_PIN_INCORRECT);

        module
            .login(PROVIDER, SLOT, session, UserType::User, Some(&b"1234"[..]))
            .unwrap();
        assert!(module.token_logged_in(UserType::User));
    }

    #[test]
    fn test_null_pin_requires_protected_path() {
        let module = MockModule::default();
        let session = module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).unwrap();
        let err = module.login(PROVIDER, SLOT, session, UserType::User, None).unwrap_err();
        assert_eq!(err.code, rv::CKR_ARGUMENTS_BAD);

        let module = MockModule::default().with_protected_auth_path();
        let session = module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).unwrap();
        assert!(module.login(PROVIDER, SLOT, session, UserType::User, None).is_ok());
    }

    #[test]
    fn test_injected_failure_is_consumed_once() {
        let module = MockModule::default();
        module.fail_next(CallKind::Open, rv::CKR_SESSION_COUNT);

        let err = module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).unwrap_err();
        assert_eq!(err.code, rv::CKR_SESSION_COUNT);
        assert!(module.open_session(PROVIDER, SLOT, OpenMode::ReadWrite).is_ok());
    }

    #[test]
    fn test_close_unknown_session() {
        let module = MockModule::default();
        let err = module.close_session(PROVIDER, SLOT, Handle::new(99)).unwrap_err();
        assert_eq!(err.code, rv::CKR_SESSION_HANDLE_INVALID);
    }
}
