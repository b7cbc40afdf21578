/*!
Slot handles and the sessions opened on them.

A [`Slot`] is the source of the provider and slot handles a session is opened
with. Slot discovery happens elsewhere: the slot is constructed from handles
the token module already issued. The slot keeps a registry of its open
sessions and destroys them when it is destroyed or dropped.
*/

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::core::constants::token_flags;
use crate::core::error::Result;
use crate::core::handle::Handle;
use crate::core::lifecycle::{Destroyable, Lifecycle, ResourceRegistry};
use crate::core::module::TokenModule;
use crate::core::session::{OpenMode, Session};

/// Token properties a session needs to know about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenInfo {
    /// Token label
    pub label: String,
    /// `CKF_*` token flags
    pub flags: u64,
}

impl TokenInfo {
    /// Create token info from a label and flags
    pub fn new<S: Into<String>>(label: S, flags: u64) -> Self {
        Self {
            label: label.into(),
            flags,
        }
    }

    /// Whether the token takes PINs on the device itself
    pub fn has_protected_auth_path(&self) -> bool {
        self.flags & token_flags::PROTECTED_AUTHENTICATION_PATH != 0
    }

    /// Whether the token requires a login for private objects
    pub fn login_required(&self) -> bool {
        self.flags & token_flags::LOGIN_REQUIRED != 0
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotHandles {
    provider: Handle,
    slot: Handle,
}

/// A slot holding a token, and the parent of its sessions
pub struct Slot {
    module: Arc<dyn TokenModule>,
    handles: Mutex<SlotHandles>,
    token: TokenInfo,
    sessions: ResourceRegistry,
    lifecycle: Lifecycle,
}

impl Slot {
    /// Wrap handles issued by `module`
    pub fn new(module: Arc<dyn TokenModule>, provider: Handle, slot: Handle, token: TokenInfo) -> Self {
        Self {
            module,
            handles: Mutex::new(SlotHandles { provider, slot }),
            token,
            sessions: ResourceRegistry::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Handle of the provider the slot belongs to
    pub fn provider_handle(&self) -> Handle {
        self.lock_handles().provider
    }

    /// Handle of the slot
    pub fn handle(&self) -> Handle {
        self.lock_handles().slot
    }

    /// Properties of the token in this slot
    pub fn token_info(&self) -> &TokenInfo {
        &self.token
    }

    /// Whether the token takes PINs on the device itself
    pub fn has_protected_auth_path(&self) -> bool {
        self.token.has_protected_auth_path()
    }

    /// Number of sessions on this slot that have not been destroyed
    pub fn open_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Open a session on this slot
    pub fn open_session(&self, mode: OpenMode) -> Result<Session> {
        Session::open(self, mode)
    }

    pub(crate) fn module(&self) -> &Arc<dyn TokenModule> {
        &self.module
    }

    pub(crate) fn sessions(&self) -> &ResourceRegistry {
        &self.sessions
    }

    /// Provider and slot handles, or `Destroyed` once the slot is gone
    pub(crate) fn live_handles(&self) -> Result<(Handle, Handle)> {
        self.lifecycle.ensure_alive("Slot")?;
        let handles = self.lock_handles();
        Ok((handles.provider, handles.slot))
    }

    fn lock_handles(&self) -> MutexGuard<'_, SlotHandles> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Destroyable for Slot {
    /// Destroy every open session, then invalidate the slot handles
    fn destroy(&self) -> Result<()> {
        if self.lifecycle.is_destroyed() {
            return Ok(());
        }
        let result = self.sessions.destroy_all();

        let mut handles = self.lock_handles();
        debug!(slot = %handles.slot, "destroying slot");
        handles.provider.take();
        handles.slot.take();
        drop(handles);

        self.lifecycle.destroy();
        result
    }

    fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Session teardown errors were already logged by the registry
        let _ = Destroyable::destroy(self);
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handles = self.lock_handles();
        f.debug_struct("Slot")
            .field("provider", &handles.provider)
            .field("slot", &handles.slot)
            .field("token", &self.token)
            .field("sessions", &self.sessions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::mock::{CallKind, MockModule};

    fn slot_with(module: &Arc<MockModule>) -> Slot {
        Slot::new(
            module.clone(),
            Handle::new(1),
            Handle::new(2),
            TokenInfo::new("test token", token_flags::LOGIN_REQUIRED),
        )
    }

    #[test]
    fn test_token_flags() {
        let info = TokenInfo::new("pinpad", token_flags::PROTECTED_AUTHENTICATION_PATH);
        assert!(info.has_protected_auth_path());
        assert!(!info.login_required());
    }

    #[test]
    fn test_slot_tracks_sessions() {
        let module = Arc::new(MockModule::default());
        let slot = slot_with(&module);

        let first = slot.open_session(OpenMode::ReadOnly).unwrap();
        let second = slot.open_session(OpenMode::ReadWrite).unwrap();
        assert_eq!(slot.open_session_count(), 2);

        first.destroy().unwrap();
        assert_eq!(slot.open_session_count(), 1);
        drop(second);
        assert_eq!(slot.open_session_count(), 0);
    }

    #[test]
    fn test_destroy_slot_destroys_sessions() {
        let module = Arc::new(MockModule::default());
        let slot = slot_with(&module);
        let session = slot.open_session(OpenMode::ReadWrite).unwrap();

        Destroyable::destroy(&slot).unwrap();
        assert!(session.is_destroyed());
        assert_eq!(module.call_count(CallKind::Close), 1);
        assert_eq!(module.open_session_count(), 0);
        assert!(slot.handle().is_null() && slot.provider_handle().is_null());

        assert_eq!(session.login_user(Some("1234")), Err(Error::Destroyed("Session")));
        assert_eq!(slot.open_session(OpenMode::ReadOnly).unwrap_err(), Error::Destroyed("Slot"));

        // A second destroy is a no-op
        Destroyable::destroy(&slot).unwrap();
        assert_eq!(module.call_count(CallKind::Close), 1);
    }

    #[test]
    fn test_dropping_slot_closes_sessions() {
        let module = Arc::new(MockModule::default());
        let session = {
            let slot = slot_with(&module);
            slot.open_session(OpenMode::ReadWrite).unwrap()
        };
        assert!(session.is_destroyed());
        assert_eq!(module.open_session_count(), 0);
    }
}
