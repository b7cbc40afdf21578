/*!
An open session on a token.

The session owns three native handles (provider, slot, session) from a
successful open until destroy, and tracks which principals it has logged in.
Login guards run before anything crosses the native boundary; provider errors
pass through unchanged. Destroy closes the native session exactly once and
leaves the handles at the null sentinel, so every later operation fails fast.
*/

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, warn};

use crate::core::config::{PinEncoding, SessionConfig};
use crate::core::constants::rv;
use crate::core::error::Result;
use crate::core::handle::Handle;
use crate::core::lifecycle::{Destroyable, Lifecycle, ResourceId};
use crate::core::module::TokenModule;
use crate::core::pin::{PinBytes, translate_pin};
use crate::core::session::state::{LoginState, OpenMode, SessionStatus, UserType};
use crate::core::slot::Slot;

/// Mutable part of a session, guarded by the session lock
#[derive(Debug)]
struct SessionHandles {
    provider: Handle,
    slot: Handle,
    session: Handle,
    login: LoginState,
}

impl SessionHandles {
    fn ensure_open(&self) -> Result<()> {
        if self.session.is_null() {
            return crate::destroyed_err!("Session");
        }
        Ok(())
    }
}

/// Shared core of a session; the slot reaches it through a weak reference
struct SessionCore {
    module: Arc<dyn TokenModule>,
    handles: Mutex<SessionHandles>,
    mode: OpenMode,
    pin_encoding: PinEncoding,
    lifecycle: Lifecycle,
}

impl SessionCore {
    fn lock(&self) -> MutexGuard<'_, SessionHandles> {
        // Flags are only written after a native call returns, so the state
        // behind a poisoned lock is still consistent
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn login(&self, user_type: UserType, pin: Option<&str>) -> Result<()> {
        let mut handles = self.lock();
        handles.ensure_open()?;
        handles.login.check_can_login(user_type)?;

        let pin = translate_pin(pin, self.pin_encoding)?;
        debug!(
            session = %handles.session,
            user_type = %user_type,
            protected_path = pin.is_none(),
            "logging in"
        );
        self.module.login(
            handles.provider,
            handles.slot,
            handles.session,
            user_type,
            pin.as_ref().map(PinBytes::as_bytes),
        )?;

        handles.login.transition_to_logged_in(user_type);
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        let mut handles = self.lock();
        handles.ensure_open()?;
        if !handles.login.any_logged_in() {
            return Ok(());
        }

        debug!(session = %handles.session, "logging out");
        self.module
            .logout(handles.provider, handles.slot, handles.session)?;

        handles.login.transition_to_logged_out();
        Ok(())
    }
}

impl Destroyable for SessionCore {
    fn destroy(&self) -> Result<()> {
        let mut handles = self.lock();
        if handles.session.is_null() {
            drop(handles);
            self.lifecycle.destroy();
            return Ok(());
        }

        debug!(session = %handles.session, "closing session");
        if let Err(e) = self
            .module
            .close_session(handles.provider, handles.slot, handles.session)
        {
            warn!(session = %handles.session, error = %e, "closing session failed, handles released anyway");
        }

        handles.session.take();
        handles.slot.take();
        handles.provider.take();
        handles.login.transition_to_logged_out();
        drop(handles);

        self.lifecycle.destroy();
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }
}

/// An open session on a token in a [`Slot`].
///
/// Dropping a session destroys it.
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    /// Open a session on `slot`
    pub fn open(slot: &Slot, mode: OpenMode) -> Result<Session> {
        Self::open_with_config(slot, &SessionConfig::default().with_mode(mode))
    }

    /// Open a session on `slot` with explicit configuration
    pub fn open_with_config(slot: &Slot, config: &SessionConfig) -> Result<Session> {
        let (provider, slot_handle) = slot.live_handles()?;
        let module = Arc::clone(slot.module());

        let session = module.open_session(provider, slot_handle, config.mode)?;
        if session.is_null() {
            return crate::provider_err!(rv::CKR_GENERAL_ERROR, "module returned a null session handle");
        }
        debug!(slot = %slot_handle, session = %session, mode = %config.mode, "opened session");

        let core = Arc::new(SessionCore {
            module,
            handles: Mutex::new(SessionHandles {
                provider,
                slot: slot_handle,
                session,
                login: LoginState::new(),
            }),
            mode: config.mode,
            pin_encoding: config.pin_encoding,
            lifecycle: Lifecycle::with_parent(slot.sessions()),
        });

        let child: Weak<dyn Destroyable> = Arc::downgrade(&core) as Weak<dyn Destroyable>;
        if let Err(e) = slot.sessions().register(core.lifecycle.id(), child) {
            // The slot went away while we were opening; don't leak the session
            core.destroy()?;
            return Err(e);
        }

        Ok(Session { core })
    }

    /// Present the user PIN to the token.
    ///
    /// `pin` may be `None` if the token has a protected authentication path.
    /// Fails with [`Error::AlreadyLoggedIn`](crate::core::error::Error::AlreadyLoggedIn) without contacting the token if
    /// the user is already logged in on this session.
    pub fn login_user(&self, pin: Option<&str>) -> Result<()> {
        self.core.login(UserType::User, pin)
    }

    /// Present the security officer PIN to the token.
    ///
    /// Same rules as [`login_user`](Self::login_user).
    pub fn login_so(&self, pin: Option<&str>) -> Result<()> {
        self.core.login(UserType::So, pin)
    }

    /// Whether the user logged in through this session
    pub fn is_user_logged_in(&self) -> bool {
        self.core.lock().login.is_logged_in(UserType::User)
    }

    /// Whether the security officer logged in through this session
    pub fn is_so_logged_in(&self) -> bool {
        self.core.lock().login.is_logged_in(UserType::So)
    }

    /// Log out from the token.
    ///
    /// Does nothing if nobody is logged in. Otherwise a single native logout
    /// clears both principals.
    pub fn logout(&self) -> Result<()> {
        self.core.logout()
    }

    /// Close the native session and invalidate the handles
    pub fn destroy(&self) -> Result<()> {
        self.core.destroy()
    }

    /// Whether the session has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }

    /// Status snapshot
    pub fn status(&self) -> SessionStatus {
        let handles = self.core.lock();
        if handles.session.is_null() {
            SessionStatus::Destroyed
        } else {
            handles.login.status()
        }
    }

    /// Mode the session was opened in
    pub fn mode(&self) -> OpenMode {
        self.core.mode
    }

    /// Identifier under which the slot tracks this session
    pub fn id(&self) -> ResourceId {
        self.core.lifecycle.id()
    }

    /// Native handle of the provider, `NULL` once destroyed
    pub fn provider_handle(&self) -> Handle {
        self.core.lock().provider
    }

    /// Native handle of the slot, `NULL` once destroyed
    pub fn slot_handle(&self) -> Handle {
        self.core.lock().slot
    }

    /// Native handle of the session, `NULL` once destroyed
    pub fn handle(&self) -> Handle {
        self.core.lock().session
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.core.is_destroyed() {
            debug!(session = %self.id(), "session dropped without destroy");
            let _ = self.core.destroy();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handles = self.core.lock();
        f.debug_struct("Session")
            .field("id", &self.core.lifecycle.id())
            .field("handle", &handles.session)
            .field("mode", &self.core.mode)
            .field("login", &handles.login)
            .finish()
    }
}
