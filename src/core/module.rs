/*!
Native token module boundary.

[`TokenModule`] is the seam between session bookkeeping and the PKCS#11
library that owns the token. Each method maps 1:1 onto one native session
call; handles are passed through opaquely and PIN bytes are only borrowed for
the duration of the call.
*/

use crate::core::error::ProviderError;
use crate::core::handle::Handle;
use crate::core::session::state::{OpenMode, UserType};

/// Result of a native module call
pub type ModuleResult<T> = std::result::Result<T, ProviderError>;

/// Session API of a native PKCS#11 token module
pub trait TokenModule: Send + Sync {
    /// Open a session on `slot`
    ///
    /// # Returns
    /// * `Handle` - the native session handle
    fn open_session(&self, provider: Handle, slot: Handle, mode: OpenMode) -> ModuleResult<Handle>;

    /// Present a PIN for `user_type`
    ///
    /// `pin` is `None` when the token authenticates through a protected path.
    fn login(
        &self,
        provider: Handle,
        slot: Handle,
        session: Handle,
        user_type: UserType,
        pin: Option<&[u8]>,
    ) -> ModuleResult<()>;

    /// Log out every principal on the token
    fn logout(&self, provider: Handle, slot: Handle, session: Handle) -> ModuleResult<()>;

    /// Close a session; callers treat failures as best-effort
    fn close_session(&self, provider: Handle, slot: Handle, session: Handle) -> ModuleResult<()>;
}
