/*!
# PKCS#11 Session

Session management on top of a PKCS#11 token module.

## Overview

A [`Session`] is a logical connection to a token in a [`Slot`]. This library
provides:

- Opening read-only and read-write sessions
- User and security officer login, with protected authentication path support
- Logout and local tracking of who is logged in
- Deterministic, one-shot teardown of native session handles
- Slots that destroy their open sessions when they go away
- A C API for hosts that supply the token module as C callbacks (`ffi` feature)

The native token module is reached through the [`TokenModule`] trait.

## Example

```
use std::sync::Arc;
use pkcs11_session::{Handle, OpenMode, Slot, TokenInfo};
use pkcs11_session::core::mock::MockModule;

let module = Arc::new(MockModule::default());
let slot = Slot::new(module, Handle::new(1), Handle::new(2), TokenInfo::default());

let session = slot.open_session(OpenMode::ReadWrite)?;
session.login_user(Some("1234"))?;
assert!(session.is_user_logged_in());

session.logout()?;
session.destroy()?;
assert!(session.login_user(Some("1234")).is_err());
# Ok::<(), pkcs11_session::Error>(())
```
*/

// Core session components
pub mod core;

// C bindings
#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export commonly used types for convenience
pub use core::config::{PinEncoding, SessionConfig};
pub use core::constants::VERSION;
pub use core::error::{Error, ProviderError, Result};
pub use core::handle::Handle;
pub use core::lifecycle::{Destroyable, ResourceId};
pub use core::module::{ModuleResult, TokenModule};
pub use core::session::{OpenMode, Session, SessionStatus, UserType};
pub use core::slot::{Slot, TokenInfo};
