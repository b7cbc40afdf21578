/*!
C API for session management.

Slots and sessions are handed to the host as opaque pointers. Status codes
are `0` on success and negative on failure; the message of the last failure
on the calling thread can be fetched with [`p11s_last_error_message`].
*/

use std::cell::RefCell;
use std::sync::Arc;
use std::{ptr, slice, str};

use libc::{c_char, c_int, c_uint, c_ulong, c_void};

use crate::core::constants::rv;
use crate::core::error::{Error, ProviderError, Result};
use crate::core::handle::Handle;
use crate::core::module::{ModuleResult, TokenModule};
use crate::core::session::{OpenMode, Session, UserType};
use crate::core::slot::{Slot, TokenInfo};

/// Status codes returned by the C API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P11sStatus {
    Success = 0,
    InvalidArgument = -1,
    ProviderError = -2,
    AlreadyLoggedIn = -3,
    Destroyed = -4,
    InvalidPin = -5,
}

/// `open` callback: writes the new session handle to `out_session`
pub type P11sOpenFn =
    unsafe extern "C" fn(context: *mut c_void, provider: u64, slot: u64, mode: c_int, out_session: *mut u64) -> c_ulong;

/// `login` callback: `pin` is null for a protected authentication path
pub type P11sLoginFn = unsafe extern "C" fn(
    context: *mut c_void,
    provider: u64,
    slot: u64,
    session: u64,
    login_type: c_ulong,
    pin: *const u8,
    pin_len: c_ulong,
) -> c_ulong;

/// `logout` and `close` callback
pub type P11sSessionFn = unsafe extern "C" fn(context: *mut c_void, provider: u64, slot: u64, session: u64) -> c_ulong;

/// Session API of the host's token module, as C function pointers.
///
/// Every callback returns a `CK_RV`. `context` is passed back unchanged.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct P11sModuleFunctions {
    pub context: *mut c_void,
    pub open_session: Option<P11sOpenFn>,
    pub login: Option<P11sLoginFn>,
    pub logout: Option<P11sSessionFn>,
    pub close_session: Option<P11sSessionFn>,
}

/// [`TokenModule`] backed by host-supplied callbacks
#[derive(Debug)]
pub struct CallbackModule {
    functions: P11sModuleFunctions,
}

// SAFETY: the host guarantees its callbacks and context may be used from any
// thread that calls into this library
unsafe impl Send for CallbackModule {}
unsafe impl Sync for CallbackModule {}

impl CallbackModule {
    /// Wrap a callback table
    ///
    /// # Safety
    /// The callbacks must be valid to call with `functions.context` for as
    /// long as the module is alive.
    pub unsafe fn new(functions: P11sModuleFunctions) -> Self {
        Self { functions }
    }
}

fn check_rv(code: c_ulong) -> ModuleResult<()> {
    let code = code as u64;
    if code == rv::CKR_OK {
        Ok(())
    } else {
        Err(ProviderError::from_code(code))
    }
}

fn not_supported<T>() -> ModuleResult<T> {
    Err(ProviderError::from_code(rv::CKR_FUNCTION_NOT_SUPPORTED))
}

impl TokenModule for CallbackModule {
    fn open_session(&self, provider: Handle, slot: Handle, mode: OpenMode) -> ModuleResult<Handle> {
        let Some(open) = self.functions.open_session else {
            return not_supported();
        };
        let mut session = 0u64;
        // SAFETY: see `CallbackModule::new`; `session` outlives the call
        check_rv(unsafe {
            open(
                self.functions.context,
                provider.raw(),
                slot.raw(),
                mode.as_raw() as c_int,
                &mut session,
            )
        })?;
        Ok(Handle::new(session))
    }

    fn login(
        &self,
        provider: Handle,
        slot: Handle,
        session: Handle,
        user_type: UserType,
        pin: Option<&[u8]>,
    ) -> ModuleResult<()> {
        let Some(login) = self.functions.login else {
            return not_supported();
        };
        let (pin_ptr, pin_len) = match pin {
            Some(pin) => (pin.as_ptr(), pin.len() as c_ulong),
            None => (ptr::null(), 0),
        };
        // SAFETY: see `CallbackModule::new`; the PIN buffer outlives the call
        check_rv(unsafe {
            login(
                self.functions.context,
                provider.raw(),
                slot.raw(),
                session.raw(),
                user_type.login_type() as c_ulong,
                pin_ptr,
                pin_len,
            )
        })
    }

    fn logout(&self, provider: Handle, slot: Handle, session: Handle) -> ModuleResult<()> {
        let Some(logout) = self.functions.logout else {
            return not_supported();
        };
        // SAFETY: see `CallbackModule::new`
        check_rv(unsafe { logout(self.functions.context, provider.raw(), slot.raw(), session.raw()) })
    }

    fn close_session(&self, provider: Handle, slot: Handle, session: Handle) -> ModuleResult<()> {
        let Some(close) = self.functions.close_session else {
            return not_supported();
        };
        // SAFETY: see `CallbackModule::new`
        check_rv(unsafe { close(self.functions.context, provider.raw(), slot.raw(), session.raw()) })
    }
}

// Opaque slot handle for the C API
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct P11sSlotHandle(*mut c_void);

// Opaque session handle for the C API
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct P11sSessionHandle(*mut c_void);

impl P11sSessionHandle {
    /// The null handle
    pub const NULL: P11sSessionHandle = P11sSessionHandle(ptr::null_mut());

    /// Whether the handle is null
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

fn status_of(error: &Error) -> P11sStatus {
    match error {
        Error::AlreadyLoggedIn(_) => P11sStatus::AlreadyLoggedIn,
        Error::Provider(_) => P11sStatus::ProviderError,
        Error::Destroyed(_) => P11sStatus::Destroyed,
        Error::InvalidPin(_) => P11sStatus::InvalidPin,
        Error::InvalidArgument(_) => P11sStatus::InvalidArgument,
    }
}

// Helper function to convert Result to a C status code
fn to_status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => P11sStatus::Success as c_int,
        Err(err) => {
            let status = status_of(&err);
            LAST_ERROR.with(|last| *last.borrow_mut() = Some(err));
            status as c_int
        }
    }
}

fn invalid_argument(what: &str) -> c_int {
    to_status(Err(Error::InvalidArgument(what.to_string())))
}

unsafe fn session_ref<'a>(handle: P11sSessionHandle) -> Option<&'a Session> {
    // SAFETY: non-null handles were produced by `p11s_session_open`
    unsafe { (handle.0 as *const Session).as_ref() }
}

unsafe fn pin_arg<'a>(pin: *const c_char, pin_len: usize) -> Result<Option<&'a str>> {
    if pin.is_null() {
        return Ok(None);
    }
    // SAFETY: the caller passes `pin_len` readable bytes at `pin`
    let bytes = unsafe { slice::from_raw_parts(pin as *const u8, pin_len) };
    str::from_utf8(bytes)
        .map(Some)
        .map_err(|_| Error::InvalidPin("PIN is not valid UTF-8".to_string()))
}

/// Create a slot backed by host callbacks
///
/// @param functions Callback table of the token module
/// @param provider Native provider handle
/// @param slot Native slot handle
/// @param token_flags `CKF_*` flags of the token in the slot
/// @return A handle to the new slot, or NULL on error
///
/// # Safety
/// `functions` must point to a valid table whose callbacks stay callable
/// until the slot and all of its sessions are freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_slot_new(
    functions: *const P11sModuleFunctions,
    provider: u64,
    slot: u64,
    token_flags: c_ulong,
) -> P11sSlotHandle {
    // SAFETY: checked for null; validity is the caller's contract
    let Some(functions) = (unsafe { functions.as_ref() }) else {
        invalid_argument("functions is null");
        return P11sSlotHandle(ptr::null_mut());
    };
    // SAFETY: forwarded caller contract
    let module = Arc::new(unsafe { CallbackModule::new(*functions) });
    let slot = Slot::new(
        module,
        Handle::new(provider),
        Handle::new(slot),
        TokenInfo::new(String::new(), token_flags as u64),
    );
    P11sSlotHandle(Box::into_raw(Box::new(slot)) as *mut c_void)
}

/// Destroy a slot, its open sessions, and free the slot
///
/// @param handle Handle to the slot to destroy
///
/// # Safety
/// `handle` must be NULL or a slot from [`p11s_slot_new`] not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_slot_destroy(handle: P11sSlotHandle) {
    if !handle.0.is_null() {
        // SAFETY: caller contract; dropping the slot destroys its sessions
        drop(unsafe { Box::from_raw(handle.0 as *mut Slot) });
    }
}

/// Open a session on a slot
///
/// @param slot Slot handle
/// @param mode 0 for read-only, 1 for read-write
/// @param out_session Pointer to receive the session handle
/// @return 0 on success, negative error code on failure
///
/// # Safety
/// `slot` must come from [`p11s_slot_new`]; `out_session` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_open(
    slot: P11sSlotHandle,
    mode: c_int,
    out_session: *mut P11sSessionHandle,
) -> c_int {
    if out_session.is_null() {
        return invalid_argument("out_session is null");
    }
    // SAFETY: non-null slot handles come from `p11s_slot_new`
    let Some(slot) = (unsafe { (slot.0 as *const Slot).as_ref() }) else {
        return invalid_argument("slot is null");
    };

    let opened = OpenMode::try_from(mode).and_then(|mode| Session::open(slot, mode));
    match opened {
        Ok(session) => {
            // SAFETY: checked for null above
            unsafe { *out_session = P11sSessionHandle(Box::into_raw(Box::new(session)) as *mut c_void) };
            P11sStatus::Success as c_int
        }
        Err(err) => {
            // SAFETY: checked for null above
            unsafe { *out_session = P11sSessionHandle::NULL };
            to_status(Err(err))
        }
    }
}

unsafe fn login(handle: P11sSessionHandle, user_type: UserType, pin: *const c_char, pin_len: usize) -> c_int {
    // SAFETY: forwarded caller contract
    let Some(session) = (unsafe { session_ref(handle) }) else {
        return invalid_argument("session is null");
    };
    // SAFETY: forwarded caller contract
    let result = unsafe { pin_arg(pin, pin_len) }.and_then(|pin| match user_type {
        UserType::User => session.login_user(pin),
        UserType::So => session.login_so(pin),
    });
    to_status(result)
}

/// Present the user PIN
///
/// @param handle Session handle
/// @param pin UTF-8 PIN bytes, or NULL for a protected authentication path
/// @param pin_len Length of the PIN in bytes
/// @return 0 on success, negative error code on failure
///
/// # Safety
/// `handle` must come from [`p11s_session_open`]; `pin` must be NULL or
/// point to `pin_len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_login_user(
    handle: P11sSessionHandle,
    pin: *const c_char,
    pin_len: usize,
) -> c_int {
    // SAFETY: forwarded caller contract
    unsafe { login(handle, UserType::User, pin, pin_len) }
}

/// Present the security officer PIN
///
/// @param handle Session handle
/// @param pin UTF-8 PIN bytes, or NULL for a protected authentication path
/// @param pin_len Length of the PIN in bytes
/// @return 0 on success, negative error code on failure
///
/// # Safety
/// Same as [`p11s_session_login_user`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_login_so(
    handle: P11sSessionHandle,
    pin: *const c_char,
    pin_len: usize,
) -> c_int {
    // SAFETY: forwarded caller contract
    unsafe { login(handle, UserType::So, pin, pin_len) }
}

/// Whether the user is logged in
///
/// @param handle Session handle
/// @return 1 if logged in, 0 if not, negative error code on failure
///
/// # Safety
/// `handle` must come from [`p11s_session_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_is_user_logged_in(handle: P11sSessionHandle) -> c_int {
    // SAFETY: forwarded caller contract
    match unsafe { session_ref(handle) } {
        Some(session) => session.is_user_logged_in() as c_int,
        None => invalid_argument("session is null"),
    }
}

/// Whether the security officer is logged in
///
/// @param handle Session handle
/// @return 1 if logged in, 0 if not, negative error code on failure
///
/// # Safety
/// `handle` must come from [`p11s_session_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_is_so_logged_in(handle: P11sSessionHandle) -> c_int {
    // SAFETY: forwarded caller contract
    match unsafe { session_ref(handle) } {
        Some(session) => session.is_so_logged_in() as c_int,
        None => invalid_argument("session is null"),
    }
}

/// Log out from the token
///
/// @param handle Session handle
/// @return 0 on success, negative error code on failure
///
/// # Safety
/// `handle` must come from [`p11s_session_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_logout(handle: P11sSessionHandle) -> c_int {
    // SAFETY: forwarded caller contract
    match unsafe { session_ref(handle) } {
        Some(session) => to_status(session.logout()),
        None => invalid_argument("session is null"),
    }
}

/// Close the native session; the handle stays allocated until freed
///
/// @param handle Session handle
/// @return 0 on success, negative error code on failure
///
/// # Safety
/// `handle` must come from [`p11s_session_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_destroy(handle: P11sSessionHandle) -> c_int {
    // SAFETY: forwarded caller contract
    match unsafe { session_ref(handle) } {
        Some(session) => to_status(session.destroy()),
        None => invalid_argument("session is null"),
    }
}

/// Free a session handle, destroying the session first if needed
///
/// @param handle Session handle
///
/// # Safety
/// `handle` must be NULL or come from [`p11s_session_open`], and must not be
/// used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_session_free(handle: P11sSessionHandle) {
    if !handle.is_null() {
        // SAFETY: caller contract
        let session = unsafe { Box::from_raw(handle.0 as *mut Session) };
        let _ = session.destroy();
    }
}

/// `CK_RV` of the last provider error on this thread, or 0
#[unsafe(no_mangle)]
pub extern "C" fn p11s_last_provider_code() -> c_ulong {
    LAST_ERROR.with(|last| match &*last.borrow() {
        Some(Error::Provider(e)) => e.code as c_ulong,
        _ => rv::CKR_OK as c_ulong,
    })
}

/// Copy the message of the last error on this thread
///
/// @param out_message Buffer to receive the NUL-terminated message
/// @param out_message_len Pointer to the buffer size (in) / required size
///                        including the terminator (out)
/// @return 0 on success, negative error code if the buffer is too small
///
/// # Safety
/// `out_message` must be writable for `*out_message_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn p11s_last_error_message(out_message: *mut c_char, out_message_len: *mut c_uint) -> c_int {
    if out_message.is_null() || out_message_len.is_null() {
        return P11sStatus::InvalidArgument as c_int;
    }
    let message = LAST_ERROR.with(|last| last.borrow().as_ref().map(ToString::to_string).unwrap_or_default());
    let needed = message.len() + 1;

    // SAFETY: checked for null above
    let max_len = unsafe { *out_message_len } as usize;
    // SAFETY: checked for null above
    unsafe { *out_message_len = needed as c_uint };
    if needed > max_len {
        return P11sStatus::InvalidArgument as c_int;
    }

    // SAFETY: the caller provided `max_len >= needed` writable bytes
    unsafe {
        ptr::copy_nonoverlapping(message.as_ptr(), out_message as *mut u8, message.len());
        *out_message.add(message.len()) = 0;
    }
    P11sStatus::Success as c_int
}
