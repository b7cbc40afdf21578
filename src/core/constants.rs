/*!
Constants shared with the native token module.

Values mirror `pkcs11t.h` so they can cross the native boundary unchanged.
*/

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sentinel value of an invalid native handle
pub const NULL_HANDLE: u64 = 0;

/// Session open modes understood by the native open call
pub mod open_mode {
    /// Read-only session
    pub const READ_ONLY: i32 = 0;

    /// Read-write session
    pub const READ_WRITE: i32 = 1;
}

/// Login type discriminators (`CKU_*`)
pub mod login_type {
    /// `CKU_SO`, presents the security officer PIN
    pub const SO: u64 = 0;

    /// `CKU_USER`, presents the user PIN
    pub const USER: u64 = 1;
}

/// Token flags (`CKF_*`) relevant to session login
pub mod token_flags {
    /// `CKF_LOGIN_REQUIRED`
    pub const LOGIN_REQUIRED: u64 = 0x0000_0004;

    /// `CKF_PROTECTED_AUTHENTICATION_PATH`
    pub const PROTECTED_AUTHENTICATION_PATH: u64 = 0x0000_0100;

    /// `CKF_TOKEN_INITIALIZED`
    pub const TOKEN_INITIALIZED: u64 = 0x0000_0400;
}

/// PKCS#11 return values (`CKR_*`) a session can observe
pub mod rv {
    /// Function completed successfully
    pub const CKR_OK: u64 = 0x0000_0000;
    /// The library ran out of host memory
    pub const CKR_HOST_MEMORY: u64 = 0x0000_0002;
    /// Slot does not exist
    pub const CKR_SLOT_ID_INVALID: u64 = 0x0000_0003;
    /// Unrecoverable module error
    pub const CKR_GENERAL_ERROR: u64 = 0x0000_0005;
    /// Function could not be completed
    pub const CKR_FUNCTION_FAILED: u64 = 0x0000_0006;
    /// Arguments were missing or malformed
    pub const CKR_ARGUMENTS_BAD: u64 = 0x0000_0007;
    /// Module does not provide the function
    pub const CKR_FUNCTION_NOT_SUPPORTED: u64 = 0x0000_0054;
    /// Token or slot reported a device problem
    pub const CKR_DEVICE_ERROR: u64 = 0x0000_0030;
    /// Token ran out of memory
    pub const CKR_DEVICE_MEMORY: u64 = 0x0000_0031;
    /// Token was removed during the call
    pub const CKR_DEVICE_REMOVED: u64 = 0x0000_0032;
    /// PIN does not match; counts towards lockout
    pub const CKR_PIN_INCORRECT: u64 = 0x0000_00A0;
    /// PIN contains invalid characters
    pub const CKR_PIN_INVALID: u64 = 0x0000_00A1;
    /// PIN is too short or too long
    pub const CKR_PIN_LEN_RANGE: u64 = 0x0000_00A2;
    /// PIN has expired
    pub const CKR_PIN_EXPIRED: u64 = 0x0000_00A3;
    /// PIN is locked after too many failures
    pub const CKR_PIN_LOCKED: u64 = 0x0000_00A4;
    /// Session was closed during the call
    pub const CKR_SESSION_CLOSED: u64 = 0x0000_00B0;
    /// Token cannot open more sessions
    pub const CKR_SESSION_COUNT: u64 = 0x0000_00B1;
    /// Session handle is not valid
    pub const CKR_SESSION_HANDLE_INVALID: u64 = 0x0000_00B3;
    /// Parallel sessions are not supported
    pub const CKR_SESSION_PARALLEL_NOT_SUPPORTED: u64 = 0x0000_00B4;
    /// Session is read-only
    pub const CKR_SESSION_READ_ONLY: u64 = 0x0000_00B5;
    /// A read-write SO session already exists
    pub const CKR_SESSION_READ_WRITE_SO_EXISTS: u64 = 0x0000_00B8;
    /// No token in the slot
    pub const CKR_TOKEN_NOT_PRESENT: u64 = 0x0000_00E0;
    /// Token is not recognized
    pub const CKR_TOKEN_NOT_RECOGNIZED: u64 = 0x0000_00E1;
    /// Principal is already logged in
    pub const CKR_USER_ALREADY_LOGGED_IN: u64 = 0x0000_0100;
    /// Nobody is logged in
    pub const CKR_USER_NOT_LOGGED_IN: u64 = 0x0000_0101;
    /// User PIN has not been set
    pub const CKR_USER_PIN_NOT_INITIALIZED: u64 = 0x0000_0102;
    /// Login type is not valid
    pub const CKR_USER_TYPE_INVALID: u64 = 0x0000_0103;
    /// Another principal is logged in
    pub const CKR_USER_ANOTHER_ALREADY_LOGGED_IN: u64 = 0x0000_0104;
    /// Too many principals logged in
    pub const CKR_USER_TOO_MANY_TYPES: u64 = 0x0000_0105;
    /// Module has not been initialized
    pub const CKR_CRYPTOKI_NOT_INITIALIZED: u64 = 0x0000_0190;
    /// Start of the vendor-defined range
    pub const CKR_VENDOR_DEFINED: u64 = 0x8000_0000;

    /// Symbolic name of a return value
    pub fn name(code: u64) -> &'static str {
        match code {
            CKR_OK => "CKR_OK",
            CKR_HOST_MEMORY => "CKR_HOST_MEMORY",
            CKR_SLOT_ID_INVALID => "CKR_SLOT_ID_INVALID",
            CKR_GENERAL_ERROR => "CKR_GENERAL_ERROR",
            CKR_FUNCTION_FAILED => "CKR_FUNCTION_FAILED",
            CKR_ARGUMENTS_BAD => "CKR_ARGUMENTS_BAD",
            CKR_FUNCTION_NOT_SUPPORTED => "CKR_FUNCTION_NOT_SUPPORTED",
            CKR_DEVICE_ERROR => "CKR_DEVICE_ERROR",
            CKR_DEVICE_MEMORY => "CKR_DEVICE_MEMORY",
            CKR_DEVICE_REMOVED => "CKR_DEVICE_REMOVED",
            CKR_PIN_INCORRECT => "CKR_PIN_INCORRECT",
            CKR_PIN_INVALID => "CKR_PIN_INVALID",
            CKR_PIN_LEN_RANGE => "CKR_PIN_LEN_RANGE",
            CKR_PIN_EXPIRED => "CKR_PIN_EXPIRED",
            CKR_PIN_LOCKED => "CKR_PIN_LOCKED",
            CKR_SESSION_CLOSED => "CKR_SESSION_CLOSED",
            CKR_SESSION_COUNT => "CKR_SESSION_COUNT",
            CKR_SESSION_HANDLE_INVALID => "CKR_SESSION_HANDLE_INVALID",
            CKR_SESSION_PARALLEL_NOT_SUPPORTED => "CKR_SESSION_PARALLEL_NOT_SUPPORTED",
            CKR_SESSION_READ_ONLY => "CKR_SESSION_READ_ONLY",
            CKR_SESSION_READ_WRITE_SO_EXISTS => "CKR_SESSION_READ_WRITE_SO_EXISTS",
            CKR_TOKEN_NOT_PRESENT => "CKR_TOKEN_NOT_PRESENT",
            CKR_TOKEN_NOT_RECOGNIZED => "CKR_TOKEN_NOT_RECOGNIZED",
            CKR_USER_ALREADY_LOGGED_IN => "CKR_USER_ALREADY_LOGGED_IN",
            CKR_USER_NOT_LOGGED_IN => "CKR_USER_NOT_LOGGED_IN",
            CKR_USER_PIN_NOT_INITIALIZED => "CKR_USER_PIN_NOT_INITIALIZED",
            CKR_USER_TYPE_INVALID => "CKR_USER_TYPE_INVALID",
            CKR_USER_ANOTHER_ALREADY_LOGGED_IN => "CKR_USER_ANOTHER_ALREADY_LOGGED_IN",
            CKR_USER_TOO_MANY_TYPES => "CKR_USER_TOO_MANY_TYPES",
            CKR_CRYPTOKI_NOT_INITIALIZED => "CKR_CRYPTOKI_NOT_INITIALIZED",
            c if c >= CKR_VENDOR_DEFINED => "CKR_VENDOR_DEFINED",
            _ => "CKR_UNKNOWN",
        }
    }

}
