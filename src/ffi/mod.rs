/*!
Foreign Function Interface (FFI) module.

This module exposes sessions to hosts that call through a C ABI, such as a
managed runtime's native interop layer. The host also supplies the token
module itself as a table of C function pointers.
*/

mod c_api;

pub use c_api::*;
