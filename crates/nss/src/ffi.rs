//! Raw-pointer plumbing shared by the entry points.
//!
//! Every exported function funnels through [`guarded`], which turns a panic
//! into `NSS_STATUS_UNAVAIL` and writes errno for failed calls.

use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};

use libc::{c_char, c_int, size_t, ENOENT};
use tracing::error;

use loginpolicy_core::LookupError;

use crate::status::NssStatus;

/// Caller buffer as a byte slice. A null or empty buffer has capacity 0.
///
/// # Safety
/// When non-null, `buf` must be valid for writes of `len` bytes for `'a`.
pub unsafe fn caller_buffer<'a>(buf: *mut c_char, len: size_t) -> &'a mut [u8] {
    if buf.is_null() || len == 0 {
        return &mut [];
    }
    // SAFETY: non-null and valid for `len` bytes per the caller contract.
    unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), len) }
}

/// Lookup key from a C string. Null and non-UTF-8 names match nothing.
///
/// # Safety
/// When non-null, `name` must point to a NUL-terminated string.
pub unsafe fn key_name<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(name) }.to_str().ok()
}

/// Pointer to a string packed by the core. Packed strings are followed by a
/// NUL inside the caller buffer.
pub fn packed_ptr(s: &str) -> *mut c_char {
    s.as_ptr() as *mut c_char
}

/// # Safety
/// `errnop` must be null or valid for writes.
unsafe fn set_errno(errnop: *mut c_int, value: c_int) {
    if !errnop.is_null() {
        // SAFETY: non-null and writable per the caller contract.
        unsafe { *errnop = value };
    }
}

/// Map a directory outcome to a status, filling the host struct on success.
///
/// # Safety
/// `errnop` must be null or valid for writes.
pub unsafe fn complete<E>(
    outcome: Result<E, LookupError>,
    errnop: *mut c_int,
    fill: impl FnOnce(E),
) -> NssStatus {
    match outcome {
        Ok(entry) => {
            fill(entry);
            NssStatus::Success
        }
        Err(err) => {
            let (status, errno) = NssStatus::from_error(&err);
            if let Some(errno) = errno {
                // SAFETY: forwarded caller contract.
                unsafe { set_errno(errnop, errno) };
            }
            status
        }
    }
}

/// Run an entry point body, keeping panics on this side of the boundary.
///
/// # Safety
/// `errnop` must be null or valid for writes.
pub unsafe fn guarded(errnop: *mut c_int, body: impl FnOnce() -> NssStatus) -> NssStatus {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(status) => status,
        Err(_) => {
            error!("panic inside NSS entry point");
            // SAFETY: forwarded caller contract.
            unsafe { set_errno(errnop, ENOENT) };
            NssStatus::Unavail
        }
    }
}
