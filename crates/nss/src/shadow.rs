//! shadow database entry points.

use libc::{c_char, c_int, c_long, c_ulong, size_t, spwd};

use loginpolicy_core::{LookupError, ShadowEntry};

use crate::ffi::{caller_buffer, complete, guarded, key_name, packed_ptr};
use crate::provider::directory;
use crate::status::NssStatus;

/// # Safety
/// `result` must be valid for writes.
unsafe fn fill(result: *mut spwd, entry: ShadowEntry<'_>) {
    // SAFETY: checked non-null by the entry point, writable per contract.
    let sp = unsafe { &mut *result };
    sp.sp_namp = packed_ptr(entry.name);
    sp.sp_pwdp = packed_ptr(entry.password);
    sp.sp_lstchg = entry.last_change as c_long;
    sp.sp_min = entry.min_days as c_long;
    sp.sp_max = entry.max_days as c_long;
    sp.sp_warn = entry.warn_days as c_long;
    sp.sp_inact = entry.inactive_days as c_long;
    sp.sp_expire = entry.expire_date as c_long;
    sp.sp_flag = entry.flag as c_ulong;
}

fn null_result() -> Result<(), LookupError> {
    Err(LookupError::Unavailable("null spwd pointer".into()))
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_setspent(_stayopen: c_int) -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            let outcome = directory().and_then(|dir| dir.begin_shadow());
            complete(outcome, std::ptr::null_mut(), |()| {})
        })
    }
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_endspent() -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            if let Ok(dir) = directory() {
                dir.end_shadow();
            }
            NssStatus::Success
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getspent_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getspent_r(
    result: *mut spwd,
    buffer: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
) -> NssStatus {
    unsafe {
        guarded(errnop, || {
            if result.is_null() {
                return complete(null_result(), errnop, |()| {});
            }
            let outcome = directory().and_then(|dir| {
                dir.next_shadow(caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getspnam_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getspnam_r(
    name: *const c_char,
    result: *mut spwd,
    buffer: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
) -> NssStatus {
    unsafe {
        guarded(errnop, || {
            if result.is_null() {
                return complete(null_result(), errnop, |()| {});
            }
            let Some(name) = key_name(name) else {
                return complete(Err::<(), _>(LookupError::NotFound), errnop, |()| {});
            };
            let outcome = directory().and_then(|dir| {
                dir.find_shadow_by_name(name, caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}
