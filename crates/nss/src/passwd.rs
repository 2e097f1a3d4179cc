//! passwd database entry points.

use libc::{c_char, c_int, passwd, size_t, uid_t};

use loginpolicy_core::{LookupError, PasswdEntry};

use crate::ffi::{caller_buffer, complete, guarded, key_name, packed_ptr};
use crate::provider::directory;
use crate::status::NssStatus;

/// # Safety
/// `result` must be valid for writes.
unsafe fn fill(result: *mut passwd, entry: PasswdEntry<'_>) {
    // SAFETY: checked non-null by the entry point, writable per contract.
    let pw = unsafe { &mut *result };
    pw.pw_name = packed_ptr(entry.name);
    pw.pw_passwd = packed_ptr(entry.password);
    pw.pw_uid = entry.uid;
    pw.pw_gid = entry.gid;
    pw.pw_gecos = packed_ptr(entry.gecos);
    pw.pw_dir = packed_ptr(entry.home);
    pw.pw_shell = packed_ptr(entry.shell);
}

fn null_result() -> Result<(), LookupError> {
    Err(LookupError::Unavailable("null passwd pointer".into()))
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_setpwent(_stayopen: c_int) -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            let outcome = directory().and_then(|dir| dir.begin_accounts());
            complete(outcome, std::ptr::null_mut(), |()| {})
        })
    }
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_endpwent() -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            if let Ok(dir) = directory() {
                dir.end_accounts();
            }
            NssStatus::Success
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getpwent_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getpwent_r(
    result: *mut passwd,
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
                dir.next_account(caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getpwnam_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getpwnam_r(
    name: *const c_char,
    result: *mut passwd,
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
                dir.find_account_by_name(name, caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getpwuid_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getpwuid_r(
    uid: uid_t,
    result: *mut passwd,
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
                dir.find_account_by_id(uid, caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}
