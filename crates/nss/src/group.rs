//! group database entry points.

use libc::{c_char, c_int, gid_t, group, size_t};

use loginpolicy_core::{GroupEntry, LookupError};

use crate::ffi::{caller_buffer, complete, guarded, key_name, packed_ptr};
use crate::provider::directory;
use crate::status::NssStatus;

/// # Safety
/// `result` must be valid for writes.
unsafe fn fill(result: *mut group, entry: GroupEntry<'_>) {
    // SAFETY: checked non-null by the entry point, writable per contract.
    let gr = unsafe { &mut *result };
    gr.gr_name = packed_ptr(entry.name);
    gr.gr_passwd = packed_ptr(entry.password);
    gr.gr_gid = entry.gid;
    // The table is word aligned and NULL terminated inside the caller buffer.
    gr.gr_mem = entry.member_table.as_ptr() as *mut *mut c_char;
}

fn null_result() -> Result<(), LookupError> {
    Err(LookupError::Unavailable("null group pointer".into()))
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_setgrent(_stayopen: c_int) -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            let outcome = directory().and_then(|dir| dir.begin_groups());
            complete(outcome, std::ptr::null_mut(), |()| {})
        })
    }
}

#[no_mangle]
pub extern "C" fn _nss_loginpolicy_endgrent() -> NssStatus {
    // SAFETY: a null errno pointer is never written.
    unsafe {
        guarded(std::ptr::null_mut(), || {
            if let Ok(dir) = directory() {
                dir.end_groups();
            }
            NssStatus::Success
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getgrent_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getgrent_r(
    result: *mut group,
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
                dir.next_group(caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getgrnam_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getgrnam_r(
    name: *const c_char,
    result: *mut group,
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
                dir.find_group_by_name(name, caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}

/// # Safety
/// Called by the NSS host with the pointers of `getgrgid_r`.
#[no_mangle]
pub unsafe extern "C" fn _nss_loginpolicy_getgrgid_r(
    gid: gid_t,
    result: *mut group,
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
                dir.find_group_by_id(gid, caller_buffer(buffer, buflen))
            });
            complete(outcome, errnop, |entry| fill(result, entry))
        })
    }
}
