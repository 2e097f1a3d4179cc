//! `enum nss_status` and the errno that goes with each outcome.

use libc::{c_int, ENOENT, ERANGE};

use loginpolicy_core::{LookupError, Status};

/// Mirror of glibc's `enum nss_status`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NssStatus {
    TryAgain = -2,
    Unavail = -1,
    NotFound = 0,
    Success = 1,
    /// Part of the ABI only. No entry point of this module returns it.
    Return = 2,
}

impl NssStatus {
    /// Status and errno for a directory outcome. `Success` leaves errno alone.
    pub fn from_status(status: Status) -> (Self, Option<c_int>) {
        match status {
            Status::Success => (NssStatus::Success, None),
            Status::NotFound => (NssStatus::NotFound, Some(ENOENT)),
            Status::Unavailable => (NssStatus::Unavail, Some(ENOENT)),
            Status::TryAgain => (NssStatus::TryAgain, Some(ERANGE)),
        }
    }

    pub fn from_error(err: &LookupError) -> (Self, Option<c_int>) {
        Self::from_status(Status::from(err))
    }
}
