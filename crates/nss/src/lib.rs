//! glibc NSS module for the loginpolicy identity directory.
//!
//! Exposes `_nss_loginpolicy_*` entry points for the passwd, group and shadow
//! databases. Each entry point hands the caller's buffer to the shared
//! [`Directory`](loginpolicy_core::Directory), maps the outcome onto
//! `enum nss_status` and errno, and points the host struct at the strings
//! packed into the buffer.
//!
//! The configuration is read once per process from `$LOGINPOLICY_CONFIG` or
//! `/etc/loginpolicy.toml`.

pub mod ffi;
pub mod group;
pub mod passwd;
pub mod provider;
pub mod shadow;
pub mod status;

pub use status::NssStatus;
