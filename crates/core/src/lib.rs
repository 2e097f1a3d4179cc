//! loginpolicy core library.
//!
//! This crate turns a flat login policy file into a read-only identity
//! directory: account, credential-status and group databases with point
//! lookups, rewindable enumeration, and packing of entries into
//! caller-supplied buffers.

pub mod config;
pub mod cursor;
pub mod directory;
pub mod errors;
pub mod groups;
pub mod models;
pub mod packer;
pub mod policy;
pub mod status;

// Re-exports for convenience.
pub use config::DirectoryConfig;
pub use directory::Directory;
pub use errors::LookupError;
pub use packer::{GroupEntry, PasswdEntry, ShadowEntry};
pub use status::Status;
