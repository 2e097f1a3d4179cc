//! Reading the login policy file.
//!
//! The policy file is the only source of truth: one account per line, read
//! fresh for every lookup.

pub mod reader;
pub mod record;
pub mod source;

pub use reader::{PolicyReader, ReadPosition};
pub use record::{IdentityRecord, LoginNames};
pub use source::{FileSource, MemorySource, PolicySource};
