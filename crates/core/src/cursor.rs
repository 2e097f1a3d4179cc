//! Enumeration cursors.
//!
//! A cursor is the open state of one database's enumeration session. Each
//! call to `next` is a three-step protocol: [`peek`](RecordCursor::peek) at
//! the entry that would be returned, try to pack it, then either
//! [`advance`](RecordCursor::advance) past it or
//! [`retreat`](RecordCursor::retreat) to the exact state before the peek. A
//! caller that retries with a larger buffer therefore sees the same entry
//! again.

use std::io::{BufRead, Seek};

use crate::errors::SourceError;
use crate::groups::{GroupRecord, GroupUniverse};
use crate::policy::{IdentityRecord, PolicyReader, ReadPosition};

// ---------------------------------------------------------------------------
// Account / credential-status cursor
// ---------------------------------------------------------------------------

/// Enumerates one entry per login name, so a record with a distinct
/// preferred name is emitted twice (preferred name first) before the reader
/// moves on.
#[derive(Debug)]
pub struct RecordCursor<R> {
    reader: PolicyReader<R>,
    pending: Option<IdentityRecord>,
    /// Index into the pending record's login names.
    sub_entry: usize,
    /// Reader position before the pending record was loaded by the latest
    /// peek, if that peek loaded it.
    loaded_from: Option<ReadPosition>,
}

impl<R: BufRead + Seek> RecordCursor<R> {
    pub fn new(reader: PolicyReader<R>) -> Self {
        Self {
            reader,
            pending: None,
            sub_entry: 0,
            loaded_from: None,
        }
    }

    /// Back to the first entry of the source.
    pub fn rewind(&mut self) -> Result<(), SourceError> {
        self.pending = None;
        self.sub_entry = 0;
        self.loaded_from = None;
        self.reader.rewind()
    }

    /// The record and login name the next entry is made of, or `None` once
    /// the source is exhausted.
    pub fn peek(&mut self) -> Result<Option<(&IdentityRecord, &str)>, SourceError> {
        self.loaded_from = None;
        if self.pending.is_none() {
            let before = self.reader.position();
            match self.reader.read_next()? {
                Some(record) => {
                    self.pending = Some(record);
                    self.sub_entry = 0;
                    self.loaded_from = Some(before);
                }
                None => return Ok(None),
            }
        }

        Ok(self.pending.as_ref().and_then(|record| {
            record
                .login_names()
                .get(self.sub_entry)
                .map(|login| (record, login))
        }))
    }

    /// Move past the entry returned by the latest peek.
    pub fn advance(&mut self) {
        self.loaded_from = None;
        let Some(record) = self.pending.as_ref() else {
            return;
        };
        self.sub_entry += 1;
        if self.sub_entry >= record.login_names().len() {
            self.pending = None;
            self.sub_entry = 0;
        }
    }

    /// Undo the latest peek so the next peek returns the same entry.
    pub fn retreat(&mut self) -> Result<(), SourceError> {
        if let Some(position) = self.loaded_from.take() {
            self.pending = None;
            self.sub_entry = 0;
            self.reader.rewind_to(position)?;
        }
        Ok(())
    }

    /// Reader position plus sub-entry index, for diagnostics and tests.
    pub fn position(&self) -> (ReadPosition, usize) {
        (self.reader.position(), self.sub_entry)
    }
}

// ---------------------------------------------------------------------------
// Group cursor
// ---------------------------------------------------------------------------

/// Enumerates a group universe materialized when the session began.
#[derive(Debug)]
pub struct GroupCursor {
    universe: GroupUniverse,
    index: usize,
}

impl GroupCursor {
    pub fn new(universe: GroupUniverse) -> Self {
        Self { universe, index: 0 }
    }

    /// Group the next call would return, or `None` past the superusers group.
    pub fn peek(&self) -> Option<&GroupRecord> {
        self.universe.get(self.index)
    }

    pub fn advance(&mut self) {
        if self.index < self.universe.len() {
            self.index += 1;
        }
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn universe(&self) -> &GroupUniverse {
        &self.universe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;
    use crate::policy::{MemorySource, PolicySource};
    use std::io::Cursor;
    use std::sync::Arc;

    const POLICY: &str = "\
peter:user_1:600:10600:Y:peter@example.com
:user_2:700:10700:N:two@example.com
paul:user_3:800:10800:0:three@example.com
";

    fn cursor() -> RecordCursor<Cursor<Arc<[u8]>>> {
        RecordCursor::new(MemorySource::new(POLICY).open().unwrap())
    }

    fn drain(cursor: &mut RecordCursor<Cursor<Arc<[u8]>>>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some((_, login)) = cursor.peek().unwrap() {
            out.push(login.to_string());
            cursor.advance();
        }
        out
    }

    #[test]
    fn test_two_entries_per_record() {
        let mut c = cursor();
        assert_eq!(
            drain(&mut c),
            vec!["peter", "user_1", "user_2", "paul", "user_3"]
        );
        assert!(c.peek().unwrap().is_none());
    }

    #[test]
    fn test_retreat_after_fresh_load() {
        let mut c = cursor();
        let before = c.position();
        assert_eq!(c.peek().unwrap().unwrap().1, "peter");
        c.retreat().unwrap();
        assert_eq!(c.position(), before);
        assert_eq!(c.peek().unwrap().unwrap().1, "peter");
    }

    #[test]
    fn test_retreat_on_second_sub_entry() {
        let mut c = cursor();
        c.peek().unwrap();
        c.advance();

        let before = c.position();
        assert_eq!(c.peek().unwrap().unwrap().1, "user_1");
        c.retreat().unwrap();
        assert_eq!(c.position(), before);
        assert_eq!(c.peek().unwrap().unwrap().1, "user_1");
        c.advance();
        assert_eq!(c.peek().unwrap().unwrap().1, "user_2");
    }

    #[test]
    fn test_rewind() {
        let mut c = cursor();
        drain(&mut c);
        c.rewind().unwrap();
        assert_eq!(c.peek().unwrap().unwrap().1, "peter");
    }

    #[test]
    fn test_group_cursor() {
        let mut reader = MemorySource::new(POLICY).open().unwrap();
        let universe = GroupUniverse::materialize(&mut reader, &GroupConfig::default()).unwrap();
        let mut c = GroupCursor::new(universe);

        let mut names = Vec::new();
        while let Some(group) = c.peek() {
            names.push(group.name.clone());
            c.advance();
        }
        assert_eq!(names.len(), 7);
        assert_eq!(names[5], "loginpolicy");
        assert_eq!(names[6], "loginpolicy_sudo");

        c.advance();
        assert_eq!(c.position(), 7);
        assert!(c.peek().is_none());
    }
}
