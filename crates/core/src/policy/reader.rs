//! Line-oriented reader over a login policy source.
//!
//! [`PolicyReader`] yields only valid [`IdentityRecord`]s. Blank lines are
//! skipped silently and malformed lines are logged at debug level and
//! skipped, so a single bad line never ends a scan.
//!
//! The reader tracks its byte offset and line number so an enumeration
//! cursor can take a [`ReadPosition`] before an attempt and rewind to it if
//! the attempt has to be repeated.

use std::io::{BufRead, Seek, SeekFrom};

use tracing::{debug, trace};

use super::record::IdentityRecord;
use crate::errors::{RecordError, SourceError};

/// Where the next [`PolicyReader::read_next`] call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadPosition {
    /// Byte offset of the next unread line.
    pub offset: u64,
    /// Number of lines consumed so far.
    pub line_no: u64,
}

/// Reads validated identity records from any seekable buffered source.
#[derive(Debug)]
pub struct PolicyReader<R> {
    inner: R,
    position: ReadPosition,
    line: Vec<u8>,
}

impl<R: BufRead + Seek> PolicyReader<R> {
    /// Wrap a source positioned at its start.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: ReadPosition::default(),
            line: Vec::with_capacity(128),
        }
    }

    /// Return the next valid record, or `None` at the end of the source.
    pub fn read_next(&mut self) -> Result<Option<IdentityRecord>, SourceError> {
        loop {
            self.line.clear();
            let read = self.inner.read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            self.position.offset += read as u64;
            self.position.line_no += 1;

            let line_no = self.position.line_no;
            match parse_raw_line(&self.line) {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => trace!(line_no, "skipping blank policy line"),
                Err(reason) => debug!(line_no, %reason, "skipping malformed policy line"),
            }
        }
    }

    /// Current position, suitable for [`rewind_to`](Self::rewind_to).
    pub fn position(&self) -> ReadPosition {
        self.position
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> u64 {
        self.position.line_no
    }

    /// Move back (or forward) to a position previously returned by
    /// [`position`](Self::position).
    pub fn rewind_to(&mut self, position: ReadPosition) -> Result<(), SourceError> {
        if position != self.position {
            self.inner.seek(SeekFrom::Start(position.offset))?;
            self.position = position;
        }
        Ok(())
    }

    /// Go back to the first line.
    pub fn rewind(&mut self) -> Result<(), SourceError> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.position = ReadPosition::default();
        Ok(())
    }
}

/// `Ok(None)` for blank lines, `Ok(Some)` for valid records.
fn parse_raw_line(raw: &[u8]) -> Result<Option<IdentityRecord>, RecordError> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.len() < 2 {
        return Ok(None);
    }
    // Fields end up NUL-terminated in caller buffers.
    if raw.contains(&0) {
        return Err(RecordError::InvalidEncoding);
    }
    let line = std::str::from_utf8(raw).map_err(|_| RecordError::InvalidEncoding)?;
    IdentityRecord::parse_line(line).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> PolicyReader<Cursor<Vec<u8>>> {
        PolicyReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn names(reader: &mut PolicyReader<Cursor<Vec<u8>>>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(record) = reader.read_next().unwrap() {
            out.push(record.unique_name);
        }
        out
    }

    #[test]
    fn test_skips_blank_and_malformed_lines() {
        let mut r = reader(
            "a:user_1:600:600:1:c\n\
             \n\
             x\n\
             broken line\n\
             b:user_2:100:600:1:c\n\
             c:user_3:700:700:maybe:c\n\
             d:user_4:800:800:N:c\n",
        );
        assert_eq!(names(&mut r), vec!["user_1", "user_4"]);
        assert_eq!(r.line_no(), 7);
    }

    #[test]
    fn test_skips_path_like_names() {
        let mut r = reader(
            "/root:user_1:600:600:1:c\n\
             b:..:700:700:0:c\n\
             c:user_3:800:800:N:c\n",
        );
        assert_eq!(names(&mut r), vec!["user_3"]);
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut r = reader("a:user_1:600:600:1:c\r\nb:user_2:700:700:0:c");
        assert_eq!(names(&mut r), vec!["user_1", "user_2"]);
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let mut bytes = b"a:user_1:600:600:1:c\n".to_vec();
        bytes.extend_from_slice(b"\xff\xfe:user_x:600:600:1:c\n");
        bytes.extend_from_slice(b"b:user_2:700:700:0:c\n");
        let mut r = PolicyReader::new(Cursor::new(bytes));
        assert_eq!(names(&mut r), vec!["user_1", "user_2"]);
    }

    #[test]
    fn test_empty_source() {
        let mut r = reader("");
        assert!(r.read_next().unwrap().is_none());
        assert!(r.read_next().unwrap().is_none());
    }

    #[test]
    fn test_rewind_to_position() {
        let mut r = reader("a:user_1:600:600:1:c\nbad\nb:user_2:700:700:0:c\n");
        r.read_next().unwrap();
        let checkpoint = r.position();
        assert_eq!(r.read_next().unwrap().unwrap().unique_name, "user_2");
        assert!(r.read_next().unwrap().is_none());

        r.rewind_to(checkpoint).unwrap();
        assert_eq!(r.line_no(), 1);
        assert_eq!(r.read_next().unwrap().unwrap().unique_name, "user_2");

        r.rewind().unwrap();
        assert_eq!(r.read_next().unwrap().unwrap().unique_name, "user_1");
    }
}
