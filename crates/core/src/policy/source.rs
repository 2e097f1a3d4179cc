//! Where policy bytes come from.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::reader::PolicyReader;
use crate::errors::SourceError;

/// A provider of fresh, independent readers over the same policy data.
///
/// Every call to [`open`](PolicySource::open) starts a new scan; dropping the
/// returned reader closes it.
pub trait PolicySource: Send + Sync {
    type Reader: std::io::BufRead + std::io::Seek + Send;

    fn open(&self) -> Result<PolicyReader<Self::Reader>, SourceError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// The policy file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicySource for FileSource {
    type Reader = BufReader<File>;

    fn open(&self) -> Result<PolicyReader<Self::Reader>, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Unavailable {
            path: self.path.display().to_string(),
            source,
        })?;
        debug!(path = %self.path.display(), "opened policy file");
        Ok(PolicyReader::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Policy data held in memory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::from(data.into()),
        }
    }
}

impl PolicySource for MemorySource {
    type Reader = Cursor<Arc<[u8]>>;

    fn open(&self) -> Result<PolicyReader<Self::Reader>, SourceError> {
        Ok(PolicyReader::new(Cursor::new(Arc::clone(&self.data))))
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login_policy");
        std::fs::write(&path, "peter:user_1:600:600:1:c\n").unwrap();

        let source = FileSource::new(&path);
        let mut reader = source.open().unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().preferred_name, "peter");
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/login_policy");
        assert!(matches!(
            source.open(),
            Err(SourceError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_memory_source_readers_are_independent() {
        let source = MemorySource::new("a:user_1:600:600:1:c\nb:user_2:700:700:0:c\n");
        let mut first = source.open().unwrap();
        let mut second = source.open().unwrap();
        first.read_next().unwrap();
        assert_eq!(second.read_next().unwrap().unwrap().unique_name, "user_1");
        assert_eq!(first.read_next().unwrap().unwrap().unique_name, "user_2");
    }
}
