use crate::record::line::LogRecord;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Durable backing for one artifact's bytes.
///
/// Temp-file storage is removed when the owning [`LogFile`] is dropped.
#[derive(Debug)]
pub enum ArtifactStorage {
    TempFile(NamedTempFile),
    Memory(Vec<u8>),
}

impl ArtifactStorage {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            ArtifactStorage::TempFile(file) => file.write_all(bytes),
            ArtifactStorage::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArtifactStorage::TempFile(file) => file.flush(),
            ArtifactStorage::Memory(_) => Ok(()),
        }
    }

    /// Location on disk, if the artifact is file-backed.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ArtifactStorage::TempFile(file) => Some(file.path()),
            ArtifactStorage::Memory(_) => None,
        }
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        match self {
            ArtifactStorage::TempFile(file) => fs::read_to_string(file.path()),
            ArtifactStorage::Memory(buf) => String::from_utf8(buf.clone())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

/// Allocates storage for a new artifact. Implementations are shared across
/// accumulation loops.
pub trait ArtifactAllocator: Send + Sync {
    fn allocate(&self) -> io::Result<ArtifactStorage>;
}

/// Backs artifacts with temp files, optionally inside a fixed directory.
#[derive(Debug, Clone, Default)]
pub struct TempFileAllocator {
    dir: Option<PathBuf>,
}

impl TempFileAllocator {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl ArtifactAllocator for TempFileAllocator {
    fn allocate(&self) -> io::Result<ArtifactStorage> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("logstitch-").suffix(".log");
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(ArtifactStorage::TempFile(file))
    }
}

/// Keeps artifact bytes in memory (replay mode and tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAllocator;

impl ArtifactAllocator for MemoryAllocator {
    fn allocate(&self) -> io::Result<ArtifactStorage> {
        Ok(ArtifactStorage::Memory(Vec::new()))
    }
}

/// A finalized, byte-addressed batch of log records.
///
/// Records are laid out back to back in `storage`: every record's
/// `byte_start` equals the previous record's `byte_end`, starting at 0.
#[derive(Debug, Default)]
pub struct LogFile {
    pub id: Uuid,
    pub records: Vec<LogRecord>,
    pub byte_size: u64,
    storage: Option<ArtifactStorage>,
}

impl LogFile {
    pub(crate) fn with_storage(storage: ArtifactStorage) -> Self {
        Self {
            id: Uuid::new_v4(),
            records: Vec::new(),
            byte_size: 0,
            storage: Some(storage),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn storage(&self) -> Option<&ArtifactStorage> {
        self.storage.as_ref()
    }

    /// Full artifact text, empty for an artifact that was never allocated.
    pub fn content(&self) -> io::Result<String> {
        match &self.storage {
            Some(storage) => storage.read_to_string(),
            None => Ok(String::new()),
        }
    }

    /// Assign the next contiguous byte range to `record` and write its content.
    pub(crate) fn append(&mut self, mut record: LogRecord) -> io::Result<()> {
        let storage = self
            .storage
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "artifact has no storage"))?;
        storage.write_all(record.content.as_bytes())?;

        record.byte_start = self.byte_size;
        record.byte_content_start = self.byte_size;
        record.byte_end = self.byte_size + record.byte_len();
        self.byte_size = record.byte_end;
        self.records.push(record);
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        match self.storage.as_mut() {
            Some(storage) => storage.flush(),
            None => Ok(()),
        }
    }
}
