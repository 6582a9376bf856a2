pub mod file;
pub mod level;
pub mod line;
pub mod sample;

pub use file::{ArtifactAllocator, ArtifactStorage, LogFile, MemoryAllocator, TempFileAllocator};
pub use level::LogLevel;
pub use line::{LogClassification, LogRecord, UNKNOWN_PID};
pub use sample::{QuerySample, TransientLogState};
