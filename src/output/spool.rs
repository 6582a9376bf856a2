use crate::output::{LogSubmission, OutputError, Submitter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes each submission as `<id>.log` (artifact bytes) and `<id>.json`
/// (metadata) into a directory.
#[derive(Debug, Clone)]
pub struct SpoolWriter {
    dir: PathBuf,
}

impl SpoolWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, path: PathBuf, contents: Vec<u8>) -> Result<(), OutputError> {
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| OutputError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl Submitter for SpoolWriter {
    fn name(&self) -> &'static str {
        "spool"
    }

    async fn submit(&self, submission: &LogSubmission) -> Result<(), OutputError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| OutputError::Io {
                path: self.dir.display().to_string(),
                source,
            })?;

        let content = submission
            .log_file
            .content()
            .map_err(OutputError::Artifact)?;
        let metadata = serde_json::to_vec_pretty(&submission.metadata())?;

        // Metadata last, so a reader that sees the .json can trust the .log
        self.write(self.dir.join(format!("{}.log", submission.id)), content.into_bytes())
            .await?;
        self.write(self.dir.join(format!("{}.json", submission.id)), metadata)
            .await
    }
}
