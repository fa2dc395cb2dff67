use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::range_reader::check_range;
use super::RangeReader;
use crate::error::IoError;

/// Local file implementation of RangeReader.
///
/// The size is read from file metadata on creation; the file handle itself is
/// opened on the first read and dropped again by [`close`](RangeReader::close).
pub struct FileRangeReader {
    path: PathBuf,
    size: u64,
    identifier: String,
    file: Mutex<Option<File>>,
}

impl FileRangeReader {
    /// Create a reader for the file at `path`.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::File(format!("{}: {}", path.display(), e)),
        })?;

        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            size: metadata.len(),
            identifier,
            file: Mutex::new(None),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_error(&self, e: std::io::Error) -> IoError {
        IoError::File(format!("{}: {}", self.path.display(), e))
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, Some(self.size))?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut guard = self.file.lock().await;
        let file = match guard.take() {
            Some(file) => file,
            None => File::open(&self.path)
                .await
                .map_err(|e| self.file_error(e))?,
        };
        let file = guard.insert(file);

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.file_error(e))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)
            .await
            .map_err(|e| self.file_error(e))?;

        Ok(Bytes::from(buffer))
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn close(&self) -> Result<(), IoError> {
        self.file.lock().await.take();
        Ok(())
    }
}
