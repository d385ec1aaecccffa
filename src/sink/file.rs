use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::foundation::error::{ZarrError, ZarrResult};
use crate::sink::Sink;

/// Sink backed by a seekable file descriptor. Created fresh (truncating) so
/// stale bytes from a previous acquisition can never leak into a chunk.
pub(crate) struct FileSink {
    file: File,
    path: String,
}

impl FileSink {
    pub fn create(file_path: impl AsRef<Path>) -> ZarrResult<Self> {
        let path = file_path.as_ref();
        let file = File::create(path).map_err(|e| {
            ZarrError::io(format!("failed to create file '{}': {e}", path.display()))
        })?;
        Ok(Self {
            file,
            path: path.display().to_string(),
        })
    }
}

impl Sink for FileSink {
    fn write(&mut self, offset: u64, buf: &[u8]) -> ZarrResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(buf))
            .map_err(|e| ZarrError::io(format!("failed to write '{}': {e}", self.path)))
    }

    fn flush(&mut self) -> ZarrResult<()> {
        self.file
            .flush()
            .map_err(|e| ZarrError::io(format!("failed to flush '{}': {e}", self.path)))
    }
}
