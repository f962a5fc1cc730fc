use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::WriteError;

/// Destination file shared by all range workers.
///
/// Writes carry their own offset, so no lock guards the file content: the
/// planner guarantees callers never write overlapping regions. Writes go
/// through `spawn_blocking` since positional file I/O has no true async path.
#[derive(Debug, Clone)]
pub struct FileStore {
    file: Arc<File>,
    path: PathBuf,
    size: u64,
}

impl FileStore {
    /// Creates the destination file and preallocates it to `size` bytes.
    /// Preallocation avoids sparse-file fragmentation and makes the on-disk
    /// length usable as a coarse progress fallback.
    pub async fn create(path: &Path, size: u64) -> io::Result<FileStore> {
        let path = path.to_path_buf();
        let create_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = File::create(&create_path)?;
            file.set_len(size)?;
            Ok(file)
        })
        .await
        .map_err(io::Error::other)??;

        Ok(FileStore {
            file: Arc::new(file),
            path,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Writes the whole chunk at `offset`, returning the number of bytes
    /// written. Offsets are absolute; the file cursor is never used.
    pub async fn write_at(&self, offset: u64, chunk: Bytes) -> Result<usize, WriteError> {
        let file = Arc::clone(&self.file);
        let len = chunk.len();
        tokio::task::spawn_blocking(move || write_all_at(&file, offset, &chunk))
            .await
            .map_err(|e| WriteError {
                offset,
                source: io::Error::other(e),
            })?
            .map_err(|source| WriteError { offset, source })?;
        Ok(len)
    }

    /// Flushes file data to disk once all workers are done.
    pub async fn finish(&self) -> io::Result<()> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(io::Error::other)?
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        let n = file.seek_write(buf, offset)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "seek_write wrote 0 bytes",
            ));
        }
        buf = &buf[n..];
        offset += n as u64;
    }
    Ok(())
}
