//! Local file storage stream using positional I/O

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::stream::StorageStream;

/// A storage stream backed by a regular file.
///
/// Reports itself sparse by default, assuming a filesystem where `set_len`
/// leaves holes. Use [`FileStream::with_sparse`] on filesystems without them.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    sparse: bool,
}

impl FileStream {
    /// Open an existing file for reading and writing.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        tracing::debug!(path = %path.display(), "opened storage file");
        Ok(Self::from_file(file))
    }

    /// Create a file, truncating any existing content.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        tracing::debug!(path = %path.display(), "created storage file");
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: File) -> Self {
        Self { file, sparse: true }
    }

    /// Whether growth may leave holes instead of writing zero blocks.
    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match std::os::windows::fs::FileExt::seek_write(file, buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl StorageStream for FileStream {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        // Positional reads may come back short mid-file; keep going until EOF.
        let mut total = 0;
        while total < buf.len() {
            match read_at(&self.file, &mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        write_all_at(&self.file, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn is_sparse(&self) -> bool {
        self.sparse
    }
}
