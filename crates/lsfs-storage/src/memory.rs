//! In-memory storage stream

use std::io;

use crate::stream::StorageStream;

/// A growable in-memory byte stream.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    data: Vec<u8>,
    sparse: bool,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStream {
    /// Empty stream that reports itself as sparse-capable.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            sparse: true,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, sparse: true }
    }

    /// Set whether the stream advertises sparse-file support.
    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw access, for inspecting or tampering with stored ciphertext.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn to_index(offset: u64) -> io::Result<usize> {
    usize::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space"))
}

impl StorageStream for MemoryStream {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = to_index(offset)?;
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        let start = to_index(offset)?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write range overflows"))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        self.data.resize(to_index(len)?, 0);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_sparse(&self) -> bool {
        self.sparse
    }
}
