use std::io;

/// Random-access byte storage holding an encrypted stream.
///
/// Offsets are absolute. `read` may return fewer bytes than requested only
/// when it reaches the end of the stored data.
pub trait StorageStream {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write all of `buf` at `offset`, extending the stream if needed.
    fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()>;

    fn size(&self) -> io::Result<u64>;

    /// Truncate or extend. Extended regions read back as zero bytes.
    fn resize(&mut self, len: u64) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Whether extending the stream leaves holes instead of allocating.
    fn is_sparse(&self) -> bool;
}

impl<S: StorageStream + ?Sized> StorageStream for &mut S {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read(buf, offset)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        (**self).write(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        (**self).resize(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn is_sparse(&self) -> bool {
        (**self).is_sparse()
    }
}

impl<S: StorageStream + ?Sized> StorageStream for Box<S> {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read(buf, offset)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        (**self).write(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        (**self).resize(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn is_sparse(&self) -> bool {
        (**self).is_sparse()
    }
}
