//! `std::io` adapter over a `BlockStream`

use std::io::{self, Read, Seek, SeekFrom, Write};

use lsfs_core::LsfsError;

use crate::block::{BlockCodec, BlockStream};

/// Tracks a position so a `BlockStream` can be used with `std::io::copy`
/// and friends.
pub struct StreamCursor<C> {
    stream: BlockStream<C>,
    pos: u64,
}

impl<C: BlockCodec> StreamCursor<C> {
    pub fn new(stream: BlockStream<C>) -> Self {
        Self { stream, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn get_ref(&self) -> &BlockStream<C> {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut BlockStream<C> {
        &mut self.stream
    }

    pub fn into_inner(self) -> BlockStream<C> {
        self.stream
    }
}

fn to_io(err: LsfsError) -> io::Error {
    match err {
        LsfsError::Io(e) => e,
        LsfsError::Config(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
        LsfsError::Corrupted(_) | LsfsError::Verification { .. } => {
            io::Error::new(io::ErrorKind::InvalidData, err)
        }
        LsfsError::Other(_) => io::Error::other(err),
    }
}

impl<C: BlockCodec> Read for StreamCursor<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream.read(buf, self.pos).map_err(to_io)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<C: BlockCodec> Write for StreamCursor<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf, self.pos).map_err(to_io)?;
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().map_err(to_io)
    }
}

impl<C: BlockCodec> Seek for StreamCursor<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(d) => (self.stream.size().map_err(to_io)?, d),
            SeekFrom::Current(d) => (self.pos, d),
        };
        let target = base.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.pos = target;
        Ok(target)
    }
}
