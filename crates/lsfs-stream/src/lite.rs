//! Authenticated block codec over an underlying storage stream
//!
//! Physical layout:
//! ```text
//! [32 bytes: session_key XOR master_key]
//! [block 0: iv | ciphertext | tag][block 1: ...]...[last block, possibly short]
//! ```
//!
//! Every block is sealed independently with AES-256-GCM under the session key,
//! so any block can be read or rewritten without touching its neighbours.
//! There is no length field: the logical size follows from the physical size.
//! A block whose stored bytes are all zero is a hole and reads as zeros.

use std::io;

use lsfs_core::types::{HEADER_SIZE, MAC_SIZE};
use lsfs_core::{FileId, LsfsError, LsfsResult, StreamConfig};
use lsfs_crypto::{
    block_cipher_for, generate_iv, generate_session_key, is_all_zeros, unwrap_session_key,
    wrap_session_key, write_aad, BlockAead, MasterKey, SessionKey, AAD_SIZE,
};
use lsfs_storage::StorageStream;
use zeroize::Zeroize;

use crate::block::BlockCodec;

pub struct LiteCodec<S> {
    stream: S,
    session_key: SessionKey,
    cipher: Box<dyn BlockAead + Send + Sync>,
    id: FileId,
    block_size: usize,
    iv_size: usize,
    check: bool,
    buffer: Vec<u8>,
    aad: [u8; AAD_SIZE],
}

impl<S: StorageStream> LiteCodec<S> {
    /// Open an encrypted stream on `stream`.
    ///
    /// An empty `stream` gets a fresh session key and header; otherwise the
    /// session key is unwrapped from the existing header.
    pub fn new(
        mut stream: S,
        master_key: &MasterKey,
        id: FileId,
        config: &StreamConfig,
    ) -> LsfsResult<Self> {
        config.validate()?;

        let mut header = [0u8; HEADER_SIZE];
        let rc = stream.read(&mut header, 0)?;
        let session_key = if rc == 0 {
            let key = generate_session_key();
            header = wrap_session_key(master_key, &key);
            stream.write(&header, 0)?;
            tracing::debug!(file = %id, "wrote new stream header");
            key
        } else if rc == HEADER_SIZE {
            tracing::debug!(file = %id, "unwrapped existing stream header");
            unwrap_session_key(master_key, &header)
        } else {
            return Err(LsfsError::Corrupted(format!(
                "underlying stream has invalid header size: {rc} bytes (expected {HEADER_SIZE})"
            )));
        };
        header.zeroize();

        let iv_size = config.iv_size as usize;
        let cipher = block_cipher_for(&session_key, iv_size)?;

        Ok(Self {
            stream,
            session_key,
            cipher,
            id,
            block_size: config.block_size as usize,
            iv_size,
            check: config.integrity_check,
            buffer: vec![0u8; config.physical_block_size()],
            aad: [0u8; AAD_SIZE],
        })
    }

    pub fn file_id(&self) -> &FileId {
        &self.id
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    pub fn iv_size(&self) -> usize {
        self.iv_size
    }

    pub fn integrity_check(&self) -> bool {
        self.check
    }

    /// Bytes of every block that are not plaintext.
    pub fn block_overhead(&self) -> usize {
        self.iv_size + MAC_SIZE
    }

    pub fn physical_block_size(&self) -> usize {
        self.block_size + self.block_overhead()
    }

    /// Physical length of a stream holding `len` logical bytes.
    pub fn physical_len_for(&self, len: u64) -> u64 {
        let bs = self.block_size as u64;
        let blocks = len / bs;
        let residue = len % bs;
        let tail = if residue > 0 {
            residue + self.block_overhead() as u64
        } else {
            0
        };
        HEADER_SIZE as u64 + blocks * self.physical_block_size() as u64 + tail
    }

    /// Logical length of a stream whose storage is `physical` bytes long.
    pub fn logical_len_for(&self, physical: u64) -> u64 {
        if physical <= HEADER_SIZE as u64 {
            return 0;
        }
        let body = physical - HEADER_SIZE as u64;
        let pbs = self.physical_block_size() as u64;
        let overhead = self.block_overhead() as u64;
        let residue = body % pbs;
        let tail = if residue > overhead {
            residue - overhead
        } else {
            0
        };
        (body / pbs) * self.block_size as u64 + tail
    }

    pub fn physical_size(&self) -> LsfsResult<u64> {
        Ok(self.stream.size()?)
    }

    /// Number of blocks holding logical data, the last possibly partial.
    pub fn block_count(&self) -> LsfsResult<u64> {
        let size = self.logical_size()?;
        Ok(size.div_ceil(self.block_size as u64))
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Direct access to the underlying storage. Writing through it bypasses
    /// encryption.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn block_offset(&self, index: u64) -> LsfsResult<u64> {
        index
            .checked_mul(self.physical_block_size() as u64)
            .and_then(|o| o.checked_add(HEADER_SIZE as u64))
            .ok_or_else(|| invalid_input(format!("block index {index} out of range")))
    }
}

fn invalid_input(msg: String) -> LsfsError {
    LsfsError::Io(io::Error::new(io::ErrorKind::InvalidInput, msg))
}

impl<S: StorageStream> BlockCodec for LiteCodec<S> {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, index: u64, output: &mut [u8]) -> LsfsResult<usize> {
        if output.len() < self.block_size {
            return Err(invalid_input(format!(
                "output buffer of {} bytes is smaller than a block ({} bytes)",
                output.len(),
                self.block_size
            )));
        }
        let offset = self.block_offset(index)?;
        let rc = self.stream.read(&mut self.buffer, offset)?;
        let overhead = self.block_overhead();

        if rc <= overhead {
            return Ok(0);
        }
        if rc > self.buffer.len() {
            return Err(LsfsError::Corrupted(format!(
                "invalid read: storage returned {rc} bytes for a {} byte block",
                self.buffer.len()
            )));
        }

        let out_size = rc - overhead;
        if is_all_zeros(&self.buffer[..rc]) {
            output[..self.block_size].fill(0);
            return Ok(out_size);
        }

        write_aad(&mut self.aad, &self.id, index);
        let (iv, rest) = self.buffer[..rc].split_at(self.iv_size);
        let (ciphertext, tag) = rest.split_at(out_size);
        let plaintext = &mut output[..out_size];
        plaintext.copy_from_slice(ciphertext);

        let verified = self.cipher.open_in_place(iv, &self.aad, plaintext, tag)?;
        if !verified {
            let offset = index * self.block_size as u64;
            if self.check {
                return Err(LsfsError::Verification {
                    id: self.id,
                    offset,
                });
            }
            tracing::warn!(
                file = %self.id,
                offset,
                "block failed authentication, returning unverified data"
            );
        }
        Ok(out_size)
    }

    fn write_block(&mut self, index: u64, input: &[u8]) -> LsfsResult<()> {
        if input.is_empty() || input.len() > self.block_size {
            return Err(invalid_input(format!(
                "block write of {} bytes (expected 1..={})",
                input.len(),
                self.block_size
            )));
        }
        let offset = self.block_offset(index)?;
        write_aad(&mut self.aad, &self.id, index);

        let len = input.len();
        let total = self.iv_size + len + MAC_SIZE;
        let (iv, rest) = self.buffer[..total].split_at_mut(self.iv_size);
        generate_iv(iv);
        let (ciphertext, tag) = rest.split_at_mut(len);
        ciphertext.copy_from_slice(input);
        self.cipher.seal_in_place(iv, &self.aad, ciphertext, tag)?;

        self.stream.write(&self.buffer[..total], offset)?;
        Ok(())
    }

    fn logical_size(&self) -> LsfsResult<u64> {
        Ok(self.logical_len_for(self.stream.size()?))
    }

    fn adjust_logical_size(&mut self, len: u64) -> LsfsResult<()> {
        let physical = self.physical_len_for(len);
        self.stream.resize(physical)?;
        Ok(())
    }

    fn flush(&mut self) -> LsfsResult<()> {
        self.stream.flush()?;
        Ok(())
    }

    fn is_sparse(&self) -> bool {
        self.stream.is_sparse()
    }
}

impl<S> std::fmt::Debug for LiteCodec<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteCodec")
            .field("id", &self.id)
            .field("block_size", &self.block_size)
            .field("iv_size", &self.iv_size)
            .field("check", &self.check)
            .finish_non_exhaustive()
    }
}
