//! Block splitter: arbitrary-offset reads and writes over fixed-size blocks
//!
//! A `BlockCodec` knows how to store one logical block; `BlockStream` maps
//! `(offset, length)` requests onto whole-block calls, doing read-modify-write
//! for partial blocks and zero-filling gaps when writing past the end.

use lsfs_core::LsfsResult;

/// Storage of fixed-size logical blocks.
pub trait BlockCodec {
    /// Plaintext bytes per block.
    fn block_size(&self) -> usize;

    /// Read block `index` into `output` (at least `block_size` bytes).
    ///
    /// Returns the number of valid bytes; 0 for a block past the end of the
    /// stream. Bytes of `output` beyond the returned length are unspecified.
    fn read_block(&mut self, index: u64, output: &mut [u8]) -> LsfsResult<usize>;

    /// Store `input` (1..=`block_size` bytes) as the content of block `index`.
    fn write_block(&mut self, index: u64, input: &[u8]) -> LsfsResult<()>;

    /// Logical length of the stream in bytes.
    fn logical_size(&self) -> LsfsResult<u64>;

    /// Set the physical size to the one implied by a logical length, without
    /// rewriting any block content.
    fn adjust_logical_size(&mut self, len: u64) -> LsfsResult<()>;

    fn flush(&mut self) -> LsfsResult<()>;

    fn is_sparse(&self) -> bool;
}

/// Byte-stream view over a `BlockCodec`.
///
/// Not internally synchronized: one reader or writer at a time.
pub struct BlockStream<C> {
    codec: C,
    scratch: Vec<u8>,
}

// scratch holds plaintext, keep it out of Debug output
impl<C: std::fmt::Debug> std::fmt::Debug for BlockStream<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStream")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl<C: BlockCodec> BlockStream<C> {
    pub fn new(codec: C) -> Self {
        let scratch = vec![0u8; codec.block_size()];
        Self { codec, scratch }
    }

    pub fn block_size(&self) -> usize {
        self.codec.block_size()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    pub fn into_codec(self) -> C {
        self.codec
    }

    /// Read up to `output.len()` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only at the end of the stream.
    pub fn read(&mut self, output: &mut [u8], offset: u64) -> LsfsResult<usize> {
        let bs = self.codec.block_size();
        let mut total = 0;
        let mut offset = offset;

        while total < output.len() {
            let index = offset / bs as u64;
            let start = (offset % bs as u64) as usize;

            let rc = self.codec.read_block(index, &mut self.scratch)?;
            if rc <= start {
                break;
            }
            let n = (rc - start).min(output.len() - total);
            output[total..total + n].copy_from_slice(&self.scratch[start..start + n]);
            total += n;
            offset += n as u64;

            if rc < bs {
                break;
            }
        }
        Ok(total)
    }

    /// Write all of `input` at `offset`, growing the stream if needed.
    pub fn write(&mut self, input: &[u8], offset: u64) -> LsfsResult<()> {
        let current = self.codec.logical_size()?;
        if offset > current {
            self.grow(current, offset)?;
        }
        self.write_within(input, offset)
    }

    pub fn size(&self) -> LsfsResult<u64> {
        self.codec.logical_size()
    }

    /// Truncate or extend to exactly `len` logical bytes.
    pub fn resize(&mut self, len: u64) -> LsfsResult<()> {
        let current = self.codec.logical_size()?;
        if len > current {
            return self.grow(current, len);
        }
        if len == current {
            return Ok(());
        }

        let bs = self.codec.block_size();
        let residue = (len % bs as u64) as usize;
        if residue > 0 {
            // The surviving tail block must be re-sealed at its shorter length.
            let index = len / bs as u64;
            self.scratch.fill(0);
            self.codec.read_block(index, &mut self.scratch)?;
            self.codec.write_block(index, &self.scratch[..residue])?;
        }
        self.codec.adjust_logical_size(len)
    }

    pub fn flush(&mut self) -> LsfsResult<()> {
        self.codec.flush()
    }

    pub fn is_sparse(&self) -> bool {
        self.codec.is_sparse()
    }

    fn write_within(&mut self, input: &[u8], offset: u64) -> LsfsResult<()> {
        let bs = self.codec.block_size();
        let mut written = 0;
        let mut offset = offset;

        while written < input.len() {
            let index = offset / bs as u64;
            let start = (offset % bs as u64) as usize;
            let n = (bs - start).min(input.len() - written);
            let chunk = &input[written..written + n];

            if n == bs {
                self.codec.write_block(index, chunk)?;
            } else {
                self.scratch.fill(0);
                let rc = self.codec.read_block(index, &mut self.scratch)?;
                self.scratch[start..start + n].copy_from_slice(chunk);
                let len = rc.max(start + n);
                self.codec.write_block(index, &self.scratch[..len])?;
            }

            written += n;
            offset += n as u64;
        }
        Ok(())
    }

    fn grow(&mut self, current: u64, len: u64) -> LsfsResult<()> {
        let bs = self.codec.block_size() as u64;
        let old_block = current / bs;
        let new_block = len / bs;

        if !self.codec.is_sparse() || old_block == new_block {
            return self.zero_fill(current, len - current);
        }

        // Pad the old tail block to full size; everything after it becomes a
        // hole in the underlying storage, which reads back as zero blocks.
        let residue = current % bs;
        if residue > 0 {
            self.zero_fill(current, bs - residue)?;
        }
        tracing::debug!(from = current, to = len, "growing stream sparsely");
        self.codec.adjust_logical_size(len)
    }

    fn zero_fill(&mut self, offset: u64, len: u64) -> LsfsResult<()> {
        let bs = self.codec.block_size() as u64;
        let zeros = vec![0u8; bs as usize];
        let mut offset = offset;
        let mut remaining = len;
        while remaining > 0 {
            // Chunks end on block boundaries so whole blocks skip the read.
            let n = remaining.min(bs - offset % bs) as usize;
            self.write_within(&zeros[..n], offset)?;
            offset += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plaintext blocks kept in a vector, recording every call.
    #[derive(Default)]
    struct PlainCodec {
        block_size: usize,
        blocks: Vec<Vec<u8>>,
        sparse: bool,
        log: Vec<String>,
    }

    impl PlainCodec {
        fn new(block_size: usize) -> Self {
            Self {
                block_size,
                ..Self::default()
            }
        }
    }

    impl BlockCodec for PlainCodec {
        fn block_size(&self) -> usize {
            self.block_size
        }

        fn read_block(&mut self, index: u64, output: &mut [u8]) -> LsfsResult<usize> {
            self.log.push(format!("r{index}"));
            match self.blocks.get(index as usize) {
                Some(block) => {
                    output[..block.len()].copy_from_slice(block);
                    Ok(block.len())
                }
                None => Ok(0),
            }
        }

        fn write_block(&mut self, index: u64, input: &[u8]) -> LsfsResult<()> {
            assert!(!input.is_empty() && input.len() <= self.block_size);
            self.log.push(format!("w{index}:{}", input.len()));
            let index = index as usize;
            if self.blocks.len() <= index {
                self.blocks.resize(index + 1, vec![0u8; self.block_size]);
            }
            self.blocks[index] = input.to_vec();
            Ok(())
        }

        fn logical_size(&self) -> LsfsResult<u64> {
            Ok(self.blocks.iter().map(|b| b.len() as u64).sum())
        }

        fn adjust_logical_size(&mut self, len: u64) -> LsfsResult<()> {
            self.log.push(format!("adjust{len}"));
            let bs = self.block_size as u64;
            let mut sizes = vec![self.block_size; (len / bs) as usize];
            if len % bs > 0 {
                sizes.push((len % bs) as usize);
            }
            self.blocks.resize(sizes.len(), Vec::new());
            for (block, size) in self.blocks.iter_mut().zip(sizes) {
                block.resize(size, 0);
            }
            Ok(())
        }

        fn flush(&mut self) -> LsfsResult<()> {
            Ok(())
        }

        fn is_sparse(&self) -> bool {
            self.sparse
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn test_write_spanning_blocks_in_order() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(&pattern(20), 0).unwrap();

        assert_eq!(stream.codec().log, vec!["w0:8", "w1:8", "r2", "w2:4"]);
        assert_eq!(stream.size().unwrap(), 20);
    }

    #[test]
    fn test_read_spanning_blocks() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        let data = pattern(20);
        stream.write(&data, 0).unwrap();
        stream.codec_mut().log.clear();

        let mut out = vec![0u8; 10];
        assert_eq!(stream.read(&mut out, 5).unwrap(), 10);
        assert_eq!(out, &data[5..15]);
        assert_eq!(stream.codec().log, vec!["r0", "r1"]);
    }

    #[test]
    fn test_read_stops_at_end() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(&pattern(12), 0).unwrap();

        let mut out = vec![0u8; 64];
        assert_eq!(stream.read(&mut out, 0).unwrap(), 12);
        assert_eq!(stream.read(&mut out, 12).unwrap(), 0);
        assert_eq!(stream.read(&mut out, 100).unwrap(), 0);
    }

    #[test]
    fn test_partial_write_merges_existing_bytes() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(&[1u8; 16], 0).unwrap();
        stream.codec_mut().log.clear();

        stream.write(&[9u8; 4], 6).unwrap();

        // Block 0 keeps bytes 0..6, block 1 keeps bytes 2..8.
        assert_eq!(stream.codec().log, vec!["r0", "w0:8", "r1", "w1:8"]);
        let mut out = vec![0u8; 16];
        stream.read(&mut out, 0).unwrap();
        assert_eq!(out, [1, 1, 1, 1, 1, 1, 9, 9, 9, 9, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_write_past_end_zero_fills_gap() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(b"abc", 0).unwrap();
        stream.write(b"xyz", 10).unwrap();

        assert_eq!(stream.size().unwrap(), 13);
        let mut out = vec![0xFFu8; 13];
        assert_eq!(stream.read(&mut out, 0).unwrap(), 13);
        assert_eq!(&out, b"abc\0\0\0\0\0\0\0xyz");
    }

    #[test]
    fn test_sparse_grow_pads_tail_then_adjusts() {
        let mut codec = PlainCodec::new(8);
        codec.sparse = true;
        let mut stream = BlockStream::new(codec);
        stream.write(b"abc", 0).unwrap();
        stream.codec_mut().log.clear();

        stream.resize(30).unwrap();

        assert_eq!(stream.codec().log, vec!["r0", "w0:8", "adjust30"]);
        assert_eq!(stream.size().unwrap(), 30);
    }

    #[test]
    fn test_non_sparse_grow_writes_every_block() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(b"abc", 0).unwrap();
        stream.codec_mut().log.clear();

        stream.resize(20).unwrap();

        assert_eq!(stream.codec().log, vec!["r0", "w0:8", "w1:8", "r2", "w2:4"]);
    }

    #[test]
    fn test_shrink_reseals_tail_block() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        let data = pattern(20);
        stream.write(&data, 0).unwrap();
        stream.codec_mut().log.clear();

        stream.resize(11).unwrap();

        assert_eq!(stream.codec().log, vec!["r1", "w1:3", "adjust11"]);
        let mut out = vec![0u8; 20];
        assert_eq!(stream.read(&mut out, 0).unwrap(), 11);
        assert_eq!(&out[..11], &data[..11]);
    }

    #[test]
    fn test_shrink_to_block_boundary_skips_reseal() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(&pattern(20), 0).unwrap();
        stream.codec_mut().log.clear();

        stream.resize(8).unwrap();

        assert_eq!(stream.codec().log, vec!["adjust8"]);
        assert_eq!(stream.size().unwrap(), 8);
    }

    #[test]
    fn test_resize_same_length_is_noop() {
        let mut stream = BlockStream::new(PlainCodec::new(8));
        stream.write(&pattern(5), 0).unwrap();
        stream.codec_mut().log.clear();

        stream.resize(5).unwrap();
        assert!(stream.codec().log.is_empty());
    }
}
