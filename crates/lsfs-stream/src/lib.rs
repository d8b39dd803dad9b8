//! lsfs-stream: authenticated, randomly accessible encrypted byte streams
//!
//! ```text
//! caller ── read/write(offset, len) ──► BlockStream   (splits into blocks, RMW)
//!                                          │ read_block / write_block
//!                                          ▼
//!                                       LiteCodec     (AES-GCM per block, header)
//!                                          │ read/write(physical offset)
//!                                          ▼
//!                                       StorageStream (memory, file, ...)
//! ```

pub mod block;
pub mod cursor;
pub mod lite;

pub use block::{BlockCodec, BlockStream};
pub use cursor::StreamCursor;
pub use lite::LiteCodec;

use lsfs_core::{FileId, LsfsResult, StreamConfig};
use lsfs_crypto::MasterKey;
use lsfs_storage::StorageStream;

/// A byte stream encrypted block-by-block into `S`.
pub type LiteStream<S> = BlockStream<LiteCodec<S>>;

/// Open (or initialize, if `storage` is empty) an encrypted stream.
pub fn open_lite_stream<S: StorageStream>(
    storage: S,
    master_key: &MasterKey,
    id: FileId,
    config: &StreamConfig,
) -> LsfsResult<LiteStream<S>> {
    let codec = LiteCodec::new(storage, master_key, id, config)?;
    Ok(BlockStream::new(codec))
}
