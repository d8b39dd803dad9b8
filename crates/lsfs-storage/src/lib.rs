//! lsfs-storage: byte-addressable storage underneath an encrypted stream
//!
//! - `stream`: the `StorageStream` capability the codec consumes
//! - `memory`: in-process `Vec<u8>` backend (tests, scratch streams)
//! - `file`: positional I/O over a local file

pub mod file;
pub mod memory;
pub mod stream;

pub use file::FileStream;
pub use memory::MemoryStream;
pub use stream::StorageStream;
