use std::fmt;

/// Size of the per-file identifier bound into every block's AAD.
pub const ID_SIZE: usize = 16;

/// Size of master and session keys (256-bit).
pub const KEY_SIZE: usize = 32;

/// Size of the wrapped session key stored at offset 0 of the underlying stream.
pub const HEADER_SIZE: usize = KEY_SIZE;

/// Size of the AES-GCM authentication tag appended to each block.
pub const MAC_SIZE: usize = 16;

/// Identifier of a logical file, unique per file.
///
/// Blocks are authenticated against it, so ciphertext copied from one file
/// into another fails verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId([u8; ID_SIZE]);

impl FileId {
    pub fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({self})")
    }
}

impl From<[u8; ID_SIZE]> for FileId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}
