use thiserror::Error;

use crate::types::FileId;

pub type LsfsResult<T> = Result<T, LsfsError>;

#[derive(Debug, Error)]
pub enum LsfsError {
    /// Rejected construction parameters. Not retryable.
    #[error("config error: {0}")]
    Config(String),

    /// The underlying storage is structurally inconsistent with the format.
    #[error("stream is corrupted: {0}")]
    Corrupted(String),

    /// A block failed authentication while integrity checking was enabled.
    #[error("message verification failed for file {id} at offset {offset}")]
    Verification { id: FileId, offset: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LsfsError {
    pub fn is_verification(&self) -> bool {
        matches!(self, LsfsError::Verification { .. })
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, LsfsError::Corrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_message_names_file_and_offset() {
        let err = LsfsError::Verification {
            id: FileId::from_bytes([0xAB; 16]),
            offset: 8192,
        };
        let msg = err.to_string();
        assert!(msg.contains("abababab"), "message should carry the file id: {msg}");
        assert!(msg.contains("8192"));
        assert!(err.is_verification());
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err: LsfsError = io.into();
        assert!(matches!(err, LsfsError::Io(_)));
    }
}
