pub mod config;
pub mod error;
pub mod types;

pub use config::{LogConfig, LogFormat, LsfsConfig, StreamConfig};
pub use error::{LsfsError, LsfsResult};
pub use types::FileId;
