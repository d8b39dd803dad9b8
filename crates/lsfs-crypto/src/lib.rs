//! lsfs-crypto: primitives behind the encrypted block stream
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, supplied by the caller, never stored)
//!   └── Session Key (per underlying stream, 256-bit random)
//!         stored at offset 0 as session_key XOR master_key
//!         └── Block AEAD: AES-256-GCM (key=session_key, nonce=random non-zero IV,
//!                         AAD=file_id || block_index as u64 LE)
//! ```

pub mod aead;
pub mod keys;
pub mod nonce;

pub use aead::{block_cipher_for, write_aad, AesGcmBlockCipher, BlockAead, AAD_SIZE};
pub use keys::{generate_session_key, unwrap_session_key, wrap_session_key, MasterKey, SessionKey};
pub use nonce::{generate_iv, generate_iv_with, is_all_zeros};

pub use lsfs_core::types::{HEADER_SIZE, ID_SIZE, KEY_SIZE, MAC_SIZE};
