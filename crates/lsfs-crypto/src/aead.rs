//! Per-block AES-256-GCM with a configurable IV length
//!
//! Encrypted block format (binary):
//! ```text
//! [iv_size bytes: random non-zero IV][N bytes: ciphertext][16 bytes: GCM tag]
//! AAD = file_id (16 bytes) || block_index (8 bytes, little-endian)
//! ```
//!
//! The AAD binds each block to its position and file, preventing block
//! reordering and cross-file substitution.

use aes_gcm::aead::consts::{
    U12, U13, U14, U15, U16, U17, U18, U19, U20, U21, U22, U23, U24, U25, U26, U27, U28, U29,
    U30, U31, U32,
};
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::generic_array::ArrayLength;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use lsfs_core::FileId;

use crate::keys::SessionKey;
use crate::{ID_SIZE, MAC_SIZE};

/// Length of the per-block associated data.
pub const AAD_SIZE: usize = ID_SIZE + 8;

/// Authenticated encryption over one block, in place, with a detached tag.
pub trait BlockAead {
    fn iv_size(&self) -> usize;

    /// Encrypt `buf` in place and write the tag into `tag` (`MAC_SIZE` bytes).
    fn seal_in_place(
        &self,
        iv: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &mut [u8],
    ) -> anyhow::Result<()>;

    /// Decrypt `buf` in place. Returns whether the tag verified; `buf` holds
    /// the decrypted (possibly unauthenticated) bytes either way.
    fn open_in_place(
        &self,
        iv: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &[u8],
    ) -> anyhow::Result<bool>;
}

/// AES-256-GCM keyed once with the session key, nonce length fixed by `N`.
pub struct AesGcmBlockCipher<N: ArrayLength<u8>> {
    cipher: AesGcm<Aes256, N>,
}

impl<N: ArrayLength<u8>> AesGcmBlockCipher<N> {
    pub fn new(key: &SessionKey) -> Self {
        Self {
            cipher: AesGcm::new(key.as_bytes().into()),
        }
    }

    fn check_lengths(&self, iv: &[u8], tag_len: usize) -> anyhow::Result<()> {
        if iv.len() != N::to_usize() {
            anyhow::bail!("IV has wrong size: {} bytes (expected {})", iv.len(), N::to_usize());
        }
        if tag_len != MAC_SIZE {
            anyhow::bail!("tag has wrong size: {tag_len} bytes (expected {MAC_SIZE})");
        }
        Ok(())
    }
}

impl<N: ArrayLength<u8>> BlockAead for AesGcmBlockCipher<N> {
    fn iv_size(&self) -> usize {
        N::to_usize()
    }

    fn seal_in_place(
        &self,
        iv: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &mut [u8],
    ) -> anyhow::Result<()> {
        self.check_lengths(iv, tag.len())?;
        let computed = self
            .cipher
            .encrypt_in_place_detached(Nonce::<N>::from_slice(iv), aad, buf)
            .map_err(|e| anyhow::anyhow!("block encryption failed: {e}"))?;
        tag.copy_from_slice(&computed);
        Ok(())
    }

    fn open_in_place(
        &self,
        iv: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &[u8],
    ) -> anyhow::Result<bool> {
        self.check_lengths(iv, tag.len())?;
        let nonce = Nonce::<N>::from_slice(iv);
        if self
            .cipher
            .decrypt_in_place_detached(nonce, aad, buf, Tag::from_slice(tag))
            .is_ok()
        {
            return Ok(true);
        }

        // A failed tag leaves `buf` as ciphertext. The CTR keystream is its
        // own inverse, so encrypting again yields the unauthenticated plaintext.
        self.cipher
            .encrypt_in_place_detached(nonce, aad, buf)
            .map_err(|e| anyhow::anyhow!("block decryption failed: {e}"))?;
        Ok(false)
    }
}

/// Build the AES-GCM block cipher for a runtime IV length (12..=32 bytes).
pub fn block_cipher_for(
    key: &SessionKey,
    iv_size: usize,
) -> anyhow::Result<Box<dyn BlockAead + Send + Sync>> {
    macro_rules! select {
        ($($len:literal => $n:ty),+ $(,)?) => {
            match iv_size {
                $($len => Box::new(AesGcmBlockCipher::<$n>::new(key)),)+
                other => anyhow::bail!("unsupported IV size: {other} bytes (expected 12..=32)"),
            }
        };
    }

    let cipher: Box<dyn BlockAead + Send + Sync> = select!(
        12 => U12, 13 => U13, 14 => U14, 15 => U15, 16 => U16, 17 => U17, 18 => U18,
        19 => U19, 20 => U20, 21 => U21, 22 => U22, 23 => U23, 24 => U24, 25 => U25,
        26 => U26, 27 => U27, 28 => U28, 29 => U29, 30 => U30, 31 => U31, 32 => U32,
    );
    Ok(cipher)
}

/// Fill `aad` with `file_id || block_index (8 bytes, LE)`.
pub fn write_aad(aad: &mut [u8; AAD_SIZE], file_id: &FileId, block_index: u64) {
    aad[..ID_SIZE].copy_from_slice(file_id.as_bytes());
    aad[ID_SIZE..].copy_from_slice(&block_index.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_session_key;
    use crate::nonce::generate_iv;
    use proptest::prelude::*;

    fn seal(
        cipher: &dyn BlockAead,
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> (Vec<u8>, [u8; MAC_SIZE]) {
        let mut buf = plaintext.to_vec();
        let mut tag = [0u8; MAC_SIZE];
        cipher.seal_in_place(iv, aad, &mut buf, &mut tag).unwrap();
        (buf, tag)
    }

    #[test]
    fn test_seal_open_roundtrip_every_iv_size() {
        let key = generate_session_key();
        let plaintext = b"hello, encrypted block!";
        let aad = [7u8; AAD_SIZE];

        for iv_size in 12..=32 {
            let cipher = block_cipher_for(&key, iv_size).unwrap();
            assert_eq!(cipher.iv_size(), iv_size);

            let mut iv = vec![0u8; iv_size];
            generate_iv(&mut iv);
            let (mut buf, tag) = seal(cipher.as_ref(), &iv, &aad, plaintext);
            assert_ne!(&buf[..], &plaintext[..]);

            let ok = cipher.open_in_place(&iv, &aad, &mut buf, &tag).unwrap();
            assert!(ok, "iv_size {iv_size} must verify");
            assert_eq!(&buf[..], &plaintext[..]);
        }
    }

    #[test]
    fn test_unsupported_iv_size() {
        let key = generate_session_key();
        assert!(block_cipher_for(&key, 11).is_err());
        assert!(block_cipher_for(&key, 33).is_err());
    }

    #[test]
    fn test_iv_length_mismatch_is_error() {
        let key = generate_session_key();
        let cipher = block_cipher_for(&key, 16).unwrap();
        let mut buf = vec![1u8; 8];
        let mut tag = [0u8; MAC_SIZE];

        assert!(cipher
            .seal_in_place(&[1u8; 12], &[], &mut buf, &mut tag)
            .is_err());
    }

    #[test]
    fn test_open_wrong_aad_fails() {
        let key = generate_session_key();
        let cipher = block_cipher_for(&key, 12).unwrap();
        let iv = [9u8; 12];

        let mut aad = [0u8; AAD_SIZE];
        write_aad(&mut aad, &FileId::from_bytes([0xAA; ID_SIZE]), 0);
        let (mut buf, tag) = seal(cipher.as_ref(), &iv, &aad, b"secret data");

        write_aad(&mut aad, &FileId::from_bytes([0xAA; ID_SIZE]), 1);
        let ok = cipher.open_in_place(&iv, &aad, &mut buf, &tag).unwrap();
        assert!(!ok, "wrong block index must fail (AAD mismatch)");
    }

    #[test]
    fn test_open_tampered_still_yields_bytes() {
        let key = generate_session_key();
        let cipher = block_cipher_for(&key, 12).unwrap();
        let iv = [3u8; 12];
        let plaintext = b"0123456789abcdef";

        let (mut buf, mut tag) = seal(cipher.as_ref(), &iv, &[], plaintext);
        tag[0] ^= 0x01;

        let ok = cipher.open_in_place(&iv, &[], &mut buf, &tag).unwrap();
        assert!(!ok);
        // Only the tag was touched, so the keystream output is still the plaintext.
        assert_eq!(&buf[..], &plaintext[..]);
    }

    #[test]
    fn test_open_flipped_ciphertext_changes_one_byte() {
        let key = generate_session_key();
        let cipher = block_cipher_for(&key, 20).unwrap();
        let iv = [0x5Cu8; 20];
        let plaintext = [0x33u8; 48];

        let (mut buf, tag) = seal(cipher.as_ref(), &iv, b"aad", &plaintext);
        buf[17] ^= 0x80;

        assert!(!cipher.open_in_place(&iv, b"aad", &mut buf, &tag).unwrap());
        let mut expected = plaintext;
        expected[17] ^= 0x80;
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_write_aad_layout() {
        let mut aad = [0u8; AAD_SIZE];
        write_aad(&mut aad, &FileId::from_bytes([0x11; ID_SIZE]), 0x0102);

        assert_eq!(&aad[..ID_SIZE], &[0x11; ID_SIZE]);
        assert_eq!(&aad[ID_SIZE..], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            plaintext in proptest::collection::vec(any::<u8>(), 1..4096),
            index in any::<u64>(),
        ) {
            let key = generate_session_key();
            let cipher = block_cipher_for(&key, 16).unwrap();
            let mut aad = [0u8; AAD_SIZE];
            write_aad(&mut aad, &FileId::from_bytes([5; ID_SIZE]), index);
            let mut iv = [0u8; 16];
            generate_iv(&mut iv);

            let (mut buf, tag) = seal(cipher.as_ref(), &iv, &aad, &plaintext);
            prop_assert!(cipher.open_in_place(&iv, &aad, &mut buf, &tag).unwrap());
            prop_assert_eq!(buf, plaintext);
        }
    }
}
