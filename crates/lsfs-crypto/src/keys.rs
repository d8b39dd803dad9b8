//! Master and session keys, and the header key wrap

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// The caller-supplied 256-bit key protecting every session key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Decode a key file: standard base64 of exactly 32 bytes, surrounding
    /// whitespace ignored.
    pub fn from_base64(encoded: &SecretString) -> anyhow::Result<Self> {
        let mut decoded = STANDARD
            .decode(encoded.expose_secret().trim())
            .map_err(|e| anyhow::anyhow!("master key is not valid base64: {e}"))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            anyhow::bail!("master key has wrong size: {len} bytes (expected {KEY_SIZE})");
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> SecretString {
        SecretString::from(STANDARD.encode(self.bytes))
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The per-stream 256-bit block encryption key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit session key.
pub fn generate_session_key() -> SessionKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    SessionKey::from_bytes(bytes)
}

/// Produce the stream header: the session key XORed byte-wise with the master key.
pub fn wrap_session_key(master: &MasterKey, session: &SessionKey) -> [u8; KEY_SIZE] {
    xor(master.as_bytes(), session.as_bytes())
}

/// Recover the session key from a stream header.
///
/// There is no authenticity check here; a wrong master key yields a wrong
/// session key, which then fails block verification.
pub fn unwrap_session_key(master: &MasterKey, header: &[u8; KEY_SIZE]) -> SessionKey {
    SessionKey::from_bytes(xor(master.as_bytes(), header))
}

fn xor(a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master_key() -> MasterKey {
        MasterKey::from_bytes([42u8; KEY_SIZE])
    }

    #[test]
    fn test_session_key_generation() {
        let k1 = generate_session_key();
        let k2 = generate_session_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let master = test_master_key();
        let session = generate_session_key();

        let header = wrap_session_key(&master, &session);
        let unwrapped = unwrap_session_key(&master, &header);

        assert_eq!(session.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_wrap_is_bytewise_xor() {
        let master = MasterKey::from_bytes([0xF0u8; KEY_SIZE]);
        let session = SessionKey::from_bytes([0x0Fu8; KEY_SIZE]);

        assert_eq!(wrap_session_key(&master, &session), [0xFFu8; KEY_SIZE]);
    }

    #[test]
    fn test_unwrap_wrong_master_gives_different_key() {
        let session = generate_session_key();
        let header = wrap_session_key(&MasterKey::from_bytes([1u8; KEY_SIZE]), &session);
        let unwrapped = unwrap_session_key(&MasterKey::from_bytes([2u8; KEY_SIZE]), &header);

        assert_ne!(session.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_base64_roundtrip() {
        let master = MasterKey::generate();
        let encoded = master.to_base64();
        let decoded = MasterKey::from_base64(&encoded).unwrap();

        assert_eq!(master.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_base64_tolerates_trailing_newline() {
        let master = test_master_key();
        let text = format!("{}\n", master.to_base64().expose_secret());
        let decoded = MasterKey::from_base64(&SecretString::from(text)).unwrap();

        assert_eq!(master.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_base64_wrong_length_rejected() {
        let short = SecretString::from(STANDARD.encode([1u8; 16]));
        assert!(MasterKey::from_base64(&short).is_err());

        let garbage = SecretString::from("not base64 at all!".to_string());
        assert!(MasterKey::from_base64(&garbage).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let dbg = format!("{:?} {:?}", test_master_key(), generate_session_key());
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("42"));
    }
}
