//! Random block IVs
//!
//! An all-zero physical block marks a sparse hole, so a real block must never
//! start with an all-zero IV. Generation rejection-samples until it doesn't.

use rand::RngCore;

/// Fill `iv` with random bytes from the thread RNG, never all zero.
pub fn generate_iv(iv: &mut [u8]) {
    generate_iv_with(&mut rand::thread_rng(), iv);
}

pub fn generate_iv_with<R: RngCore + ?Sized>(rng: &mut R, iv: &mut [u8]) {
    loop {
        rng.fill_bytes(iv);
        if !is_all_zeros(iv) {
            return;
        }
        tracing::trace!("rejected all-zero IV");
    }
}

pub fn is_all_zeros(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}
