//! The entropy pool: a fixed-size byte buffer that raw entropy is folded
//! into by repeated SHA-1 hashing rather than simple XOR, so that a weak or
//! partially-predictable entropy source can't cancel out bits already in
//! the pool.

use sha1::{Digest, Sha1};
use zeroize::Zeroize;

/// Logical pool size callers see: samples, halves and key/seed material are
/// all drawn from the first `POOL_SIZE` bytes.
pub const POOL_SIZE: usize = 256;
const DIGEST_SIZE: usize = 20;
const FOLLOWING_SIZE: usize = 64;
/// Storage is rounded up to a multiple of `DIGEST_SIZE` so the mix step's
/// last chunk still has a full 20 bytes to write its digest into, rather
/// than spilling past the pool.
const POOL_STORAGE: usize = (POOL_SIZE + DIGEST_SIZE - 1) / DIGEST_SIZE * DIGEST_SIZE;
/// Mix count saturates here: once the pool has been mixed this many times
/// its diffusion is trusted, and further mixes don't need to raise the
/// bar any further.
const MIN_MIXES_THRESHOLD: u32 = 10;

pub struct EntropyPool {
    bytes: [u8; POOL_STORAGE],
    write_pos: usize,
    mix_count: u32,
    /// Caller-claimed quality, 0-100, capped there regardless of how many
    /// claims have been folded in.
    quality: u8,
    /// Total bytes ever folded in, used to sanity-check quality claims
    /// against how much raw material actually backs them.
    byte_count: u64,
}

impl EntropyPool {
    pub fn new() -> Self {
        EntropyPool {
            bytes: [0u8; POOL_STORAGE],
            write_pos: 0,
            mix_count: 0,
            quality: 0,
            byte_count: 0,
        }
    }

    /// Fold `data` into the pool by XOR at the current write position,
    /// wrapping (and mixing) whenever the position reaches the pool end.
    /// `quality` is the caller's claim (1-100) about how many bits per byte
    /// are genuinely random; a claim that would more than double the
    /// pool's bytes-per-quality-point ratio is rejected (the bytes are
    /// still folded in, just not credited). Returns whether the quality
    /// claim was accepted.
    pub fn add_entropy(&mut self, data: &[u8], quality: u8) -> bool {
        for &byte in data {
            self.bytes[self.write_pos] ^= byte;
            self.write_pos += 1;
            if self.write_pos >= POOL_SIZE {
                self.mix();
            }
        }
        self.byte_count += data.len() as u64;

        let claim = quality.clamp(1, 100);
        let candidate_quality = (self.quality as u32 + claim as u32).min(100) as u8;

        if self.quality > 0 {
            let prior_byte_count = self.byte_count - data.len() as u64;
            // candidate_ratio > 2 * prior_ratio, cross-multiplied to stay
            // in integer arithmetic:
            //   byte_count / candidate_quality > 2 * prior_byte_count / quality
            let lhs = self.byte_count * self.quality as u64;
            let rhs = 2 * prior_byte_count * candidate_quality as u64;
            if candidate_quality > 0 && lhs > rhs {
                return false;
            }
        }
        self.quality = candidate_quality;
        true
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn mix_count(&self) -> u32 {
        self.mix_count
    }

    /// Whether the pool currently satisfies the CSPRNG output
    /// preconditions: a fully-credited quality estimate and enough mix
    /// passes to trust the diffusion.
    pub fn meets_output_preconditions(&self) -> bool {
        self.quality >= 100 && self.mix_count >= MIN_MIXES_THRESHOLD
    }

    /// Reset the mix count (but not quality or content) back to zero, used
    /// after a detected fork to force the next output request to re-earn
    /// the minimum-mixes threshold via its own fast entropy injection.
    pub fn reset_mix_count(&mut self) {
        self.mix_count = 0;
    }

    /// Iterate over the pool in 20-byte chunks. For each chunk starting at
    /// `p`, hash the previous 20 bytes (circularly) concatenated with the
    /// 64 bytes following `p` (circularly) and write the 20-byte digest
    /// back at `p`. Chunks are processed in place, so later chunks see
    /// earlier chunks' already-mixed bytes in their window.
    pub fn mix(&mut self) {
        for p in (0..POOL_STORAGE).step_by(DIGEST_SIZE) {
            let mut input = [0u8; DIGEST_SIZE + FOLLOWING_SIZE];
            for i in 0..DIGEST_SIZE {
                let idx = (p + POOL_STORAGE - DIGEST_SIZE + i) % POOL_STORAGE;
                input[i] = self.bytes[idx];
            }
            for i in 0..FOLLOWING_SIZE {
                let idx = (p + i) % POOL_STORAGE;
                input[DIGEST_SIZE + i] = self.bytes[idx];
            }
            let digest = Sha1::digest(input);
            self.bytes[p..p + DIGEST_SIZE].copy_from_slice(&digest[..DIGEST_SIZE]);
        }
        self.mix_count = (self.mix_count + 1).min(MIN_MIXES_THRESHOLD);
        self.write_pos = 0;
    }

    /// The pool's logical content, ignoring the rounding padding used only
    /// by `mix`.
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes[..POOL_SIZE]
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..POOL_SIZE]
    }

    /// A disposable copy of this pool with every byte bit-inverted, used as
    /// the CSPRNG output path's companion pool.
    pub(crate) fn inverted_clone(&self) -> Self {
        let mut bytes = self.bytes;
        for b in bytes.iter_mut() {
            *b = !*b;
        }
        EntropyPool {
            bytes,
            write_pos: 0,
            mix_count: self.mix_count,
            quality: self.quality,
            byte_count: self.byte_count,
        }
    }

    /// A 4-byte sample at offset 0, for the FIPS-140 continuous-output
    /// test.
    pub(crate) fn sample(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.bytes[0..4]);
        out
    }

    /// The pool's first half XORed with its second half.
    pub(crate) fn fold_halves(&self) -> [u8; POOL_SIZE / 2] {
        let half = POOL_SIZE / 2;
        let mut out = [0u8; POOL_SIZE / 2];
        for i in 0..half {
            out[i] = self.bytes[i] ^ self.bytes[half + i];
        }
        out
    }

    pub(crate) fn key_material(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.bytes[0..16]);
        out
    }

    pub(crate) fn seed_material(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.bytes[16..24]);
        out
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EntropyPool {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_entropy_increases_the_quality_up_to_the_cap() {
        let mut pool = EntropyPool::new();
        assert!(pool.add_entropy(&[1u8; 64], 50));
        assert_eq!(pool.quality(), 50);
        assert!(pool.add_entropy(&[2u8; 10_000], 100));
        assert_eq!(pool.quality(), 100);
    }

    #[test]
    fn a_claim_that_blows_the_bytes_per_quality_ratio_is_rejected() {
        let mut pool = EntropyPool::new();
        // Establishes a ratio of roughly 1 byte per quality point.
        assert!(pool.add_entropy(&[1u8; 100], 100));
        assert_eq!(pool.quality(), 100);
        // A single extra byte claiming 1 point would leave the ratio
        // essentially unchanged, so this should be accepted...
        assert!(pool.add_entropy(&[2u8; 1], 1));
        // ...but a huge batch of bytes claiming the same single point
        // would more than double the ratio and should be rejected.
        let mut pool = EntropyPool::new();
        assert!(pool.add_entropy(&[1u8; 100], 100));
        assert!(!pool.add_entropy(&[2u8; 10_000], 1));
        assert_eq!(pool.quality(), 100);
    }

    #[test]
    fn reaching_the_pool_end_mixes_and_wraps_the_write_position() {
        let mut pool = EntropyPool::new();
        let before = pool.mix_count();
        pool.add_entropy(&[7u8; POOL_SIZE + 1], 100);
        assert!(pool.mix_count() > before);
    }

    #[test]
    fn mixing_is_not_a_no_op() {
        let mut pool = EntropyPool::new();
        pool.add_entropy(&[7u8; 32], 80);
        let snapshot: Vec<u8> = pool.bytes().to_vec();
        pool.mix();
        assert_ne!(snapshot, pool.bytes());
    }

    #[test]
    fn mix_count_saturates_at_the_minimum_mixes_threshold() {
        let mut pool = EntropyPool::new();
        for _ in 0..(MIN_MIXES_THRESHOLD + 5) {
            pool.mix();
        }
        assert_eq!(pool.mix_count(), MIN_MIXES_THRESHOLD);
    }

    #[test]
    fn output_preconditions_require_both_quality_and_mix_count() {
        let mut pool = EntropyPool::new();
        assert!(!pool.meets_output_preconditions());
        pool.add_entropy(&[3u8; POOL_SIZE * 12], 100);
        assert!(pool.meets_output_preconditions());
    }

    #[test]
    fn inverted_clone_flips_every_byte() {
        let mut pool = EntropyPool::new();
        pool.add_entropy(&[0x0Fu8; 64], 100);
        let clone = pool.inverted_clone();
        for (a, b) in pool.bytes().iter().zip(clone.bytes().iter()) {
            assert_eq!(*a, !*b);
        }
    }

    #[test]
    fn fold_halves_xors_the_two_halves_together() {
        let mut pool = EntropyPool::new();
        pool.add_entropy(&[0xAAu8; 64], 100);
        let folded = pool.fold_halves();
        let half = POOL_SIZE / 2;
        for i in 0..half {
            assert_eq!(folded[i], pool.bytes()[i] ^ pool.bytes()[half + i]);
        }
    }
}
