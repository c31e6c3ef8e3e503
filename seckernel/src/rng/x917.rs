//! ANSI X9.17 post-processor: whitens the entropy pool's output through a
//! two-key triple-DES generator before it's ever handed to a caller, so raw
//! pool state is never exposed even if the mixing step turns out to be
//! weaker than assumed.
//!
//! Rekeys from fresh pool output every `REKEY_INTERVAL` cycles, exactly the
//! interval the source uses, so a compromise of one key only exposes that
//! many outputs.

use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use des::TdesEde2;
use zeroize::Zeroize;

use seckernel_types::{KernelError, KernelResult};

const BLOCK_SIZE: usize = 8;
const KEY_SIZE: usize = 16;
pub const REKEY_INTERVAL: u32 = 1024;

pub struct X917Generator {
    cipher: TdesEde2,
    seed: [u8; BLOCK_SIZE],
    cycles_since_rekey: u32,
}

impl X917Generator {
    pub fn new(key: [u8; KEY_SIZE], seed: [u8; BLOCK_SIZE]) -> KernelResult<Self> {
        let cipher = TdesEde2::new_from_slice(&key).map_err(|_| KernelError::Random)?;
        Ok(X917Generator {
            cipher,
            seed,
            cycles_since_rekey: 0,
        })
    }

    fn encrypt(&self, block: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut ga = GenericArray::clone_from_slice(&block);
        self.cipher.encrypt_block(&mut ga);
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&ga);
        out
    }

    /// One X9.17 cycle: `I = E(sample)`, `R = E(I ^ V)`, `V' = E(R ^ I)`.
    /// `sample` is whatever the caller is whitening through this generator
    /// this cycle -- a date/time-ish nonce seed or a block of entropy-pool
    /// material, the math doesn't care which. Returns `R`, the output
    /// block, and advances the seed to `V'`.
    pub fn cycle(&mut self, sample: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let i = self.encrypt(sample);
        let r = self.encrypt(xor(i, self.seed));
        self.seed = self.encrypt(xor(r, i));
        self.cycles_since_rekey += 1;
        r
    }

    pub fn needs_rekey(&self) -> bool {
        self.cycles_since_rekey >= REKEY_INTERVAL
    }

    /// Replace the key and seed with fresh material (from the entropy
    /// pool) and reset the rekey counter.
    pub fn rekey(&mut self, key: [u8; KEY_SIZE], seed: [u8; BLOCK_SIZE]) -> KernelResult<()> {
        self.cipher = TdesEde2::new_from_slice(&key).map_err(|_| KernelError::Random)?;
        self.seed = seed;
        self.cycles_since_rekey = 0;
        Ok(())
    }
}

impl Drop for X917Generator {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

fn xor(a: [u8; BLOCK_SIZE], b: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        out[i] = a[i] ^ b[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_blocks_differ() {
        let mut gen = X917Generator::new([0xAB; KEY_SIZE], [0u8; BLOCK_SIZE]).unwrap();
        let a = gen.cycle([1u8; BLOCK_SIZE]);
        let b = gen.cycle([2u8; BLOCK_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn rekey_resets_the_cycle_counter() {
        let mut gen = X917Generator::new([0xAB; KEY_SIZE], [0u8; BLOCK_SIZE]).unwrap();
        for i in 0..REKEY_INTERVAL {
            gen.cycle([i as u8; BLOCK_SIZE]);
        }
        assert!(gen.needs_rekey());
        gen.rekey([0xCD; KEY_SIZE], [1u8; BLOCK_SIZE]).unwrap();
        assert!(!gen.needs_rekey());
    }
}
