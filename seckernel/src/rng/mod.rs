//! The system device's CSPRNG: an entropy pool feeding an ANSI X9.17
//! post-processor, gated by a FIPS-140 continuous output test and a fork
//! detector.

pub mod fork;
pub mod pool;
pub mod x917;

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};

use fork::ForkDetector;
use pool::{EntropyPool, POOL_SIZE};
use seckernel_types::{KernelError, KernelResult};
use x917::X917Generator;

const BLOCK_SIZE: usize = 8;
const KEY_SIZE: usize = 16;
const DIGEST_SIZE: usize = 20;
/// Each output request folds a companion pool's halves together, yielding
/// at most this many bytes; longer requests loop.
const HALF_POOL: usize = POOL_SIZE / 2;
/// How many consecutive samples the continuous-output test keeps around to
/// compare a new sample against. The pool mixer and the X9.17
/// post-processor each get their own window.
const CONTINUOUS_TEST_WINDOW: usize = 16;
/// A generation attempt gives up after this many consecutive
/// continuous-test failures; a real source shouldn't fail even once.
const MAX_RETRIES: u32 = 5;

pub struct Rng {
    pool: EntropyPool,
    generator: Option<X917Generator>,
    fork_detector: Box<dyn ForkDetector>,
    pool_samples: VecDeque<[u8; 4]>,
    x917_samples: VecDeque<[u8; 4]>,
    nonce_public: [u8; DIGEST_SIZE],
    nonce_private: [u8; BLOCK_SIZE],
    nonce_initialised: bool,
}

impl Rng {
    pub fn new(fork_detector: Box<dyn ForkDetector>) -> Self {
        Rng {
            pool: EntropyPool::new(),
            generator: None,
            fork_detector,
            pool_samples: VecDeque::with_capacity(CONTINUOUS_TEST_WINDOW),
            x917_samples: VecDeque::with_capacity(CONTINUOUS_TEST_WINDOW),
            nonce_public: [0u8; DIGEST_SIZE],
            nonce_private: [0u8; BLOCK_SIZE],
            nonce_initialised: false,
        }
    }

    pub fn add_entropy(&mut self, data: &[u8], quality: u8) -> bool {
        self.pool.add_entropy(data, quality)
    }

    /// Draw `len` bytes of post-processed, continuous-tested output.
    pub fn generate(&mut self, len: usize) -> KernelResult<Vec<u8>> {
        let out = self.generate_checked(len)?;
        if self.fork_detector.has_forked() {
            // Parent and child would otherwise emit the same stream from
            // here on; force a fresh mix pass and regenerate so they
            // diverge.
            self.pool.reset_mix_count();
            return self.generate_checked(len);
        }
        Ok(out)
    }

    fn generate_checked(&mut self, len: usize) -> KernelResult<Vec<u8>> {
        if !self.pool.meets_output_preconditions() {
            return Err(KernelError::Random);
        }
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let chunk = self.produce_chunk()?;
            let take = (len - out.len()).min(chunk.len());
            out.extend_from_slice(&chunk[..take]);
        }
        Ok(out)
    }

    /// A nonce has looser entropy requirements than key material: it only
    /// needs to be non-repeating, not secret. The first call draws a
    /// private seed from the strong RNG (falling back to wall-clock time
    /// if that fails twice); every call chains
    /// `public_state <- hash(public_state || private_state)` and emits a
    /// prefix of `public_state`.
    pub fn nonce(&mut self, len: usize) -> KernelResult<Vec<u8>> {
        if !self.nonce_initialised {
            self.nonce_private = self.draw_nonce_seed();
            self.nonce_initialised = true;
        }
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let mut hasher = Sha1::new();
            hasher.update(self.nonce_public);
            hasher.update(self.nonce_private);
            let digest = hasher.finalize();
            self.nonce_public.copy_from_slice(&digest);
            let take = (len - out.len()).min(DIGEST_SIZE);
            out.extend_from_slice(&self.nonce_public[..take]);
        }
        Ok(out)
    }

    /// Unpredictability doesn't matter here: any caller whose nonce needs
    /// to be secret will also reach the strong RNG through key generation
    /// and fail there if it's unavailable, so a wall-clock fallback after
    /// one retry is acceptable.
    fn draw_nonce_seed(&mut self) -> [u8; BLOCK_SIZE] {
        for _ in 0..2 {
            if let Ok(chunk) = self.produce_chunk() {
                let mut seed = [0u8; BLOCK_SIZE];
                seed.copy_from_slice(&chunk[..BLOCK_SIZE]);
                return seed;
            }
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        nanos.to_le_bytes()
    }

    /// Ensure the X9.17 generator is seeded and within its rekey interval,
    /// drawing fresh key/seed material from the just-mixed pool and then
    /// mixing twice more to erase the bytes used.
    fn ensure_generator(&mut self) -> KernelResult<()> {
        let needs_init = match &self.generator {
            None => true,
            Some(generator) => generator.needs_rekey(),
        };
        if !needs_init {
            return Ok(());
        }
        self.pool.mix();
        let key = self.pool.key_material();
        let seed = self.pool.seed_material();
        self.pool.mix();
        self.pool.mix();
        match &mut self.generator {
            Some(generator) => generator.rekey(key, seed)?,
            None => self.generator = Some(X917Generator::new(key, seed)?),
        }
        Ok(())
    }

    /// One CSPRNG output request: clone the pool into a byte-inverted
    /// companion, mix both independently, FIPS-check the source pool's
    /// sample, run the companion's bytes through the X9.17 generator block
    /// by block, FIPS-check the X9.17 output's sample, then fold the
    /// companion's halves together and scrub it.
    fn produce_chunk(&mut self) -> KernelResult<[u8; HALF_POOL]> {
        self.ensure_generator()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            if attempt > MAX_RETRIES {
                return Err(KernelError::Random);
            }

            let mut companion = self.pool.inverted_clone();
            self.pool.mix();
            companion.mix();

            let pool_sample = self.pool.sample();
            if self.pool_samples.contains(&pool_sample) {
                continue;
            }

            let generator = self.generator.as_mut().expect("seeded just above");
            let mut transformed = [0u8; POOL_SIZE];
            for (i, block) in companion.bytes().chunks(BLOCK_SIZE).enumerate() {
                let mut input = [0u8; BLOCK_SIZE];
                input.copy_from_slice(block);
                let output = generator.cycle(input);
                transformed[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE].copy_from_slice(&output);
            }
            companion.bytes_mut().copy_from_slice(&transformed);

            let x917_sample = companion.sample();
            if self.x917_samples.contains(&x917_sample) {
                continue;
            }

            push_sample(&mut self.pool_samples, pool_sample);
            push_sample(&mut self.x917_samples, x917_sample);

            return Ok(companion.fold_halves());
        }
    }
}

fn push_sample(window: &mut VecDeque<[u8; 4]>, sample: [u8; 4]) {
    if window.len() == CONTINUOUS_TEST_WINDOW {
        window.pop_front();
    }
    window.push_back(sample);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fork::NeverForked;

    /// Enough entropy, in one call, to cross both the pool's quality cap
    /// and its minimum-mixes threshold (one mix per pool-sized wrap).
    fn seeded_rng() -> Rng {
        let mut rng = Rng::new(Box::new(NeverForked));
        rng.add_entropy(&[0x5A; POOL_SIZE * 12], 100);
        rng
    }

    #[test]
    fn refuses_to_generate_without_enough_entropy() {
        let mut rng = Rng::new(Box::new(NeverForked));
        assert_eq!(rng.generate(16), Err(KernelError::Random));
    }

    #[test]
    fn refuses_to_generate_below_the_minimum_mixes_threshold() {
        let mut rng = Rng::new(Box::new(NeverForked));
        // High quality but only a handful of mixes.
        rng.add_entropy(&[0x5A; POOL_SIZE * 2], 100);
        assert_eq!(rng.generate(16), Err(KernelError::Random));
    }

    #[test]
    fn generates_the_requested_length() {
        let mut rng = seeded_rng();
        let out = rng.generate(37).unwrap();
        assert_eq!(out.len(), 37);
    }

    #[test]
    fn a_request_longer_than_half_the_pool_loops_to_fill_it() {
        let mut rng = seeded_rng();
        let out = rng.generate(HALF_POOL + 10).unwrap();
        assert_eq!(out.len(), HALF_POOL + 10);
    }

    #[test]
    fn consecutive_draws_differ() {
        let mut rng = seeded_rng();
        let a = rng.generate(16).unwrap();
        let b = rng.generate(16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_does_not_require_entropy_preconditions() {
        let mut rng = Rng::new(Box::new(NeverForked));
        let nonce = rng.nonce(12).unwrap();
        assert_eq!(nonce.len(), 12);
    }

    #[test]
    fn consecutive_nonces_differ() {
        let mut rng = Rng::new(Box::new(NeverForked));
        let a = rng.nonce(16).unwrap();
        let b = rng.nonce(16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn a_nonce_longer_than_the_digest_size_chains_further_hashes() {
        let mut rng = Rng::new(Box::new(NeverForked));
        let out = rng.nonce(DIGEST_SIZE + 5).unwrap();
        assert_eq!(out.len(), DIGEST_SIZE + 5);
    }
}
