//! Seeded level RNG.
//!
//! Every random choice the generator makes flows through [`LevelRng`], so a
//! level number reproduces the same grid on every platform. The level seed
//! is folded together with a fixed salt before seeding, which keeps small
//! adjacent level numbers from producing correlated streams.

use crate::constants::RNG_WARMUP_DRAWS;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic random source for one level.
#[derive(Debug, Clone)]
pub struct LevelRng {
    inner: ChaCha8Rng,
}

impl LevelRng {
    pub fn new(seed: i32) -> Self {
        let mut rng = Self {
            inner: ChaCha8Rng::seed_from_u64(0),
        };
        rng.reseed(seed);
        rng
    }

    /// Reseed from a level number and discard the warm-up outputs.
    pub fn reseed(&mut self, seed: i32) {
        self.inner = ChaCha8Rng::seed_from_u64(mix_seed(seed));
        for _ in 0..RNG_WARMUP_DRAWS {
            self.inner.next_u32();
        }
    }

    /// Uniform integer in `[min, max_exclusive)`. Returns `min` without
    /// drawing when the range holds at most one value.
    pub fn next_int(&mut self, min: i32, max_exclusive: i32) -> i32 {
        if max_exclusive.saturating_sub(min) <= 1 {
            return min;
        }
        self.inner.gen_range(min..max_exclusive)
    }

    /// Uniform index in `[0, len)`; `0` for empty and single-element ranges.
    pub fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.inner.gen_range(0..len)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

/// Fold the level number and its salt words into a single 64-bit seed.
fn mix_seed(seed: i32) -> u64 {
    let hash = |s: u64, i: u64| -> u64 {
        let mut h = s.wrapping_mul(6364136223846793005).wrapping_add(i);
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51afd7ed558ccd);
        h ^= h >> 33;
        h
    };

    let base = i64::from(seed);
    let salt = [
        base,
        i64::from(b' '),
        i64::from(b'L'),
        i64::from(b'e'),
        i64::from(b'v'),
        i64::from(b'e'),
        i64::from(b'l'),
        i64::from(b' '),
        base + 1,
        i64::from(b' '),
        i64::from(b's'),
        i64::from(b'e'),
        i64::from(b'e'),
        i64::from(b'd'),
        i64::from(b' '),
        base + 2,
    ];
    salt.iter()
        .fold(0x5049_5045_5345_4544, |acc, word| hash(acc, *word as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = LevelRng::new(42);
        let mut b = LevelRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_int(0, 1000), b.next_int(0, 1000));
        }
    }

    #[test]
    fn test_adjacent_seeds_diverge() {
        let mut a = LevelRng::new(1);
        let mut b = LevelRng::new(2);
        let xs: Vec<_> = (0..16).map(|_| a.next_int(0, 1_000_000)).collect();
        let ys: Vec<_> = (0..16).map(|_| b.next_int(0, 1_000_000)).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_degenerate_range_does_not_draw() {
        let mut a = LevelRng::new(7);
        let mut b = LevelRng::new(7);
        assert_eq!(a.next_int(5, 6), 5);
        assert_eq!(a.next_int(5, 5), 5);
        assert_eq!(a.next_int(5, 2), 5);
        assert_eq!(a.next_index(1), 0);
        // Stream is untouched by the calls above.
        assert_eq!(a.next_int(0, 1 << 30), b.next_int(0, 1 << 30));
    }

    #[test]
    fn test_next_int_stays_in_range() {
        let mut rng = LevelRng::new(3);
        for _ in 0..1000 {
            let v = rng.next_int(-4, 4);
            assert!((-4..4).contains(&v));
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = LevelRng::new(9);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_reseed_restarts_stream() {
        let mut rng = LevelRng::new(11);
        let first: Vec<_> = (0..8).map(|_| rng.next_int(0, 100)).collect();
        rng.reseed(11);
        let again: Vec<_> = (0..8).map(|_| rng.next_int(0, 100)).collect();
        assert_eq!(first, again);
    }
}
