//! Deterministic pseudo-randomness for reproducible splits
//!
//! The same seed yields the same sequence on every platform.

use std::num::Wrapping;

/// Linear congruential generator with the glibc constants
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 1_103_515_245;
    const INCREMENT: u64 = 12_345;
    const MODULUS: u64 = 1 << 31;

    /// Seeds above `2^31` are folded so every bit of the seed matters.
    pub fn new(seed: u64) -> Self {
        let folded = seed ^ (seed >> 31) ^ (seed >> 62);
        Self {
            state: Wrapping(folded % Self::MODULUS),
        }
    }

    /// Next raw value in `[0, 2^31)`.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        (self.state.0 & (Self::MODULUS - 1)) as u32
    }

    /// Uniform value in `[0, max)`.
    ///
    /// The low bits of an LCG cycle with short periods, so the range is
    /// scaled from the full 31-bit output instead of taken modulo.
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        ((u64::from(self.next_u32()) * max as u64) >> 31) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..1000 {
            assert!(rng.next_range(10) < 10);
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut items: Vec<usize> = (0..50).collect();
        LcgRng::new(7).shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn test_high_seed_bits_change_the_sequence() {
        for high in [1u64 << 31, 1 << 32, 1 << 47, 1 << 63] {
            let mut low = LcgRng::new(5);
            let mut wide = LcgRng::new(5 | high);
            assert_ne!(low.next_u32(), wide.next_u32(), "bit {high:#x} ignored");
        }
        // Seeds below 2^31 are used as is.
        let mut direct = LcgRng::new(42);
        let mut state = Wrapping(42u64);
        state = state * Wrapping(LcgRng::MULTIPLIER) + Wrapping(LcgRng::INCREMENT);
        assert_eq!(u64::from(direct.next_u32()), state.0 & (LcgRng::MODULUS - 1));
    }

    #[test]
    fn test_different_seeds_shuffle_differently() {
        let mut a: Vec<usize> = (0..20).collect();
        let mut b = a.clone();
        LcgRng::new(1).shuffle(&mut a);
        LcgRng::new(2).shuffle(&mut b);
        assert_ne!(a, b);
    }
}
