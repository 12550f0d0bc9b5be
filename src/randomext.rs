//! Seeded random sources. Structural draws (counts, choices) are always
//! uniform; literal values go through [`Randomness::value_between`], which the
//! multi-range sources bias toward edge cases.

use libafl_bolts::rands::{Rand, StdRand};

pub trait Randomness {
    /// Uniform draw in `[lo, hi)`.
    fn long_between(&mut self, lo: i64, hi: i64) -> i64;

    /// Uniform draw in `[lo, hi)`.
    fn float_between(&mut self, lo: f32, hi: f32) -> f32;

    /// Draw in `[lo, hi)` for a literal value.
    fn value_between(&mut self, lo: i64, hi: i64) -> i64 {
        self.long_between(lo, hi)
    }

    fn long_below(&mut self, bound: i64) -> i64 {
        self.long_between(0, bound)
    }

    fn int_below(&mut self, bound: i32) -> i32 {
        self.long_between(0, bound as i64) as i32
    }

    fn int_between(&mut self, lo: i32, hi: i32) -> i32 {
        self.long_between(lo as i64, hi as i64) as i32
    }

    fn boolean(&mut self) -> bool {
        self.long_between(0, 2) == 1
    }

    fn probability(&mut self, p: f64) -> bool {
        assert!((0.0..=1.0).contains(&p));
        p * 10000f64 >= self.long_between(1, 10001) as f64
    }
}

pub trait RandomnessExt: Randomness {
    fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "choosing from an empty set");
        self.long_below(len as i64) as usize
    }

    fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.index(items.len())]
    }

    /// Index drawn proportionally to `weights`; `None` if all are zero.
    fn weighted(&mut self, weights: &[u32]) -> Option<usize> {
        let total: i64 = weights.iter().map(|w| *w as i64).sum();
        if total == 0 {
            return None;
        }
        let mut pick = self.long_below(total);
        for (idx, weight) in weights.iter().enumerate() {
            if pick < *weight as i64 {
                return Some(idx);
            }
            pick -= *weight as i64;
        }
        unreachable!("pick is below the weight total")
    }
}

impl<R: Randomness + ?Sized> RandomnessExt for R {}

fn std_between(rng: &mut StdRand, lo: i64, hi: i64) -> i64 {
    assert!(lo < hi, "empty range [{lo}, {hi})");
    let span = (hi as i128 - lo as i128) as u64;
    (lo as i128 + rng.below(span) as i128) as i64
}

fn std_float(rng: &mut StdRand, lo: f32, hi: f32) -> f32 {
    let unit = (rng.next() >> 40) as f32 / (1u64 << 24) as f32;
    lo + (hi - lo) * unit
}

#[derive(Debug)]
pub struct UniformRandom {
    rng: StdRand,
}

impl UniformRandom {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRand::with_seed(seed),
        }
    }
}

impl Randomness for UniformRandom {
    fn long_between(&mut self, lo: i64, hi: i64) -> i64 {
        std_between(&mut self.rng, lo, hi)
    }

    fn float_between(&mut self, lo: f32, hi: f32) -> f32 {
        std_float(&mut self.rng, lo, hi)
    }
}

/// Mixes uniform value draws with draws from small values, values near the
/// range limits and, unless disabled, the special set `0, ±1, ±2, MIN, MAX`.
#[derive(Debug)]
pub struct MultiRangeRandom {
    rng: StdRand,
    special: bool,
}

impl MultiRangeRandom {
    const WINDOW: i64 = 16;

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRand::with_seed(seed),
            special: true,
        }
    }

    /// The multi-range source without the special value set.
    pub fn without_special(seed: u64) -> Self {
        Self {
            rng: StdRand::with_seed(seed),
            special: false,
        }
    }

    fn special_value(&mut self, lo: i64, hi: i64) -> Option<i64> {
        let candidates = [0, 1, -1, 2, -2, lo, hi - 1];
        let in_range: Vec<i64> = candidates
            .into_iter()
            .filter(|v| (lo..hi).contains(v))
            .collect();
        if in_range.is_empty() {
            None
        } else {
            let idx = self.rng.below(in_range.len() as u64) as usize;
            Some(in_range[idx])
        }
    }

    fn small_value(&mut self, lo: i64, hi: i64) -> i64 {
        let small_lo = lo.max(-Self::WINDOW);
        let small_hi = hi.min(Self::WINDOW + 1);
        if small_lo < small_hi {
            std_between(&mut self.rng, small_lo, small_hi)
        } else {
            std_between(&mut self.rng, lo, hi)
        }
    }

    fn near_limit_value(&mut self, lo: i64, hi: i64) -> i64 {
        if self.rng.below(2) == 0 {
            std_between(&mut self.rng, lo, hi.min(lo.saturating_add(Self::WINDOW)))
        } else {
            std_between(&mut self.rng, lo.max(hi.saturating_sub(Self::WINDOW)), hi)
        }
    }
}

impl Randomness for MultiRangeRandom {
    fn long_between(&mut self, lo: i64, hi: i64) -> i64 {
        std_between(&mut self.rng, lo, hi)
    }

    fn float_between(&mut self, lo: f32, hi: f32) -> f32 {
        std_float(&mut self.rng, lo, hi)
    }

    fn value_between(&mut self, lo: i64, hi: i64) -> i64 {
        let buckets = if self.special { 4 } else { 3 };
        match self.rng.below(buckets) {
            0 => std_between(&mut self.rng, lo, hi),
            1 => self.small_value(lo, hi),
            2 => self.near_limit_value(lo, hi),
            _ => match self.special_value(lo, hi) {
                Some(value) => value,
                None => std_between(&mut self.rng, lo, hi),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RandomGeneratorKind {
    #[value(name = "multiplerange")]
    MultipleRange,
    #[value(name = "nospecial")]
    NoSpecial,
    Uniform,
}

impl RandomGeneratorKind {
    pub fn build(self, seed: u64) -> Box<dyn Randomness> {
        match self {
            Self::MultipleRange => Box::new(MultiRangeRandom::with_seed(seed)),
            Self::NoSpecial => Box::new(MultiRangeRandom::without_special(seed)),
            Self::Uniform => Box::new(UniformRandom::with_seed(seed)),
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::Randomness;

    /// Returns scripted offsets into each requested range; once the script
    /// runs dry every draw yields the lower bound.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedRandom {
        script: VecDeque<i64>,
    }

    impl ScriptedRandom {
        pub(crate) fn new(script: impl IntoIterator<Item = i64>) -> Self {
            Self {
                script: script.into_iter().collect(),
            }
        }
    }

    impl Randomness for ScriptedRandom {
        fn long_between(&mut self, lo: i64, hi: i64) -> i64 {
            assert!(lo < hi, "empty range [{lo}, {hi})");
            let span = hi as i128 - lo as i128;
            let offset = self.script.pop_front().unwrap_or(0) as i128;
            (lo as i128 + offset.rem_euclid(span)) as i64
        }

        fn float_between(&mut self, lo: f32, hi: f32) -> f32 {
            let offset = self.script.pop_front().unwrap_or(0) as f32;
            (lo + offset).min(hi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{scripted::ScriptedRandom, *};

    #[test]
    fn uniform_draws_stay_in_range() {
        let mut rng = UniformRandom::with_seed(7);
        for _ in 0..1000 {
            let v = rng.int_between(-3, 5);
            assert!((-3..5).contains(&v));
            let f = rng.float_between(1.0, 2.0);
            assert!((1.0..=2.0).contains(&f));
        }
    }

    #[test]
    fn multi_range_hits_edge_values() {
        let mut rng = MultiRangeRandom::with_seed(1);
        let draws: Vec<i64> = (0..4000)
            .map(|_| rng.value_between(i32::MIN as i64, i32::MAX as i64 + 1))
            .collect();
        assert!(draws.contains(&(i32::MIN as i64)));
        assert!(draws.contains(&(i32::MAX as i64)));
        assert!(draws.contains(&0));
        assert!(draws
            .iter()
            .all(|v| (i32::MIN as i64..=i32::MAX as i64).contains(v)));
    }

    #[test]
    fn scripted_source_replays_offsets() {
        let mut rng = ScriptedRandom::new([2, 7, 1]);
        assert_eq!(rng.int_between(10, 20), 12);
        assert_eq!(rng.int_below(5), 2);
        assert!(rng.boolean());
        assert_eq!(rng.int_below(5), 0);
    }

    #[test]
    fn weighted_choice_skips_zero_weights() {
        let mut rng = ScriptedRandom::new([0, 3]);
        assert_eq!(rng.weighted(&[0, 2, 2]), Some(1));
        assert_eq!(rng.weighted(&[0, 2, 2]), Some(2));
        assert_eq!(rng.weighted(&[0, 0]), None);
    }
}
