//! Randomness behind dodge/block rolls, AI choices, loot and jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of random rolls. The world owns one; tests script it.
pub trait Dice: Send {
    /// Uniform roll in `1..=100`
    fn percent(&mut self) -> i32;

    /// Uniform index in `0..len`; `len` must be non-zero
    fn pick(&mut self, len: usize) -> usize;

    /// Uniform integer in `lo..=hi`
    fn between(&mut self, lo: i32, hi: i32) -> i32;

    /// Uniform float in `lo..=hi`
    fn range(&mut self, lo: f64, hi: f64) -> f64;

    /// Succeeds with probability `pct` percent
    fn chance(&mut self, pct: i32) -> bool {
        self.percent() <= pct.clamp(0, 100)
    }
}

/// [`Dice`] backed by a `rand` generator
pub struct RandDice<R> {
    rng: R,
}

impl RandDice<StdRng> {
    /// Seeded for reproducible runs, or from OS entropy
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl<R: Rng + Send> Dice for RandDice<R> {
    fn percent(&mut self) -> i32 {
        self.rng.gen_range(1..=100)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len.max(1))
    }

    fn between(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}

#[cfg(test)]
pub use scripted::ScriptedDice;

#[cfg(test)]
mod scripted {
    use std::collections::VecDeque;

    use super::Dice;

    /// Deterministic dice for tests.
    ///
    /// Percent rolls come from the script and then stay at 100, so chance
    /// checks below 100% fail once the script runs dry. Picks default to the
    /// first candidate and ranges to their midpoint.
    #[derive(Debug, Default)]
    pub struct ScriptedDice {
        percents: VecDeque<i32>,
        picks: VecDeque<usize>,
        /// Number of percent rolls made so far
        pub rolls: usize,
    }

    impl ScriptedDice {
        pub fn new(percents: Vec<i32>) -> Self {
            Self {
                percents: percents.into(),
                ..Self::default()
            }
        }

        pub fn with_picks(mut self, picks: Vec<usize>) -> Self {
            self.picks = picks.into();
            self
        }
    }

    impl Dice for ScriptedDice {
        fn percent(&mut self) -> i32 {
            self.rolls += 1;
            self.percents.pop_front().unwrap_or(100)
        }

        fn pick(&mut self, len: usize) -> usize {
            self.picks.pop_front().unwrap_or(0).min(len.saturating_sub(1))
        }

        fn between(&mut self, lo: i32, hi: i32) -> i32 {
            lo + (hi - lo) / 2
        }

        fn range(&mut self, lo: f64, hi: f64) -> f64 {
            (lo + hi) / 2.0
        }
    }
}
