//! Sources of randomness for stub objects.
//!
//! Stubs never reach for a global generator. Each one owns a [`RandomSource`]
//! which is handed to it at construction, so that a host can make analysis
//! runs reproducible by seeding, or explore boundary cases by scripting the
//! draws with [`ScriptedRng`].

use crate::policy::IntRange;

/// Source of uniformly distributed integers.
pub trait RandomSource {
    /// Return a value drawn uniformly from `range`.
    fn int_in(&mut self, range: IntRange) -> i64;
}

impl RandomSource for fastrand::Rng {
    fn int_in(&mut self, range: IntRange) -> i64 {
        self.i64(range.lo()..=range.hi())
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn int_in(&mut self, range: IntRange) -> i64 {
        (**self).int_in(range)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn int_in(&mut self, range: IntRange) -> i64 {
        (**self).int_in(range)
    }
}

/// Which value of a range a [`ScriptedRng`] returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pick {
    /// The lower bound.
    Low,
    /// The upper bound.
    High,
    /// The lower bound plus an offset, wrapping around at the end of the
    /// range.
    Offset(u64),
}

/// Deterministic source that replays a fixed cycle of [`Pick`]s.
///
/// This lets a host evaluate a program under the smallest or largest sizes a
/// policy allows instead of under random ones.
#[derive(Clone, Debug)]
pub struct ScriptedRng {
    picks: Vec<Pick>,
    next: usize,
}

impl ScriptedRng {
    /// Create a source which cycles through `picks`.
    ///
    /// An empty script behaves like `[Pick::Low]`.
    pub fn new<I: IntoIterator<Item = Pick>>(picks: I) -> ScriptedRng {
        let mut picks: Vec<Pick> = picks.into_iter().collect();
        if picks.is_empty() {
            picks.push(Pick::Low);
        }
        ScriptedRng { picks, next: 0 }
    }

    /// Create a source which makes the same pick every time.
    pub fn repeat(pick: Pick) -> ScriptedRng {
        ScriptedRng::new([pick])
    }
}

impl RandomSource for ScriptedRng {
    fn int_in(&mut self, range: IntRange) -> i64 {
        let pick = self.picks[self.next];
        self.next = (self.next + 1) % self.picks.len();

        match pick {
            Pick::Low => range.lo(),
            Pick::High => range.hi(),
            Pick::Offset(offset) => range.lo().wrapping_add((offset % range.len()) as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Pick, RandomSource, ScriptedRng};
    use crate::policy::IntRange;

    #[test]
    fn test_fastrand_source() {
        let range = IntRange::new(-3, 3).unwrap();
        let mut rng = fastrand::Rng::with_seed(42);
        let mut seen = [false; 7];
        for _ in 0..1000 {
            let x = rng.int_in(range);
            assert!(range.contains(x));
            seen[(x + 3) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_seeded_sources_agree() {
        let range = IntRange::new(0, 1_000_000).unwrap();
        let mut a = fastrand::Rng::with_seed(7);
        let mut b = fastrand::Rng::with_seed(7);
        let xs: Vec<i64> = (0..10).map(|_| a.int_in(range)).collect();
        let ys: Vec<i64> = (0..10).map(|_| b.int_in(range)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_scripted_rng() {
        let range = IntRange::new(10, 14).unwrap();
        let mut rng = ScriptedRng::new([Pick::Low, Pick::High, Pick::Offset(2), Pick::Offset(7)]);
        let xs: Vec<i64> = (0..6).map(|_| rng.int_in(range)).collect();
        assert_eq!(xs, [10, 14, 12, 12, 10, 14]);

        let mut empty = ScriptedRng::new([]);
        assert_eq!(empty.int_in(range), 10);
    }

    #[test]
    fn test_boxed_source() {
        let mut rng: Box<dyn RandomSource> = Box::new(ScriptedRng::repeat(Pick::High));
        assert_eq!(rng.int_in(IntRange::new(0, 9).unwrap()), 9);
    }
}
