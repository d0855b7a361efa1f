//! Internal testing utilities for the pystub crates.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Debug` struct, conventionally named `Case`, describing one case,
/// build a collection of them and call `test_each` with the test body. Every
/// case runs even if an earlier one panics; failing cases are reported
/// together at the end.
///
/// ```
/// use pystub_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     size: i64,
///     kernel: i64,
///     expected: i64,
/// }
///
/// let cases = [
///     Case { size: 28, kernel: 3, expected: 26 },
///     Case { size: 32, kernel: 5, expected: 28 },
/// ];
///
/// cases.test_each(|case| {
///     assert_eq!(case.size - case.kernel + 1, case.expected);
/// });
/// ```
///
/// Cases and the test closure must be unwind safe. Wrap values with interior
/// mutability in [`AssertUnwindSafe`](std::panic::AssertUnwindSafe), or
/// create them inside the test body.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes each
    /// test function an owned clone of the case.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let value = case.clone();
                std::panic::catch_unwind(move || test(value)).is_err()
            })
            .collect();
        report_failures(&failures);
    }
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

/// Counts how often each integer value was observed.
///
/// Used to check that randomly drawn labels or sizes stay inside a closed
/// range and reach every value in it.
#[derive(Clone, Debug, Default)]
pub struct Histogram {
    counts: BTreeMap<i64, usize>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: i64) {
        *self.counts.entry(value).or_default() += 1;
    }

    /// Total number of recorded values.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, value: i64) -> usize {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    pub fn min(&self) -> Option<i64> {
        self.counts.keys().next().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.counts.keys().next_back().copied()
    }

    /// Return the values in `[lo, hi]` that were never recorded.
    pub fn missing(&self, lo: i64, hi: i64) -> Vec<i64> {
        (lo..=hi).filter(|v| !self.counts.contains_key(v)).collect()
    }

    /// Return true if the recorded values are exactly the integers in
    /// `[lo, hi]`: every one of them occurs and nothing outside occurs.
    pub fn covers_exactly(&self, lo: i64, hi: i64) -> bool {
        self.min() == Some(lo) && self.max() == Some(hi) && self.missing(lo, hi).is_empty()
    }
}

impl FromIterator<i64> for Histogram {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        let mut hist = Histogram::new();
        for value in iter {
            hist.record(value);
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram, TestCases};

    #[test]
    fn test_test_cases_success() {
        #[derive(Clone, Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.clone().test_each(|case| _ = case.x);
        cases.test_each_clone(|case| _ = case.x);
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_test_each_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| {
            _ = case.x;
            panic!("oh no");
        })
    }

    #[test]
    #[should_panic(expected = "1 test cases failed")]
    fn test_test_each_clone_failure() {
        #[derive(Clone, Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each_clone(|case| assert_eq!(case.x, 1))
    }

    #[test]
    fn test_histogram() {
        let hist: Histogram = [0, 1, 1, 2, 4].into_iter().collect();
        assert_eq!(hist.total(), 5);
        assert_eq!(hist.count(1), 2);
        assert_eq!(hist.count(3), 0);
        assert_eq!(hist.min(), Some(0));
        assert_eq!(hist.max(), Some(4));
        assert_eq!(hist.missing(0, 4), [3]);
        assert!(!hist.covers_exactly(0, 4));

        let hist: Histogram = (0..=9).collect();
        assert!(hist.covers_exactly(0, 9));
        assert!(!hist.covers_exactly(0, 10));
        assert!(!hist.covers_exactly(1, 9));
    }
}
