//! Rules for assigning sizes to freshly created stub objects.

use std::fmt;

use smallvec::SmallVec;

use crate::rng::RandomSource;
use crate::shape::Shape;
use crate::sym_expr::SymExpr;

/// Errors reported when building a policy from runtime values.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyError {
    /// A range's lower bound is greater than its upper bound.
    EmptyRange { lo: i64, hi: i64 },
    /// A class count too large to index with an `i64` label.
    TooManyClasses { count: usize },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRange { lo, hi } => write!(f, "range [{}, {}] is empty", lo, hi),
            Self::TooManyClasses { count } => {
                write!(f, "class count {} exceeds the largest label", count)
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Closed integer interval `[lo, hi]` with `lo <= hi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntRange {
    lo: i64,
    hi: i64,
}

impl IntRange {
    pub fn new(lo: i64, hi: i64) -> Result<IntRange, PolicyError> {
        if lo > hi {
            return Err(PolicyError::EmptyRange { lo, hi });
        }
        Ok(IntRange { lo, hi })
    }

    /// Create a range in a constant context.
    ///
    /// Evaluating this with `lo > hi` inside a `const` item fails the build.
    pub const fn constant(lo: i64, hi: i64) -> IntRange {
        assert!(lo <= hi, "empty range");
        IntRange { lo, hi }
    }

    /// Range of class indices for a classifier with `n` classes, ie.
    /// `[0, n - 1]`.
    pub fn classes(n: usize) -> Result<IntRange, PolicyError> {
        let hi = i64::try_from(n)
            .map_err(|_| PolicyError::TooManyClasses { count: n })?
            .checked_sub(1)
            .ok_or(PolicyError::EmptyRange { lo: 0, hi: -1 })?;
        IntRange::new(0, hi)
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.lo..=self.hi).contains(&value)
    }

    /// Number of values in the range, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        self.hi.abs_diff(self.lo).saturating_add(1)
    }

    /// Always false, since ranges cannot be empty.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

/// How one dimension of a generated shape is chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum DimPolicy {
    /// Always this size.
    Fixed(i64),
    /// A size drawn uniformly from the range each time.
    Range(IntRange),
    /// A placeholder supplied by the host, passed through unchanged.
    Symbolic(SymExpr),
}

impl DimPolicy {
    pub fn range(lo: i64, hi: i64) -> Result<DimPolicy, PolicyError> {
        IntRange::new(lo, hi).map(DimPolicy::Range)
    }

    fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> SymExpr {
        match self {
            Self::Fixed(size) => SymExpr::Value(*size),
            Self::Range(range) => SymExpr::Value(rng.int_in(*range)),
            Self::Symbolic(expr) => expr.clone(),
        }
    }

    /// Return true if `size` is a value this policy can produce.
    pub fn admits(&self, size: &SymExpr) -> bool {
        match (self, size) {
            (Self::Fixed(expected), SymExpr::Value(size)) => expected == size,
            (Self::Range(range), SymExpr::Value(size)) => range.contains(*size),
            (Self::Symbolic(expr), size) => expr == size,
            _ => false,
        }
    }
}

impl From<i64> for DimPolicy {
    fn from(size: i64) -> Self {
        DimPolicy::Fixed(size)
    }
}

impl From<IntRange> for DimPolicy {
    fn from(range: IntRange) -> Self {
        DimPolicy::Range(range)
    }
}

impl From<SymExpr> for DimPolicy {
    fn from(expr: SymExpr) -> Self {
        match expr {
            SymExpr::Value(size) => DimPolicy::Fixed(size),
            expr => DimPolicy::Symbolic(expr),
        }
    }
}

/// Per-dimension table used to produce the shape of a new stub object.
///
/// ```
/// use pystub_shape::{DimPolicy, ShapePolicy, SymExpr};
///
/// let mut rng = fastrand::Rng::with_seed(0);
/// let policy = ShapePolicy::new([
///     DimPolicy::Fixed(1),
///     DimPolicy::range(256, 1280).unwrap(),
///     DimPolicy::Symbolic(SymExpr::from("width")),
/// ]);
/// let shape = policy.sample(&mut rng);
/// assert!(policy.admits(&shape));
/// assert_eq!(shape.dim(2), Some(&SymExpr::from("width")));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapePolicy {
    dims: SmallVec<[DimPolicy; 4]>,
}

impl ShapePolicy {
    pub fn new<I: IntoIterator<Item = DimPolicy>>(dims: I) -> ShapePolicy {
        ShapePolicy {
            dims: dims.into_iter().collect(),
        }
    }

    /// Policy that always produces the same concrete shape.
    pub fn fixed(sizes: &[i64]) -> ShapePolicy {
        ShapePolicy::new(sizes.iter().copied().map(DimPolicy::Fixed))
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[DimPolicy] {
        &self.dims
    }

    /// Return a copy with the policy for dimension `index` replaced.
    ///
    /// Panics if `index` is out of bounds.
    pub fn with_dim(&self, index: usize, dim: DimPolicy) -> ShapePolicy {
        let mut dims = self.dims.clone();
        dims[index] = dim;
        ShapePolicy { dims }
    }

    /// Return true if every dimension has a fixed size.
    pub fn is_fixed(&self) -> bool {
        self.dims.iter().all(|d| matches!(d, DimPolicy::Fixed(_)))
    }

    /// Produce a shape, drawing one value for each ranged dimension.
    pub fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Shape {
        self.dims.iter().map(|d| d.sample(rng)).collect()
    }

    /// Return true if `shape` is a shape this policy can produce.
    pub fn admits(&self, shape: &Shape) -> bool {
        shape.ndim() == self.ndim()
            && self
                .dims
                .iter()
                .zip(shape.dims())
                .all(|(policy, size)| policy.admits(size))
    }
}
