//! Shape descriptors with concrete or symbolic dimensions.

use std::fmt;

use smallvec::SmallVec;

use crate::sym_expr::SymExpr;

/// Ordered sequence of dimension sizes.
///
/// Each dimension is a [`SymExpr`], so a shape can mix concrete sizes with
/// placeholders supplied by the host, eg. `(batch, 3, 28, 28)`.
///
/// ```
/// use pystub_shape::{shape, Shape, SymExpr};
///
/// let s = shape!["batch", 3, 28, 28];
/// assert_eq!(s.ndim(), 4);
/// assert_eq!(s.dim(1), Some(&SymExpr::from(3)));
/// assert_eq!(s.to_fixed(), None);
/// assert_eq!(s.to_string(), "(batch, 3, 28, 28)");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    dims: SmallVec<[SymExpr; 4]>,
}

impl Shape {
    pub fn new(dims: Vec<SymExpr>) -> Self {
        Shape { dims: dims.into() }
    }

    /// Create a shape whose sizes are all known.
    pub fn from_fixed(dims: &[usize]) -> Self {
        Shape {
            dims: dims.iter().copied().map(SymExpr::size).collect(),
        }
    }

    /// Create a zero-dimensional shape.
    pub fn scalar() -> Self {
        Shape::default()
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[SymExpr] {
        &self.dims
    }

    pub fn dim(&self, index: usize) -> Option<&SymExpr> {
        self.dims.get(index)
    }

    /// Return the size of the dimension given by an axis in `[-ndim, ndim)`.
    pub fn dim_at(&self, axis: i64) -> Option<&SymExpr> {
        resolve_axis(self.ndim(), axis).and_then(|i| self.dims.get(i))
    }

    /// Return the sizes as integers, or `None` if any size is symbolic or
    /// negative.
    pub fn to_fixed(&self) -> Option<Vec<usize>> {
        self.dims
            .iter()
            .map(|d| d.as_value().and_then(|v| usize::try_from(v).ok()))
            .collect()
    }

    /// Return true if every size is a known integer.
    pub fn is_fixed(&self) -> bool {
        self.dims.iter().all(|d| d.is_known())
    }

    /// Return an expression for the total number of elements.
    pub fn numel(&self) -> SymExpr {
        self.dims
            .iter()
            .cloned()
            .fold(SymExpr::Value(1), |prod, dim| prod * dim)
            .simplify()
    }

    /// Return a copy of this shape with the dimension at `index` replaced.
    pub fn with_dim(&self, index: usize, size: SymExpr) -> Shape {
        let mut dims = self.dims.clone();
        dims[index] = size;
        Shape { dims }
    }

    /// Return a copy of this shape with the dimension at `index` removed.
    pub fn without_dim(&self, index: usize) -> Shape {
        let mut dims = self.dims.clone();
        dims.remove(index);
        Shape { dims }
    }

    /// Simplify every dimension expression.
    pub fn simplify(&self) -> Shape {
        Shape {
            dims: self.dims.iter().map(|d| d.simplify()).collect(),
        }
    }
}

impl From<Vec<SymExpr>> for Shape {
    fn from(dims: Vec<SymExpr>) -> Self {
        Shape::new(dims)
    }
}

impl FromIterator<SymExpr> for Shape {
    fn from_iter<I: IntoIterator<Item = SymExpr>>(iter: I) -> Self {
        Shape {
            dims: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        // Match Python's tuple syntax for one-element shapes.
        if self.dims.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Resolve an axis given as a value in `[-ndim, ndim)` to a zero-based
/// dimension index, or return `None` if it is out of bounds.
pub fn resolve_axis(ndim: usize, axis: i64) -> Option<usize> {
    let ndim = ndim as i64;
    if axis < -ndim || axis >= ndim {
        return None;
    }
    Some(if axis >= 0 { axis } else { ndim + axis } as usize)
}

/// Create a [`Shape`] from a list of symbol names and sizes.
///
/// String literals become positive symbols and integers become known sizes.
#[macro_export]
macro_rules! shape {
    ($($x:expr),* $(,)?) => {
        $crate::Shape::new(vec![$($crate::SymExpr::from($x)),*])
    };
}
