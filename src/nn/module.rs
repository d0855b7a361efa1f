use std::any::Any;
use std::fmt;
use std::sync::Arc;

use pystub_shape::{Shape, SymExpr};

use crate::tensor::{DType, Tensor};

/// Errors reported by [`Module::forward`] when inputs are not valid for a
/// layer.
///
/// Symbolic dimensions are never rejected. An error means the shapes are
/// known to be incompatible, and the real layer would raise at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeError {
    /// Too many or too few inputs were provided.
    IncorrectInputCount { expected: usize, actual: usize },

    /// An input's rank is not one the layer accepts.
    IncorrectRank {
        expected: &'static str,
        actual: usize,
    },

    /// A dimension does not match the size the layer requires, or two
    /// dimensions cannot be broadcast together.
    IncompatibleShapes {
        what: &'static str,
        expected: SymExpr,
        actual: SymExpr,
    },

    /// An axis, padding or output size is out of range for the input.
    InvalidValue(String),

    /// The module has no `forward`, eg. `ModuleList`.
    NotCallable(&'static str),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncorrectInputCount { expected, actual } => {
                write!(f, "expected {} inputs, got {}", expected, actual)
            }
            Self::IncorrectRank { expected, actual } => {
                write!(f, "expected {} input, got {}D input", expected, actual)
            }
            Self::IncompatibleShapes {
                what,
                expected,
                actual,
            } => write!(f, "{} mismatch: expected {}, got {}", what, expected, actual),
            Self::InvalidValue(msg) => write!(f, "{}", msg),
            Self::NotCallable(name) => write!(f, "{} is not callable", name),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Shape-level stand-in for a `torch.nn.Module`.
///
/// `forward` maps the shapes of the inputs to the shape of the output,
/// without any computation.
pub trait Module: Any + fmt::Debug + Send + Sync {
    /// Class name, eg. "Conv2d".
    fn name(&self) -> &str;

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError>;

    /// Submodules, for containers.
    fn children(&self) -> &[Arc<dyn Module>] {
        &[]
    }
}

impl dyn Module {
    /// Downcast this module to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref()
    }
}

/// Extension methods for [`Module`]s.
pub trait ModuleExt: Module {
    /// Call the module on tensor stubs, as `module(*inputs)` does.
    ///
    /// The output has the element type of the first input.
    fn call(&self, inputs: &[&Tensor]) -> Result<Tensor, ShapeError> {
        let shapes: Vec<Shape> = inputs.iter().map(|t| t.shape().clone()).collect();
        let dtype = inputs.first().map(|t| t.dtype()).unwrap_or(DType::Float32);
        let shape = self.forward(&shapes)?;
        Ok(Tensor::new(shape, dtype))
    }
}

impl<M: Module + ?Sized> ModuleExt for M {}

pub(crate) fn one_input(inputs: &[Shape]) -> Result<&Shape, ShapeError> {
    match inputs {
        [input] => Ok(input),
        _ => Err(ShapeError::IncorrectInputCount {
            expected: 1,
            actual: inputs.len(),
        }),
    }
}

pub(crate) fn two_inputs(inputs: &[Shape]) -> Result<(&Shape, &Shape), ShapeError> {
    match inputs {
        [a, b] => Ok((a, b)),
        _ => Err(ShapeError::IncorrectInputCount {
            expected: 2,
            actual: inputs.len(),
        }),
    }
}

/// Check that `shape` has a rank in `[min, max]`.
pub(crate) fn check_rank(
    shape: &Shape,
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), ShapeError> {
    if !(min..=max).contains(&shape.ndim()) {
        return Err(ShapeError::IncorrectRank {
            expected,
            actual: shape.ndim(),
        });
    }
    Ok(())
}

/// Check that a dimension has the size a layer requires.
///
/// Fails only if both sizes are known and differ.
pub(crate) fn check_dim(
    what: &'static str,
    expected: &SymExpr,
    actual: &SymExpr,
) -> Result<(), ShapeError> {
    match (expected, actual) {
        (SymExpr::Value(e), SymExpr::Value(a)) if e != a => Err(ShapeError::IncompatibleShapes {
            what,
            expected: expected.clone(),
            actual: actual.clone(),
        }),
        _ => Ok(()),
    }
}

/// Return the shape that results from broadcasting `a` and `b` together,
/// following NumPy's broadcasting rules.
pub(crate) fn broadcast_shapes(a: &Shape, b: &Shape) -> Result<Shape, ShapeError> {
    let a_pad = b.ndim().saturating_sub(a.ndim());
    let b_pad = a.ndim().saturating_sub(b.ndim());
    let one = SymExpr::Value(1);

    let a_iter = std::iter::repeat(&one).take(a_pad).chain(a.dims());
    let b_iter = std::iter::repeat(&one).take(b_pad).chain(b.dims());

    let mut out = Vec::with_capacity(a_pad + a.ndim());
    for (a, b) in a_iter.zip(b_iter) {
        let dim = match (a, b) {
            (a, b) if a == b => a.clone(),

            // If either size is 1, it is broadcast against the other.
            (SymExpr::Value(1), b) => b.clone(),
            (a, SymExpr::Value(1)) => a.clone(),

            (SymExpr::Value(_), SymExpr::Value(_)) => {
                return Err(ShapeError::IncompatibleShapes {
                    what: "broadcast dimension",
                    expected: a.clone(),
                    actual: b.clone(),
                });
            }

            // A fixed size other than 1 against a symbol can only succeed if
            // the symbol has the same size.
            (SymExpr::Value(_), _) => a.clone(),
            (_, SymExpr::Value(_)) => b.clone(),

            (a, b) => a.broadcast(b),
        };
        out.push(dim);
    }
    Ok(Shape::new(out))
}
