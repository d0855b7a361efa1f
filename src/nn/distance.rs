use pystub_shape::{resolve_axis, Shape};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{broadcast_shapes, two_inputs, Module, ShapeError};

/// Cosine similarity between two inputs along `dim`.
///
/// The inputs are broadcast together and `dim` is removed from the result.
#[derive(Clone, Debug, PartialEq)]
pub struct CosineSimilarity {
    pub dim: i64,
    pub eps: f64,
}

impl Default for CosineSimilarity {
    fn default() -> Self {
        CosineSimilarity { dim: 1, eps: 1e-8 }
    }
}

impl Module for CosineSimilarity {
    fn name(&self) -> &str {
        "CosineSimilarity"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let (x1, x2) = two_inputs(inputs)?;
        let shape = broadcast_shapes(x1, x2)?;
        let axis = resolve_axis(shape.ndim(), self.dim).ok_or_else(|| {
            ShapeError::InvalidValue(format!(
                "dimension {} out of range for {}D input",
                self.dim,
                shape.ndim()
            ))
        })?;
        Ok(shape.without_dim(axis))
    }
}

impl FromArgs for CosineSimilarity {
    const SIGNATURE: Signature = Signature::new(&["dim", "eps"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(CosineSimilarity {
            dim: args.int_or("dim", 1)?,
            eps: args.float_or("eps", 1e-8)?,
        })
    }
}
