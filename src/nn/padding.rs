use pystub_shape::{Shape, SymExpr};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{check_rank, one_input, Module, ShapeError};

/// Pads the last two dims by reflecting the input at the border.
#[derive(Clone, Debug, PartialEq)]
pub struct ReflectionPad2d {
    /// Padding as `(left, right, top, bottom)`.
    pub padding: [usize; 4],
}

impl ReflectionPad2d {
    pub fn new(padding: [usize; 4]) -> ReflectionPad2d {
        ReflectionPad2d { padding }
    }

    /// Pad each side by the same amount.
    pub fn uniform(padding: usize) -> ReflectionPad2d {
        ReflectionPad2d::new([padding; 4])
    }
}

/// Pad a dimension of size `size` by `start` and `end`. Reflection padding
/// requires each side's padding to be smaller than the size.
fn reflect_pad(size: &SymExpr, start: usize, end: usize) -> Result<SymExpr, ShapeError> {
    if let Some(size) = size.as_value() {
        let widest = start.max(end) as i64;
        if widest >= size {
            return Err(ShapeError::InvalidValue(format!(
                "padding size should be less than the corresponding input dimension, but got padding {} for dimension of size {}",
                widest, size
            )));
        }
    }
    Ok((size.clone() + SymExpr::size(start + end)).simplify())
}

impl Module for ReflectionPad2d {
    fn name(&self) -> &str {
        "ReflectionPad2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        check_rank(input, 3, 4, "3D or 4D")?;

        let [left, right, top, bottom] = self.padding;
        let ndim = input.ndim();
        let height = reflect_pad(&input.dims()[ndim - 2], top, bottom)?;
        let width = reflect_pad(&input.dims()[ndim - 1], left, right)?;
        Ok(input.with_dim(ndim - 2, height).with_dim(ndim - 1, width))
    }
}

impl FromArgs for ReflectionPad2d {
    const SIGNATURE: Signature = Signature::new(&["padding"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let value = args.required("padding")?;
        Ok(ReflectionPad2d {
            padding: args.non_negative_tuple("padding", value)?,
        })
    }
}
