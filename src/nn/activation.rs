use pystub_shape::{resolve_axis, Shape};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{one_input, Module, ShapeError};

/// Rectified linear unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReLU {
    pub inplace: bool,
}

impl Module for ReLU {
    fn name(&self) -> &str {
        "ReLU"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        one_input(inputs).cloned()
    }
}

impl FromArgs for ReLU {
    const SIGNATURE: Signature = Signature::new(&["inplace"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(ReLU {
            inplace: args.bool_or("inplace", false),
        })
    }
}

/// Leaky rectified linear unit.
#[derive(Clone, Debug, PartialEq)]
pub struct LeakyReLU {
    pub negative_slope: f64,
    pub inplace: bool,
}

impl Default for LeakyReLU {
    fn default() -> Self {
        LeakyReLU {
            negative_slope: 0.01,
            inplace: false,
        }
    }
}

impl Module for LeakyReLU {
    fn name(&self) -> &str {
        "LeakyReLU"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        one_input(inputs).cloned()
    }
}

impl FromArgs for LeakyReLU {
    const SIGNATURE: Signature = Signature::new(&["negative_slope", "inplace"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(LeakyReLU {
            negative_slope: args.float_or("negative_slope", 0.01)?,
            inplace: args.bool_or("inplace", false),
        })
    }
}

/// Softmax along `dim`.
///
/// When `dim` is `None`, PyTorch picks an axis based on the input rank. The
/// output shape is the same either way.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Softmax {
    pub dim: Option<i64>,
}

impl Module for Softmax {
    fn name(&self) -> &str {
        "Softmax"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        if let Some(dim) = self.dim {
            // Scalars accept dims 0 and -1.
            let ndim = input.ndim().max(1);
            if resolve_axis(ndim, dim).is_none() {
                return Err(ShapeError::InvalidValue(format!(
                    "dimension out of range (expected to be in range of [{}, {}], but got {})",
                    -(ndim as i64),
                    ndim - 1,
                    dim
                )));
            }
        }
        Ok(input.clone())
    }
}

impl FromArgs for Softmax {
    const SIGNATURE: Signature = Signature::new(&["dim"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(Softmax {
            dim: args.opt_int("dim")?,
        })
    }
}
