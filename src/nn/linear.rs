use pystub_shape::{Shape, SymExpr};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{check_dim, one_input, Module, ShapeError};

/// Fully connected layer applied to the last dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Linear {
    pub in_features: SymExpr,
    pub out_features: SymExpr,
    pub bias: bool,
}

impl Linear {
    pub fn new(in_features: impl Into<SymExpr>, out_features: impl Into<SymExpr>) -> Linear {
        Linear {
            in_features: in_features.into(),
            out_features: out_features.into(),
            bias: true,
        }
    }
}

impl Module for Linear {
    fn name(&self) -> &str {
        "Linear"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        let Some(last) = input.ndim().checked_sub(1) else {
            return Err(ShapeError::IncorrectRank {
                expected: "at least 1D",
                actual: 0,
            });
        };
        check_dim("input features", &self.in_features, &input.dims()[last])?;
        Ok(input.with_dim(last, self.out_features.clone()))
    }
}

impl FromArgs for Linear {
    const SIGNATURE: Signature =
        Signature::new(&["in_features", "out_features", "bias", "device", "dtype"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(Linear {
            in_features: args.positive_dim("in_features")?,
            out_features: args.positive_dim("out_features")?,
            bias: args.bool_or("bias", true),
        })
    }
}
