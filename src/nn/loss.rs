use std::fmt;

use pystub_shape::Shape;

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{broadcast_shapes, check_dim, two_inputs, Module, ShapeError};

/// How a loss reduces per-element values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Reduction {
    None,
    #[default]
    Mean,
    Sum,
}

impl Reduction {
    /// Output shape for per-element losses of shape `shape`.
    fn apply(self, shape: Shape) -> Shape {
        match self {
            Reduction::None => shape,
            Reduction::Mean | Reduction::Sum => Shape::scalar(),
        }
    }

    fn from_args(args: &mut BoundArgs) -> Result<Reduction, ArgError> {
        let reduction = args.str_or("reduction", "mean")?;
        match reduction.as_str() {
            "none" => Ok(Reduction::None),
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            _ => Err(args.value_error(
                "reduction",
                format!("{} is not a valid value for reduction", reduction),
            )),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reduction::None => "none",
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
        };
        write!(f, "{}", name)
    }
}

/// Cross entropy between logits `(N, C, d1, ...)` or `(C,)` and a target.
///
/// The target is either class indices with the class dim removed, or class
/// probabilities with the same shape as the input.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossEntropyLoss {
    pub reduction: Reduction,
    pub ignore_index: i64,
    pub label_smoothing: f64,
}

impl CrossEntropyLoss {
    pub fn new(reduction: Reduction) -> CrossEntropyLoss {
        CrossEntropyLoss {
            reduction,
            ignore_index: -100,
            label_smoothing: 0.0,
        }
    }
}

impl Default for CrossEntropyLoss {
    fn default() -> Self {
        CrossEntropyLoss::new(Reduction::Mean)
    }
}

impl Module for CrossEntropyLoss {
    fn name(&self) -> &str {
        "CrossEntropyLoss"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let (input, target) = two_inputs(inputs)?;
        if input.ndim() == 0 {
            return Err(ShapeError::IncorrectRank {
                expected: "at least 1D",
                actual: 0,
            });
        }

        // Unbatched input has the class dim first, batched input second.
        let class_axis = if input.ndim() == 1 { 0 } else { 1 };
        let per_element = input.without_dim(class_axis);

        if target.ndim() == input.ndim() {
            for (expected, actual) in input.dims().iter().zip(target.dims()) {
                check_dim("target size", expected, actual)?;
            }
        } else if target.ndim() + 1 == input.ndim() {
            for (expected, actual) in per_element.dims().iter().zip(target.dims()) {
                check_dim("target size", expected, actual)?;
            }
        } else {
            return Err(ShapeError::IncorrectRank {
                expected: "target with the input rank or one less",
                actual: target.ndim(),
            });
        }

        Ok(self.reduction.apply(per_element))
    }
}

impl FromArgs for CrossEntropyLoss {
    const SIGNATURE: Signature = Signature::new(&[
        "weight",
        "size_average",
        "ignore_index",
        "reduce",
        "reduction",
        "label_smoothing",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let ignore_index = args.int_or("ignore_index", -100)?;
        let reduction = Reduction::from_args(args)?;
        let label_smoothing = args.float_or("label_smoothing", 0.0)?;
        if !(0.0..=1.0).contains(&label_smoothing) {
            return Err(args.value_error(
                "label_smoothing",
                "label_smoothing must be between 0.0 and 1.0",
            ));
        }
        Ok(CrossEntropyLoss {
            reduction,
            ignore_index,
            label_smoothing,
        })
    }
}

/// Mean squared error between an input and a target of broadcastable shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MSELoss {
    pub reduction: Reduction,
}

impl MSELoss {
    pub fn new(reduction: Reduction) -> MSELoss {
        MSELoss { reduction }
    }
}

impl Module for MSELoss {
    fn name(&self) -> &str {
        "MSELoss"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let (input, target) = two_inputs(inputs)?;
        let shape = broadcast_shapes(input, target)?;
        Ok(self.reduction.apply(shape))
    }
}

impl FromArgs for MSELoss {
    const SIGNATURE: Signature = Signature::new(&["size_average", "reduce", "reduction"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(MSELoss {
            reduction: Reduction::from_args(args)?,
        })
    }
}
