use pystub_shape::{Shape, SymExpr};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::conv::output_size;
use crate::nn::module::{check_rank, one_input, Module, ShapeError};

/// Compute the output shape of a 2D pooling layer over the last two dims.
fn pool_2d(
    input: &Shape,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    dilation: [usize; 2],
    ceil_mode: bool,
) -> Result<Shape, ShapeError> {
    check_rank(input, 3, 4, "3D or 4D")?;
    let ndim = input.ndim();
    let mut out = input.clone();
    for i in 0..2 {
        let axis = ndim - 2 + i;
        let size = output_size(
            &input.dims()[axis],
            kernel_size[i],
            stride[i],
            dilation[i],
            padding[i],
            ceil_mode,
        )?;
        out = out.with_dim(axis, size);
    }
    Ok(out)
}

/// Read the `kernel_size`, `stride` and `padding` parameters shared by the
/// pooling layers.
///
/// `stride` defaults to the kernel size. Padding may be at most half the
/// kernel size.
fn read_window(args: &mut BoundArgs) -> Result<([usize; 2], [usize; 2], [usize; 2]), ArgError> {
    let kernel_size = args.positive_pair("kernel_size")?;
    let stride = args.opt_positive_pair("stride")?.unwrap_or(kernel_size);
    let padding = args.non_negative_tuple_or("padding", [0, 0])?;
    if padding.iter().zip(kernel_size).any(|(p, k)| *p > k / 2) {
        return Err(args.value_error(
            "padding",
            "pad should be at most half of effective kernel size",
        ));
    }
    Ok((kernel_size, stride, padding))
}

/// 2D max pooling.
#[derive(Clone, Debug, PartialEq)]
pub struct MaxPool2d {
    pub kernel_size: [usize; 2],
    pub stride: [usize; 2],
    pub padding: [usize; 2],
    pub dilation: [usize; 2],
    pub return_indices: bool,
    pub ceil_mode: bool,
}

impl MaxPool2d {
    pub fn new(kernel_size: [usize; 2]) -> MaxPool2d {
        MaxPool2d {
            kernel_size,
            stride: kernel_size,
            padding: [0, 0],
            dilation: [1, 1],
            return_indices: false,
            ceil_mode: false,
        }
    }
}

impl Module for MaxPool2d {
    fn name(&self) -> &str {
        "MaxPool2d"
    }

    // With `return_indices` the indices output has the same shape as the
    // values.
    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        pool_2d(
            one_input(inputs)?,
            self.kernel_size,
            self.stride,
            self.padding,
            self.dilation,
            self.ceil_mode,
        )
    }
}

impl FromArgs for MaxPool2d {
    const SIGNATURE: Signature = Signature::new(&[
        "kernel_size",
        "stride",
        "padding",
        "dilation",
        "return_indices",
        "ceil_mode",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let (kernel_size, stride, padding) = read_window(args)?;
        Ok(MaxPool2d {
            kernel_size,
            stride,
            padding,
            dilation: args.opt_positive_pair("dilation")?.unwrap_or([1, 1]),
            return_indices: args.bool_or("return_indices", false),
            ceil_mode: args.bool_or("ceil_mode", false),
        })
    }
}

/// 2D average pooling.
#[derive(Clone, Debug, PartialEq)]
pub struct AvgPool2d {
    pub kernel_size: [usize; 2],
    pub stride: [usize; 2],
    pub padding: [usize; 2],
    pub ceil_mode: bool,
    pub count_include_pad: bool,
    pub divisor_override: Option<i64>,
}

impl AvgPool2d {
    pub fn new(kernel_size: [usize; 2]) -> AvgPool2d {
        AvgPool2d {
            kernel_size,
            stride: kernel_size,
            padding: [0, 0],
            ceil_mode: false,
            count_include_pad: true,
            divisor_override: None,
        }
    }
}

impl Module for AvgPool2d {
    fn name(&self) -> &str {
        "AvgPool2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        pool_2d(
            one_input(inputs)?,
            self.kernel_size,
            self.stride,
            self.padding,
            [1, 1],
            self.ceil_mode,
        )
    }
}

impl FromArgs for AvgPool2d {
    const SIGNATURE: Signature = Signature::new(&[
        "kernel_size",
        "stride",
        "padding",
        "ceil_mode",
        "count_include_pad",
        "divisor_override",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let (kernel_size, stride, padding) = read_window(args)?;
        let ceil_mode = args.bool_or("ceil_mode", false);
        let count_include_pad = args.bool_or("count_include_pad", true);
        let divisor_override = args.opt_int("divisor_override")?;
        if divisor_override == Some(0) {
            return Err(args.value_error("divisor_override", "divisor must be not zero"));
        }
        Ok(AvgPool2d {
            kernel_size,
            stride,
            padding,
            ceil_mode,
            count_include_pad,
            divisor_override,
        })
    }
}

/// 2D adaptive average pooling to a target `(height, width)`.
///
/// A `None` entry keeps the input size of that dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveAvgPool2d {
    pub output_size: [Option<usize>; 2],
}

impl AdaptiveAvgPool2d {
    pub fn new(output_size: [Option<usize>; 2]) -> AdaptiveAvgPool2d {
        AdaptiveAvgPool2d { output_size }
    }
}

impl Module for AdaptiveAvgPool2d {
    fn name(&self) -> &str {
        "AdaptiveAvgPool2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        check_rank(input, 3, 4, "3D or 4D")?;
        let ndim = input.ndim();
        let mut out = input.clone();
        for (i, size) in self.output_size.iter().enumerate() {
            if let Some(size) = size {
                out = out.with_dim(ndim - 2 + i, SymExpr::size(*size));
            }
        }
        Ok(out)
    }
}

impl FromArgs for AdaptiveAvgPool2d {
    const SIGNATURE: Signature = Signature::new(&["output_size"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(AdaptiveAvgPool2d {
            output_size: args.output_size("output_size")?,
        })
    }
}
