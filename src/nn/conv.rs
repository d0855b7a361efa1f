use pystub_shape::{Shape, SymExpr};

use crate::args::{ArgError, ArgValue, BoundArgs, FromArgs, Signature};
use crate::nn::module::{check_dim, check_rank, one_input, Module, ShapeError};

/// Return the output size for a spatial dimension in a convolution or pooling
/// layer.
///
/// The formula is the one given in the PyTorch docs for `Conv2d` and
/// `MaxPool2d`. `padding` is the padding added to each side. When
/// `ceil_mode` is set, a final window that would start in the right padding
/// is dropped, as PyTorch does.
pub(crate) fn output_size(
    in_size: &SymExpr,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
    padding: usize,
    ceil_mode: bool,
) -> Result<SymExpr, ShapeError> {
    if stride == 0 {
        return Err(ShapeError::InvalidValue("stride must be positive, got 0".to_string()));
    }
    let offset = (2 * padding) as i64 - (dilation * kernel_size.saturating_sub(1)) as i64 - 1;
    let numerator = in_size.clone() + SymExpr::Value(offset);
    let stride_expr = SymExpr::Value(stride as i64);
    let windows = if ceil_mode {
        numerator.div_ceil(&stride_expr)
    } else {
        numerator / stride_expr
    };
    let out_size = (windows + SymExpr::Value(1)).simplify();

    let Some(mut size) = out_size.as_value() else {
        return Ok(out_size);
    };
    if ceil_mode {
        if let Some(in_size) = in_size.as_value() {
            if (size - 1) * stride as i64 >= in_size + padding as i64 {
                size -= 1;
            }
        }
    }
    if size < 1 {
        return Err(ShapeError::InvalidValue(format!(
            "input size {} is too small for kernel size {}, output size would be {}",
            in_size, kernel_size, size
        )));
    }
    Ok(SymExpr::Value(size))
}

/// Padding of a [`Conv2d`] layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvPadding {
    /// Padding added to each side of the `(height, width)` dims. "valid"
    /// padding is `Fixed([0, 0])`.
    Fixed([usize; 2]),

    /// Pad so that the output has the same spatial size as the input.
    Same,
}

/// 2D convolution over `(N, C, H, W)` or `(C, H, W)` inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2d {
    pub in_channels: SymExpr,
    pub out_channels: SymExpr,
    pub kernel_size: [usize; 2],
    pub stride: [usize; 2],
    pub padding: ConvPadding,
    pub dilation: [usize; 2],
    pub groups: usize,
    pub bias: bool,
    pub padding_mode: String,
}

impl Conv2d {
    pub fn new(
        in_channels: impl Into<SymExpr>,
        out_channels: impl Into<SymExpr>,
        kernel_size: [usize; 2],
    ) -> Conv2d {
        Conv2d {
            in_channels: in_channels.into(),
            out_channels: out_channels.into(),
            kernel_size,
            stride: [1, 1],
            padding: ConvPadding::Fixed([0, 0]),
            dilation: [1, 1],
            groups: 1,
            bias: true,
            padding_mode: "zeros".to_string(),
        }
    }
}

impl Module for Conv2d {
    fn name(&self) -> &str {
        "Conv2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        check_rank(input, 3, 4, "3D or 4D")?;

        let ndim = input.ndim();
        let dims = input.dims();
        check_dim("input channels", &self.in_channels, &dims[ndim - 3])?;

        let mut out = input.with_dim(ndim - 3, self.out_channels.clone());
        for i in 0..2 {
            let axis = ndim - 2 + i;
            let size = match self.padding {
                ConvPadding::Same => dims[axis].clone(),
                ConvPadding::Fixed(padding) => output_size(
                    &dims[axis],
                    self.kernel_size[i],
                    self.stride[i],
                    self.dilation[i],
                    padding[i],
                    false,
                )?,
            };
            out = out.with_dim(axis, size);
        }
        Ok(out)
    }
}

impl FromArgs for Conv2d {
    const SIGNATURE: Signature = Signature::new(&[
        "in_channels",
        "out_channels",
        "kernel_size",
        "stride",
        "padding",
        "dilation",
        "groups",
        "bias",
        "padding_mode",
        "device",
        "dtype",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let in_channels = args.positive_dim("in_channels")?;
        let out_channels = args.positive_dim("out_channels")?;
        let kernel_size = args.positive_pair("kernel_size")?;
        let stride = args.opt_positive_pair("stride")?.unwrap_or([1, 1]);

        let padding = match args.take("padding") {
            None => ConvPadding::Fixed([0, 0]),
            Some(ArgValue::Str(mode)) => match mode.as_str() {
                "valid" => ConvPadding::Fixed([0, 0]),
                "same" => ConvPadding::Same,
                _ => {
                    return Err(args.value_error(
                        "padding",
                        format!("invalid padding string '{}'", mode),
                    ))
                }
            },
            Some(value) => ConvPadding::Fixed(args.non_negative_tuple("padding", value)?),
        };

        let dilation = args.opt_positive_pair("dilation")?.unwrap_or([1, 1]);
        let groups = match args.opt_int("groups")? {
            None => 1,
            Some(groups) if groups > 0 => groups as usize,
            Some(groups) => {
                return Err(args.value_error(
                    "groups",
                    format!("groups must be a positive integer, got {}", groups),
                ))
            }
        };
        let bias = args.bool_or("bias", true);
        let padding_mode = args.str_or("padding_mode", "zeros")?;

        // Symbolic channel counts can only be checked once they are known.
        let divisible = |channels: &SymExpr| {
            !matches!(channels.as_value(), Some(c) if c % groups as i64 != 0)
        };
        if !divisible(&in_channels) {
            return Err(args.value_error(
                "in_channels",
                "in_channels must be divisible by groups",
            ));
        }
        if !divisible(&out_channels) {
            return Err(args.value_error(
                "out_channels",
                "out_channels must be divisible by groups",
            ));
        }
        if padding == ConvPadding::Same && stride != [1, 1] {
            return Err(args.value_error(
                "padding",
                "padding='same' is not supported for strided convolutions",
            ));
        }
        if !["zeros", "reflect", "replicate", "circular"].contains(&padding_mode.as_str()) {
            return Err(args.value_error(
                "padding_mode",
                format!("unsupported padding mode '{}'", padding_mode),
            ));
        }

        Ok(Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            dilation,
            groups,
            bias,
            padding_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::{shape, Shape, SymExpr};
    use pystub_testing::TestCases;

    use super::{output_size, Conv2d, ConvPadding};
    use crate::args::{ArgError, ArgValue, CallArgs, FromArgs};
    use crate::nn::{Module, ShapeError};

    #[test]
    fn test_output_size() {
        #[derive(Debug)]
        struct Case {
            in_size: i64,
            kernel: usize,
            stride: usize,
            dilation: usize,
            padding: usize,
            ceil_mode: bool,
            expected: i64,
        }

        let cases = [
            Case {
                in_size: 28,
                kernel: 3,
                stride: 1,
                dilation: 1,
                padding: 0,
                ceil_mode: false,
                expected: 26,
            },
            Case {
                in_size: 28,
                kernel: 3,
                stride: 1,
                dilation: 1,
                padding: 1,
                ceil_mode: false,
                expected: 28,
            },
            Case {
                in_size: 28,
                kernel: 5,
                stride: 2,
                dilation: 1,
                padding: 2,
                ceil_mode: false,
                expected: 14,
            },
            Case {
                in_size: 32,
                kernel: 3,
                stride: 1,
                dilation: 2,
                padding: 0,
                ceil_mode: false,
                expected: 28,
            },
            Case {
                in_size: 5,
                kernel: 2,
                stride: 2,
                dilation: 1,
                padding: 0,
                ceil_mode: false,
                expected: 2,
            },
            Case {
                in_size: 5,
                kernel: 2,
                stride: 2,
                dilation: 1,
                padding: 0,
                ceil_mode: true,
                expected: 3,
            },
            // The last window would start in the padding, so it is dropped.
            Case {
                in_size: 5,
                kernel: 2,
                stride: 2,
                dilation: 1,
                padding: 1,
                ceil_mode: true,
                expected: 3,
            },
        ];

        cases.test_each(|case| {
            let size = output_size(
                &case.in_size.into(),
                case.kernel,
                case.stride,
                case.dilation,
                case.padding,
                case.ceil_mode,
            );
            assert_eq!(size, Ok(case.expected.into()));
        })
    }

    #[test]
    fn test_output_size_too_small() {
        let err = output_size(&2.into(), 3, 1, 1, 0, false).unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue(_)));
    }

    #[test]
    fn test_zero_stride() {
        let err = output_size(&28.into(), 3, 0, 1, 0, false).unwrap_err();
        assert!(matches!(err, ShapeError::InvalidValue(_)));

        let conv = Conv2d {
            stride: [0, 0],
            ..Conv2d::new(3, 16, [3, 3])
        };
        assert!(matches!(
            conv.forward(&[shape![1, 3, 28, 28]]),
            Err(ShapeError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_symbolic_output_size() {
        let h = SymExpr::from("h");
        assert_eq!(output_size(&h, 3, 1, 1, 1, false), Ok(h.clone()));

        let size = output_size(&h, 3, 2, 1, 0, false).unwrap();
        let lookup = |name: &str| (name == "h").then_some(28);
        assert_eq!(size.eval(&lookup), Ok(13));
    }

    #[test]
    fn test_conv2d_forward() {
        let conv = Conv2d::new(3, 16, [3, 3]);
        assert_eq!(conv.forward(&[shape![8, 3, 28, 28]]), Ok(shape![8, 16, 26, 26]));
        assert_eq!(conv.forward(&[shape![3, 28, 28]]), Ok(shape![16, 26, 26]));

        let out = conv.forward(&[shape!["n", 3, 28, 28]]).unwrap();
        assert_eq!(out, shape!["n", 16, 26, 26]);

        let same = Conv2d {
            padding: ConvPadding::Same,
            ..Conv2d::new(3, 8, [5, 5])
        };
        assert_eq!(same.forward(&[shape!["n", 3, "h", "w"]]), Ok(shape!["n", 8, "h", "w"]));
    }

    #[test]
    fn test_conv2d_forward_errors() {
        let conv = Conv2d::new(3, 16, [3, 3]);
        assert!(matches!(
            conv.forward(&[shape![8, 4, 28, 28]]),
            Err(ShapeError::IncompatibleShapes { .. })
        ));
        assert!(matches!(
            conv.forward(&[shape![28, 28]]),
            Err(ShapeError::IncorrectRank { .. })
        ));
        assert!(matches!(
            conv.forward(&[]),
            Err(ShapeError::IncorrectInputCount { .. })
        ));

        // Channel counts that are unknown are not rejected.
        let out = conv.forward(&[shape![1, "c", 10, 10]]).unwrap();
        assert_eq!(out, Shape::from_fixed(&[1, 16, 8, 8]));
    }

    #[test]
    fn test_conv2d_from_args() {
        let args = CallArgs::new()
            .arg(3)
            .arg(64)
            .kwarg("kernel_size", vec![ArgValue::Int(3), ArgValue::Int(5)])
            .kwarg("padding", "same")
            .kwarg("bias", false);
        let mut bound = Conv2d::SIGNATURE.bind("Conv2d", args).unwrap();
        let conv = Conv2d::from_args(&mut bound).unwrap();
        assert_eq!(conv.kernel_size, [3, 5]);
        assert_eq!(conv.padding, ConvPadding::Same);
        assert!(!conv.bias);

        let args = CallArgs::new().arg(3).arg(8).arg(3).kwarg("padding", 1);
        let mut bound = Conv2d::SIGNATURE.bind("Conv2d", args).unwrap();
        let conv = Conv2d::from_args(&mut bound).unwrap();
        assert_eq!(conv.padding, ConvPadding::Fixed([1, 1]));
    }

    #[test]
    fn test_conv2d_symbolic_channels() {
        let args = CallArgs::new()
            .arg(SymExpr::from("c"))
            .arg(16)
            .arg(3)
            .kwarg("groups", 2);
        let mut bound = Conv2d::SIGNATURE.bind("Conv2d", args).unwrap();
        let conv = Conv2d::from_args(&mut bound).unwrap();
        assert_eq!(conv.in_channels, SymExpr::from("c"));
        assert_eq!(
            conv.forward(&[shape!["n", "c", 32, 32]]),
            Ok(shape!["n", 16, 30, 30])
        );

        let out = Conv2d::new(3, "k", [1, 1]).forward(&[shape![2, 3, 5, 5]]);
        assert_eq!(out, Ok(shape![2, "k", 5, 5]));
    }

    #[test]
    fn test_conv2d_from_args_errors() {
        let build = |args: CallArgs| -> Result<Conv2d, ArgError> {
            let mut bound = Conv2d::SIGNATURE.bind("Conv2d", args)?;
            Conv2d::from_args(&mut bound)
        };

        let err = build(CallArgs::new().arg(3).arg(8).arg(3).kwarg("groups", 2)).unwrap_err();
        assert!(matches!(err, ArgError::InvalidValue { name: "in_channels", .. }));

        let err = build(
            CallArgs::new()
                .arg(3)
                .arg(8)
                .arg(3)
                .kwarg("stride", 2)
                .kwarg("padding", "same"),
        )
        .unwrap_err();
        assert!(matches!(err, ArgError::InvalidValue { name: "padding", .. }));

        let err = build(CallArgs::new().arg(3).arg(8)).unwrap_err();
        assert_eq!(
            err,
            ArgError::MissingArgument {
                class: "Conv2d",
                name: "kernel_size"
            }
        );
    }
}
