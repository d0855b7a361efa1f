use pystub_shape::{Shape, SymExpr};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{check_dim, check_rank, one_input, Module, ShapeError};

const NORM_PARAMS: &[&str] = &[
    "num_features",
    "eps",
    "momentum",
    "affine",
    "track_running_stats",
    "device",
    "dtype",
];

/// Batch normalization over the channel dim of `(N, C, H, W)` inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchNorm2d {
    pub num_features: SymExpr,
    pub eps: f64,
    pub momentum: Option<f64>,
    pub affine: bool,
    pub track_running_stats: bool,
}

impl BatchNorm2d {
    pub fn new(num_features: impl Into<SymExpr>) -> BatchNorm2d {
        BatchNorm2d {
            num_features: num_features.into(),
            eps: 1e-5,
            momentum: Some(0.1),
            affine: true,
            track_running_stats: true,
        }
    }
}

impl Module for BatchNorm2d {
    fn name(&self) -> &str {
        "BatchNorm2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        check_rank(input, 4, 4, "4D")?;
        check_dim("num_features", &self.num_features, &input.dims()[1])?;
        Ok(input.clone())
    }
}

/// Read an optional momentum. An explicit `None` disables the running
/// average, so it is distinct from omitting the argument.
fn read_momentum(args: &mut BoundArgs, default: f64) -> Result<Option<f64>, ArgError> {
    let explicit_none = args.is_none("momentum");
    let momentum = args.float_or("momentum", default)?;
    Ok((!explicit_none).then_some(momentum))
}

impl FromArgs for BatchNorm2d {
    const SIGNATURE: Signature = Signature::new(NORM_PARAMS);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(BatchNorm2d {
            num_features: args.positive_dim("num_features")?,
            eps: args.float_or("eps", 1e-5)?,
            momentum: read_momentum(args, 0.1)?,
            affine: args.bool_or("affine", true),
            track_running_stats: args.bool_or("track_running_stats", true),
        })
    }
}

/// Instance normalization over `(N, C, H, W)` or `(C, H, W)` inputs.
///
/// Unlike batch norm the affine parameters are off by default, and the
/// channel count is only checked when they are enabled.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceNorm2d {
    pub num_features: SymExpr,
    pub eps: f64,
    pub momentum: Option<f64>,
    pub affine: bool,
    pub track_running_stats: bool,
}

impl InstanceNorm2d {
    pub fn new(num_features: impl Into<SymExpr>) -> InstanceNorm2d {
        InstanceNorm2d {
            num_features: num_features.into(),
            eps: 1e-5,
            momentum: Some(0.1),
            affine: false,
            track_running_stats: false,
        }
    }
}

impl Module for InstanceNorm2d {
    fn name(&self) -> &str {
        "InstanceNorm2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        check_rank(input, 3, 4, "3D or 4D")?;
        if self.affine {
            check_dim(
                "num_features",
                &self.num_features,
                &input.dims()[input.ndim() - 3],
            )?;
        }
        Ok(input.clone())
    }
}

impl FromArgs for InstanceNorm2d {
    const SIGNATURE: Signature = Signature::new(NORM_PARAMS);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(InstanceNorm2d {
            num_features: args.positive_dim("num_features")?,
            eps: args.float_or("eps", 1e-5)?,
            momentum: read_momentum(args, 0.1)?,
            affine: args.bool_or("affine", false),
            track_running_stats: args.bool_or("track_running_stats", false),
        })
    }
}
