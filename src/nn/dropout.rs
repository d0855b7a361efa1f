use pystub_shape::Shape;

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::nn::module::{one_input, Module, ShapeError};

/// Randomly zeroes elements during training. Shape preserving.
#[derive(Clone, Debug, PartialEq)]
pub struct Dropout {
    pub p: f64,
    pub inplace: bool,
}

impl Default for Dropout {
    fn default() -> Self {
        Dropout {
            p: 0.5,
            inplace: false,
        }
    }
}

impl Module for Dropout {
    fn name(&self) -> &str {
        "Dropout"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        one_input(inputs).cloned()
    }
}

impl FromArgs for Dropout {
    const SIGNATURE: Signature = Signature::new(&["p", "inplace"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(Dropout {
            p: args.probability_or("p", 0.5)?,
            inplace: args.bool_or("inplace", false),
        })
    }
}

/// Randomly zeroes whole channels during training. Shape preserving.
///
/// PyTorch only warns for inputs that are not 3D or 4D, so any rank is
/// accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct Dropout2d {
    pub p: f64,
    pub inplace: bool,
}

impl Default for Dropout2d {
    fn default() -> Self {
        Dropout2d {
            p: 0.5,
            inplace: false,
        }
    }
}

impl Module for Dropout2d {
    fn name(&self) -> &str {
        "Dropout2d"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        one_input(inputs).cloned()
    }
}

impl FromArgs for Dropout2d {
    const SIGNATURE: Signature = Signature::new(&["p", "inplace"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(Dropout2d {
            p: args.probability_or("p", 0.5)?,
            inplace: args.bool_or("inplace", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::shape;

    use super::{Dropout, Dropout2d};
    use crate::args::{ArgError, CallArgs, FromArgs};
    use crate::nn::Module;

    #[test]
    fn test_dropout_forward() {
        let input = shape!["n", 64, 7, 7];
        assert_eq!(Dropout::default().forward(&[input.clone()]), Ok(input.clone()));
        assert_eq!(Dropout2d::default().forward(&[input.clone()]), Ok(input));
    }

    #[test]
    fn test_dropout_probability() {
        let mut bound = Dropout::SIGNATURE
            .bind("Dropout", CallArgs::new().arg(0.25))
            .unwrap();
        assert_eq!(Dropout::from_args(&mut bound).unwrap().p, 0.25);

        let mut bound = Dropout2d::SIGNATURE
            .bind("Dropout2d", CallArgs::new().kwarg("p", 1.5))
            .unwrap();
        let err = Dropout2d::from_args(&mut bound).unwrap_err();
        assert!(matches!(err, ArgError::InvalidValue { name: "p", .. }));
        assert_eq!(
            err.to_string(),
            "Dropout2d() invalid value for 'p': probability has to be between 0 and 1, but got 1.5"
        );
    }
}
