use std::fmt;

use pystub_shape::Shape;

/// Element type of a [`Tensor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DType {
    Float32,
    Int64,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "float32",
            DType::Int64 => "int64",
            DType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

/// Stand-in for a `torch.Tensor`. Holds a shape and element type, but no
/// data.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
}

impl Tensor {
    pub fn new(shape: Shape, dtype: DType) -> Tensor {
        Tensor { shape, dtype }
    }

    /// Create a float tensor, the default element type of `torch`.
    pub fn float(shape: Shape) -> Tensor {
        Tensor::new(shape, DType::Float32)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Return a tensor with the same element type and a different shape.
    pub fn with_shape(&self, shape: Shape) -> Tensor {
        Tensor {
            shape,
            dtype: self.dtype,
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{} {}", self.shape, self.dtype)
    }
}
