use std::fmt;

use pystub_shape::{Shape, SymExpr};

/// Stand-in for a `PIL.Image.Image`.
///
/// Images carry only a `(channels, height, width)` shape. Note that PIL
/// reports sizes as `(width, height)`, which is what [`Image::size`] returns.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    shape: Shape,
}

impl Image {
    pub fn new(channels: SymExpr, height: SymExpr, width: SymExpr) -> Image {
        Image {
            shape: Shape::new(vec![channels, height, width]),
        }
    }

    /// Create an image from a `(channels, height, width)` shape.
    ///
    /// If the shape does not have three dimensions it is returned as the
    /// error.
    pub fn from_shape(shape: Shape) -> Result<Image, Shape> {
        if shape.ndim() == 3 {
            Ok(Image { shape })
        } else {
            Err(shape)
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn channels(&self) -> &SymExpr {
        &self.shape.dims()[0]
    }

    pub fn height(&self) -> &SymExpr {
        &self.shape.dims()[1]
    }

    pub fn width(&self) -> &SymExpr {
        &self.shape.dims()[2]
    }

    /// Return `(width, height)`, in the order PIL's `Image.size` uses.
    pub fn size(&self) -> (SymExpr, SymExpr) {
        (self.width().clone(), self.height().clone())
    }

    /// Return the PIL mode name for the channel count, if it is known.
    pub fn mode(&self) -> Option<&'static str> {
        match self.channels().as_value()? {
            1 => Some("L"),
            3 => Some("RGB"),
            4 => Some("RGBA"),
            _ => None,
        }
    }

    /// Return a copy with new spatial dimensions.
    pub fn resized(&self, height: SymExpr, width: SymExpr) -> Image {
        Image::new(self.channels().clone(), height, width)
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image{}", self.shape)
    }
}
