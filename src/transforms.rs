//! Shape-level stand-ins for a subset of `torchvision.transforms`.
//!
//! Each transform maps an [`Item`] to the item the real transform would
//! produce, as far as kind and shape are concerned. Items of a kind a
//! transform does not handle are returned unchanged.

use pystub_shape::SymExpr;

use crate::item::{Item, ItemTransform, Transform};
use crate::tensor::Tensor;

/// Apply a sequence of transforms in order.
#[derive(Clone, Debug, Default)]
pub struct Compose {
    transforms: Vec<Transform>,
}

impl Compose {
    pub fn new(transforms: Vec<Transform>) -> Compose {
        Compose { transforms }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

impl ItemTransform for Compose {
    fn name(&self) -> &str {
        "Compose"
    }

    fn apply(&self, item: Item) -> Item {
        self.transforms.iter().fold(item, |item, t| t.apply(item))
    }
}

/// Convert an image to a float tensor with the same `(C, H, W)` shape.
#[derive(Clone, Debug, Default)]
pub struct ToTensor;

impl ItemTransform for ToTensor {
    fn name(&self) -> &str {
        "ToTensor"
    }

    fn apply(&self, item: Item) -> Item {
        match item {
            Item::Image(image) => Item::Tensor(Tensor::float(image.shape().clone())),
            other => other,
        }
    }
}

/// Replace the last two dimensions of an image or tensor.
fn set_spatial_size(item: Item, height: &SymExpr, width: &SymExpr) -> Item {
    match item {
        Item::Image(image) => Item::Image(image.resized(height.clone(), width.clone())),
        Item::Tensor(tensor) if tensor.ndim() >= 2 => {
            let ndim = tensor.ndim();
            let shape = tensor
                .shape()
                .with_dim(ndim - 2, height.clone())
                .with_dim(ndim - 1, width.clone());
            Item::Tensor(tensor.with_shape(shape))
        }
        other => other,
    }
}

/// Resize to an explicit `(height, width)`.
#[derive(Clone, Debug)]
pub struct Resize {
    pub height: SymExpr,
    pub width: SymExpr,
}

impl Resize {
    pub fn new(height: SymExpr, width: SymExpr) -> Resize {
        Resize { height, width }
    }
}

impl ItemTransform for Resize {
    fn name(&self) -> &str {
        "Resize"
    }

    fn apply(&self, item: Item) -> Item {
        set_spatial_size(item, &self.height, &self.width)
    }
}

/// Crop the center `(height, width)` region.
#[derive(Clone, Debug)]
pub struct CenterCrop {
    pub height: SymExpr,
    pub width: SymExpr,
}

impl CenterCrop {
    pub fn new(height: SymExpr, width: SymExpr) -> CenterCrop {
        CenterCrop { height, width }
    }
}

impl ItemTransform for CenterCrop {
    fn name(&self) -> &str {
        "CenterCrop"
    }

    // Crops larger than the input are padded, so the output size is always
    // the requested one.
    fn apply(&self, item: Item) -> Item {
        set_spatial_size(item, &self.height, &self.width)
    }
}

/// Per-channel normalization of a tensor. Shape preserving.
#[derive(Clone, Debug)]
pub struct Normalize {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Normalize {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Normalize {
        Normalize { mean, std }
    }
}

impl ItemTransform for Normalize {
    fn name(&self) -> &str {
        "Normalize"
    }

    fn apply(&self, item: Item) -> Item {
        item
    }
}

/// Wrap a user function as a transform.
pub struct Lambda<F>(pub F);

impl<F: Fn(Item) -> Item + Send + Sync> ItemTransform for Lambda<F> {
    fn name(&self) -> &str {
        "Lambda"
    }

    fn apply(&self, item: Item) -> Item {
        (self.0)(item)
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::shape;

    use super::{CenterCrop, Compose, Lambda, Normalize, Resize, ToTensor};
    use crate::image::Image;
    use crate::item::{Item, ItemTransform, Transform};
    use crate::tensor::{DType, Tensor};

    fn cifar_image() -> Item {
        Item::Image(Image::new(3.into(), 28.into(), 28.into()))
    }

    #[test]
    fn test_to_tensor() {
        let out = ToTensor.apply(cifar_image());
        let tensor = out.as_tensor().unwrap();
        assert_eq!(tensor.shape(), &shape![3, 28, 28]);
        assert_eq!(tensor.dtype(), DType::Float32);

        // Labels pass through.
        assert_eq!(ToTensor.apply(Item::Int(3)), Item::Int(3));
    }

    #[test]
    fn test_resize_and_crop() {
        let resize = Resize::new(32.into(), 32.into());
        let out = resize.apply(cifar_image());
        assert_eq!(out.shape(), Some(&shape![3, 32, 32]));

        let crop = CenterCrop::new("h".into(), "w".into());
        let tensor = Item::Tensor(Tensor::float(shape!["n", 3, 64, 64]));
        assert_eq!(crop.apply(tensor).shape(), Some(&shape!["n", 3, "h", "w"]));

        // Tensors with fewer than two dims have no spatial size.
        let vector = Item::Tensor(Tensor::float(shape![10]));
        assert_eq!(crop.apply(vector.clone()), vector);
    }

    #[test]
    fn test_normalize_preserves_shape() {
        let norm = Normalize::new(vec![0.5; 3], vec![0.5; 3]);
        let tensor = Item::Tensor(Tensor::float(shape![3, 28, 28]));
        assert_eq!(norm.apply(tensor.clone()), tensor);
    }

    #[test]
    fn test_compose() {
        let pipeline = Compose::new(vec![
            Resize::new(32.into(), 32.into()).into(),
            CenterCrop::new(24.into(), 24.into()).into(),
            ToTensor.into(),
            Normalize::new(vec![0.5; 3], vec![0.5; 3]).into(),
        ]);
        assert_eq!(pipeline.transforms().len(), 4);

        let out = pipeline.apply(cifar_image());
        assert_eq!(out, Item::Tensor(Tensor::float(shape![3, 24, 24])));
    }

    #[test]
    fn test_lambda() {
        let double: Transform = Lambda(|item: Item| match item {
            Item::Int(x) => Item::Int(x * 2),
            other => other,
        })
        .into();
        assert_eq!(double.name(), "Lambda");
        assert_eq!(double.apply(Item::Int(4)), Item::Int(8));
    }
}
