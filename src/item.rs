use std::fmt;
use std::sync::Arc;

use pystub_shape::Shape;

use crate::image::Image;
use crate::tensor::Tensor;

/// A value produced by a dataset or passed through a transform.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Image(Image),
    Tensor(Tensor),
    Int(i64),
}

impl Item {
    /// Return the shape of an image or tensor item.
    pub fn shape(&self) -> Option<&Shape> {
        match self {
            Item::Image(image) => Some(image.shape()),
            Item::Tensor(tensor) => Some(tensor.shape()),
            Item::Int(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Item::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Item::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Item::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Name of the Python type this item stands in for.
    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Image(_) => "PIL.Image.Image",
            Item::Tensor(_) => "torch.Tensor",
            Item::Int(_) => "int",
        }
    }
}

impl From<Image> for Item {
    fn from(image: Image) -> Item {
        Item::Image(image)
    }
}

impl From<Tensor> for Item {
    fn from(tensor: Tensor) -> Item {
        Item::Tensor(tensor)
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Item {
        Item::Int(value)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Image(image) => write!(f, "{}", image),
            Item::Tensor(tensor) => write!(f, "{}", tensor),
            Item::Int(value) => write!(f, "{}", value),
        }
    }
}

/// A unary function over [`Item`]s, such as the `transform` or
/// `target_transform` argument of a dataset.
pub trait ItemTransform: Send + Sync {
    /// Name shown in debug output.
    fn name(&self) -> &str;

    fn apply(&self, item: Item) -> Item;
}

/// Shared handle to an [`ItemTransform`].
///
/// Cloning a `Transform` shares the underlying function.
#[derive(Clone)]
pub struct Transform {
    inner: Arc<dyn ItemTransform>,
}

impl Transform {
    pub fn new<T: ItemTransform + 'static>(transform: T) -> Transform {
        Transform {
            inner: Arc::new(transform),
        }
    }

    /// Create a transform from a closure.
    pub fn from_fn<F>(name: &str, func: F) -> Transform
    where
        F: Fn(Item) -> Item + Send + Sync + 'static,
    {
        Transform::new(FnTransform {
            name: name.to_string(),
            func,
        })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn apply(&self, item: Item) -> Item {
        self.inner.apply(item)
    }
}

impl<T: ItemTransform + 'static> From<T> for Transform {
    fn from(transform: T) -> Transform {
        Transform::new(transform)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.name())
    }
}

struct FnTransform<F> {
    name: String,
    func: F,
}

impl<F: Fn(Item) -> Item + Send + Sync> ItemTransform for FnTransform<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, item: Item) -> Item {
        (self.func)(item)
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::shape;

    use super::{Item, Transform};
    use crate::image::Image;
    use crate::tensor::Tensor;

    #[test]
    fn test_item_accessors() {
        let image: Item = Image::new(3.into(), 28.into(), 28.into()).into();
        assert_eq!(image.shape(), Some(&shape![3, 28, 28]));
        assert!(image.as_image().is_some());
        assert_eq!(image.type_name(), "PIL.Image.Image");

        let tensor: Item = Tensor::float(shape![10]).into();
        assert!(tensor.as_tensor().is_some());
        assert_eq!(tensor.as_int(), None);

        let label = Item::from(7);
        assert_eq!(label.as_int(), Some(7));
        assert_eq!(label.shape(), None);
        assert_eq!(label.to_string(), "7");
    }

    #[test]
    fn test_fn_transform() {
        let add_one = Transform::from_fn("add_one", |item| match item {
            Item::Int(x) => Item::Int(x + 1),
            other => other,
        });
        assert_eq!(add_one.apply(Item::Int(1)), Item::Int(2));
        assert_eq!(format!("{:?}", add_one), "Transform(add_one)");

        let shared = add_one.clone();
        assert_eq!(shared.apply(Item::Int(5)), Item::Int(6));
    }
}
