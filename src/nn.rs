//! Shape-level stand-ins for the `torch.nn` classes that user code commonly
//! imports.
//!
//! Each layer implements [`Module`], whose `forward` maps input shapes to the
//! output shape. Layers also implement [`FromArgs`](crate::FromArgs) so the
//! host can build them from the arguments of a Python call via the
//! [`Registry`](crate::Registry).

mod activation;
mod container;
mod conv;
mod distance;
mod dropout;
mod linear;
mod loss;
mod module;
mod norm;
mod padding;
mod pooling;

pub use activation::{LeakyReLU, ReLU, Softmax};
pub use container::{ModuleList, Sequential};
pub use conv::{Conv2d, ConvPadding};
pub use distance::CosineSimilarity;
pub use dropout::{Dropout, Dropout2d};
pub use linear::Linear;
pub use loss::{CrossEntropyLoss, MSELoss, Reduction};
pub use module::{Module, ModuleExt, ShapeError};
pub use norm::{BatchNorm2d, InstanceNorm2d};
pub use padding::ReflectionPad2d;
pub use pooling::{AdaptiveAvgPool2d, AvgPool2d, MaxPool2d};

/// Names exported by `torch.nn`, in the order the package lists them.
pub const EXPORTS: &[&str] = &[
    "Module",
    "LeakyReLU",
    "ReLU",
    "Softmax",
    "BatchNorm2d",
    "Sequential",
    "ModuleList",
    "Conv2d",
    "CosineSimilarity",
    "Dropout2d",
    "Dropout",
    "Linear",
    "CrossEntropyLoss",
    "MSELoss",
    "AdaptiveAvgPool2d",
    "AvgPool2d",
    "MaxPool2d",
    "InstanceNorm2d",
    "ReflectionPad2d",
];

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pystub_shape::{shape, Shape, SymbolGen};

    use super::*;
    use crate::tensor::{DType, Tensor};

    /// A small classifier built from the exported layers.
    fn classifier() -> Sequential {
        Sequential::new(vec![
            Arc::new(ReflectionPad2d::uniform(1)),
            Arc::new(Conv2d::new(3, 32, [3, 3])),
            Arc::new(BatchNorm2d::new(32)),
            Arc::new(LeakyReLU::default()),
            Arc::new(MaxPool2d::new([2, 2])),
            Arc::new(InstanceNorm2d::new(32)),
            Arc::new(Dropout2d::default()),
            Arc::new(AvgPool2d::new([2, 2])),
            Arc::new(AdaptiveAvgPool2d::new([Some(1), Some(1)])),
            Arc::new(Dropout::default()),
        ])
    }

    #[test]
    fn test_classifier_with_symbolic_batch() {
        let mut sym_gen = SymbolGen::with_prefix("batch".into());
        let batch = sym_gen.gen_positive();

        let input = Shape::new(vec![batch.clone(), 3.into(), 28.into(), 28.into()]);
        let features = classifier().forward(&[input]).unwrap();
        assert_eq!(
            features,
            Shape::new(vec![batch.clone(), 32.into(), 1.into(), 1.into()])
        );

        let logits = Linear::new(32, 10)
            .forward(&[Shape::new(vec![batch.clone(), 32.into()])])
            .unwrap();
        let probs = Softmax { dim: Some(1) }.forward(&[logits.clone()]).unwrap();
        assert_eq!(probs, logits);

        let loss = CrossEntropyLoss::default()
            .forward(&[logits, Shape::new(vec![batch])])
            .unwrap();
        assert_eq!(loss, Shape::scalar());
    }

    #[test]
    fn test_module_call() {
        let x = Tensor::float(shape![4, 3, 32, 32]);
        let y = Conv2d::new(3, 8, [5, 5]).call(&[&x]).unwrap();
        assert_eq!(y.shape(), &shape![4, 8, 28, 28]);
        assert_eq!(y.dtype(), DType::Float32);

        let a = Tensor::float(shape![4, 16]);
        let sim = CosineSimilarity::default().call(&[&a, &a]).unwrap();
        assert_eq!(sim.shape(), &shape![4]);

        let mse = MSELoss::new(Reduction::Sum).call(&[&a, &a]).unwrap();
        assert_eq!(mse.shape(), &Shape::scalar());
    }

    #[test]
    fn test_module_names() {
        let modules: Vec<Box<dyn Module>> = vec![
            Box::new(ReLU::default()),
            Box::new(ModuleList::default()),
            Box::new(CosineSimilarity::default()),
        ];
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["ReLU", "ModuleList", "CosineSimilarity"]);
        assert!(names.iter().all(|name| EXPORTS.contains(name)));
    }
}
