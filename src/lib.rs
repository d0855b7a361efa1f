//! pystub provides shape-level stand-ins for parts of PyTorch's Python API,
//! for use by static analyzers of deep learning code.
//!
//! The stubs reproduce what an analyzer can observe about the real classes:
//! constructor signatures, dataset lengths, the types and shapes of dataset
//! items and the output shapes of `nn` layers. They never perform any
//! computation, read files or download data.
//!
//! # Modeled API
//!
//! - [`torch.nn`](nn): `Module` and eighteen layer and loss classes. Each
//!   layer implements [`Module::forward`](nn::Module::forward), which maps
//!   input shapes to an output shape.
//! - [`torchvision.datasets`](datasets): `CIFAR10`, `CIFAR100` and
//!   `ImageFolder`. Items are [`Image`] stubs with randomly drawn or fixed
//!   sizes and random labels.
//! - [`torchvision.transforms`](transforms): a small set of transforms that
//!   can be passed to datasets.
//!
//! # Shapes
//!
//! Sizes are [`SymExpr`](pystub_shape::SymExpr) values, which are either
//! known integers or placeholders supplied by the host analyzer. Placeholders
//! flow through datasets and layers unchanged or as arithmetic expressions,
//! so an analyzer can track sizes that are unknown until runtime.
//!
//! # Hosting
//!
//! An analyzer resolves imports against a [`Registry`] and constructs stubs
//! from the arguments of Python calls:
//!
//! ```
//! use pystub::{CallArgs, Context, Registry};
//! use pystub::torch::utils::data::Dataset;
//!
//! let registry = Registry::new();
//! let mut ctx = Context::default();
//!
//! let args = CallArgs::new().arg("./data").kwarg("train", true);
//! let mut dataset = registry
//!     .construct("torchvision.datasets.CIFAR10", args, &mut ctx)
//!     .unwrap()
//!     .into_dataset()
//!     .unwrap();
//! assert_eq!(dataset.len(), 500);
//!
//! let (image, label) = dataset.get_item(0);
//! assert_eq!(image.shape().unwrap().to_string(), "(3, 28, 28)");
//! assert!((0..10).contains(&label.as_int().unwrap()));
//! ```
//!
//! Names that are not modeled resolve to
//! [`ResolveError::NotModeled`], which hosts can treat as an unknown value.
//!
//! # Configuration
//!
//! The random seed and the sizing tables of datasets can be changed with a
//! [`StubConfig`]. See the [`config`] module. Setting `PYSTUB_VERBOSE=1`
//! logs every generated item and every name that fails to resolve.

mod args;
mod dataset;
mod env;
mod image;
mod item;
mod registry;
mod tensor;

pub mod config;
pub mod datasets;
pub mod nn;
pub mod transforms;

pub use args::{ArgError, ArgValue, BoundArgs, CallArgs, FromArgs, Signature};
pub use config::{ConfigError, Context, StubConfig};
pub use dataset::{Dataset, DatasetProfile, TransformPipeline};
pub use image::Image;
pub use item::{Item, ItemTransform, Transform};
pub use registry::{
    ConstructError, Export, ExportKind, Object, Registry, ResolveError, TORCHVISION_DATASETS,
    TORCH_NN,
};
pub use tensor::{DType, Tensor};

/// Stubs under their `torch` module paths.
pub mod torch {
    pub use crate::nn;

    pub mod utils {
        pub mod data {
            pub use crate::dataset::Dataset;
        }
    }
}

/// Stubs under their `torchvision` module paths.
pub mod torchvision {
    pub use crate::datasets;
    pub use crate::transforms;
}
