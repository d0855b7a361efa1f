//! Stand-ins for the `torchvision.datasets` image collections.
//!
//! The datasets never touch the filesystem. The `root` they are given is
//! only recorded, and `download=True` is accepted and ignored. Each item is a
//! freshly generated [`Image`](crate::Image) stub and a random class label.

mod cifar;
mod folder;

pub use cifar::{CifarOptions, CIFAR10, CIFAR100};
pub use folder::{ImageFolder, ImageFolderOptions};

/// Names exported by `torchvision.datasets`.
pub const EXPORTS: &[&str] = &["CIFAR10", "CIFAR100", "ImageFolder"];
