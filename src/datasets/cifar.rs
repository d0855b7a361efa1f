use std::path::{Path, PathBuf};

use pystub_shape::{IntRange, RandomSource, ShapePolicy};

use crate::args::{ArgError, BoundArgs, FromArgs, Signature};
use crate::dataset::{Dataset, DatasetProfile, ImageSampler, TransformPipeline};
use crate::item::{Item, Transform};

/// Constructor arguments shared by [`CIFAR10`] and [`CIFAR100`].
#[derive(Clone, Debug)]
pub struct CifarOptions {
    pub root: PathBuf,

    /// Select the training split (500 items) rather than the test split
    /// (100 items).
    pub train: bool,

    pub transform: Option<Transform>,
    pub target_transform: Option<Transform>,

    /// Accepted for compatibility. Nothing is ever downloaded.
    pub download: bool,
}

impl CifarOptions {
    pub fn new<P: Into<PathBuf>>(root: P) -> CifarOptions {
        CifarOptions {
            root: root.into(),
            train: true,
            transform: None,
            target_transform: None,
            download: false,
        }
    }

    pub fn train(&mut self, train: bool) -> &mut Self {
        self.train = train;
        self
    }

    pub fn transform(&mut self, transform: impl Into<Transform>) -> &mut Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn target_transform(&mut self, transform: impl Into<Transform>) -> &mut Self {
        self.target_transform = Some(transform.into());
        self
    }

    pub fn download(&mut self, download: bool) -> &mut Self {
        self.download = download;
        self
    }

    fn pipeline(&self) -> TransformPipeline {
        TransformPipeline {
            transform: self.transform.clone(),
            target_transform: self.target_transform.clone(),
        }
    }
}

impl FromArgs for CifarOptions {
    const SIGNATURE: Signature = Signature::new(&[
        "root",
        "train",
        "transform",
        "target_transform",
        "download",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        Ok(CifarOptions {
            root: args.path("root")?,
            train: args.bool_or("train", true),
            transform: args.transform("transform")?,
            target_transform: args.transform("target_transform")?,
            download: args.bool_or("download", false),
        })
    }
}

/// Default table for a CIFAR dataset with `num_classes` classes.
///
/// Real CIFAR images are 32x32. The stubs produce 28x28 images, which is
/// what analyzed code built around these stubs expects.
fn cifar_profile(num_classes: i64) -> DatasetProfile {
    DatasetProfile {
        train_len: 500,
        eval_len: 100,
        labels: IntRange::constant(0, num_classes - 1),
        image: ShapePolicy::fixed(&[3, 28, 28]),
    }
}

macro_rules! cifar_dataset {
    ($name:ident, $num_classes:expr, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Items are `(Image(3, 28, 28), label)` pairs. The dataset has 500
        /// items when `train` is set and 100 otherwise.
        #[allow(clippy::upper_case_acronyms)]
        pub struct $name<R = fastrand::Rng> {
            sampler: ImageSampler<R>,
        }

        impl $name {
            /// Number of classes, and thus the number of distinct labels.
            pub const NUM_CLASSES: usize = $num_classes as usize;

            /// Create a dataset which draws from an entropy-seeded generator.
            pub fn new(options: &CifarOptions) -> Self {
                Self::with_rng(options, fastrand::Rng::new())
            }

            /// Return the default sizing table.
            pub fn profile() -> DatasetProfile {
                cifar_profile($num_classes)
            }
        }

        impl<R: RandomSource> $name<R> {
            pub fn with_rng(options: &CifarOptions, rng: R) -> Self {
                Self::with_profile(options, cifar_profile($num_classes), rng)
            }

            /// Create a dataset which uses `profile` instead of the default
            /// sizing table.
            pub fn with_profile(options: &CifarOptions, profile: DatasetProfile, rng: R) -> Self {
                $name {
                    sampler: ImageSampler::new(
                        stringify!($name),
                        options.root.clone(),
                        options.train,
                        profile,
                        options.pipeline(),
                        rng,
                    ),
                }
            }

            pub fn root(&self) -> &Path {
                self.sampler.root()
            }

            /// Enable or disable logging of each generated item.
            pub fn set_verbose(&mut self, verbose: bool) {
                self.sampler.set_verbose(verbose);
            }
        }

        impl<R: RandomSource> Dataset for $name<R> {
            fn len(&self) -> usize {
                self.sampler.len()
            }

            fn get_item(&mut self, index: i64) -> (Item, Item) {
                self.sampler.sample(index)
            }
        }
    };
}

cifar_dataset!(CIFAR10, 10, "Stand-in for `torchvision.datasets.CIFAR10`.");
cifar_dataset!(CIFAR100, 100, "Stand-in for `torchvision.datasets.CIFAR100`.");
