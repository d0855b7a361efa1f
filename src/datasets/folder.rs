use std::path::{Path, PathBuf};

use pystub_shape::{DimPolicy, IntRange, RandomSource, ShapePolicy};

use crate::args::{ArgError, ArgValue, BoundArgs, FromArgs, Signature};
use crate::dataset::{Dataset, DatasetProfile, ImageSampler, TransformPipeline};
use crate::item::{Item, Transform};

/// Smallest and largest height or width of a generated image.
const IMAGE_SIZE: IntRange = IntRange::constant(256, 1280);

/// Number of distinct labels.
const NUM_CLASSES: i64 = 10;

/// Constructor arguments for [`ImageFolder`].
#[derive(Clone, Debug)]
pub struct ImageFolderOptions {
    pub root: PathBuf,
    pub transform: Option<Transform>,
    pub target_transform: Option<Transform>,

    /// Name of the custom loader, if one was given. It is never called.
    pub loader: Option<String>,

    /// Name of the custom file filter, if one was given. It is never called.
    pub is_valid_file: Option<String>,
}

impl ImageFolderOptions {
    pub fn new<P: Into<PathBuf>>(root: P) -> ImageFolderOptions {
        ImageFolderOptions {
            root: root.into(),
            transform: None,
            target_transform: None,
            loader: None,
            is_valid_file: None,
        }
    }

    pub fn transform(&mut self, transform: impl Into<Transform>) -> &mut Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn target_transform(&mut self, transform: impl Into<Transform>) -> &mut Self {
        self.target_transform = Some(transform.into());
        self
    }

    fn pipeline(&self) -> TransformPipeline {
        TransformPipeline {
            transform: self.transform.clone(),
            target_transform: self.target_transform.clone(),
        }
    }
}

impl FromArgs for ImageFolderOptions {
    const SIGNATURE: Signature = Signature::new(&[
        "root",
        "transform",
        "target_transform",
        "loader",
        "is_valid_file",
    ]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        // `loader` and `is_valid_file` may be any callable. Only their type
        // name is kept.
        let describe = |value: ArgValue| match value {
            ArgValue::Opaque(name) => name,
            value => value.type_name().to_string(),
        };
        Ok(ImageFolderOptions {
            root: args.path("root")?,
            transform: args.transform("transform")?,
            target_transform: args.transform("target_transform")?,
            loader: args.take("loader").map(describe),
            is_valid_file: args.take("is_valid_file").map(describe),
        })
    }
}

/// Stand-in for `torchvision.datasets.ImageFolder`.
///
/// Items are `(Image(1, H, W), label)` pairs, where `H` and `W` are drawn
/// independently from `[256, 1280]` and labels from `[0, 9]`. The dataset
/// always has 100 items.
pub struct ImageFolder<R = fastrand::Rng> {
    sampler: ImageSampler<R>,
}

impl ImageFolder {
    /// Create a dataset which draws from an entropy-seeded generator.
    pub fn new(options: &ImageFolderOptions) -> Self {
        Self::with_rng(options, fastrand::Rng::new())
    }

    /// Return the default sizing table.
    pub fn profile() -> DatasetProfile {
        folder_profile()
    }
}

fn folder_profile() -> DatasetProfile {
    DatasetProfile {
        train_len: 100,
        eval_len: 100,
        labels: IntRange::constant(0, NUM_CLASSES - 1),
        image: ShapePolicy::new([
            DimPolicy::Fixed(1),
            DimPolicy::Range(IMAGE_SIZE),
            DimPolicy::Range(IMAGE_SIZE),
        ]),
    }
}

impl<R: RandomSource> ImageFolder<R> {
    pub fn with_rng(options: &ImageFolderOptions, rng: R) -> Self {
        Self::with_profile(options, folder_profile(), rng)
    }

    /// Create a dataset which uses `profile` instead of the default sizing
    /// table.
    pub fn with_profile(options: &ImageFolderOptions, profile: DatasetProfile, rng: R) -> Self {
        ImageFolder {
            sampler: ImageSampler::new(
                "ImageFolder",
                options.root.clone(),
                true,
                profile,
                options.pipeline(),
                rng,
            ),
        }
    }

    pub fn root(&self) -> &Path {
        self.sampler.root()
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.sampler.set_verbose(verbose);
    }
}

impl<R: RandomSource> Dataset for ImageFolder<R> {
    fn len(&self) -> usize {
        self.sampler.len()
    }

    fn get_item(&mut self, index: i64) -> (Item, Item) {
        self.sampler.sample(index)
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::{shape, DimPolicy, Pick, ScriptedRng, SymExpr};
    use pystub_testing::Histogram;

    use super::{ImageFolder, ImageFolderOptions};
    use crate::args::{ArgValue, CallArgs, FromArgs};
    use crate::dataset::Dataset;
    use crate::item::Item;
    use crate::transforms::ToTensor;

    #[test]
    fn test_items() {
        let options = ImageFolderOptions::new("images");
        let mut dataset = ImageFolder::with_rng(&options, fastrand::Rng::with_seed(42));
        assert_eq!(dataset.len(), 100);

        let mut labels = Histogram::new();
        for i in 0..500 {
            let (image, label) = dataset.get_item(i);
            let image = image.as_image().unwrap();
            assert_eq!(image.channels(), &SymExpr::from(1));
            assert_eq!(image.mode(), Some("L"));
            for size in [image.height(), image.width()] {
                let size = size.as_value().unwrap();
                assert!((256..=1280).contains(&size), "size {} out of range", size);
            }
            labels.record(label.as_int().unwrap());
        }
        assert!(labels.covers_exactly(0, 9));
    }

    #[test]
    fn test_size_bounds() {
        let options = ImageFolderOptions::new("images");

        let mut dataset = ImageFolder::with_rng(&options, ScriptedRng::repeat(Pick::Low));
        let (image, label) = dataset.get_item(0);
        assert_eq!(image.shape(), Some(&shape![1, 256, 256]));
        assert_eq!(label, Item::Int(0));

        let mut dataset = ImageFolder::with_rng(&options, ScriptedRng::repeat(Pick::High));
        let (image, label) = dataset.get_item(0);
        assert_eq!(image.shape(), Some(&shape![1, 1280, 1280]));
        assert_eq!(label, Item::Int(9));
    }

    #[test]
    fn test_symbolic_profile() {
        let profile = ImageFolder::profile();
        let profile = crate::dataset::DatasetProfile {
            image: profile
                .image
                .with_dim(1, DimPolicy::Symbolic("h".into()))
                .with_dim(2, DimPolicy::Symbolic("w".into())),
            ..profile
        };

        let mut options = ImageFolderOptions::new("images");
        options.transform(ToTensor);
        let mut dataset =
            ImageFolder::with_profile(&options, profile, fastrand::Rng::with_seed(0));
        let (sample, _) = dataset.get_item(0);
        let tensor = sample.as_tensor().unwrap();
        assert_eq!(tensor.shape(), &shape![1, "h", "w"]);
    }

    #[test]
    fn test_from_args() {
        let args = CallArgs::new()
            .arg("images")
            .kwarg("loader", ArgValue::Opaque("pil_loader".into()))
            .kwarg("is_valid_file", ArgValue::None);
        let mut bound = ImageFolderOptions::SIGNATURE
            .bind("ImageFolder", args)
            .unwrap();
        let options = ImageFolderOptions::from_args(&mut bound).unwrap();
        assert_eq!(options.loader.as_deref(), Some("pil_loader"));
        assert_eq!(options.is_valid_file, None);

        let err = ImageFolderOptions::SIGNATURE
            .bind("ImageFolder", CallArgs::new().arg("images").kwarg("train", true))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ImageFolder() got an unexpected keyword argument 'train'"
        );
    }
}
