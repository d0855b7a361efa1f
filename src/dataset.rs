use std::path::{Path, PathBuf};

use pystub_shape::{IntRange, RandomSource, ShapePolicy};

use crate::image::Image;
use crate::item::{Item, Transform};
use crate::tensor::Tensor;

/// Map-style dataset, the capability set of `torch.utils.data.Dataset`.
///
/// Stub datasets never fail. Indices are not validated, so any index,
/// including a negative or out-of-range one, yields a fresh
/// `(sample, label)` pair.
pub trait Dataset {
    /// Number of items, as reported by `len(dataset)`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the item at `index`, as `dataset[index]` does.
    fn get_item(&mut self, index: i64) -> (Item, Item);
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get_item(&mut self, index: i64) -> (Item, Item) {
        (**self).get_item(index)
    }
}

/// Sizing table for an image dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetProfile {
    /// Length in training mode.
    pub train_len: usize,

    /// Length in evaluation mode.
    pub eval_len: usize,

    /// Range from which labels are drawn.
    pub labels: IntRange,

    /// Shape of the `(channels, height, width)` images produced.
    pub image: ShapePolicy,
}

impl DatasetProfile {
    pub fn len(&self, train: bool) -> usize {
        if train {
            self.train_len
        } else {
            self.eval_len
        }
    }
}

/// Optional transforms applied to each produced `(sample, label)` pair.
#[derive(Clone, Debug, Default)]
pub struct TransformPipeline {
    pub transform: Option<Transform>,
    pub target_transform: Option<Transform>,
}

impl TransformPipeline {
    /// Apply the sample transform to `sample` and the target transform to
    /// `label`, once each.
    pub fn apply(&self, sample: Item, label: Item) -> (Item, Item) {
        let sample = match &self.transform {
            Some(t) => t.apply(sample),
            None => sample,
        };
        let label = match &self.target_transform {
            Some(t) => t.apply(label),
            None => label,
        };
        (sample, label)
    }
}

/// Shared implementation of the image datasets.
///
/// Each call to `sample` draws an image shape and then a label from `rng`.
pub(crate) struct ImageSampler<R> {
    name: &'static str,
    root: PathBuf,
    len: usize,
    labels: IntRange,
    image: ShapePolicy,
    pipeline: TransformPipeline,
    rng: R,
    verbose: bool,
}

impl<R: RandomSource> ImageSampler<R> {
    pub fn new(
        name: &'static str,
        root: PathBuf,
        train: bool,
        profile: DatasetProfile,
        pipeline: TransformPipeline,
        rng: R,
    ) -> Self {
        let verbose = crate::env::verbose();
        if verbose {
            eprintln!(
                "pystub: {}(root={:?}, train={}) len={} labels={} image={:?}",
                name,
                root,
                train,
                profile.len(train),
                profile.labels,
                profile.image.dims()
            );
        }
        ImageSampler {
            name,
            root,
            len: profile.len(train),
            labels: profile.labels,
            image: profile.image,
            pipeline,
            rng,
            verbose,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn sample(&mut self, index: i64) -> (Item, Item) {
        let shape = self.image.sample(&mut self.rng);
        let label = self.rng.int_in(self.labels);

        if self.verbose {
            eprintln!(
                "pystub: {}[{}] -> image {} label {}",
                self.name, index, shape, label
            );
        }

        // Non 3D policies can only come from a custom profile. Produce a
        // tensor with the requested shape in that case.
        let sample = match Image::from_shape(shape) {
            Ok(image) => Item::Image(image),
            Err(shape) => Item::Tensor(Tensor::float(shape)),
        };
        self.pipeline.apply(sample, Item::Int(label))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pystub_shape::{shape, DimPolicy, IntRange, Pick, ScriptedRng, ShapePolicy};

    use super::{DatasetProfile, ImageSampler, TransformPipeline};
    use crate::item::{Item, Transform};

    fn profile() -> DatasetProfile {
        DatasetProfile {
            train_len: 50,
            eval_len: 10,
            labels: IntRange::constant(0, 4),
            image: ShapePolicy::fixed(&[3, 8, 8]),
        }
    }

    #[test]
    fn test_profile_len() {
        let profile = profile();
        assert_eq!(profile.len(true), 50);
        assert_eq!(profile.len(false), 10);
    }

    #[test]
    fn test_pipeline_applies_each_transform_once() {
        let sample_calls = Arc::new(AtomicUsize::new(0));
        let label_calls = Arc::new(AtomicUsize::new(0));

        let pipeline = TransformPipeline {
            transform: Some({
                let calls = sample_calls.clone();
                Transform::from_fn("count", move |item| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    item
                })
            }),
            target_transform: Some({
                let calls = label_calls.clone();
                Transform::from_fn("count", move |item| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    item
                })
            }),
        };

        let (sample, label) = pipeline.apply(Item::Int(1), Item::Int(2));
        assert_eq!((sample, label), (Item::Int(1), Item::Int(2)));
        assert_eq!(sample_calls.load(Ordering::SeqCst), 1);
        assert_eq!(label_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sampler_draw_order() {
        // The image shape is drawn before the label.
        let profile = DatasetProfile {
            image: ShapePolicy::new([
                DimPolicy::Fixed(1),
                DimPolicy::range(10, 20).unwrap(),
                DimPolicy::Fixed(5),
            ]),
            ..profile()
        };
        let rng = ScriptedRng::new([Pick::High, Pick::Low]);
        let mut sampler = ImageSampler::new(
            "Test",
            "data".into(),
            true,
            profile,
            TransformPipeline::default(),
            rng,
        );
        assert_eq!(sampler.len(), 50);
        assert_eq!(sampler.root().to_str(), Some("data"));

        let (image, label) = sampler.sample(-1);
        assert_eq!(image.shape(), Some(&shape![1, 20, 5]));
        assert_eq!(label, Item::Int(0));
    }

    #[test]
    fn test_sampler_non_image_shape() {
        let profile = DatasetProfile {
            image: ShapePolicy::fixed(&[16]),
            ..profile()
        };
        let mut sampler = ImageSampler::new(
            "Test",
            "data".into(),
            false,
            profile,
            TransformPipeline::default(),
            fastrand::Rng::with_seed(0),
        );
        let (sample, _) = sampler.sample(0);
        assert!(sample.as_tensor().is_some());
        assert_eq!(sample.shape(), Some(&shape![16]));
    }
}
