//! Runtime configuration of the stubs.
//!
//! A [`StubConfig`] can be loaded from JSON to fix the random seed or to
//! change the sizing tables of individual datasets, eg. to make image
//! heights symbolic:
//!
//! ```json
//! {
//!   "seed": 1234,
//!   "datasets": {
//!     "ImageFolder": { "len": 20, "height": "h", "width": { "min": 32, "max": 64 } },
//!     "CIFAR10": { "num_classes": 2 }
//!   }
//! }
//! ```

use std::error::Error;
use std::fmt;
use std::path::Path;

use pystub_shape::{DimPolicy, IntRange, PolicyError, SymExpr};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::dataset::DatasetProfile;
use crate::env::str_as_bool;

/// Errors reported when loading a [`StubConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// There was an error reading the JSON data from a file.
    IoError(std::io::Error),
    /// There was an error decoding the JSON data.
    JsonError(serde_json::Error),
    /// A dataset override contains an invalid range.
    InvalidPolicy { dataset: String, error: PolicyError },
    /// An environment variable has a value that could not be parsed.
    InvalidEnv { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(err) => fmt::Display::fmt(err, f),
            Self::JsonError(err) => write!(f, "JSON error {}", err),
            Self::InvalidPolicy { dataset, error } => {
                write!(f, "invalid override for {}: {}", dataset, error)
            }
            Self::InvalidEnv { name, value } => {
                write!(f, "invalid value \"{}\" for {}", value, name)
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::JsonError(err) => Some(err),
            Self::InvalidPolicy { error, .. } => Some(error),
            Self::InvalidEnv { .. } => None,
        }
    }
}

/// Size of one image dimension in a [`DatasetOverride`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DimSpec {
    /// A fixed size, eg. `28`.
    Fixed(i64),
    /// A symbolic size, eg. `"h"`.
    Symbol(String),
    /// A size drawn from `[min, max]`, eg. `{ "min": 256, "max": 1280 }`.
    Range { min: i64, max: i64 },
}

impl DimSpec {
    pub fn to_policy(&self) -> Result<DimPolicy, PolicyError> {
        match self {
            Self::Fixed(size) => Ok(DimPolicy::Fixed(*size)),
            Self::Symbol(name) => Ok(DimPolicy::Symbolic(SymExpr::from(name.as_str()))),
            Self::Range { min, max } => DimPolicy::range(*min, *max),
        }
    }
}

/// Inclusive label range in a [`DatasetOverride`].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LabelRange {
    pub min: i64,
    pub max: i64,
}

/// Changes to the default sizing table of one dataset class.
///
/// Fields that are absent keep the class's defaults.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatasetOverride {
    /// Length in both training and evaluation mode.
    pub len: Option<usize>,
    pub train_len: Option<usize>,
    pub eval_len: Option<usize>,

    /// Draw labels from `[0, num_classes - 1]`.
    pub num_classes: Option<usize>,

    /// Draw labels from an explicit range. Takes precedence over
    /// `num_classes`.
    pub labels: Option<LabelRange>,

    pub channels: Option<DimSpec>,
    pub height: Option<DimSpec>,
    pub width: Option<DimSpec>,
}

impl DatasetOverride {
    fn labels(&self) -> Result<Option<IntRange>, PolicyError> {
        if let Some(LabelRange { min, max }) = self.labels {
            return IntRange::new(min, max).map(Some);
        }
        self.num_classes.map(IntRange::classes).transpose()
    }

    fn image_dims(&self) -> [Option<&DimSpec>; 3] {
        [
            self.channels.as_ref(),
            self.height.as_ref(),
            self.width.as_ref(),
        ]
    }

    /// Check that every range in the override is non-empty.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.labels()?;
        for spec in self.image_dims().into_iter().flatten() {
            spec.to_policy()?;
        }
        Ok(())
    }

    /// Return `profile` with the fields of this override replaced.
    ///
    /// The image dims apply to the last three dims of the profile's shape
    /// policy, which are `(channels, height, width)` for image datasets.
    pub fn apply(&self, mut profile: DatasetProfile) -> Result<DatasetProfile, PolicyError> {
        if let Some(len) = self.len {
            profile.train_len = len;
            profile.eval_len = len;
        }
        if let Some(len) = self.train_len {
            profile.train_len = len;
        }
        if let Some(len) = self.eval_len {
            profile.eval_len = len;
        }
        if let Some(labels) = self.labels()? {
            profile.labels = labels;
        }

        let ndim = profile.image.ndim();
        if ndim >= 3 {
            for (offset, spec) in self.image_dims().into_iter().enumerate() {
                if let Some(spec) = spec {
                    profile.image = profile.image.with_dim(ndim - 3 + offset, spec.to_policy()?);
                }
            }
        }

        Ok(profile)
    }
}

/// Configuration shared by all stubs created through a
/// [`Context`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StubConfig {
    /// Seed for the context's random number generator. If absent, the
    /// generator is seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Log each generated item and each unmodeled import.
    #[serde(default)]
    pub verbose: bool,

    /// Per-class overrides, keyed by class name (eg. `"CIFAR10"`).
    #[serde(default)]
    pub datasets: FxHashMap<String, DatasetOverride>,
}

impl StubConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<StubConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::from_json(&content)
    }

    /// Load a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<StubConfig, ConfigError> {
        let config: StubConfig = serde_json::from_str(json).map_err(ConfigError::JsonError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, dataset) in &self.datasets {
            dataset
                .validate()
                .map_err(|error| ConfigError::InvalidPolicy {
                    dataset: name.clone(),
                    error,
                })?;
        }
        Ok(())
    }

    /// Apply the `PYSTUB_SEED` and `PYSTUB_VERBOSE` environment variables.
    pub fn with_env(self) -> Result<StubConfig, ConfigError> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<StubConfig, ConfigError> {
        if let Some(value) = var("PYSTUB_SEED") {
            let seed = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PYSTUB_SEED",
                value: value.clone(),
            })?;
            self.seed = Some(seed);
        }
        if let Some(value) = var("PYSTUB_VERBOSE") {
            self.verbose = str_as_bool(&value);
        }
        Ok(self)
    }

    /// Return the sizing table for the dataset class `name`, starting from
    /// the class's `default` table.
    pub fn profile_for(
        &self,
        name: &str,
        default: DatasetProfile,
    ) -> Result<DatasetProfile, ConfigError> {
        match self.datasets.get(name) {
            Some(dataset) => dataset
                .apply(default)
                .map_err(|error| ConfigError::InvalidPolicy {
                    dataset: name.to_string(),
                    error,
                }),
            None => Ok(default),
        }
    }
}

/// State shared by the stubs created during one analysis run.
///
/// The context owns the random number generator from which each dataset's
/// generator is forked, so a seeded context produces the same items on every
/// run.
pub struct Context {
    rng: fastrand::Rng,
    config: StubConfig,
    verbose: bool,
}

impl Context {
    pub fn new(config: StubConfig) -> Context {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let verbose = config.verbose || crate::env::verbose();
        Context {
            rng,
            config,
            verbose,
        }
    }

    /// Create a context from the default configuration, or the file named
    /// by `PYSTUB_CONFIG`, with environment overrides applied.
    pub fn from_env() -> Result<Context, ConfigError> {
        let config = match std::env::var_os("PYSTUB_CONFIG") {
            Some(path) => StubConfig::from_file(path)?,
            None => StubConfig::default(),
        };
        Ok(Context::new(config.with_env()?))
    }

    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Return a new generator seeded from the context's generator.
    pub fn fork_rng(&mut self) -> fastrand::Rng {
        fastrand::Rng::with_seed(self.rng.u64(..))
    }

    /// See [`StubConfig::profile_for`].
    pub fn profile_for(
        &self,
        name: &str,
        default: DatasetProfile,
    ) -> Result<DatasetProfile, ConfigError> {
        self.config.profile_for(name, default)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(StubConfig::default())
    }
}
