//! Lookup and construction of stubs by their qualified Python name.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::args::{ArgError, CallArgs, FromArgs, Signature};
use crate::config::{ConfigError, Context};
use crate::dataset::{Dataset, DatasetProfile};
use crate::datasets::{CifarOptions, ImageFolder, ImageFolderOptions, CIFAR10, CIFAR100};
use crate::nn;
use crate::nn::Module;

/// Namespace of the `nn` layer stubs.
pub const TORCH_NN: &str = "torch.nn";

/// Namespace of the dataset stubs.
pub const TORCHVISION_DATASETS: &str = "torchvision.datasets";

/// What kind of object an export produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExportKind {
    /// A class that user code subclasses but does not construct directly,
    /// eg. `torch.nn.Module`.
    BaseClass,
    /// An `nn` layer.
    Module,
    /// A dataset.
    Dataset,
}

/// An object created by [`Registry::construct`].
pub enum Object {
    Module(Arc<dyn Module>),
    Dataset(Box<dyn Dataset + Send>),
}

impl Object {
    pub fn as_module(&self) -> Option<&Arc<dyn Module>> {
        match self {
            Object::Module(module) => Some(module),
            Object::Dataset(_) => None,
        }
    }

    pub fn into_module(self) -> Option<Arc<dyn Module>> {
        match self {
            Object::Module(module) => Some(module),
            Object::Dataset(_) => None,
        }
    }

    pub fn into_dataset(self) -> Option<Box<dyn Dataset + Send>> {
        match self {
            Object::Module(_) => None,
            Object::Dataset(dataset) => Some(dataset),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Module(module) => f.debug_tuple("Module").field(module).finish(),
            Object::Dataset(dataset) => write!(f, "Dataset(len={})", dataset.len()),
        }
    }
}

/// Function which builds an object from call arguments. The first argument
/// is the class name.
type Factory = fn(&'static str, CallArgs, &mut Context) -> Result<Object, ConstructError>;

/// A class exported under a qualified name.
#[derive(Clone)]
pub struct Export {
    namespace: &'static str,
    name: &'static str,
    kind: ExportKind,
    signature: Option<Signature>,
    factory: Option<Factory>,
}

impl Export {
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Python name of the class, eg. `"Conv2d"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fully qualified name, eg. `"torch.nn.Conv2d"`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Constructor parameters, or `None` for base classes.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Export")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Error returned when looking up a name that has no stub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The name is not part of the modeled API. Hosts fall back to their
    /// own handling, eg. treating the value as unknown.
    NotModeled { name: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotModeled { name } => write!(f, "{} is not modeled", name),
        }
    }
}

impl Error for ResolveError {}

/// Errors reported by [`Registry::construct`].
#[derive(Debug)]
pub enum ConstructError {
    Resolve(ResolveError),
    /// The export is a base class which cannot be constructed.
    NotConstructible { name: &'static str },
    /// The call arguments do not match the class's signature.
    Args(ArgError),
    /// The dataset's configuration override is invalid.
    Config(ConfigError),
}

impl fmt::Display for ConstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(err) => fmt::Display::fmt(err, f),
            Self::NotConstructible { name } => {
                write!(f, "{} is a base class and cannot be constructed", name)
            }
            Self::Args(err) => fmt::Display::fmt(err, f),
            Self::Config(err) => write!(f, "configuration error: {}", err),
        }
    }
}

impl Error for ConstructError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolve(err) => Some(err),
            Self::NotConstructible { .. } => None,
            Self::Args(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ResolveError> for ConstructError {
    fn from(err: ResolveError) -> Self {
        ConstructError::Resolve(err)
    }
}

impl From<ArgError> for ConstructError {
    fn from(err: ArgError) -> Self {
        ConstructError::Args(err)
    }
}

impl From<ConfigError> for ConstructError {
    fn from(err: ConfigError) -> Self {
        ConstructError::Config(err)
    }
}

fn construct_module<M: Module + FromArgs>(
    class: &'static str,
    args: CallArgs,
    _ctx: &mut Context,
) -> Result<Object, ConstructError> {
    let mut bound = M::SIGNATURE.bind(class, args)?;
    let module = M::from_args(&mut bound)?;
    Ok(Object::Module(Arc::new(module)))
}

/// Dataset stubs which the registry can construct.
trait DatasetClass: Dataset + Send + Sized + 'static {
    type Options: FromArgs;

    fn default_profile() -> DatasetProfile;

    fn build(options: &Self::Options, profile: DatasetProfile, rng: fastrand::Rng) -> Self;

    fn set_verbose(&mut self, verbose: bool);
}

macro_rules! impl_dataset_class {
    ($class:ident, $options:ident) => {
        impl DatasetClass for $class {
            type Options = $options;

            fn default_profile() -> DatasetProfile {
                $class::profile()
            }

            fn build(options: &$options, profile: DatasetProfile, rng: fastrand::Rng) -> Self {
                $class::with_profile(options, profile, rng)
            }

            fn set_verbose(&mut self, verbose: bool) {
                $class::set_verbose(self, verbose)
            }
        }
    };
}

impl_dataset_class!(CIFAR10, CifarOptions);
impl_dataset_class!(CIFAR100, CifarOptions);
impl_dataset_class!(ImageFolder, ImageFolderOptions);

fn construct_dataset<D: DatasetClass>(
    class: &'static str,
    args: CallArgs,
    ctx: &mut Context,
) -> Result<Object, ConstructError> {
    let mut bound = D::Options::SIGNATURE.bind(class, args)?;
    let options = D::Options::from_args(&mut bound)?;
    let profile = ctx.profile_for(class, D::default_profile())?;
    let mut dataset = D::build(&options, profile, ctx.fork_rng());
    dataset.set_verbose(ctx.verbose());
    Ok(Object::Dataset(Box::new(dataset)))
}

/// Table of the stubs available to a host, keyed by qualified name.
///
/// The set of exports is fixed when the registry is created. Names outside
/// it resolve to [`ResolveError::NotModeled`].
pub struct Registry {
    exports: Vec<Export>,

    /// Map from qualified name to index in `exports`.
    index: FxHashMap<String, usize>,

    verbose: bool,
}

impl Registry {
    /// Create a registry with all stubs registered.
    pub fn new() -> Registry {
        let mut reg = Registry {
            exports: Vec::new(),
            index: FxHashMap::default(),
            verbose: crate::env::verbose(),
        };

        macro_rules! register_module {
            ($class:ident) => {
                reg.register(Export {
                    namespace: TORCH_NN,
                    name: stringify!($class),
                    kind: ExportKind::Module,
                    signature: Some(<nn::$class as FromArgs>::SIGNATURE),
                    factory: Some(construct_module::<nn::$class> as Factory),
                })
            };
        }

        macro_rules! register_dataset {
            ($class:ident) => {
                reg.register(Export {
                    namespace: TORCHVISION_DATASETS,
                    name: stringify!($class),
                    kind: ExportKind::Dataset,
                    signature: Some(<<$class as DatasetClass>::Options as FromArgs>::SIGNATURE),
                    factory: Some(construct_dataset::<$class> as Factory),
                })
            };
        }

        reg.register(Export {
            namespace: TORCH_NN,
            name: "Module",
            kind: ExportKind::BaseClass,
            signature: None,
            factory: None,
        });
        register_module!(LeakyReLU);
        register_module!(ReLU);
        register_module!(Softmax);
        register_module!(BatchNorm2d);
        register_module!(Sequential);
        register_module!(ModuleList);
        register_module!(Conv2d);
        register_module!(CosineSimilarity);
        register_module!(Dropout2d);
        register_module!(Dropout);
        register_module!(Linear);
        register_module!(CrossEntropyLoss);
        register_module!(MSELoss);
        register_module!(AdaptiveAvgPool2d);
        register_module!(AvgPool2d);
        register_module!(MaxPool2d);
        register_module!(InstanceNorm2d);
        register_module!(ReflectionPad2d);

        register_dataset!(CIFAR10);
        register_dataset!(CIFAR100);
        register_dataset!(ImageFolder);

        reg
    }

    fn register(&mut self, export: Export) {
        self.index
            .insert(export.qualified_name(), self.exports.len());
        self.exports.push(export);
    }

    /// Enable or disable logging of names that fail to resolve.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Look up an export by qualified name, eg. `"torch.nn.Conv2d"`.
    pub fn resolve(&self, qualified_name: &str) -> Result<&Export, ResolveError> {
        match self.index.get(qualified_name) {
            Some(&idx) => Ok(&self.exports[idx]),
            None => {
                if self.verbose {
                    eprintln!("pystub: {} is not modeled", qualified_name);
                }
                Err(ResolveError::NotModeled {
                    name: qualified_name.to_string(),
                })
            }
        }
    }

    /// Return the names exported from `namespace`, in the order the real
    /// package lists them.
    pub fn names<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.exports
            .iter()
            .filter(move |export| export.namespace == namespace)
            .map(|export| export.name)
    }

    /// Return all exports.
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Create an instance of the class `qualified_name`, as the Python call
    /// `qualified_name(*args, **kwargs)` would.
    pub fn construct(
        &self,
        qualified_name: &str,
        args: CallArgs,
        ctx: &mut Context,
    ) -> Result<Object, ConstructError> {
        let export = self.resolve(qualified_name)?;
        let factory = export.factory.ok_or(ConstructError::NotConstructible {
            name: export.name,
        })?;
        factory(export.name, args, ctx)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
