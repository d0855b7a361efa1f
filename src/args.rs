//! Binding of Python-style call arguments to stub constructors.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pystub_shape::SymExpr;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::item::Transform;
use crate::nn::Module;

/// A value passed by the host as a constructor argument.
#[derive(Clone, Debug)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Symbolic size supplied by the host.
    Dim(SymExpr),
    Tuple(Vec<ArgValue>),
    Transform(Transform),
    Module(Arc<dyn Module>),
    /// A callable the stubs accept but never invoke, eg. an `ImageFolder`
    /// loader.
    Opaque(String),
}

impl ArgValue {
    /// Name of the Python type of the value, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::None => "NoneType",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "str",
            ArgValue::Dim(_) => "SymInt",
            ArgValue::Tuple(_) => "tuple",
            ArgValue::Transform(_) => "function",
            ArgValue::Module(_) => "Module",
            ArgValue::Opaque(_) => "object",
        }
    }

    /// Return the value's truthiness, as Python's `bool(value)` would.
    ///
    /// Symbolic sizes, callables and modules are always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            ArgValue::None => false,
            ArgValue::Bool(value) => *value,
            ArgValue::Int(value) => *value != 0,
            ArgValue::Float(value) => *value != 0.0,
            ArgValue::Str(value) => !value.is_empty(),
            ArgValue::Tuple(items) => !items.is_empty(),
            ArgValue::Dim(_)
            | ArgValue::Transform(_)
            | ArgValue::Module(_)
            | ArgValue::Opaque(_) => true,
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl From<SymExpr> for ArgValue {
    fn from(value: SymExpr) -> Self {
        match value {
            SymExpr::Value(v) => ArgValue::Int(v),
            expr => ArgValue::Dim(expr),
        }
    }
}

impl From<Transform> for ArgValue {
    fn from(value: Transform) -> Self {
        ArgValue::Transform(value)
    }
}

impl From<Arc<dyn Module>> for ArgValue {
    fn from(value: Arc<dyn Module>) -> Self {
        ArgValue::Module(value)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(value: Vec<ArgValue>) -> Self {
        ArgValue::Tuple(value)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map(|v| v.into()).unwrap_or(ArgValue::None)
    }
}

/// Errors reported when call arguments do not match a stub's signature.
///
/// Messages follow the `TypeError` and `ValueError` text Python reports for
/// the same mistakes.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgError {
    MissingArgument {
        class: &'static str,
        name: &'static str,
    },
    UnexpectedKeyword {
        class: &'static str,
        name: String,
    },
    TooManyPositional {
        class: &'static str,
        max: usize,
        given: usize,
    },
    DuplicateArgument {
        class: &'static str,
        name: String,
    },
    InvalidType {
        class: &'static str,
        name: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    InvalidValue {
        class: &'static str,
        name: &'static str,
        message: String,
    },
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument { class, name } => {
                write!(f, "{}() missing required argument '{}'", class, name)
            }
            Self::UnexpectedKeyword { class, name } => {
                write!(f, "{}() got an unexpected keyword argument '{}'", class, name)
            }
            Self::TooManyPositional { class, max, given } => write!(
                f,
                "{}() takes at most {} positional arguments but {} were given",
                class, max, given
            ),
            Self::DuplicateArgument { class, name } => {
                write!(f, "{}() got multiple values for argument '{}'", class, name)
            }
            Self::InvalidType {
                class,
                name,
                expected,
                actual,
            } => write!(
                f,
                "{}() argument '{}' must be {}, not {}",
                class, name, expected, actual
            ),
            Self::InvalidValue {
                class,
                name,
                message,
            } => write!(f, "{}() invalid value for '{}': {}", class, name, message),
        }
    }
}

impl std::error::Error for ArgError {}

/// Positional and keyword arguments of a call, in call order.
#[derive(Clone, Debug, Default)]
pub struct CallArgs {
    positional: SmallVec<[ArgValue; 4]>,
    keywords: Vec<(String, ArgValue)>,
}

impl CallArgs {
    pub fn new() -> CallArgs {
        CallArgs::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.keywords.push((name.to_string(), value.into()));
        self
    }

    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, ArgValue)] {
        &self.keywords
    }
}

/// Parameter list of a stub constructor.
///
/// `params` lists the parameter names in positional order, as in the real
/// class's `__init__`. A variadic signature collects all positional
/// arguments instead, like `Sequential(*modules)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: &'static [&'static str],
    pub variadic: bool,
}

impl Signature {
    pub const fn new(params: &'static [&'static str]) -> Signature {
        Signature {
            params,
            variadic: false,
        }
    }

    pub const fn variadic(params: &'static [&'static str]) -> Signature {
        Signature {
            params,
            variadic: true,
        }
    }

    fn param(&self, name: &str) -> Option<&'static str> {
        self.params.iter().copied().find(|p| *p == name)
    }

    /// Match `args` against this signature.
    pub fn bind(&self, class: &'static str, args: CallArgs) -> Result<BoundArgs, ArgError> {
        let mut values = FxHashMap::default();
        let mut rest = Vec::new();

        if self.variadic {
            rest.extend(args.positional);
        } else {
            if args.positional.len() > self.params.len() {
                return Err(ArgError::TooManyPositional {
                    class,
                    max: self.params.len(),
                    given: args.positional.len(),
                });
            }
            for (name, value) in self.params.iter().zip(args.positional) {
                values.insert(*name, value);
            }
        }

        for (name, value) in args.keywords {
            let Some(param) = self.param(&name) else {
                return Err(ArgError::UnexpectedKeyword { class, name });
            };
            if values.insert(param, value).is_some() {
                return Err(ArgError::DuplicateArgument { class, name });
            }
        }

        Ok(BoundArgs {
            class,
            values,
            rest,
        })
    }
}

/// Construction of a stub from bound call arguments.
pub trait FromArgs: Sized {
    /// Parameters of the real class's constructor.
    const SIGNATURE: Signature;

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError>;
}

/// Arguments matched to parameter names.
///
/// The typed accessors remove the value they read. An argument of `None` is
/// treated the same as an omitted one, so defaults apply.
#[derive(Debug)]
pub struct BoundArgs {
    class: &'static str,
    values: FxHashMap<&'static str, ArgValue>,
    rest: Vec<ArgValue>,
}

impl BoundArgs {
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Take the value of a parameter, if it was given and is not `None`.
    pub fn take(&mut self, name: &'static str) -> Option<ArgValue> {
        match self.values.remove(name) {
            Some(ArgValue::None) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Return true if a parameter was passed explicitly as `None`.
    pub fn is_none(&self, name: &'static str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::None))
    }

    /// Take the positional arguments collected by a variadic signature.
    pub fn take_rest(&mut self) -> Vec<ArgValue> {
        std::mem::take(&mut self.rest)
    }

    pub fn required(&mut self, name: &'static str) -> Result<ArgValue, ArgError> {
        self.take(name).ok_or(ArgError::MissingArgument {
            class: self.class,
            name,
        })
    }

    pub fn type_error(
        &self,
        name: &'static str,
        expected: &'static str,
        value: &ArgValue,
    ) -> ArgError {
        ArgError::InvalidType {
            class: self.class,
            name,
            expected,
            actual: value.type_name(),
        }
    }

    pub fn value_error(&self, name: &'static str, message: impl Into<String>) -> ArgError {
        ArgError::InvalidValue {
            class: self.class,
            name,
            message: message.into(),
        }
    }

    /// Read a flag. Like Python's `if flag:`, any value is accepted and
    /// converted by truthiness, so `download=1` means `True`.
    pub fn bool_or(&mut self, name: &'static str, default: bool) -> bool {
        self.take(name).map_or(default, |value| value.is_truthy())
    }

    fn to_int(&self, name: &'static str, value: ArgValue) -> Result<i64, ArgError> {
        match value {
            ArgValue::Int(value) => Ok(value),
            value => Err(self.type_error(name, "int", &value)),
        }
    }

    pub fn int(&mut self, name: &'static str) -> Result<i64, ArgError> {
        let value = self.required(name)?;
        self.to_int(name, value)
    }

    pub fn opt_int(&mut self, name: &'static str) -> Result<Option<i64>, ArgError> {
        self.take(name).map(|v| self.to_int(name, v)).transpose()
    }

    pub fn int_or(&mut self, name: &'static str, default: i64) -> Result<i64, ArgError> {
        Ok(self.opt_int(name)?.unwrap_or(default))
    }

    /// Read a size parameter that is either a positive integer or a
    /// symbolic size supplied by the host.
    pub fn positive_dim(&mut self, name: &'static str) -> Result<SymExpr, ArgError> {
        match self.required(name)? {
            ArgValue::Int(value) => {
                let value = self.check_positive(name, value)?;
                Ok(SymExpr::size(value))
            }
            ArgValue::Dim(expr) => Ok(expr),
            value => Err(self.type_error(name, "int", &value)),
        }
    }

    fn check_positive(&self, name: &'static str, value: i64) -> Result<usize, ArgError> {
        match usize::try_from(value) {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(self.value_error(
                name,
                format!("expected a positive integer, got {}", value),
            )),
        }
    }

    fn check_non_negative(&self, name: &'static str, value: i64) -> Result<usize, ArgError> {
        usize::try_from(value).map_err(|_| {
            self.value_error(name, format!("expected a non-negative integer, got {}", value))
        })
    }

    pub fn float_or(&mut self, name: &'static str, default: f64) -> Result<f64, ArgError> {
        match self.take(name) {
            None => Ok(default),
            Some(ArgValue::Float(value)) => Ok(value),
            Some(ArgValue::Int(value)) => Ok(value as f64),
            Some(value) => Err(self.type_error(name, "float", &value)),
        }
    }

    /// Read a probability in `[0, 1]`.
    pub fn probability_or(&mut self, name: &'static str, default: f64) -> Result<f64, ArgError> {
        let p = self.float_or(name, default)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(self.value_error(
                name,
                format!("probability has to be between 0 and 1, but got {}", p),
            ));
        }
        Ok(p)
    }

    pub fn str_or(&mut self, name: &'static str, default: &str) -> Result<String, ArgError> {
        match self.take(name) {
            None => Ok(default.to_string()),
            Some(ArgValue::Str(value)) => Ok(value),
            Some(value) => Err(self.type_error(name, "str", &value)),
        }
    }

    /// Read a filesystem path. The path is recorded, never accessed.
    pub fn path(&mut self, name: &'static str) -> Result<PathBuf, ArgError> {
        match self.required(name)? {
            ArgValue::Str(value) => Ok(PathBuf::from(value)),
            value => Err(self.type_error(name, "str", &value)),
        }
    }

    /// Read a `transform` style argument.
    ///
    /// A callable the host cannot model, given as [`ArgValue::Opaque`], is
    /// accepted and applied as the identity.
    pub fn transform(&mut self, name: &'static str) -> Result<Option<Transform>, ArgError> {
        match self.take(name) {
            None => Ok(None),
            Some(ArgValue::Transform(t)) => Ok(Some(t)),
            Some(ArgValue::Opaque(callable)) => {
                Ok(Some(Transform::from_fn(&callable, |item| item)))
            }
            Some(value) => Err(self.type_error(name, "callable", &value)),
        }
    }

    /// Read a value that is either an int or a tuple of `N` ints, as used
    /// for kernel sizes, strides and paddings.
    fn int_tuple<const N: usize>(
        &self,
        name: &'static str,
        value: ArgValue,
    ) -> Result<[i64; N], ArgError> {
        match value {
            ArgValue::Int(v) => Ok([v; N]),
            ArgValue::Tuple(items) if items.len() == N => {
                let mut out = [0; N];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = self.to_int(name, item)?;
                }
                Ok(out)
            }
            ArgValue::Tuple(items) => Err(self.value_error(
                name,
                format!("expected {} values, got {}", N, items.len()),
            )),
            value => Err(self.type_error(name, "int or tuple", &value)),
        }
    }

    /// Read an `int | (int, int)` parameter of positive values.
    pub fn positive_pair(&mut self, name: &'static str) -> Result<[usize; 2], ArgError> {
        let value = self.required(name)?;
        let [a, b] = self.int_tuple::<2>(name, value)?;
        Ok([self.check_positive(name, a)?, self.check_positive(name, b)?])
    }

    /// Read an optional `int | (int, int)` parameter of positive values.
    pub fn opt_positive_pair(
        &mut self,
        name: &'static str,
    ) -> Result<Option<[usize; 2]>, ArgError> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => {
                let [a, b] = self.int_tuple::<2>(name, value)?;
                Ok(Some([
                    self.check_positive(name, a)?,
                    self.check_positive(name, b)?,
                ]))
            }
        }
    }

    /// Read an `int | (int, ...)` parameter of `N` non-negative values.
    pub fn non_negative_tuple_or<const N: usize>(
        &mut self,
        name: &'static str,
        default: [usize; N],
    ) -> Result<[usize; N], ArgError> {
        match self.take(name) {
            None => Ok(default),
            Some(value) => self.non_negative_tuple(name, value),
        }
    }

    /// Convert an already taken `int | (int, ...)` value to `N` non-negative
    /// values.
    pub fn non_negative_tuple<const N: usize>(
        &self,
        name: &'static str,
        value: ArgValue,
    ) -> Result<[usize; N], ArgError> {
        let values = self.int_tuple::<N>(name, value)?;
        let mut out = [0; N];
        for (slot, v) in out.iter_mut().zip(values) {
            *slot = self.check_non_negative(name, v)?;
        }
        Ok(out)
    }

    /// Read an output size given as `int | (int | None, int | None)`.
    pub fn output_size(&mut self, name: &'static str) -> Result<[Option<usize>; 2], ArgError> {
        match self.required(name)? {
            ArgValue::Int(v) => {
                let v = self.check_positive(name, v)?;
                Ok([Some(v), Some(v)])
            }
            ArgValue::Tuple(items) if items.len() == 2 => {
                let mut out = [None; 2];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = match item {
                        ArgValue::None => None,
                        item => {
                            let v = self.to_int(name, item)?;
                            Some(self.check_positive(name, v)?)
                        }
                    };
                }
                Ok(out)
            }
            value => Err(self.type_error(name, "int or tuple", &value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pystub_shape::SymExpr;

    use super::{ArgError, ArgValue, CallArgs, Signature};
    use crate::item::Item;

    const CIFAR: Signature = Signature::new(&[
        "root",
        "train",
        "transform",
        "target_transform",
        "download",
    ]);

    #[test]
    fn test_bind_positional_and_keyword() {
        let args = CallArgs::new()
            .arg("data")
            .arg(false)
            .kwarg("download", true);
        let mut bound = CIFAR.bind("CIFAR10", args).unwrap();
        assert_eq!(bound.path("root").unwrap().to_str(), Some("data"));
        assert!(!bound.bool_or("train", true));
        assert!(bound.bool_or("download", false));
        assert!(bound.transform("transform").unwrap().is_none());
    }

    #[test]
    fn test_none_uses_default() {
        let args = CallArgs::new()
            .arg("data")
            .kwarg("train", ArgValue::None);
        let mut bound = CIFAR.bind("CIFAR10", args).unwrap();
        assert!(bound.bool_or("train", true));
    }

    #[test]
    fn test_bind_errors() {
        let err = CIFAR
            .bind("CIFAR10", CallArgs::new().arg("data").kwarg("size", 3))
            .unwrap_err();
        assert_eq!(
            err,
            ArgError::UnexpectedKeyword {
                class: "CIFAR10",
                name: "size".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "CIFAR10() got an unexpected keyword argument 'size'"
        );

        let err = CIFAR
            .bind("CIFAR10", CallArgs::new().arg("data").kwarg("root", "other"))
            .unwrap_err();
        assert!(matches!(err, ArgError::DuplicateArgument { .. }));

        let mut args = CallArgs::new();
        for _ in 0..6 {
            args = args.arg(true);
        }
        let err = CIFAR.bind("CIFAR10", args).unwrap_err();
        assert_eq!(
            err,
            ArgError::TooManyPositional {
                class: "CIFAR10",
                max: 5,
                given: 6
            }
        );

        let mut bound = CIFAR.bind("CIFAR10", CallArgs::new()).unwrap();
        assert_eq!(
            bound.path("root").unwrap_err(),
            ArgError::MissingArgument {
                class: "CIFAR10",
                name: "root"
            }
        );
    }

    #[test]
    fn test_type_errors() {
        let mut bound = CIFAR
            .bind("CIFAR10", CallArgs::new().arg(3).arg("yes"))
            .unwrap();
        assert_eq!(
            bound.path("root").unwrap_err().to_string(),
            "CIFAR10() argument 'root' must be str, not int"
        );
        assert!(matches!(bound.transform("transform"), Ok(None)));

        let args = CallArgs::new().arg("data").kwarg("transform", 1);
        let mut bound = CIFAR.bind("CIFAR10", args).unwrap();
        assert_eq!(
            bound.transform("transform").unwrap_err().to_string(),
            "CIFAR10() argument 'transform' must be callable, not int"
        );
    }

    #[test]
    fn test_flags_use_truthiness() {
        let cases: [(ArgValue, bool); 7] = [
            (ArgValue::Int(1), true),
            (ArgValue::Int(0), false),
            (ArgValue::Float(0.0), false),
            ("yes".into(), true),
            ("".into(), false),
            (ArgValue::Tuple(Vec::new()), false),
            (ArgValue::Opaque("object".into()), true),
        ];

        for (value, expected) in cases {
            let args = CallArgs::new().arg("data").kwarg("download", value.clone());
            let mut bound = CIFAR.bind("CIFAR10", args).unwrap();
            assert_eq!(
                bound.bool_or("download", !expected),
                expected,
                "truthiness of {:?}",
                value
            );
        }
    }

    #[test]
    fn test_opaque_transform() {
        let args = CallArgs::new()
            .arg("data")
            .kwarg("transform", ArgValue::Opaque("my_augment".into()));
        let mut bound = CIFAR.bind("CIFAR10", args).unwrap();
        let transform = bound.transform("transform").unwrap().unwrap();
        assert_eq!(transform.name(), "my_augment");
        assert_eq!(transform.apply(Item::Int(3)), Item::Int(3));
    }

    #[test]
    fn test_int_tuples() {
        const SIG: Signature = Signature::new(&["kernel_size", "padding", "output_size"]);

        let args = CallArgs::new()
            .arg(3)
            .arg(vec![ArgValue::Int(1), ArgValue::Int(2)])
            .arg(vec![ArgValue::None, ArgValue::Int(7)]);
        let mut bound = SIG.bind("Test", args).unwrap();
        assert_eq!(bound.positive_pair("kernel_size"), Ok([3, 3]));
        assert_eq!(bound.non_negative_tuple_or("padding", [0, 0]), Ok([1, 2]));
        assert_eq!(bound.output_size("output_size"), Ok([None, Some(7)]));

        let mut bound = SIG.bind("Test", CallArgs::new().arg(0)).unwrap();
        assert!(matches!(
            bound.positive_pair("kernel_size"),
            Err(ArgError::InvalidValue { .. })
        ));

        let args = CallArgs::new().kwarg("padding", vec![ArgValue::Int(1); 3]);
        let mut bound = SIG.bind("Test", args).unwrap();
        assert!(bound.non_negative_tuple_or("padding", [0, 0]).is_err());
    }

    #[test]
    fn test_positive_dim() {
        const SIG: Signature = Signature::new(&["in_features", "out_features"]);

        let args = CallArgs::new().arg(SymExpr::from("n")).arg(10);
        let mut bound = SIG.bind("Linear", args).unwrap();
        assert_eq!(bound.positive_dim("in_features"), Ok(SymExpr::from("n")));
        assert_eq!(bound.positive_dim("out_features"), Ok(SymExpr::from(10)));

        let args = CallArgs::new().arg(0).arg(1.5);
        let mut bound = SIG.bind("Linear", args).unwrap();
        assert!(matches!(
            bound.positive_dim("in_features"),
            Err(ArgError::InvalidValue { .. })
        ));
        assert_eq!(
            bound.positive_dim("out_features").unwrap_err().to_string(),
            "Linear() argument 'out_features' must be int, not float"
        );
    }

    #[test]
    fn test_variadic() {
        const SEQ: Signature = Signature::variadic(&[]);
        let mut bound = SEQ
            .bind("Sequential", CallArgs::new().arg(1).arg(2))
            .unwrap();
        assert_eq!(bound.take_rest().len(), 2);

        assert!(SEQ
            .bind("Sequential", CallArgs::new().kwarg("x", 1))
            .is_err());
    }

    #[test]
    fn test_arg_value_from() {
        assert!(matches!(ArgValue::from(SymExpr::from(4)), ArgValue::Int(4)));
        assert!(matches!(ArgValue::from(SymExpr::from("n")), ArgValue::Dim(_)));
        assert!(matches!(ArgValue::from(None::<i64>), ArgValue::None));
        assert_eq!(ArgValue::from(0.5).type_name(), "float");
    }
}
