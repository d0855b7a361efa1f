use std::sync::Arc;

use pystub_shape::Shape;

use crate::args::{ArgError, ArgValue, BoundArgs, FromArgs, Signature};
use crate::nn::module::{one_input, Module, ShapeError};

fn to_module(
    args: &BoundArgs,
    name: &'static str,
    value: ArgValue,
) -> Result<Arc<dyn Module>, ArgError> {
    match value {
        ArgValue::Module(module) => Ok(module),
        value => Err(args.type_error(name, "Module", &value)),
    }
}

/// Runs a list of modules in order, feeding each output to the next module.
#[derive(Clone, Debug, Default)]
pub struct Sequential {
    modules: Vec<Arc<dyn Module>>,
}

impl Sequential {
    pub fn new(modules: Vec<Arc<dyn Module>>) -> Sequential {
        Sequential { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn name(&self) -> &str {
        "Sequential"
    }

    fn forward(&self, inputs: &[Shape]) -> Result<Shape, ShapeError> {
        let input = one_input(inputs)?;
        self.modules
            .iter()
            .try_fold(input.clone(), |shape, module| module.forward(&[shape]))
    }

    fn children(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }
}

impl FromArgs for Sequential {
    const SIGNATURE: Signature = Signature::variadic(&[]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let modules = args
            .take_rest()
            .into_iter()
            .map(|value| to_module(args, "args", value))
            .collect::<Result<_, _>>()?;
        Ok(Sequential { modules })
    }
}

/// Holds submodules in a list. It has no `forward` of its own.
#[derive(Clone, Debug, Default)]
pub struct ModuleList {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleList {
    pub fn new(modules: Vec<Arc<dyn Module>>) -> ModuleList {
        ModuleList { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Return the module at `index`, which may be negative as in Python.
    pub fn get(&self, index: i64) -> Option<&Arc<dyn Module>> {
        let index = pystub_shape::resolve_axis(self.modules.len(), index)?;
        self.modules.get(index)
    }

    pub fn push(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }
}

impl Module for ModuleList {
    fn name(&self) -> &str {
        "ModuleList"
    }

    fn forward(&self, _inputs: &[Shape]) -> Result<Shape, ShapeError> {
        Err(ShapeError::NotCallable("ModuleList"))
    }

    fn children(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }
}

impl FromArgs for ModuleList {
    const SIGNATURE: Signature = Signature::new(&["modules"]);

    fn from_args(args: &mut BoundArgs) -> Result<Self, ArgError> {
        let modules = match args.take("modules") {
            None => Vec::new(),
            Some(ArgValue::Tuple(items)) => items
                .into_iter()
                .map(|value| to_module(args, "modules", value))
                .collect::<Result<_, _>>()?,
            Some(value) => return Err(args.type_error("modules", "iterable", &value)),
        };
        Ok(ModuleList { modules })
    }
}
