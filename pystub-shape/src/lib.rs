//! Shapes and sizing policies for library stubs.
//!
//! Stub objects stand in for tensors, images and datasets during static
//! analysis. They carry a [`Shape`] instead of data. Each dimension of a shape
//! is a [`SymExpr`]: either a known integer or a placeholder [`Symbol`]
//! supplied by the host analyzer. This crate builds and folds such
//! expressions, but does not reason about them; deciding whether two symbolic
//! sizes are compatible is left to the host.
//!
//! When a stub creates a new object, the object's shape comes from a
//! [`ShapePolicy`], a per-dimension table where each entry is a fixed size, a
//! closed range from which a size is drawn, or a placeholder. Draws use an
//! explicitly supplied [`RandomSource`].

mod policy;
mod rng;
mod shape;
mod sym_expr;
mod sym_gen;

pub use policy::{DimPolicy, IntRange, PolicyError, ShapePolicy};
pub use rng::{Pick, RandomSource, ScriptedRng};
pub use shape::{resolve_axis, Shape};
pub use sym_expr::{div_ceil, div_floor, EvalError, SymExpr, Symbol};
pub use sym_gen::SymbolGen;
