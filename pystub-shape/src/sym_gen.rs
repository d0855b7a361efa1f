//! Symbol name generator.

use std::borrow::Cow;

use crate::sym_expr::{SymExpr, Symbol};

/// Generates fresh placeholder symbols.
///
/// Hosts use this to mint placeholders for sizes they cannot resolve, such as
/// a batch size chosen at runtime, before handing them to stub constructors
/// or shape policies.
pub struct SymbolGen {
    prefix: Cow<'static, str>,
    next_symbol_id: u32,
}

impl Default for SymbolGen {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolGen {
    pub fn new() -> Self {
        Self::with_prefix("dim".into())
    }

    pub fn with_prefix(prefix: Cow<'static, str>) -> Self {
        Self {
            prefix,
            next_symbol_id: 0,
        }
    }

    fn gen_name(&mut self) -> String {
        self.next_symbol_id += 1;
        format!("{}_{}", self.prefix, self.next_symbol_id)
    }

    /// Generate a new symbol which is assumed to be positive.
    pub fn gen_positive(&mut self) -> SymExpr {
        Symbol {
            name: self.gen_name(),
            positive: true,
        }
        .into()
    }
}
