//! Symbolic expressions for dimension sizes.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

/// A named placeholder for a value that is unknown until the analyzed program
/// runs.
///
/// Symbols are normally supplied by the host analyzer. Two symbols are equal
/// if they have the same name.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,

    // True if this value is assumed to be >= 0.
    pub positive: bool,
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        self.name == other.name
    }
}

/// Integer expression describing a dimension size.
///
/// Expressions are either known integers, host-supplied symbols or
/// arithmetic combinations of the two. This crate never tries to prove
/// anything about a symbol; it only builds and folds expressions so that they
/// can be handed back to the host.
#[derive(Clone, PartialEq)]
pub enum SymExpr {
    /// Known integer value.
    Value(i64),
    /// Host-supplied placeholder.
    Var(Arc<Symbol>),
    Add(Arc<SymExpr>, Arc<SymExpr>),
    Sub(Arc<SymExpr>, Arc<SymExpr>),
    Mul(Arc<SymExpr>, Arc<SymExpr>),
    /// Flooring division.
    Div(Arc<SymExpr>, Arc<SymExpr>),
    /// Ceiling division.
    DivCeil(Arc<SymExpr>, Arc<SymExpr>),
    /// Result of broadcasting two sizes against each other.
    ///
    /// Implies that both sizes are equal or one of them is 1.
    Broadcast(Arc<SymExpr>, Arc<SymExpr>),
    Neg(Arc<SymExpr>),
}

impl SymExpr {
    /// Create a named symbol with no assumptions about its value.
    pub fn var(name: &str) -> Self {
        SymExpr::Var(
            Symbol {
                name: name.to_string(),
                positive: false,
            }
            .into(),
        )
    }

    /// Create a named symbol representing a value `>= 0`.
    pub fn pos_var(name: &str) -> Self {
        SymExpr::Var(
            Symbol {
                name: name.to_string(),
                positive: true,
            }
            .into(),
        )
    }

    /// Create an expression for a known size.
    pub fn size(size: usize) -> Self {
        SymExpr::Value(size as i64)
    }

    /// Return the value of this expression if it is a known integer.
    pub fn as_value(&self) -> Option<i64> {
        match self {
            Self::Value(x) => Some(*x),
            _ => None,
        }
    }

    /// Return the symbol if this expression is a bare placeholder.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Var(sym) => Some(sym),
            _ => None,
        }
    }

    /// Return true if this expression contains no symbols.
    pub fn is_known(&self) -> bool {
        self.as_value().is_some()
    }

    /// Return true if the value of this expression is known to be >= 0.
    pub fn is_positive(&self) -> bool {
        match self {
            Self::Value(x) => *x >= 0,
            Self::Var(sym) => sym.positive,
            Self::Neg(_) | Self::Sub(..) => false,
            Self::Add(lhs, rhs)
            | Self::Mul(lhs, rhs)
            | Self::Div(lhs, rhs)
            | Self::DivCeil(lhs, rhs) => lhs.is_positive() && rhs.is_positive(),
            Self::Broadcast(..) => true,
        }
    }

    /// Return the result of dividing `self` by `other`, rounded up.
    pub fn div_ceil(&self, other: &SymExpr) -> SymExpr {
        Self::DivCeil(self.clone().into(), other.clone().into())
    }

    /// Return the result of broadcasting `self` against `other`.
    pub fn broadcast(&self, other: &SymExpr) -> SymExpr {
        Self::Broadcast(self.clone().into(), other.clone().into())
    }

    /// Fold constants and remove identities.
    ///
    /// Sums are flattened so that constants collect into a single trailing
    /// term and equal terms of opposite sign cancel, eg. `(h - 2) - 1 + 1`
    /// becomes `h - 2`. Products collect constants into a leading factor.
    pub fn simplify(&self) -> SymExpr {
        match self {
            Self::Value(_) | Self::Var(_) => self.clone(),
            Self::Neg(x) => match x.simplify() {
                Self::Value(v) => Self::Value(-v),
                Self::Neg(inner) => (*inner).clone(),
                x => Self::Neg(x.into()),
            },
            Self::Add(..) | Self::Sub(..) => simplify_sum(self),
            Self::Mul(..) => simplify_product(self),
            Self::Div(lhs, rhs) => match (lhs.simplify(), rhs.simplify()) {
                (lhs, Self::Value(1)) => lhs,
                (Self::Value(x), Self::Value(y)) if y != 0 => Self::Value(div_floor(x, y)),
                (lhs, rhs) if lhs == rhs => Self::Value(1),
                (lhs, rhs) => Self::Div(lhs.into(), rhs.into()),
            },
            Self::DivCeil(lhs, rhs) => match (lhs.simplify(), rhs.simplify()) {
                (lhs, Self::Value(1)) => lhs,
                (Self::Value(x), Self::Value(y)) if y != 0 => Self::Value(div_ceil(x, y)),
                (lhs, rhs) if lhs == rhs => Self::Value(1),
                (lhs, rhs) => Self::DivCeil(lhs.into(), rhs.into()),
            },
            Self::Broadcast(lhs, rhs) => match (lhs.simplify(), rhs.simplify()) {
                (lhs, rhs) if lhs == rhs => lhs,
                (Self::Value(1), other) | (other, Self::Value(1)) => other,
                (Self::Value(x), _) | (_, Self::Value(x)) => Self::Value(x),
                (lhs, rhs) => Self::Broadcast(lhs.into(), rhs.into()),
            },
        }
    }

    /// Evaluate the expression, looking up symbol values with `lookup`.
    pub fn eval(&self, lookup: &impl Fn(&str) -> Option<i64>) -> Result<i64, EvalError> {
        let binop = |lhs: &SymExpr, rhs: &SymExpr| -> Result<(i64, i64), EvalError> {
            Ok((lhs.eval(lookup)?, rhs.eval(lookup)?))
        };
        match self {
            Self::Value(x) => Ok(*x),
            Self::Var(sym) => {
                lookup(&sym.name).ok_or_else(|| EvalError::UnboundSymbol(sym.name.clone()))
            }
            Self::Neg(x) => Ok(-x.eval(lookup)?),
            Self::Add(lhs, rhs) => binop(lhs, rhs).map(|(x, y)| x + y),
            Self::Sub(lhs, rhs) => binop(lhs, rhs).map(|(x, y)| x - y),
            Self::Mul(lhs, rhs) => binop(lhs, rhs).map(|(x, y)| x * y),
            Self::Div(lhs, rhs) => match binop(lhs, rhs)? {
                (_, 0) => Err(EvalError::DivideByZero),
                (x, y) => Ok(div_floor(x, y)),
            },
            Self::DivCeil(lhs, rhs) => match binop(lhs, rhs)? {
                (_, 0) => Err(EvalError::DivideByZero),
                (x, y) => Ok(div_ceil(x, y)),
            },
            Self::Broadcast(lhs, rhs) => match binop(lhs, rhs)? {
                (x, y) if x == y || y == 1 => Ok(x),
                (1, y) => Ok(y),
                _ => Err(EvalError::BroadcastMismatch),
            },
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Value(_)
            | Self::Var(_)
            | Self::Neg(_)
            | Self::DivCeil(..)
            | Self::Broadcast(..) => 4,
            Self::Div(..) => 3,
            Self::Mul(..) => 2,
            Self::Add(..) | Self::Sub(..) => 1,
        }
    }
}

/// Errors from [`SymExpr::eval`].
#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    /// A symbol had no value.
    UnboundSymbol(String),
    DivideByZero,
    /// Two sizes that were broadcast together are incompatible.
    BroadcastMismatch,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundSymbol(name) => write!(f, "no value for symbol \"{}\"", name),
            Self::DivideByZero => write!(f, "division by zero"),
            Self::BroadcastMismatch => write!(f, "sizes cannot be broadcast"),
        }
    }
}

impl std::error::Error for EvalError {}

// Flatten a tree of additions, subtractions and negations into signed terms.
fn collect_sum_terms(expr: &SymExpr, negate: bool, terms: &mut Vec<(bool, SymExpr)>) {
    match expr {
        SymExpr::Add(lhs, rhs) => {
            collect_sum_terms(lhs, negate, terms);
            collect_sum_terms(rhs, negate, terms);
        }
        SymExpr::Sub(lhs, rhs) => {
            collect_sum_terms(lhs, negate, terms);
            collect_sum_terms(rhs, !negate, terms);
        }
        SymExpr::Neg(x) => collect_sum_terms(x, !negate, terms),
        _ => match expr.simplify() {
            // Division by one and similar identities can expose a nested sum.
            sum @ (SymExpr::Add(..) | SymExpr::Sub(..) | SymExpr::Neg(_)) => {
                collect_sum_terms(&sum, negate, terms)
            }
            term => terms.push((negate, term)),
        },
    }
}

fn simplify_sum(expr: &SymExpr) -> SymExpr {
    let mut terms = Vec::new();
    collect_sum_terms(expr, false, &mut terms);

    let mut constant = 0;
    let mut symbolic: Vec<(bool, SymExpr)> = Vec::with_capacity(terms.len());
    for (negate, term) in terms {
        if let SymExpr::Value(x) = term {
            constant += if negate { -x } else { x };
            continue;
        }
        if let Some(pos) = symbolic.iter().position(|(n, t)| *n != negate && *t == term) {
            symbolic.remove(pos);
        } else {
            symbolic.push((negate, term));
        }
    }

    let mut iter = symbolic.into_iter();
    let Some((first_neg, first)) = iter.next() else {
        return SymExpr::Value(constant);
    };
    let mut result = if first_neg { -first } else { first };
    for (negate, term) in iter {
        result = if negate { result - term } else { result + term };
    }
    match constant {
        0 => result,
        c if c < 0 => result - SymExpr::Value(-c),
        c => result + SymExpr::Value(c),
    }
}

fn collect_factors(expr: &SymExpr, factors: &mut Vec<SymExpr>) {
    if let SymExpr::Mul(lhs, rhs) = expr {
        collect_factors(lhs, factors);
        collect_factors(rhs, factors);
    } else {
        match expr.simplify() {
            product @ SymExpr::Mul(..) => collect_factors(&product, factors),
            factor => factors.push(factor),
        }
    }
}

fn simplify_product(expr: &SymExpr) -> SymExpr {
    let mut factors = Vec::new();
    collect_factors(expr, &mut factors);

    let mut constant = 1;
    let mut symbolic = Vec::with_capacity(factors.len());
    for factor in factors {
        match factor {
            SymExpr::Value(x) => constant *= x,
            other => symbolic.push(other),
        }
    }
    if constant == 0 {
        return SymExpr::Value(0);
    }

    let product = symbolic.into_iter().reduce(|prod, x| prod * x);
    match (constant, product) {
        (c, None) => SymExpr::Value(c),
        (1, Some(product)) => product,
        (c, Some(product)) => SymExpr::Value(c) * product,
    }
}

/// Integer division rounding towards negative infinity, as Python's `//`.
pub fn div_floor(lhs: i64, rhs: i64) -> i64 {
    let d = lhs / rhs;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        d - 1
    } else {
        d
    }
}

/// Integer division rounding towards positive infinity.
pub fn div_ceil(lhs: i64, rhs: i64) -> i64 {
    let d = lhs / rhs;
    if lhs % rhs != 0 && ((lhs < 0) == (rhs < 0)) {
        d + 1
    } else {
        d
    }
}

impl Add<SymExpr> for SymExpr {
    type Output = SymExpr;

    fn add(self, rhs: SymExpr) -> Self {
        Self::Add(self.into(), rhs.into())
    }
}

impl Sub<SymExpr> for SymExpr {
    type Output = SymExpr;

    fn sub(self, rhs: SymExpr) -> Self {
        Self::Sub(self.into(), rhs.into())
    }
}

impl Mul<SymExpr> for SymExpr {
    type Output = SymExpr;

    fn mul(self, rhs: SymExpr) -> Self {
        Self::Mul(self.into(), rhs.into())
    }
}

impl Div<SymExpr> for SymExpr {
    type Output = SymExpr;

    fn div(self, rhs: SymExpr) -> Self {
        Self::Div(self.into(), rhs.into())
    }
}

impl Neg for SymExpr {
    type Output = SymExpr;

    fn neg(self) -> Self {
        Self::Neg(self.into())
    }
}

impl From<Symbol> for SymExpr {
    fn from(val: Symbol) -> Self {
        Self::Var(val.into())
    }
}

/// Create a symbol that is assumed to be positive, since symbols in this
/// crate almost always stand for dimension sizes.
impl<'a> From<&'a str> for SymExpr {
    fn from(name: &'a str) -> Self {
        SymExpr::pos_var(name)
    }
}

impl From<i64> for SymExpr {
    fn from(val: i64) -> Self {
        SymExpr::Value(val)
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = |f: &mut fmt::Formatter<'_>, expr: &SymExpr, strict: bool| {
            let needs_parens = if strict {
                expr.precedence() <= self.precedence()
            } else {
                expr.precedence() < self.precedence()
            };
            if needs_parens {
                write!(f, "({})", expr)
            } else {
                write!(f, "{}", expr)
            }
        };
        let binop = |f: &mut fmt::Formatter<'_>, op, lhs, rhs| {
            operand(f, lhs, false)?;
            write!(f, " {op} ")?;
            // Right operand of `-` and `/` needs parens at equal precedence.
            operand(f, rhs, matches!(op, '-' | '/'))
        };
        match self {
            Self::Value(val) => write!(f, "{}", val),
            Self::Var(sym) => write!(f, "{}", sym.name),
            Self::Neg(expr) => {
                write!(f, "-")?;
                operand(f, expr, false)
            }
            Self::Add(lhs, rhs) => binop(f, '+', lhs, rhs),
            Self::Sub(lhs, rhs) => binop(f, '-', lhs, rhs),
            Self::Mul(lhs, rhs) => binop(f, '*', lhs, rhs),
            Self::Div(lhs, rhs) => binop(f, '/', lhs, rhs),
            Self::DivCeil(lhs, rhs) => write!(f, "ceil_div({}, {})", lhs, rhs),
            Self::Broadcast(lhs, rhs) => write!(f, "broadcast({}, {})", lhs, rhs),
        }
    }
}

impl fmt::Debug for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(sym) => write!(
                f,
                "\"{}\"{}",
                sym.name,
                if sym.positive { 'u' } else { 'i' }
            ),
            _ => write!(f, "{}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{div_ceil, div_floor, EvalError, SymExpr};

    #[test]
    fn test_simplify_sum() {
        let h = SymExpr::from("h");

        // h + 0 => h
        assert_eq!((h.clone() + SymExpr::from(0)).simplify(), h);

        // (h + 2) - 3 => h - 1
        let expr = (h.clone() + SymExpr::from(2)) - SymExpr::from(3);
        assert_eq!(expr.simplify(), h.clone() - SymExpr::from(1));

        // h - h => 0
        assert_eq!((h.clone() - h.clone()).simplify(), SymExpr::from(0));

        // h + w - h => w
        let w = SymExpr::from("w");
        assert_eq!((h.clone() + w.clone() - h.clone()).simplify(), w);

        // -(-h) => h
        assert_eq!((-(-h.clone())).simplify(), h);
    }

    #[test]
    fn test_simplify_product() {
        let h = SymExpr::from("h");

        assert_eq!((h.clone() * SymExpr::from(1)).simplify(), h);
        assert_eq!((h.clone() * SymExpr::from(0)).simplify(), SymExpr::from(0));

        // 2 * h * 3 => 6 * h
        let expr = SymExpr::from(2) * h.clone() * SymExpr::from(3);
        assert_eq!(expr.simplify(), SymExpr::from(6) * h);
    }

    #[test]
    fn test_simplify_div() {
        let h = SymExpr::from("h");

        assert_eq!((SymExpr::from(7) / SymExpr::from(2)).simplify(), 3.into());
        assert_eq!((h.clone() / SymExpr::from(1)).simplify(), h);
        assert_eq!((h.clone() / h.clone()).simplify(), 1.into());
        assert_eq!(
            (SymExpr::from(5) / SymExpr::from(0)).simplify(),
            SymExpr::from(5) / SymExpr::from(0)
        );

        assert_eq!(SymExpr::from(7).div_ceil(&2.into()).simplify(), 4.into());
        assert_eq!(h.div_ceil(&1.into()).simplify(), h);
    }

    #[test]
    fn test_simplify_broadcast() {
        let h = SymExpr::from("h");
        let one = SymExpr::from(1);
        let ten = SymExpr::from(10);

        assert_eq!(h.broadcast(&one).simplify(), h);
        assert_eq!(one.broadcast(&h).simplify(), h);
        assert_eq!(h.broadcast(&ten).simplify(), ten);
        assert_eq!(h.broadcast(&h).simplify(), h);
    }

    #[test]
    fn test_conv_output_size_folds() {
        // (h + 2*1 - 1*(3 - 1) - 1) / 1 + 1 => h
        let h = SymExpr::from("h");
        let expr = (h.clone() + SymExpr::from(2)
            - SymExpr::from(1) * (SymExpr::from(3) - SymExpr::from(1))
            - SymExpr::from(1))
            / SymExpr::from(1)
            + SymExpr::from(1);
        assert_eq!(expr.simplify(), h);
    }

    #[test]
    fn test_eval() {
        let h = SymExpr::from("h");
        let expr = (h.clone() - SymExpr::from(3)) / SymExpr::from(2) + SymExpr::from(1);
        let lookup = |name: &str| (name == "h").then_some(28);
        assert_eq!(expr.eval(&lookup), Ok(13));

        let unbound = SymExpr::from("w") + h;
        assert_eq!(
            unbound.eval(&lookup),
            Err(EvalError::UnboundSymbol("w".to_string()))
        );
    }

    #[test]
    fn test_integer_division() {
        assert_eq!(div_ceil(7, 2), 4);
        assert_eq!(div_ceil(8, 2), 4);
        assert_eq!(div_ceil(0, 3), 0);
        assert_eq!(div_ceil(-7, 2), -3);

        assert_eq!(div_floor(7, 2), 3);
        assert_eq!(div_floor(-7, 2), -4);
    }

    #[test]
    fn test_display() {
        let expr = (SymExpr::from("h") - SymExpr::from(3)) / SymExpr::from(2) + SymExpr::from(1);
        assert_eq!(expr.to_string(), "(h - 3) / 2 + 1");

        let expr = SymExpr::from("a") - (SymExpr::from("b") - SymExpr::from("c"));
        assert_eq!(expr.to_string(), "a - (b - c)");

        let expr = (SymExpr::from("h") - SymExpr::from("w")) + SymExpr::from(2);
        assert_eq!(expr.to_string(), "h - w + 2");
        assert_eq!((-SymExpr::from("h")).to_string(), "-h");
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", SymExpr::from("batch")), "\"batch\"u");
        assert_eq!(format!("{:?}", SymExpr::var("n")), "\"n\"i");
        assert_eq!(format!("{:?}", SymExpr::from(4)), "4");
    }
}
