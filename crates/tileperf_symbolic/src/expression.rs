use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
    ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign},
    sync::Arc,
};

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::{simplify, BinaryOp, CmpOp, Number, Result, SymbolicError};

/// An immutable, structurally shared symbolic expression.
///
/// Cloning is cheap (a reference count bump). Two expressions compare equal
/// iff they have the same shape and the same leaves, regardless of whether
/// they share storage.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

struct Node {
    kind: ExprKind,
    hash: u64,
    has_placeholder: bool,
}

/// The shape of one expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// A named unknown, such as a tile size or the core count
    Symbol(Arc<str>),
    Literal(Number),
    Binary(BinaryOp, Expr, Expr),
    /// Boolean valued; only folded when both sides are literals
    Compare(CmpOp, Expr, Expr),
    /// `if cond then .0 else .1`, kept inline
    Ternary(Expr, Expr, Expr),
    /// Reference to a ternary stored in a [`crate::TernaryRegistry`]
    Placeholder(Arc<str>),
}

impl Expr {
    pub(crate) fn new(kind: ExprKind) -> Self {
        let mut hasher = FxHasher::default();
        kind.hash(&mut hasher);
        let has_placeholder = match &kind {
            ExprKind::Symbol(_) | ExprKind::Literal(_) => false,
            ExprKind::Placeholder(_) => true,
            ExprKind::Binary(_, a, b) | ExprKind::Compare(_, a, b) => {
                a.has_placeholder() || b.has_placeholder()
            }
            ExprKind::Ternary(c, t, e) => {
                c.has_placeholder() || t.has_placeholder() || e.has_placeholder()
            }
        };
        Self(Arc::new(Node {
            kind,
            hash: hasher.finish(),
            has_placeholder,
        }))
    }

    pub fn symbol(name: impl AsRef<str>) -> Self {
        Self::new(ExprKind::Symbol(Arc::from(name.as_ref())))
    }

    pub fn literal(value: Number) -> Self {
        Self::new(ExprKind::Literal(value))
    }

    pub fn int(value: i64) -> Self {
        Self::literal(Number::int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::literal(Number::float(value))
    }

    /// Exact `numer / denom`, reduced to lowest terms
    pub fn rational(numer: i64, denom: i64) -> Result<Self> {
        Number::rational(numer, denom).map(Self::literal)
    }

    /// A reference to a registry entry. Prints as its bare name until resolved.
    pub fn placeholder(name: impl AsRef<str>) -> Self {
        Self::new(ExprKind::Placeholder(Arc::from(name.as_ref())))
    }

    pub fn zero() -> Self {
        Self::int(0)
    }

    pub fn one() -> Self {
        Self::int(1)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// The literal value, if this expression is fully folded
    pub fn as_number(&self) -> Option<Number> {
        match self.kind() {
            ExprKind::Literal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.to_f64())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind(), ExprKind::Literal(_))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Whether any registry placeholder is still referenced inside this tree
    pub fn has_placeholder(&self) -> bool {
        self.0.has_placeholder
    }

    /// Expressions usable as a ternary condition
    pub fn is_boolean_shaped(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::Compare(..) | ExprKind::Ternary(..) | ExprKind::Placeholder(_)
        )
    }

    /// Every distinct symbol name in the tree, in first-seen order.
    pub fn symbols(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut out = vec![];
        let mut stack = vec![self.clone()];
        while let Some(e) = stack.pop() {
            match e.kind() {
                ExprKind::Symbol(name) => {
                    if seen.insert(name.clone()) {
                        out.push(name.to_string());
                    }
                }
                ExprKind::Literal(_) | ExprKind::Placeholder(_) => {}
                ExprKind::Binary(_, a, b) | ExprKind::Compare(_, a, b) => {
                    stack.push(b.clone());
                    stack.push(a.clone());
                }
                ExprKind::Ternary(c, t, f) => {
                    stack.push(f.clone());
                    stack.push(t.clone());
                    stack.push(c.clone());
                }
            }
        }
        out
    }

    /// Equality of two products up to how they were associated.
    ///
    /// `(b * c) * d` and `b * (c * d)` are the same stride but different
    /// trees. Both sides are flattened into a constant coefficient and a
    /// canonically sorted list of the remaining factors before comparing.
    pub fn product_eq(&self, other: &Expr) -> bool {
        self == other || simplify::product_form(self) == simplify::product_form(other)
    }

    /// Build `self op rhs`, folding literals and applying identities.
    pub fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Result<Expr> {
        let rhs = rhs.into();
        if let (Some(a), Some(b)) = (self.as_number(), rhs.as_number()) {
            return a.apply(op, b).map(Expr::literal);
        }
        if op.is_division() && rhs.as_number().is_some_and(|n| n.is_zero()) {
            return Err(SymbolicError::DivisionByZero);
        }
        Ok(simplify::normalize(op, self, rhs))
    }

    /// Division. Fails if the divisor is the literal zero.
    pub fn try_div(self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Div, rhs)
    }

    /// Truncating remainder. Fails if the divisor is the literal zero.
    pub fn try_rem(self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Mod, rhs)
    }

    /// Compare two expressions. Two literals fold to `1` or `0`.
    pub fn compare(self, op: CmpOp, rhs: impl Into<Expr>) -> Expr {
        let rhs = rhs.into();
        if let (Some(a), Some(b)) = (self.as_number(), rhs.as_number()) {
            return Expr::int(a.compare(op, b) as i64);
        }
        Expr::new(ExprKind::Compare(op, self, rhs))
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    /// Inline conditional. A literal condition picks its branch immediately;
    /// anything that is not boolean shaped is rejected.
    pub fn ternary(
        cond: impl Into<Expr>,
        then_branch: impl Into<Expr>,
        else_branch: impl Into<Expr>,
    ) -> Result<Expr> {
        let cond = cond.into();
        let (then_branch, else_branch) = (then_branch.into(), else_branch.into());
        if let Some(n) = cond.as_number() {
            return Ok(if n.is_zero() { else_branch } else { then_branch });
        }
        if !cond.is_boolean_shaped() {
            return Err(SymbolicError::InvalidCondition {
                cond: cond.to_string(),
            });
        }
        if then_branch == else_branch {
            return Ok(then_branch);
        }
        Ok(Expr::new(ExprKind::Ternary(cond, then_branch, else_branch)))
    }

    // `cond` comes from `compare`, so it is always a literal or a comparison
    fn select(cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        match cond.as_number() {
            Some(n) if n.is_zero() => else_branch,
            Some(_) => then_branch,
            None if then_branch == else_branch => then_branch,
            None => Expr::new(ExprKind::Ternary(cond, then_branch, else_branch)),
        }
    }

    /// Minimum
    pub fn min(self, rhs: impl Into<Expr>) -> Expr {
        let rhs = rhs.into();
        Self::select(self.clone().le(rhs.clone()), self, rhs)
    }

    /// Maximum
    pub fn max(self, rhs: impl Into<Expr>) -> Expr {
        let rhs = rhs.into();
        Self::select(self.clone().ge(rhs.clone()), self, rhs)
    }

    /// Replace every occurrence of the symbol `var` with `value`, re-folding
    /// whatever becomes literal on the way back up.
    pub fn substitute(&self, var: &str, value: &Expr) -> Result<Expr> {
        let mut values = FxHashMap::default();
        values.insert(var.to_string(), value.clone());
        self.substitute_all(&values)
    }

    /// Substitute several symbols at once.
    pub fn substitute_all(&self, values: &FxHashMap<String, Expr>) -> Result<Expr> {
        if values.is_empty() {
            return Ok(self.clone());
        }
        self.rewrite(
            &mut |e: &Expr| {
                Ok(match e.kind() {
                    ExprKind::Symbol(name) => values.get(&**name).cloned(),
                    _ => None,
                })
            },
            &mut FxHashMap::default(),
        )
    }

    /// Point placeholders at new names, leaving every other leaf untouched.
    pub fn rename_placeholders(&self, renames: &FxHashMap<Expr, Expr>) -> Result<Expr> {
        if renames.is_empty() || !self.has_placeholder() {
            return Ok(self.clone());
        }
        self.rewrite(
            &mut |e: &Expr| {
                Ok(match e.kind() {
                    ExprKind::Placeholder(_) => renames.get(e).cloned(),
                    _ => None,
                })
            },
            &mut FxHashMap::default(),
        )
    }

    /// Rebuild the tree bottom-up through the folding constructors. `leaf`
    /// may replace any node outright; shared subtrees are rewritten once.
    pub(crate) fn rewrite(
        &self,
        leaf: &mut dyn FnMut(&Expr) -> Result<Option<Expr>>,
        memo: &mut FxHashMap<Expr, Expr>,
    ) -> Result<Expr> {
        if let Some(done) = memo.get(self) {
            return Ok(done.clone());
        }
        let out = match leaf(self)? {
            Some(replacement) => replacement,
            None => match self.kind() {
                ExprKind::Symbol(_) | ExprKind::Literal(_) | ExprKind::Placeholder(_) => {
                    self.clone()
                }
                ExprKind::Binary(op, a, b) => {
                    let a = a.rewrite(leaf, memo)?;
                    let b = b.rewrite(leaf, memo)?;
                    a.binary(*op, b)?
                }
                ExprKind::Compare(op, a, b) => {
                    let a = a.rewrite(leaf, memo)?;
                    let b = b.rewrite(leaf, memo)?;
                    a.compare(*op, b)
                }
                ExprKind::Ternary(c, t, f) => {
                    let c = c.rewrite(leaf, memo)?;
                    let t = t.rewrite(leaf, memo)?;
                    let f = f.rewrite(leaf, memo)?;
                    Expr::ternary(c, t, f)?
                }
            },
        };
        memo.insert(self.clone(), out.clone());
        Ok(out)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash && self.kind() == other.kind())
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::zero()
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            ExprKind::Symbol(name) | ExprKind::Placeholder(name) => write!(f, "{name}"),
            ExprKind::Literal(n) => write!(f, "{n}"),
            ExprKind::Binary(op, a, b) => write!(f, "({a} {op} {b})"),
            ExprKind::Compare(op, a, b) => write!(f, "({a} {op} {b})"),
            ExprKind::Ternary(c, t, e) => write!(f, "TenaryOp({c}, {t}, {e})"),
        }
    }
}

impl Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl From<Number> for Expr {
    fn from(value: Number) -> Self {
        Expr::literal(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(value as i64)
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::int(value as i64)
    }
}

impl From<usize> for Expr {
    fn from(value: usize) -> Self {
        Expr::int(value as i64)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::float(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::symbol(value)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

// Add, Sub and Mul can never fail, so they get operators. Div and Mod go
// through `try_div` / `try_rem`.
macro_rules! infallible_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:expr) => {
        impl<E: Into<Expr>> $trait<E> for Expr {
            type Output = Expr;
            fn $method(self, rhs: E) -> Expr {
                let rhs = rhs.into();
                match (self.as_number(), rhs.as_number()) {
                    (Some(a), Some(b)) => Expr::literal(a.$method(b)),
                    _ => simplify::normalize($op, self, rhs),
                }
            }
        }

        impl<E: Into<Expr>> $trait<E> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: E) -> Expr {
                self.clone().$method(rhs)
            }
        }

        impl<E: Into<Expr>> $assign_trait<E> for Expr {
            fn $assign_method(&mut self, rhs: E) {
                *self = self.clone().$method(rhs);
            }
        }
    };
}

infallible_op!(Add, add, AddAssign, add_assign, BinaryOp::Add);
infallible_op!(Sub, sub, SubAssign, sub_assign, BinaryOp::Sub);
infallible_op!(Mul, mul, MulAssign, mul_assign, BinaryOp::Mul);

impl std::iter::Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Self {
        iter.fold(Expr::zero(), |acc, e| acc + e)
    }
}

impl std::iter::Product for Expr {
    fn product<I: Iterator<Item = Expr>>(iter: I) -> Self {
        iter.fold(Expr::one(), |acc, e| acc * e)
    }
}
