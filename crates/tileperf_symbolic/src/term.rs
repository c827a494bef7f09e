use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
    ops::{Add, Mul, Sub},
};

use num::{integer::Integer, rational::Rational64};
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, One, ToPrimitive, Zero};

use crate::{Result, SymbolicError};

/// Arithmetic operators that combine two expressions into a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul)
    }

    /// Operators whose right-hand side must never be zero
    pub fn is_division(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }

    fn apply_f64(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
        }
    }
}

/// Comparison operators. Comparisons are boolean-valued: once decided they
/// fold to the literal `1` or `0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum CmpOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl CmpOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// A numeric literal: either an exact rational kept in lowest terms, or an
/// IEEE double. Any float operand makes the result of an operation a float.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Rational(Rational64),
    Float(f64),
}

impl Number {
    pub fn int(value: i64) -> Self {
        Number::Rational(Rational64::from_integer(value))
    }

    /// `numer / denom` in lowest terms. A value whose reduced form does not
    /// fit in `i64`, such as `i64::MIN / -1`, becomes a float.
    pub fn rational(numer: i64, denom: i64) -> Result<Self> {
        if denom == 0 {
            return Err(SymbolicError::DivisionByZero);
        }
        // Reduce in i128 so sign normalization cannot overflow
        let (n, d) = (i128::from(numer), i128::from(denom));
        let g = n.gcd(&d);
        let (n, d) = if d < 0 { (-n / g, -d / g) } else { (n / g, d / g) };
        match (i64::try_from(n), i64::try_from(d)) {
            (Ok(n), Ok(d)) => Ok(Number::Rational(Rational64::new_raw(n, d))),
            _ => {
                tracing::warn!(numer, denom, "rational out of range, promoting to float");
                Ok(Number::Float(numer as f64 / denom as f64))
            }
        }
    }

    pub fn float(value: f64) -> Self {
        Number::Float(value)
    }

    /// True for both the rational and the float zero
    pub fn is_zero(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_zero(),
            Number::Float(f) => *f == 0.0,
        }
    }

    pub(crate) fn is_exact_zero(&self) -> bool {
        matches!(self, Number::Rational(r) if r.is_zero())
    }

    pub(crate) fn is_exact_one(&self) -> bool {
        matches!(self, Number::Rational(r) if r.is_one())
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Rational(r) => r
                .to_f64()
                .unwrap_or_else(|| *r.numer() as f64 / *r.denom() as f64),
            Number::Float(f) => *f,
        }
    }

    /// Fold a binary operator over two literals.
    pub fn apply(self, op: BinaryOp, rhs: Number) -> Result<Number> {
        if op.is_division() && rhs.is_zero() {
            return Err(SymbolicError::DivisionByZero);
        }
        Ok(self.fold(op, rhs))
    }

    /// Decide a comparison between two literals. Unordered floats (NaN) only
    /// satisfy `!=`.
    pub fn compare(self, op: CmpOp, rhs: Number) -> bool {
        let ordering = match (self, rhs) {
            (Number::Rational(a), Number::Rational(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        };
        match ordering {
            Some(ordering) => op.holds(ordering),
            None => op == CmpOp::Ne,
        }
    }

    // Callers guarantee the divisor of Div/Mod is non-zero
    fn fold(self, op: BinaryOp, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Rational(a), Number::Rational(b)) => match exact(op, &a, &b) {
                Some(r) => Number::Rational(r),
                None => {
                    tracing::warn!(
                        %op,
                        lhs = %self,
                        rhs = %rhs,
                        "rational overflow, promoting to float"
                    );
                    Number::Float(op.apply_f64(self.to_f64(), rhs.to_f64()))
                }
            },
            (a, b) => Number::Float(op.apply_f64(a.to_f64(), b.to_f64())),
        }
    }

    /// Ordering used to place literals canonically. Not a numeric ordering
    /// for NaN.
    pub(crate) fn total_cmp(&self, other: &Number) -> Ordering {
        self.to_f64()
            .total_cmp(&other.to_f64())
            .then_with(|| self.is_float().cmp(&other.is_float()))
    }

    fn float_bits(f: f64) -> u64 {
        // -0.0 and 0.0 are the same literal
        if f == 0.0 {
            0
        } else {
            f.to_bits()
        }
    }
}

fn exact(op: BinaryOp, a: &Rational64, b: &Rational64) -> Option<Rational64> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => {
            // Truncating remainder, matching f64 `%`
            let quotient = a.checked_div(b)?.trunc();
            a.checked_sub(&b.checked_mul(&quotient)?)
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => Self::float_bits(*a) == Self::float_bits(*b),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Number::Rational(r) => {
                state.write_u8(0);
                r.hash(state);
            }
            Number::Float(f) => {
                state.write_u8(1);
                state.write_u64(Self::float_bits(*f));
            }
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Rational(r) if r.is_integer() => write!(f, "{}", r.numer()),
            Number::Rational(r) => write!(f, "Rational({} , {})", r.numer(), r.denom()),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        self.fold(BinaryOp::Add, rhs)
    }
}

impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        self.fold(BinaryOp::Sub, rhs)
    }
}

impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        self.fold(BinaryOp::Mul, rhs)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}
