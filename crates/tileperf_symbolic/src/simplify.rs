use std::cmp::Ordering;

use super::*;

/// Build a non-literal binary node: apply the cheap identities, put commutative
/// operands in canonical order and merge exact rational constants.
///
/// Identities only fire on exact rationals so float promotion is never lost.
pub(crate) fn normalize(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let zero = |e: &Expr| e.as_number().is_some_and(|n| n.is_exact_zero());
    let one = |e: &Expr| e.as_number().is_some_and(|n| n.is_exact_one());
    match op {
        BinaryOp::Add if zero(&rhs) => return lhs,
        BinaryOp::Add if zero(&lhs) => return rhs,
        BinaryOp::Sub if zero(&rhs) => return lhs,
        BinaryOp::Mul if zero(&lhs) || zero(&rhs) => return Expr::zero(),
        BinaryOp::Mul if one(&rhs) => return lhs,
        BinaryOp::Mul if one(&lhs) => return rhs,
        BinaryOp::Div if one(&rhs) => return lhs,
        _ => {}
    }

    let (lhs, rhs) = if op.is_commutative() && canonical_cmp(&rhs, &lhs) == Ordering::Less {
        (rhs, lhs)
    } else {
        (lhs, rhs)
    };

    // c1 + (c2 + x) -> (c1 + c2) + x, likewise for *
    if op.is_commutative() {
        if let (Some(c1 @ Number::Rational(_)), ExprKind::Binary(inner, c2, x)) =
            (lhs.as_number(), rhs.kind())
        {
            if let (true, Some(c2 @ Number::Rational(_))) = (*inner == op, c2.as_number()) {
                let merged = match op {
                    BinaryOp::Add => c1 + c2,
                    _ => c1 * c2,
                };
                return normalize(op, Expr::literal(merged), x.clone());
            }
        }
    }

    Expr::new(ExprKind::Binary(op, lhs, rhs))
}

fn rank(e: &Expr) -> u8 {
    match e.kind() {
        ExprKind::Literal(_) => 0,
        ExprKind::Symbol(_) => 1,
        ExprKind::Placeholder(_) => 2,
        ExprKind::Binary(..) => 3,
        ExprKind::Compare(..) => 4,
        ExprKind::Ternary(..) => 5,
    }
}

/// Total order on expressions: literals first, then symbols by name, then
/// composite nodes compared child by child.
pub(crate) fn canonical_cmp(a: &Expr, b: &Expr) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    rank(a).cmp(&rank(b)).then_with(|| match (a.kind(), b.kind()) {
        (ExprKind::Literal(x), ExprKind::Literal(y)) => x.total_cmp(y),
        (ExprKind::Symbol(x), ExprKind::Symbol(y))
        | (ExprKind::Placeholder(x), ExprKind::Placeholder(y)) => x.cmp(y),
        (ExprKind::Binary(o1, l1, r1), ExprKind::Binary(o2, l2, r2)) => o1
            .cmp(o2)
            .then_with(|| canonical_cmp(l1, l2))
            .then_with(|| canonical_cmp(r1, r2)),
        (ExprKind::Compare(o1, l1, r1), ExprKind::Compare(o2, l2, r2)) => o1
            .cmp(o2)
            .then_with(|| canonical_cmp(l1, l2))
            .then_with(|| canonical_cmp(r1, r2)),
        (ExprKind::Ternary(c1, t1, e1), ExprKind::Ternary(c2, t2, e2)) => canonical_cmp(c1, c2)
            .then_with(|| canonical_cmp(t1, t2))
            .then_with(|| canonical_cmp(e1, e2)),
        _ => Ordering::Equal,
    })
}

/// A product split into its folded constant and its other factors in
/// canonical order. Non-products are a single factor with coefficient 1.
pub(crate) fn product_form(e: &Expr) -> (Number, Vec<Expr>) {
    let mut coefficient = Number::int(1);
    let mut factors = vec![];
    let mut stack = vec![e.clone()];
    while let Some(e) = stack.pop() {
        match e.kind() {
            ExprKind::Binary(BinaryOp::Mul, a, b) => {
                stack.push(b.clone());
                stack.push(a.clone());
            }
            ExprKind::Literal(n) => coefficient = coefficient * *n,
            _ => factors.push(e),
        }
    }
    factors.sort_by(canonical_cmp);
    (coefficient, factors)
}
