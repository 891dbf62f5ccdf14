//! Conditional arm normalization.
//!
//! Before an `if` is metered, each arm must be a statement sequence the
//! injector can insert charges into. A bare single-expression arm is moved
//! into a `then`/`else` wrapper. The wrappers carry no branch label, so
//! relative branch depths inside the arm are unchanged.

use wast_meter_types::ast::Expr;

/// `true` if `arm` is already a `then` wrapper.
pub fn is_explicit_then(arm: &Expr) -> bool {
    matches!(arm, Expr::Then { .. })
}

/// `true` if `arm` is already an `else` wrapper.
pub fn is_explicit_else(arm: &Expr) -> bool {
    matches!(arm, Expr::Else { .. })
}

/// Wrap both arms of an `if` in explicit sequences. Other nodes are left
/// alone. Returns `true` if anything changed.
pub fn normalize_arms(expr: &mut Expr) -> bool {
    let Expr::If {
        then_arm, else_arm, ..
    } = expr
    else {
        return false;
    };
    let mut changed = false;
    if !is_explicit_then(then_arm) {
        wrap(then_arm, |body| Expr::Then { body });
        changed = true;
    }
    if let Some(else_arm) = else_arm {
        if !is_explicit_else(else_arm) {
            wrap(else_arm, |body| Expr::Else { body });
            changed = true;
        }
    }
    changed
}

fn wrap(arm: &mut Expr, wrapper: fn(Vec<Expr>) -> Expr) {
    let statement = std::mem::replace(arm, Expr::Nop);
    *arm = wrapper(vec![statement]);
}
