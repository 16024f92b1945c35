//! Checks for the derivative normal form.

use super::cond::{cond_key, CondKey};
use crate::term::{Term, TermOp};

/// Whether `d` is in derivative normal form: a right-nested antimirov union whose branches are
/// guard trees with positive, strictly ordered conditions and plain regexes as leaves.
pub(crate) fn is_deriv_normal_form(d: &Term) -> bool {
    match d.op() {
        TermOp::AntimirovUnion(a, b) => {
            !a.is_antimirov_union() && is_guard_tree(a, None) && is_deriv_normal_form(b)
        }
        _ => is_guard_tree(d, None),
    }
}

/// Whether `t` is a guard tree whose conditions all rank below `bound`.
fn is_guard_tree(t: &Term, bound: Option<CondKey>) -> bool {
    match t.op() {
        TermOp::Ite(c, a, b) if t.is_ite() => {
            if matches!(c.op(), TermOp::Not(_)) {
                return false;
            }
            let key = cond_key(c);
            if bound.is_some_and(|b| key >= b) {
                return false;
            }
            is_guard_tree(a, Some(key)) && is_guard_tree(b, Some(key))
        }
        TermOp::AntimirovUnion(..) => false,
        _ => true,
    }
}
