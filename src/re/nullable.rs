//! Nullability of regexes as boolean conditions.

use super::cache::{CacheKey, OpTag};
use super::Engine;
use crate::term::{Term, TermOp};

impl Engine {
    /// The condition under which `r` accepts the empty word.
    ///
    /// The condition is `true` or `false` whenever nullability does not depend on variables.
    /// Regex variables yield the residual membership `"" ∈ r`.
    pub(crate) fn nullable_term(&mut self, r: &Term) -> Term {
        if let Some(n) = r.static_nullable() {
            return self.tb.boolean(n);
        }
        let key = CacheKey::unary(OpTag::Nullable, r);
        if let Some(n) = self.cached(&key) {
            return n;
        }
        let result = match r.op() {
            TermOp::ToRe(s) => {
                let empty = self.tb.empty_str();
                self.tb.eq(s.clone(), empty)
            }
            TermOp::Concat(a, b) | TermOp::Inter(a, b) => {
                let na = self.nullable_term(a);
                let nb = self.nullable_term(b);
                self.tb.and(na, nb)
            }
            TermOp::Union(a, b) | TermOp::AntimirovUnion(a, b) => {
                let na = self.nullable_term(a);
                let nb = self.nullable_term(b);
                self.tb.or(na, nb)
            }
            TermOp::Diff(a, b) => {
                let na = self.nullable_term(a);
                let nb = self.nullable_term(b);
                let nb = self.tb.not(nb);
                self.tb.and(na, nb)
            }
            TermOp::Complement(a) => {
                let na = self.nullable_term(a);
                self.tb.not(na)
            }
            TermOp::Plus(a) | TermOp::Loop(a, _, _) | TermOp::Reverse(a) => self.nullable_term(a),
            TermOp::Conditional(c, a, b) | TermOp::Ite(c, a, b) => {
                let na = self.nullable_term(a);
                let nb = self.nullable_term(b);
                self.tb.ite(c.clone(), na, nb)
            }
            // ε ∈ D(e, r) iff e ∈ r
            TermOp::Derivative(e, r0) => {
                let w = self.tb.unit(e.clone());
                self.tb.in_re(w, r0.clone())
            }
            _ => {
                let empty = self.tb.empty_str();
                self.tb.in_re(empty, r.clone())
            }
        };
        self.remember(key, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DerivConfig;
    use crate::term::Sort;

    fn engine() -> Engine {
        Engine::new(DerivConfig::default()).unwrap()
    }

    #[test]
    fn constant_cases() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("a");
        let cases = [
            (tb.none(), false),
            (tb.epsilon(), true),
            (tb.any_char(), false),
            (tb.all(), true),
            (tb.range_from_to('a', 'z'), false),
            (tb.star(a.clone()), true),
            (tb.opt(a.clone()), true),
            (tb.plus(a.clone()), false),
            (tb.loop_(a.clone(), 0, Some(3)), true),
            (tb.loop_(a.clone(), 2, Some(3)), false),
            (tb.comp(a.clone()), true),
        ];
        for (r, expected) in cases {
            assert_eq!(engine.nullable_term(&r).as_bool(), Some(expected), "{}", r);
        }
    }

    #[test]
    fn sequence_variable() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.var("x", Sort::Seq);
        let r = tb.to_re(x.clone());
        let empty = tb.empty_str();
        let expected = tb.eq(x, empty);
        assert_eq!(engine.nullable_term(&r), expected);
    }

    #[test]
    fn regex_variable_is_residual() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.re_var("X");
        let a = tb.literal("a");
        let r = tb.union(x.clone(), a);
        let empty = tb.empty_str();
        let expected = tb.in_re(empty, x);
        assert_eq!(engine.nullable_term(&r), expected);
    }

    #[test]
    fn complement_of_variable() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.var("x", Sort::Seq);
        let tx = tb.to_re(x.clone());
        let r = tb.comp(tx);
        let empty = tb.empty_str();
        let eq = tb.eq(x, empty);
        let expected = tb.not(eq);
        assert_eq!(engine.nullable_term(&r), expected);
    }

    #[test]
    fn conditional() {
        let mut engine = engine();
        let tb = engine.terms();
        let b = tb.var("b", Sort::Bool);
        let eps = tb.epsilon();
        let a = tb.literal("a");
        let r = tb.conditional(b.clone(), eps, a);
        assert_eq!(engine.nullable_term(&r), b);
    }

    #[test]
    fn stuck_derivative() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.re_var("X");
        let c = tb.char('c');
        let d = tb.stuck_derivative(c.clone(), x.clone());
        let w = tb.str("c");
        let expected = tb.in_re(w, x);
        assert_eq!(engine.nullable_term(&d), expected);
    }
}
