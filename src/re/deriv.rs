//! Symbolic derivatives of regexes.
//!
//! The derivative of `r` by a character term `e` is a guard tree over conditions on `e`. Its
//! leaves are the regexes matching the remaining suffixes. If `e` is a concrete character all
//! conditions evaluate and the tree collapses into a single regex.

use tracing::trace;

use super::cache::{CacheKey, OpTag};
use super::cond::{cofactor, max_top};
use super::Engine;
use crate::term::{Term, TermOp};
use crate::SmtChar;

impl Engine {
    /// The derivative of `r` by `e`, assuming the path condition `path`. Branches that
    /// contradict `path` are pruned.
    pub(crate) fn deriv(&mut self, e: &Term, r: &Term, path: &Term) -> Term {
        if path.is_false() {
            return self.tb.none();
        }
        match r.op() {
            TermOp::Empty | TermOp::Epsilon => return self.tb.none(),
            TermOp::FullSeq => return r.clone(),
            TermOp::FullChar => return self.tb.epsilon(),
            _ => {}
        }
        let key = CacheKey::ternary(OpTag::Derivative, e, r, path);
        if let Some(d) = self.cached(&key) {
            return d;
        }
        self.stats.derivatives += 1;
        let result = self.deriv_uncached(e, r, path);
        trace!(%e, %r, %result, "derivative");
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }

    fn deriv_uncached(&mut self, e: &Term, r: &Term, path: &Term) -> Term {
        match r.op() {
            TermOp::ToRe(s) => self.deriv_seq(e, s, path),
            TermOp::Concat(r1, r2) => {
                let d1 = self.deriv(e, r1, path);
                let head = self.concat(&d1, r2);
                if r1.static_nullable() == Some(false) {
                    return head;
                }
                let n = self.nullable_term(r1);
                let d2 = self.deriv(e, r2, path);
                let tail = self.guarded(&n, path, &d2);
                self.union(&head, &tail)
            }
            TermOp::Union(a, b) | TermOp::AntimirovUnion(a, b) => {
                let da = self.deriv(e, a, path);
                let db = self.deriv(e, b, path);
                self.union(&da, &db)
            }
            TermOp::Inter(a, b) => {
                let da = self.deriv(e, a, path);
                let db = self.deriv(e, b, path);
                self.intersection(&da, &db, path)
            }
            TermOp::Diff(a, b) => {
                let da = self.deriv(e, a, path);
                let db = self.deriv(e, b, path);
                let ndb = self.negate(&db);
                self.intersection(&da, &ndb, path)
            }
            TermOp::Complement(a) => {
                let da = self.deriv(e, a, path);
                self.negate(&da)
            }
            TermOp::Star(a) => {
                let da = self.deriv(e, a, path);
                self.concat(&da, r)
            }
            TermOp::Plus(a) => {
                let da = self.deriv(e, a, path);
                let star = self.tb.star(a.clone());
                self.concat(&da, &star)
            }
            TermOp::Opt(a) => self.deriv(e, a, path),
            TermOp::Loop(a, lo, hi) => {
                let rest = match hi {
                    Some(0) => return self.tb.none(),
                    None if *lo <= 1 => self.tb.star(a.clone()),
                    None => self.tb.loop_(a.clone(), lo - 1, None),
                    Some(h) => self.tb.loop_(a.clone(), lo.saturating_sub(1), Some(h - 1)),
                };
                let da = self.deriv(e, a, path);
                self.concat(&da, &rest)
            }
            TermOp::Range(lo, hi) => match self.range_cond(e, lo, hi) {
                Some(cond) => {
                    let eps = self.tb.epsilon();
                    self.guarded(&cond, path, &eps)
                }
                None => self.tb.none(),
            },
            TermOp::OfPred(p) => {
                let cond = self.tb.apply(p.clone(), e.clone());
                let eps = self.tb.epsilon();
                self.guarded(&cond, path, &eps)
            }
            TermOp::Conditional(c, a, b) | TermOp::Ite(c, a, b) => {
                let (pt, pe) = self.split_path(path, c);
                match (pt.is_false(), pe.is_false()) {
                    (true, true) => self.tb.none(),
                    (true, false) => self.deriv(e, b, &pe),
                    (false, true) => self.deriv(e, a, &pt),
                    (false, false) => {
                        let da = self.deriv(e, a, &pt);
                        let db = self.deriv(e, b, &pe);
                        let tree = self.guard_tree(c, true);
                        self.select(&tree, &da, &db)
                    }
                }
            }
            TermOp::Reverse(a) => match a.op() {
                TermOp::ToRe(s) if s.as_str().is_none() => self.deriv_seq_rev(e, s, path),
                _ => {
                    let ra = self.tb.reversed(a);
                    if matches!(ra.op(), TermOp::Reverse(_)) {
                        self.tb.stuck_derivative(e.clone(), r.clone())
                    } else {
                        self.deriv(e, &ra, path)
                    }
                }
            },
            _ => self.tb.stuck_derivative(e.clone(), r.clone()),
        }
    }

    /// The derivative of the singleton regex of the sequence `s`.
    fn deriv_seq(&mut self, e: &Term, s: &Term, path: &Term) -> Term {
        let (cond, rest) = match s.as_str() {
            Some(w) => match w.first() {
                Some(c) => {
                    let w = w.drop(1);
                    let c = self.tb.char(c);
                    (self.tb.eq(e.clone(), c), self.tb.literal(w))
                }
                None => return self.tb.none(),
            },
            None => {
                let f = self.tb.first(s.clone());
                let cond = self.tb.eq(e.clone(), f);
                let cond = self.non_empty(s, cond);
                let rest = self.tb.rest(s.clone());
                (cond, self.tb.to_re(rest))
            }
        };
        self.guarded(&cond, path, &rest)
    }

    /// The derivative of the reverse of the singleton regex of `s`, reading `s` from its end.
    fn deriv_seq_rev(&mut self, e: &Term, s: &Term, path: &Term) -> Term {
        let l = self.tb.last(s.clone());
        let cond = self.tb.eq(e.clone(), l);
        let cond = self.non_empty(s, cond);
        let init = self.tb.butlast(s.clone());
        let init = self.tb.to_re(init);
        let rest = self.tb.reverse(init);
        self.guarded(&cond, path, &rest)
    }

    /// `cond`, strengthened by `s ≠ ""` unless `s` is known to be non-empty.
    fn non_empty(&mut self, s: &Term, cond: Term) -> Term {
        if s.min_length() > 0 {
            return cond;
        }
        let empty = self.tb.empty_str();
        let is_empty = self.tb.eq(s.clone(), empty);
        let ne = self.tb.not(is_empty);
        self.tb.and(ne, cond)
    }

    /// The condition that `e` lies between the bounds of a range, or `None` if the range is
    /// malformed.
    fn range_cond(&mut self, e: &Term, lo: &Term, hi: &Term) -> Option<Term> {
        let mut conds = Vec::with_capacity(4);
        let mut bound = |this: &mut Self, b: &Term| -> Option<Term> {
            match b.as_str() {
                Some(w) if w.len() == 1 => w.first().map(|c| this.tb.char(c)),
                Some(_) => None,
                None => {
                    let len = this.tb.len(b.clone());
                    let one = this.tb.int(1);
                    conds.push(this.tb.eq(len, one));
                    Some(this.tb.first(b.clone()))
                }
            }
        };
        let l = bound(self, lo)?;
        let h = bound(self, hi)?;
        conds.push(self.tb.char_le(l, e.clone()));
        conds.push(self.tb.char_le(e.clone(), h));
        Some(self.tb.and_all(conds))
    }

    /// The derivative `d` where `cond` holds and ∅ elsewhere, under `path`.
    fn guarded(&mut self, cond: &Term, path: &Term, d: &Term) -> Term {
        if d.is_none() {
            return d.clone();
        }
        let (pt, pe) = self.split_path(path, cond);
        if pt.is_false() {
            return self.tb.none();
        }
        if pe.is_false() {
            return d.clone();
        }
        let tree = self.guard_tree(cond, true);
        let tree = self.restrict(&tree, path);
        let none = self.tb.none();
        self.select(&tree, d, &none)
    }

    /// A guard tree that is ε where `c` has the truth value `pos` and ∅ elsewhere.
    ///
    /// Character equalities and lower bounds are expressed through upper bounds `x ≤ k`, so
    /// that all constraints on a character are ordered by their bound.
    fn guard_tree(&mut self, c: &Term, pos: bool) -> Term {
        match c.op() {
            TermOp::True => self.leaf(pos),
            TermOp::False => self.leaf(!pos),
            TermOp::Not(a) => self.guard_tree(a, !pos),
            TermOp::And(a, b) => {
                let ta = self.guard_tree(a, pos);
                let tb = self.guard_tree(b, pos);
                self.apply_guards(&ta, &tb, pos)
            }
            TermOp::Or(a, b) => {
                let ta = self.guard_tree(a, pos);
                let tb = self.guard_tree(b, pos);
                self.apply_guards(&ta, &tb, !pos)
            }
            TermOp::Eq(a, b) => match (a.as_char(), b.as_char()) {
                (Some(k), None) => self.char_eq_tree(b, k, pos),
                (None, Some(k)) => self.char_eq_tree(a, k, pos),
                _ => self.atom_tree(c, pos),
            },
            TermOp::CharLe(k, x) if x.as_char().is_none() => match k.as_char() {
                // k ≤ x iff ¬(x ≤ k - 1)
                Some(k) => match k.prev() {
                    Some(p) => {
                        let p = self.tb.char(p);
                        let below = self.tb.char_le(x.clone(), p);
                        self.guard_tree(&below, !pos)
                    }
                    None => self.leaf(pos),
                },
                None => self.atom_tree(c, pos),
            },
            _ => self.atom_tree(c, pos),
        }
    }

    /// `x = k` as `x ≤ k ∧ ¬(x ≤ k - 1)`.
    fn char_eq_tree(&mut self, x: &Term, k: SmtChar, pos: bool) -> Term {
        let kt = self.tb.char(k);
        let upper = self.tb.char_le(x.clone(), kt);
        let cond = match k.prev() {
            Some(p) => {
                let p = self.tb.char(p);
                let below = self.tb.char_le(x.clone(), p);
                let above = self.tb.not(below);
                self.tb.and(upper, above)
            }
            None => upper,
        };
        // the rewritten condition has no equality left, so this does not loop
        self.guard_tree(&cond, pos)
    }

    fn atom_tree(&mut self, c: &Term, pos: bool) -> Term {
        let (t, e) = (self.leaf(pos), self.leaf(!pos));
        self.mk_ite(c, &t, &e)
    }

    fn leaf(&self, pos: bool) -> Term {
        if pos {
            self.tb.epsilon()
        } else {
            self.tb.none()
        }
    }

    /// Conjunction (or disjunction) of two guard trees with ε and ∅ leaves.
    fn apply_guards(&mut self, a: &Term, b: &Term, conj: bool) -> Term {
        let (dominant, neutral) = if conj {
            (self.tb.none(), self.tb.epsilon())
        } else {
            (self.tb.epsilon(), self.tb.none())
        };
        if *a == dominant || *b == dominant {
            return dominant;
        }
        if *a == neutral || a == b {
            return b.clone();
        }
        if *b == neutral {
            return a.clone();
        }
        let Some(c) = max_top(&[a, b]).cloned() else {
            return dominant;
        };
        let t = {
            let (a1, b1) = (cofactor(a, &c, true), cofactor(b, &c, true));
            self.apply_guards(&a1, &b1, conj)
        };
        let e = {
            let (a0, b0) = (cofactor(a, &c, false), cofactor(b, &c, false));
            self.apply_guards(&a0, &b0, conj)
        };
        self.mk_ite(&c, &t, &e)
    }

    /// Replaces the ε leaves of the guard tree `tree` by `then` and its ∅ leaves by `els`.
    fn select(&mut self, tree: &Term, then: &Term, els: &Term) -> Term {
        match tree.op() {
            TermOp::Ite(c, a, b) if tree.is_ite() => {
                let t = self.select(a, then, els);
                let e = self.select(b, then, els);
                self.mk_ite(c, &t, &e)
            }
            TermOp::Empty => els.clone(),
            _ => then.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::super::normal_form::is_deriv_normal_form;
    use super::*;
    use crate::config::DerivConfig;
    use crate::term::Sort;

    fn engine() -> Engine {
        Engine::new(DerivConfig::default()).unwrap()
    }

    fn d(engine: &mut Engine, c: char, r: &Term) -> Term {
        engine.derivative_char(SmtChar::new(c), r).unwrap()
    }

    #[test]
    fn deriv_const() {
        let mut engine = engine();
        let tb = engine.terms();
        let r = tb.literal("foo");
        let expected = tb.literal("oo");
        assert_eq!(d(&mut engine, 'f', &r), expected);
        assert!(d(&mut engine, 'g', &r).is_none());
    }

    #[quickcheck]
    fn deriv_none(c: u32) {
        let c = SmtChar::from(c % (crate::SMT_MAX_CODEPOINT + 1));
        let mut engine = engine();
        let r = engine.terms().none();
        assert!(engine.derivative_char(c, &r).unwrap().is_none());
    }

    #[quickcheck]
    fn deriv_all(c: u32) {
        let c = SmtChar::from(c % (crate::SMT_MAX_CODEPOINT + 1));
        let mut engine = engine();
        let r = engine.terms().all();
        assert!(engine.derivative_char(c, &r).unwrap().is_all());
    }

    #[test]
    fn deriv_all_char() {
        let mut engine = engine();
        let r = engine.terms().any_char();
        assert!(d(&mut engine, 'f', &r).is_epsilon());
    }

    #[test]
    fn deriv_dot_plus() {
        let mut engine = engine();
        let tb = engine.terms();
        let any = tb.any_char();
        let r = tb.plus(any);
        assert!(d(&mut engine, 'x', &r).is_all());
    }

    #[test]
    fn deriv_concat_nullable() {
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let opt = tb.opt(foo);
        let far = tb.literal("far");
        // (foo)?far
        let r = tb.concat(opt, far.clone());

        let oo = tb.literal("oo");
        let oofar = tb.concat(oo, far);
        let ar = tb.literal("ar");

        let derived = d(&mut engine, 'f', &r);
        match derived.op() {
            TermOp::Union(a, b) => {
                let mut got = [a.clone(), b.clone()];
                got.sort();
                let mut want = [oofar, ar];
                want.sort();
                assert_eq!(got, want);
            }
            _ => panic!("expected a union, got {}", derived),
        }
        assert!(d(&mut engine, 'g', &r).is_none());
        assert!(d(&mut engine, 'o', &r).is_none());
    }

    #[test]
    fn deriv_star() {
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let r = tb.star(foo);
        let oo = tb.literal("oo");
        let expected = tb.concat(oo, r.clone());
        assert_eq!(d(&mut engine, 'f', &r), expected);
        assert!(d(&mut engine, 'g', &r).is_none());
    }

    #[test]
    fn deriv_plus() {
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let r = tb.plus(foo.clone());
        let oo = tb.literal("oo");
        let star = tb.star(foo);
        let expected = tb.concat(oo, star);
        assert_eq!(d(&mut engine, 'f', &r), expected);
    }

    #[test]
    fn deriv_loop() {
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let r = tb.loop_(foo.clone(), 1, Some(2));
        let oo = tb.literal("oo");
        let rest = tb.loop_(foo, 0, Some(1));
        let expected = tb.concat(oo, rest);
        assert_eq!(d(&mut engine, 'f', &r), expected);
        assert!(d(&mut engine, 'b', &r).is_none());
    }

    #[quickcheck]
    fn deriv_loops(l: u32, u: u32) {
        let l = l % 20;
        let u = u % 20;
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let r = tb.loop_(foo.clone(), l, Some(u));
        if l > u || u == 0 {
            assert!(d(&mut engine, 'f', &r).is_none());
        } else {
            let tb = engine.terms();
            let rest = tb.loop_(foo, l.saturating_sub(1), Some(u - 1));
            let oo = tb.literal("oo");
            let expected = tb.concat(oo, rest);
            assert_eq!(d(&mut engine, 'f', &r), expected);
        }
    }

    #[test]
    fn deriv_unbounded_loop() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("a");
        let r = tb.loop_(a.clone(), 3, None);
        let expected = tb.loop_(a, 2, None);
        assert_eq!(d(&mut engine, 'a', &r), expected);
    }

    #[test]
    fn deriv_inter_and_diff() {
        let mut engine = engine();
        let tb = engine.terms();
        let foo = tb.literal("foo");
        let far = tb.literal("far");
        let inter = tb.inter(foo.clone(), far.clone());
        let diff = tb.diff(foo, far);
        assert!(d(&mut engine, 'f', &inter).is_none());
        let expected = engine.terms().literal("oo");
        assert_eq!(d(&mut engine, 'f', &diff), expected);
    }

    #[test]
    fn deriv_complement() {
        let mut engine = engine();
        let tb = engine.terms();
        let ab = tb.literal("ab");
        let r = tb.comp(ab);
        let b = engine.terms().literal("b");
        let expected = engine.terms().comp(b);
        assert_eq!(d(&mut engine, 'a', &r), expected);
        assert!(d(&mut engine, 'x', &r).is_all());
    }

    #[test]
    fn symbolic_range_is_bound_tree() {
        let mut engine = engine();
        let r = engine.terms().range_from_to('b', 'y');
        let d = engine.derivative_symbolic(&r).unwrap();
        assert!(is_deriv_normal_form(&d));
        let ch = engine.char_var().clone();
        // ite(ch ≤ 'y', ite(ch ≤ 'a', ∅, ε), ∅)
        match d.op() {
            TermOp::Ite(c, t, e) => {
                let y = engine.terms().char('y');
                let expected = engine.terms().char_le(ch, y);
                assert_eq!(*c, expected);
                assert!(t.is_ite());
                assert!(e.is_none());
            }
            _ => panic!("expected a guard, got {}", d),
        }
    }

    #[test]
    fn symbolic_literal_union() {
        let mut engine = engine();
        let tb = engine.terms();
        let ab = tb.literal("ab");
        let cd = tb.literal("cd");
        let r = tb.union(ab, cd);
        let ch = engine.char_var().clone();
        let tt = engine.terms().boolean(true);
        let d = engine.deriv(&ch, &r, &tt);
        assert!(is_deriv_normal_form(&d));
        for (c, rest) in [('a', Some("b")), ('c', Some("d")), ('b', None)] {
            let cc = engine.terms().char(c);
            let inst = engine.terms().substitute(&d, &ch, &cc);
            match rest {
                Some(w) => assert_eq!(inst, engine.terms().literal(w)),
                None => assert!(inst.is_none()),
            }
        }
    }

    #[test]
    fn symbolic_sequence_variable() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.var("x", Sort::Seq);
        let r = tb.to_re(x.clone());
        let d = engine.derivative_symbolic(&r).unwrap();
        // ite(x ≠ "" ∧ ch = first(x), to_re(rest(x)), ∅)
        assert!(d.is_ite());
        let tb = engine.terms();
        let rest = tb.rest(x.clone());
        let tail = tb.to_re(rest);
        fn has_leaf(t: &Term, leaf: &Term) -> bool {
            t == leaf || (t.is_ite() && t.children().into_iter().skip(1).any(|c| has_leaf(c, leaf)))
        }
        assert!(has_leaf(&d, &tail));
    }

    #[test]
    fn path_condition_prunes() {
        let mut engine = engine();
        let ch = engine.char_var().clone();
        let tb = engine.terms();
        let m = tb.char('m');
        let path = tb.char_le(ch.clone(), m);
        let r = tb.range_from_to('p', 'z');
        assert!(engine.deriv(&ch, &r, &path).is_none());
        let r = engine.terms().range_from_to('a', 'z');
        let d = engine.deriv(&ch, &r, &path);
        assert!(is_deriv_normal_form(&d));
        assert!(!d.is_none());
    }

    #[test]
    fn conditional_regex() {
        let mut engine = engine();
        let tb = engine.terms();
        let b = tb.var("b", Sort::Bool);
        let x = tb.literal("x");
        let y = tb.literal("y");
        let r = tb.conditional(b.clone(), x, y);
        let d = engine.derivative_char(SmtChar::new('x'), &r).unwrap();
        // ite(b, ε, ∅)
        match d.op() {
            TermOp::Ite(c, t, e) => {
                assert_eq!(*c, b);
                assert!(t.is_epsilon());
                assert!(e.is_none());
            }
            _ => panic!("expected a guard, got {}", d),
        }
    }

    #[test]
    fn of_pred_derivative() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.fresh_var("x", Sort::Char);
        let k = tb.char('k');
        let body = tb.char_le(x.clone(), k);
        let p = tb.lambda(x, body);
        let r = tb.of_pred(p);
        assert!(d(&mut engine, 'a', &r).is_epsilon());
        assert!(d(&mut engine, 'z', &r).is_none());
    }

    #[test]
    fn reverse_derivative() {
        let mut engine = engine();
        let tb = engine.terms();
        let ab = tb.literal("ab");
        let c = tb.range_from_to('c', 'd');
        let abc = tb.concat(ab, c);
        let r = tb.reverse(abc);
        let d1 = d(&mut engine, 'c', &r);
        let expected = engine.terms().literal("ba");
        assert_eq!(d1, expected);
    }

    #[test]
    fn stuck_on_variable() {
        let mut engine = engine();
        let x = engine.terms().re_var("X");
        let d = d(&mut engine, 'a', &x);
        assert!(matches!(d.op(), TermOp::Derivative(_, r) if *r == x));
    }
}
