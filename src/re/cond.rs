//! Character conditions: their order in guard trees and the simplification of path conditions.

use indexmap::IndexMap;

use super::cache::{CacheKey, OpTag};
use super::Engine;
use crate::alphabet::{Alphabet, CharRange};
use crate::term::{Sort, Term, TermId, TermOp};
use crate::SmtChar;

/// The rank of a condition in a guard tree. Conditions with a larger key are tested closer to
/// the root. Upper bounds `x ≤ k` on a character rank above all other conditions, by `k`.
///
/// A negation has the key of the condition it negates; guard trees only test positive
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CondKey {
    Opaque(TermId),
    Bound(SmtChar, TermId),
}

pub(crate) fn cond_key(c: &Term) -> CondKey {
    match c.op() {
        TermOp::Not(a) => cond_key(a),
        TermOp::CharLe(x, k) => match (x.as_char(), k.as_char()) {
            (None, Some(k)) => CondKey::Bound(k, x.id()),
            _ => CondKey::Opaque(c.id()),
        },
        _ => CondKey::Opaque(c.id()),
    }
}

/// The condition tested at the root of `t`, if `t` is a guard node.
pub(crate) fn top_cond(t: &Term) -> Option<&Term> {
    match t.op() {
        TermOp::Ite(c, _, _) if t.is_ite() => Some(c),
        _ => None,
    }
}

/// The condition with the largest key among the roots of `ts`.
pub(crate) fn max_top<'a>(ts: &[&'a Term]) -> Option<&'a Term> {
    ts.iter().copied().filter_map(top_cond).max_by_key(|c| cond_key(c))
}

/// The branch of `t` for `c = value` if `t` tests `c` at its root, otherwise `t`.
/// In an ordered guard tree `c` can only occur at the root if it has the largest key.
pub(crate) fn cofactor(t: &Term, c: &Term, value: bool) -> Term {
    match t.op() {
        TermOp::Ite(c2, a, b) if c2 == c && t.is_ite() => {
            if value {
                a.clone()
            } else {
                b.clone()
            }
        }
        _ => t.clone(),
    }
}

impl Engine {
    /// Simplifies a conjunction of conditions.
    ///
    /// Equalities `x = v` of a variable and a literal are solved by substituting `v` for `x` in
    /// the other conjuncts. Bounds on a character term, `x ≤ k`, `k ≤ x` and `x = k` for literal
    /// `k` and their negations, are collected into one set of characters per term. The result
    /// is `false` if any of these sets is empty. Otherwise it is the conjunction of the solved
    /// equalities, the remaining conjuncts, and a range constraint for each term whose set is
    /// not the full alphabet.
    pub(crate) fn simplify_cond(&mut self, cond: &Term) -> Term {
        if cond.as_bool().is_some() {
            return cond.clone();
        }
        let key = CacheKey::unary(OpTag::Simplify, cond);
        if let Some(r) = self.cached(&key) {
            return r;
        }
        let result = self.simplify_conjunction(cond);
        self.remember(key, &result);
        result
    }

    fn simplify_conjunction(&mut self, cond: &Term) -> Term {
        let ff = self.tb.boolean(false);
        let mut atoms = Vec::new();
        flatten_and(cond, &mut atoms);

        let mut solved = Vec::new();
        while let Some(i) = atoms.iter().position(|a| solution(a).is_some()) {
            let atom = atoms.remove(i);
            let Some((x, v)) = solution(&atom) else {
                break;
            };
            for a in std::mem::take(&mut atoms) {
                let a = self.tb.substitute(&a, &x, &v);
                flatten_and(&a, &mut atoms);
            }
            solved.push(atom);
        }

        let mut ranges: IndexMap<Term, Alphabet> = IndexMap::new();
        let mut residual = Vec::new();
        for a in atoms {
            match a.as_bool() {
                Some(true) => continue,
                Some(false) => return ff,
                None => {}
            }
            if let Some((x, chars)) = range_set(&a) {
                let set = ranges.entry(x).or_insert_with(Alphabet::full);
                *set = set.intersect(&chars);
                if set.is_empty() {
                    return ff;
                }
            } else {
                residual.push(a);
            }
        }

        residual.sort();
        residual.dedup();
        let contradiction = residual
            .iter()
            .any(|a| matches!(a.op(), TermOp::Not(b) if residual.binary_search(b).is_ok()));
        if contradiction {
            return ff;
        }

        let mut conj = solved;
        conj.extend(residual);
        for (x, set) in ranges {
            if !set.is_full() {
                let p = self.range_pred(&x, &set);
                conj.push(p);
            }
        }
        self.tb.and_all(conj)
    }

    /// The condition that `x` is in `set`, as a disjunction over the ranges of `set`.
    fn range_pred(&mut self, x: &Term, set: &Alphabet) -> Term {
        let mut disjuncts = Vec::new();
        for r in set.iter_ranges() {
            let (lo, hi) = (r.start(), r.end());
            let d = if lo == hi {
                let c = self.tb.char(lo);
                self.tb.eq(x.clone(), c)
            } else {
                let h = self.tb.char(hi);
                let upper = self.tb.char_le(x.clone(), h);
                let lower = match lo.prev() {
                    Some(p) => {
                        let p = self.tb.char(p);
                        let below = self.tb.char_le(x.clone(), p);
                        self.tb.not(below)
                    }
                    None => self.tb.boolean(true),
                };
                self.tb.and(lower, upper)
            };
            disjuncts.push(d);
        }
        self.tb.or_all(disjuncts)
    }

    /// The simplified conditions `path ∧ c` and `path ∧ ¬c`.
    pub(crate) fn split_path(&mut self, path: &Term, c: &Term) -> (Term, Term) {
        let pos = self.tb.and(path.clone(), c.clone());
        let nc = self.tb.not(c.clone());
        let neg = self.tb.and(path.clone(), nc);
        (self.simplify_cond(&pos), self.simplify_cond(&neg))
    }
}

fn flatten_and(t: &Term, out: &mut Vec<Term>) {
    match t.op() {
        TermOp::And(a, b) => {
            flatten_and(a, out);
            flatten_and(b, out);
        }
        _ => out.push(t.clone()),
    }
}

/// An equality `x = v` between a variable and a literal, returned as `(x, v)`.
fn solution(atom: &Term) -> Option<(Term, Term)> {
    match atom.op() {
        TermOp::Eq(x, v) | TermOp::Eq(v, x)
            if matches!(x.op(), TermOp::Var(..)) && is_literal(v) =>
        {
            Some((x.clone(), v.clone()))
        }
        _ => None,
    }
}

fn is_literal(t: &Term) -> bool {
    matches!(
        t.op(),
        TermOp::Char(_) | TermOp::Int(_) | TermOp::Str(_) | TermOp::True | TermOp::False
    )
}

/// The set of characters a character term `x` is restricted to by `atom`, if `atom` is a
/// boolean combination of bounds on `x` alone. This covers the range constraints built by
/// `range_pred`, so simplified paths can be simplified again.
fn range_set(atom: &Term) -> Option<(Term, Alphabet)> {
    match atom.op() {
        TermOp::Not(a) => range_set(a).map(|(x, set)| (x, set.complement())),
        TermOp::And(a, b) | TermOp::Or(a, b) => {
            let (x, sa) = range_set(a)?;
            let (y, sb) = range_set(b)?;
            if x != y {
                return None;
            }
            let set = if matches!(atom.op(), TermOp::And(..)) {
                sa.intersect(&sb)
            } else {
                sa.union(&sb)
            };
            Some((x, set))
        }
        _ => {
            let (x, range, positive) = range_atom(atom)?;
            let set = Alphabet::from(range);
            Some((x, if positive { set } else { set.complement() }))
        }
    }
}

/// A bound on a character term: `(x, range, positive)` means `x ∈ range` if `positive` and
/// `x ∉ range` otherwise.
fn range_atom(atom: &Term) -> Option<(Term, CharRange, bool)> {
    match atom.op() {
        TermOp::Not(a) => range_atom(a).map(|(x, r, pos)| (x, r, !pos)),
        TermOp::CharLe(a, b) => match (a.as_char(), b.as_char()) {
            (None, Some(k)) => Some((a.clone(), CharRange::new(SmtChar::MIN, k), true)),
            (Some(k), None) => Some((b.clone(), CharRange::new(k, SmtChar::MAX), true)),
            _ => None,
        },
        TermOp::Eq(a, b) if a.sort() == Sort::Char => match (a.as_char(), b.as_char()) {
            (None, Some(k)) => Some((a.clone(), CharRange::singleton(k), true)),
            (Some(k), None) => Some((b.clone(), CharRange::singleton(k), true)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DerivConfig;

    fn setup() -> (Engine, Term) {
        let engine = Engine::new(DerivConfig::default()).unwrap();
        let e = engine.char_var().clone();
        (engine, e)
    }

    fn le(engine: &mut Engine, x: &Term, c: char) -> Term {
        let c = engine.terms().char(c);
        engine.terms().char_le(x.clone(), c)
    }

    fn ge(engine: &mut Engine, x: &Term, c: char) -> Term {
        let c = engine.terms().char(c);
        engine.terms().char_le(c, x.clone())
    }

    #[test]
    fn disjoint_bounds_are_false() {
        let (mut engine, e) = setup();
        let a = le(&mut engine, &e, 'c');
        let b = ge(&mut engine, &e, 'm');
        let cond = engine.terms().and(a, b);
        assert!(engine.simplify(&cond).unwrap().is_false());
    }

    #[test]
    fn bounds_reduce_to_range() {
        let (mut engine, e) = setup();
        let a = le(&mut engine, &e, 'z');
        let b = le(&mut engine, &e, 'm');
        let cond = engine.terms().and(a, b.clone());
        assert_eq!(engine.simplify(&cond).unwrap(), b);

        let c = ge(&mut engine, &e, 'd');
        let cond = engine.terms().and(c, b.clone());
        let expected = {
            let below = le(&mut engine, &e, 'c');
            let tb = engine.terms();
            let lower = tb.not(below);
            tb.and(lower, b)
        };
        assert_eq!(engine.simplify(&cond).unwrap(), expected);
    }

    #[test]
    fn negated_bounds_split_ranges() {
        let (mut engine, e) = setup();
        // e ≤ 'z' ∧ ¬(e = 'm') ∧ ¬(e ≤ 'l') leaves ['n', 'z']
        let a = le(&mut engine, &e, 'z');
        let m = engine.terms().char('m');
        let eq = engine.terms().eq(e.clone(), m);
        let neq = engine.terms().not(eq);
        let b = le(&mut engine, &e, 'l');
        let nb = engine.terms().not(b);
        let cond = engine.terms().and_all([a, neq, nb]);
        let s = engine.simplify(&cond).unwrap();
        for (c, expected) in [('m', false), ('n', true), ('z', true), ('l', false)] {
            let ch = engine.terms().char(c);
            let inst = engine.terms().substitute(&s, &e, &ch);
            assert_eq!(inst.as_bool(), Some(expected), "{}", c);
        }
    }

    #[test]
    fn split_ranges_simplify_again() {
        let (mut engine, e) = setup();
        // ¬(e = 'l') ∧ e ≤ 'z' leaves the two ranges [MIN, 'k'] and ['m', 'z']
        let l = engine.terms().char('l');
        let eq = engine.terms().eq(e.clone(), l);
        let neq = engine.terms().not(eq);
        let z = le(&mut engine, &e, 'z');
        let p = engine.terms().and(neq, z);
        let simplified = engine.simplify(&p).unwrap();
        assert!(matches!(simplified.op(), TermOp::Or(..)), "{}", simplified);

        // e = 'l' is excluded by the path, whether or not it was simplified before
        let upper = le(&mut engine, &e, 'l');
        let below = le(&mut engine, &e, 'k');
        let lower = engine.terms().not(below);
        let q = engine.terms().and(upper, lower);
        let direct = engine.terms().and(p.clone(), q.clone());
        let again = engine.terms().and(simplified.clone(), q);
        assert!(engine.simplify(&direct).unwrap().is_false());
        assert!(engine.simplify(&again).unwrap().is_false());

        // a satisfiable extension simplifies to the same condition either way
        let q = le(&mut engine, &e, 'p');
        let direct = engine.terms().and(p, q.clone());
        let again = engine.terms().and(simplified.clone(), q);
        let expected = engine.simplify(&direct).unwrap();
        assert_eq!(engine.simplify(&again).unwrap(), expected);
        assert_eq!(engine.simplify(&simplified).unwrap(), simplified);
    }

    #[test]
    fn singleton_range_becomes_equality() {
        let (mut engine, e) = setup();
        let a = le(&mut engine, &e, 'k');
        let b = ge(&mut engine, &e, 'k');
        let cond = engine.terms().and(a, b);
        let k = engine.terms().char('k');
        let expected = engine.terms().eq(e, k);
        assert_eq!(engine.simplify(&cond).unwrap(), expected);
    }

    #[test]
    fn equalities_are_substituted() {
        let (mut engine, _) = setup();
        let tb = engine.terms();
        let x = tb.var("x", Sort::Char);
        let p = tb.var("P", Sort::Pred);
        let a = tb.char('a');
        let eq = tb.eq(x.clone(), a.clone());
        let px = tb.apply(p.clone(), x.clone());
        let cond = tb.and(px, eq.clone());
        let pa = tb.apply(p, a.clone());
        let expected = tb.and(eq.clone(), pa);
        assert_eq!(engine.simplify(&cond).unwrap(), expected);

        let tb = engine.terms();
        let z_upper = tb.char('Z');
        let bound = tb.char_le(x, z_upper);
        let cond = tb.and(eq, bound);
        assert!(engine.simplify(&cond).unwrap().is_false());
    }

    #[test]
    fn opaque_contradiction_is_false() {
        let (mut engine, _) = setup();
        let tb = engine.terms();
        let p = tb.var("p", Sort::Bool);
        let q = tb.var("q", Sort::Bool);
        let r = tb.var("r", Sort::Bool);
        let np = tb.not(p.clone());
        let inner = tb.and(r, np);
        let inner = tb.and(q, inner);
        let cond = tb.and(p, inner);
        assert!(!cond.is_false());
        assert!(engine.simplify(&cond).unwrap().is_false());
    }

    #[test]
    fn keys_order_bounds_by_character() {
        let (mut engine, e) = setup();
        let a = le(&mut engine, &e, 'a');
        let z = le(&mut engine, &e, 'z');
        let p = engine.terms().var("p", Sort::Bool);
        assert!(cond_key(&z) > cond_key(&a));
        assert!(cond_key(&a) > cond_key(&p));
        let na = engine.terms().not(a.clone());
        assert_eq!(cond_key(&na), cond_key(&a));
    }
}
