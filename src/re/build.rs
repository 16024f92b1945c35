//! Constructors for regular expression terms.
//!
//! The constructors live on [TermBuilder] next to the constructors for the other sorts. With
//! optimization enabled they apply the local rewrites that keep regexes small: identities and
//! absorbing elements, merging of adjacent literals and loops, loop normalization, and
//! complement/star flattening. They never unfold a regex into derivatives.

use crate::term::{Sort, Term, TermBuilder, TermOp};
use crate::{SmtChar, SmtString};

impl TermBuilder {
    /// The regex denoting the empty set.
    pub fn none(&self) -> Term {
        self.re_none.clone()
    }

    /// The regex denoting the set of all words.
    pub fn all(&self) -> Term {
        self.re_all.clone()
    }

    /// The regex denoting the set of all words of length 1.
    pub fn any_char(&self) -> Term {
        self.re_allchar.clone()
    }

    /// The regex denoting only the empty word.
    pub fn epsilon(&self) -> Term {
        self.re_epsilon.clone()
    }

    /// A regex variable.
    pub fn re_var(&mut self, name: &str) -> Term {
        self.var(name, Sort::RegLan)
    }

    /// The regex accepting exactly the sequence `s`.
    pub fn to_re(&mut self, s: Term) -> Term {
        if self.optimize && s == self.empty_str() {
            return self.epsilon();
        }
        self.intern(TermOp::ToRe(s))
    }

    /// The regex accepting exactly the word `w`.
    pub fn literal(&mut self, w: impl Into<SmtString>) -> Term {
        let s = self.str(w);
        self.to_re(s)
    }

    /// The regex of all characters between `lo` and `hi`, both given as sequences of length one.
    pub fn range(&mut self, lo: Term, hi: Term) -> Term {
        if self.optimize {
            if let (Some(l), Some(h)) = (lo.as_str(), hi.as_str()) {
                if l.len() != 1 || h.len() != 1 || l > h {
                    return self.none();
                }
            }
        }
        self.intern(TermOp::Range(lo, hi))
    }

    /// The regex of all characters between `l` and `u`.
    pub fn range_from_to(&mut self, l: impl Into<SmtChar>, u: impl Into<SmtChar>) -> Term {
        let l: SmtChar = l.into();
        let u: SmtChar = u.into();
        let lo = self.str(l);
        let hi = self.str(u);
        self.range(lo, hi)
    }

    /// The concatenation `r1 · r2`.
    pub fn concat(&mut self, r1: Term, r2: Term) -> Term {
        if self.optimize {
            self.concat_opt(r1, r2)
        } else {
            self.intern(TermOp::Concat(r1, r2))
        }
    }

    /// The concatenation of all given regexes, ε if there are none.
    pub fn concat_all(&mut self, rs: impl IntoIterator<Item = Term>) -> Term {
        let rs: Vec<Term> = rs.into_iter().collect();
        rs.into_iter()
            .rev()
            .fold(self.epsilon(), |acc, r| self.concat(r, acc))
    }

    fn concat_opt(&mut self, r1: Term, r2: Term) -> Term {
        if r1.is_epsilon() || r2.is_none() {
            return r2;
        }
        if r2.is_epsilon() || r1.is_none() {
            return r1;
        }
        match (r1.op(), r2.op()) {
            (TermOp::FullSeq, TermOp::FullSeq) => return r1,
            (TermOp::FullChar, TermOp::FullSeq) | (TermOp::FullSeq, TermOp::FullChar) => {
                let any = self.any_char();
                return self.plus(any);
            }
            (TermOp::Concat(a, b), _) => {
                // keep concatenations right-associated
                let (a, b) = (a.clone(), b.clone());
                let tail = self.concat(b, r2);
                return self.concat(a, tail);
            }
            _ => {}
        }
        if let Some(merged) = self.merge_adjacent(&r1, &r2) {
            return merged;
        }
        if let TermOp::Concat(b1, b2) = r2.op() {
            if let Some(merged) = self.merge_adjacent(&r1, b1) {
                let b2 = b2.clone();
                return self.concat(merged, b2);
            }
        }
        self.intern(TermOp::Concat(r1, r2))
    }

    /// Combines two adjacent factors of a concatenation into one, if they are literals or
    /// repetitions of the same regex.
    fn merge_adjacent(&mut self, r1: &Term, r2: &Term) -> Option<Term> {
        use TermOp::*;
        let merged = match (r1.op(), r2.op()) {
            (ToRe(s1), ToRe(s2)) => {
                let (s1, s2) = (s1.clone(), s2.clone());
                let s = self.seq_concat(s1, s2);
                self.to_re(s)
            }
            (Star(a), Star(b)) if a == b => r1.clone(),
            // r*·r = r·r*
            (Star(a), _) if a == r2 => self.intern(Concat(r2.clone(), r1.clone())),
            (Loop(a, l1, h1), Loop(b, l2, h2)) if a == b => {
                let hi = h1.zip(*h2).map(|(x, y)| x.saturating_add(y));
                let (a, lo) = (a.clone(), l1.saturating_add(*l2));
                self.loop_(a, lo, hi)
            }
            (Loop(a, l, _), Star(b)) | (Star(b), Loop(a, l, _)) if a == b => {
                let (a, l) = (a.clone(), *l);
                self.loop_(a, l, None)
            }
            (Loop(a, l, h), _) if a == r2 => {
                let (a, l, h) = (a.clone(), *l, *h);
                self.loop_(a, l.saturating_add(1), h.map(|h| h.saturating_add(1)))
            }
            (_, Loop(a, l, h)) if a == r1 => {
                let (a, l, h) = (a.clone(), *l, *h);
                self.loop_(a, l.saturating_add(1), h.map(|h| h.saturating_add(1)))
            }
            _ => return None,
        };
        Some(merged)
    }

    /// The union `r1 ∪ r2`.
    pub fn union(&mut self, r1: Term, r2: Term) -> Term {
        if self.optimize {
            self.union_opt(r1, r2)
        } else {
            self.intern(TermOp::Union(r1, r2))
        }
    }

    fn union_opt(&mut self, r1: Term, r2: Term) -> Term {
        if r1 == r2 || r2.is_none() {
            return r1;
        }
        if r1.is_none() {
            return r2;
        }
        if r1.is_all() || r2.is_all() {
            return self.all();
        }
        // r* ∪ ε = r* and its symmetric cases
        if r2.is_epsilon() && r1.static_nullable() == Some(true) {
            return r1;
        }
        if r1.is_epsilon() && r2.static_nullable() == Some(true) {
            return r2;
        }
        self.intern(TermOp::Union(r1, r2))
    }

    /// The intersection `r1 ∩ r2`.
    pub fn inter(&mut self, r1: Term, r2: Term) -> Term {
        if self.optimize {
            self.inter_opt(r1, r2)
        } else {
            self.intern(TermOp::Inter(r1, r2))
        }
    }

    fn inter_opt(&mut self, r1: Term, r2: Term) -> Term {
        if r1 == r2 || r1.is_none() || r2.is_all() {
            return r1;
        }
        if r2.is_none() || r1.is_all() {
            return r2;
        }
        self.intern(TermOp::Inter(r1, r2))
    }

    /// The difference `r1 \ r2`.
    pub fn diff(&mut self, r1: Term, r2: Term) -> Term {
        if self.optimize {
            if r1.is_none() || r2.is_all() || r1 == r2 {
                return self.none();
            }
            if r2.is_none() {
                return r1;
            }
        }
        self.intern(TermOp::Diff(r1, r2))
    }

    /// The complement of `r` with respect to all words.
    pub fn comp(&mut self, r: Term) -> Term {
        if self.optimize {
            self.comp_opt(r)
        } else {
            self.intern(TermOp::Complement(r))
        }
    }

    fn comp_opt(&mut self, r: Term) -> Term {
        match r.op() {
            TermOp::Complement(inner) => inner.clone(),
            TermOp::Empty => self.all(),
            TermOp::FullSeq => self.none(),
            TermOp::Epsilon => {
                let any = self.any_char();
                self.plus(any)
            }
            TermOp::Plus(a) if a.op() == &TermOp::FullChar => self.epsilon(),
            TermOp::Union(a, b) => {
                let (a, b) = (a.clone(), b.clone());
                let ca = self.comp(a);
                let cb = self.comp(b);
                self.inter(ca, cb)
            }
            TermOp::Inter(a, b) => {
                let (a, b) = (a.clone(), b.clone());
                let ca = self.comp(a);
                let cb = self.comp(b);
                self.union(ca, cb)
            }
            _ => self.intern(TermOp::Complement(r)),
        }
    }

    /// The Kleene closure `r*`.
    pub fn star(&mut self, r: Term) -> Term {
        if self.optimize {
            self.star_opt(r)
        } else {
            self.intern(TermOp::Star(r))
        }
    }

    fn star_opt(&mut self, r: Term) -> Term {
        use TermOp::*;
        match r.op() {
            Star(_) | FullSeq => r,
            FullChar => self.all(),
            Empty | Epsilon => self.epsilon(),
            Plus(a) | Opt(a) => {
                let a = a.clone();
                self.star(a)
            }
            // (b* ∪ c)* = (b ∪ c)*
            Union(b, c) if matches!(b.op(), Star(_)) || matches!(c.op(), Star(_)) => {
                let b = strip_star(b);
                let c = strip_star(c);
                let u = self.union(b, c);
                self.star(u)
            }
            // (ε ∪ c)* = c*
            Union(b, c) if b.is_epsilon() || c.is_epsilon() => {
                let c = if b.is_epsilon() { c.clone() } else { b.clone() };
                self.star(c)
            }
            // (b*·c*)* = (b ∪ c)*
            Concat(b, c) => match (b.op(), c.op()) {
                (Star(b), Star(c)) => {
                    let (b, c) = (b.clone(), c.clone());
                    let u = self.union(b, c);
                    self.star(u)
                }
                _ => self.intern(Star(r)),
            },
            _ => self.intern(Star(r)),
        }
    }

    /// The positive closure `r+`.
    pub fn plus(&mut self, r: Term) -> Term {
        if self.optimize {
            match r.op() {
                TermOp::Empty | TermOp::Epsilon | TermOp::FullSeq | TermOp::Plus(_) | TermOp::Star(_) => {
                    return r
                }
                _ => {}
            }
        }
        self.intern(TermOp::Plus(r))
    }

    /// The option `r?`, accepting `r` or the empty word.
    pub fn opt(&mut self, r: Term) -> Term {
        if self.optimize {
            if r.is_none() || r.is_epsilon() {
                return self.epsilon();
            }
            if r.static_nullable() == Some(true) {
                return r;
            }
        }
        self.intern(TermOp::Opt(r))
    }

    /// Between `lo` and `hi` repetitions of `r`, or at least `lo` if `hi` is `None`.
    pub fn loop_(&mut self, r: Term, lo: u32, hi: Option<u32>) -> Term {
        if self.optimize {
            self.loop_opt(r, lo, hi)
        } else {
            self.intern(TermOp::Loop(r, lo, hi))
        }
    }

    fn loop_opt(&mut self, r: Term, lo: u32, hi: Option<u32>) -> Term {
        if matches!(hi, Some(h) if lo > h) {
            return self.none();
        }
        if r.is_epsilon() || hi == Some(0) {
            return self.epsilon();
        }
        if r.is_none() {
            return if lo == 0 { self.epsilon() } else { self.none() };
        }
        match (lo, hi) {
            (1, Some(1)) => return r,
            (0, None) => return self.star(r),
            (1, None) => return self.plus(r),
            _ => {}
        }
        // (a{l,l}){h,h} = a{l·h, l·h}
        if let TermOp::Loop(a, l, Some(l2)) = r.op() {
            if *l == *l2 && Some(lo) == hi {
                let n = l.saturating_mul(lo);
                let a = a.clone();
                return self.loop_(a, n, Some(n));
            }
        }
        self.intern(TermOp::Loop(r, lo, hi))
    }

    /// Exactly `n` repetitions of `r`.
    pub fn power(&mut self, r: Term, n: u32) -> Term {
        self.loop_(r, n, Some(n))
    }

    /// The reverse of `r` as a single node, only simplified at the top.
    /// See [TermBuilder::reversed] for pushing the reversal into the regex.
    pub fn reverse(&mut self, r: Term) -> Term {
        if self.optimize {
            match r.op() {
                TermOp::Reverse(inner) => return inner.clone(),
                TermOp::ToRe(s) => {
                    if let Some(w) = s.as_str() {
                        let w = w.reversed();
                        return self.literal(w);
                    }
                }
                TermOp::Empty
                | TermOp::Epsilon
                | TermOp::FullChar
                | TermOp::FullSeq
                | TermOp::Range(..)
                | TermOp::OfPred(_) => return r,
                _ => {}
            }
        }
        self.intern(TermOp::Reverse(r))
    }

    /// The reverse of `r`, pushed through every operator down to the literals.
    /// Reversal of regex variables and non-literal sequences stays as a [TermOp::Reverse] node.
    pub fn reversed(&mut self, r: &Term) -> Term {
        use TermOp::*;
        match r.op() {
            Empty | Epsilon | FullChar | FullSeq | Range(..) | OfPred(_) => r.clone(),
            ToRe(s) if matches!(s.op(), Unit(_)) => r.clone(),
            Reverse(inner) => inner.clone(),
            Concat(a, b) => {
                let rb = self.reversed(b);
                let ra = self.reversed(a);
                self.concat(rb, ra)
            }
            Union(a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.union(ra, rb)
            }
            Inter(a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.inter(ra, rb)
            }
            Diff(a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.diff(ra, rb)
            }
            AntimirovUnion(a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.antimirov_union(ra, rb)
            }
            Star(a) => {
                let ra = self.reversed(a);
                self.star(ra)
            }
            Plus(a) => {
                let ra = self.reversed(a);
                self.plus(ra)
            }
            Opt(a) => {
                let ra = self.reversed(a);
                self.opt(ra)
            }
            Complement(a) => {
                let ra = self.reversed(a);
                self.comp(ra)
            }
            Loop(a, lo, hi) => {
                let ra = self.reversed(a);
                self.loop_(ra, *lo, *hi)
            }
            Ite(c, a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.guard_ite(c.clone(), ra, rb)
            }
            Conditional(c, a, b) => {
                let (ra, rb) = (self.reversed(a), self.reversed(b));
                self.conditional(c.clone(), ra, rb)
            }
            _ => self.reverse(r.clone()),
        }
    }

    /// Single characters satisfying the predicate `p`.
    pub fn of_pred(&mut self, p: Term) -> Term {
        if self.optimize {
            if let TermOp::Lambda(_, body) = p.op() {
                match body.as_bool() {
                    Some(true) => return self.any_char(),
                    Some(false) => return self.none(),
                    None => {}
                }
            }
        }
        self.intern(TermOp::OfPred(p))
    }

    /// The regex `t` if `c` holds and `e` otherwise.
    pub fn conditional(&mut self, c: Term, t: Term, e: Term) -> Term {
        if self.optimize {
            if c.is_true() || t == e {
                return t;
            }
            if c.is_false() {
                return e;
            }
        }
        self.intern(TermOp::Conditional(c, t, e))
    }

    /// A guard node of a derivative. Negated conditions are normalized by swapping the branches.
    pub(crate) fn guard_ite(&mut self, c: Term, t: Term, e: Term) -> Term {
        if c.is_true() || t == e {
            return t;
        }
        if c.is_false() {
            return e;
        }
        if let TermOp::Not(c0) = c.op() {
            let c0 = c0.clone();
            return self.guard_ite(c0, e, t);
        }
        self.intern(TermOp::Ite(c, t, e))
    }

    /// A top-level union node of a derivative.
    pub(crate) fn antimirov_union(&mut self, a: Term, b: Term) -> Term {
        if a.is_none() || a == b {
            return b;
        }
        if b.is_none() {
            return a;
        }
        self.intern(TermOp::AntimirovUnion(a, b))
    }

    /// The derivative of `r` by `e` left unevaluated.
    pub(crate) fn stuck_derivative(&mut self, e: Term, r: Term) -> Term {
        self.intern(TermOp::Derivative(e, r))
    }
}

fn strip_star(r: &Term) -> Term {
    match r.op() {
        TermOp::Star(a) => a.clone(),
        _ => r.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn literal_concat_merges() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("ab");
        let b = tb.literal("cd");
        let ab = tb.concat(a, b);
        assert_eq!(ab, tb.literal("abcd"));
    }

    #[test]
    fn concat_right_associative() {
        let mut tb = TermBuilder::default();
        let a = tb.range_from_to('a', 'c');
        let b = tb.range_from_to('x', 'z');
        let c = tb.any_char();
        let ab = tb.concat(a.clone(), b.clone());
        let left = tb.concat(ab, c.clone());
        let bc = tb.concat(b, c);
        let right = tb.concat(a, bc);
        assert!(Rc::ptr_eq(&left, &right));
    }

    #[test]
    fn concat_identities() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("a");
        let eps = tb.epsilon();
        let none = tb.none();
        assert_eq!(tb.concat(a.clone(), eps.clone()), a);
        assert_eq!(tb.concat(eps, a.clone()), a);
        assert_eq!(tb.concat(a.clone(), none.clone()), none);
        assert_eq!(tb.concat(none.clone(), a), none);
        let all = tb.all();
        let any = tb.any_char();
        assert_eq!(tb.concat(all.clone(), all.clone()), all);
        let dot_plus = tb.concat(any, all);
        assert!(dot_plus.is_dot_plus());
    }

    #[test]
    fn concat_merges_loops() {
        let mut tb = TermBuilder::default();
        let a = tb.range_from_to('a', 'b');
        let l1 = tb.loop_(a.clone(), 2, Some(3));
        let l2 = tb.loop_(a.clone(), 1, Some(4));
        assert_eq!(tb.concat(l1.clone(), l2), tb.loop_(a.clone(), 3, Some(7)));
        assert_eq!(tb.concat(l1.clone(), a.clone()), tb.loop_(a.clone(), 3, Some(4)));
        let s = tb.star(a.clone());
        assert_eq!(tb.concat(l1, s), tb.loop_(a, 2, None));
    }

    #[test]
    fn union_absorbs() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("a");
        let all = tb.all();
        let none = tb.none();
        assert_eq!(tb.union(all.clone(), a.clone()), all);
        assert_eq!(tb.union(a.clone(), all.clone()), all);
        assert_eq!(tb.union(none, a.clone()), a);
        assert_eq!(tb.union(a.clone(), a.clone()), a);
        let s = tb.star(a);
        let eps = tb.epsilon();
        assert_eq!(tb.union(s.clone(), eps), s);
    }

    #[test]
    fn inter_identities() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("a");
        let all = tb.all();
        let none = tb.none();
        assert_eq!(tb.inter(all, a.clone()), a);
        assert_eq!(tb.inter(a.clone(), none.clone()), none);
    }

    #[test]
    fn complement_rules() {
        let mut tb = TermBuilder::default();
        let x = tb.literal("x");
        let cx = tb.comp(x.clone());
        assert_eq!(tb.comp(cx), x);
        let none = tb.none();
        assert!(tb.comp(none).is_all());
        let eps = tb.epsilon();
        assert!(tb.comp(eps).is_dot_plus());
    }

    #[test]
    fn star_rules() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("a");
        let sa = tb.star(a.clone());
        assert_eq!(tb.star(sa.clone()), sa);
        let pa = tb.plus(a.clone());
        assert_eq!(tb.star(pa), sa);
        let any = tb.any_char();
        assert!(tb.star(any).is_all());
        let none = tb.none();
        assert!(tb.star(none).is_epsilon());
        let b = tb.literal("b");
        let sb = tb.star(b.clone());
        let u = tb.union(sa.clone(), b.clone());
        let ab = tb.union(a.clone(), b.clone());
        assert_eq!(tb.star(u), tb.star(ab.clone()));
        let c = tb.concat(sa, sb);
        assert_eq!(tb.star(c), tb.star(ab));
    }

    #[test]
    fn loop_rules() {
        let mut tb = TermBuilder::default();
        let a = tb.literal("a");
        assert!(tb.loop_(a.clone(), 3, Some(2)).is_none());
        assert!(tb.loop_(a.clone(), 0, Some(0)).is_epsilon());
        assert_eq!(tb.loop_(a.clone(), 1, Some(1)), a);
        assert_eq!(tb.loop_(a.clone(), 0, None), tb.star(a.clone()));
        let l2 = tb.power(a.clone(), 2);
        assert_eq!(tb.power(l2, 3), tb.power(a, 6));
    }

    #[test]
    fn malformed_ranges_are_empty() {
        let mut tb = TermBuilder::default();
        assert!(tb.range_from_to('z', 'a').is_none());
        let ab = tb.str("ab");
        let c = tb.str("c");
        assert!(tb.range(ab, c).is_none());
        assert!(!tb.range_from_to('a', 'z').is_none());
    }

    #[test]
    fn reversed_pushes_inward() {
        let mut tb = TermBuilder::default();
        let ab = tb.literal("ab");
        let c = tb.range_from_to('0', '9');
        let r = tb.concat(ab, c.clone());
        let s = tb.star(r.clone());
        let rev = tb.reversed(&s);
        let ba = tb.literal("ba");
        let expected = tb.concat(c, ba);
        let expected = tb.star(expected);
        assert_eq!(rev, expected);
        assert_eq!(tb.reversed(&rev), s);

        let x = tb.re_var("X");
        let rx = tb.reversed(&x);
        assert!(matches!(rx.op(), TermOp::Reverse(_)));
        assert_eq!(tb.reversed(&rx), x);
    }

    #[test]
    fn guard_ite_normalizes_negation() {
        let mut tb = TermBuilder::default();
        let p = tb.var("p", Sort::Bool);
        let np = tb.not(p.clone());
        let a = tb.literal("a");
        let none = tb.none();
        let g1 = tb.guard_ite(np, a.clone(), none.clone());
        let g2 = tb.guard_ite(p, none, a);
        assert_eq!(g1, g2);
    }
}
