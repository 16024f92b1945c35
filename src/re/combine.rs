//! Combinators on derivatives.
//!
//! Every combinator takes derivatives in normal form and returns one. Guard trees are combined
//! like ordered decision diagrams: the condition with the largest key is split on first, and
//! path conditions prune branches that can no longer be taken.

use super::cache::{CacheKey, OpTag};
use super::cond::{cofactor, cond_key, max_top};
use super::Engine;
use crate::term::{Term, TermOp};

/// The branches of an antimirov union, or `d` itself if it is none.
pub(crate) fn antimirov_branches(d: &Term) -> Vec<Term> {
    let mut out = Vec::new();
    collect_branches(d, &mut out);
    out
}

fn collect_branches(d: &Term, out: &mut Vec<Term>) {
    match d.op() {
        TermOp::AntimirovUnion(a, b) => {
            collect_branches(a, out);
            collect_branches(b, out);
        }
        _ => out.push(d.clone()),
    }
}

/// A plain regex, i.e., neither a guard nor an antimirov union.
pub(crate) fn is_leaf(d: &Term) -> bool {
    !d.is_ite() && !d.is_antimirov_union()
}

impl Engine {
    /// The guard tree testing `c`, with `t` and `e` as branches, keeping conditions ordered.
    /// `c` must be an atomic condition or its negation.
    pub(crate) fn mk_ite(&mut self, c: &Term, t: &Term, e: &Term) -> Term {
        if c.is_true() || t == e {
            return t.clone();
        }
        if c.is_false() {
            return e.clone();
        }
        if let TermOp::Not(c0) = c.op() {
            let c0 = c0.clone();
            return self.mk_ite(&c0, e, t);
        }
        let key = CacheKey::ternary(OpTag::Ite, c, t, e);
        if let Some(r) = self.cached(&key) {
            return r;
        }

        let result = if t.is_antimirov_union() || e.is_antimirov_union() {
            // ite(c, a ⊕ b, e) = ite(c, a, ∅) ⊕ ite(c, b, ∅) ⊕ ite(c, ∅, e)
            let none = self.tb.none();
            let mut branches = Vec::new();
            for a in antimirov_branches(t) {
                branches.push(self.mk_ite(c, &a, &none));
            }
            for b in antimirov_branches(e) {
                branches.push(self.mk_ite(c, &none, &b));
            }
            self.antimirov_of(branches)
        } else {
            match max_top(&[t, e]) {
                Some(v) if cond_key(v) > cond_key(c) => {
                    let v = v.clone();
                    let (t1, e1) = (cofactor(t, &v, true), cofactor(e, &v, true));
                    let (t0, e0) = (cofactor(t, &v, false), cofactor(e, &v, false));
                    let hi = self.mk_ite(c, &t1, &e1);
                    let lo = self.mk_ite(c, &t0, &e0);
                    self.tb.guard_ite(v, hi, lo)
                }
                _ => {
                    let t = cofactor(t, c, true);
                    let e = cofactor(e, c, false);
                    self.tb.guard_ite(c.clone(), t, e)
                }
            }
        };
        self.remember(key, &result);
        result
    }

    /// Joins derivatives into one antimirov union. Nested unions are flattened, empty branches
    /// dropped, and all plain branches merged into a single one.
    pub(crate) fn antimirov_of(&mut self, branches: Vec<Term>) -> Term {
        let mut trees = Vec::new();
        let mut plain: Option<Term> = None;
        for b in branches.iter().flat_map(antimirov_branches) {
            if b.is_none() {
                continue;
            }
            if b.is_ite() {
                trees.push(b);
            } else {
                plain = Some(match plain {
                    Some(p) => self.union_normalize(&p, &b),
                    None => b,
                });
            }
        }
        if let Some(p) = plain {
            if p.is_all() {
                return p;
            }
            trees.push(p);
        }
        trees.sort();
        trees.dedup();
        let mut rev = trees.into_iter().rev();
        match rev.next() {
            Some(last) => rev.fold(last, |acc, b| self.tb.antimirov_union(b, acc)),
            None => self.tb.none(),
        }
    }

    /// The union of two derivatives.
    ///
    /// Guards on the same condition are united branch-wise. Plain regexes are merged into one
    /// union. Anything else is kept apart as an antimirov union.
    pub(crate) fn union(&mut self, a: &Term, b: &Term) -> Term {
        if a == b || b.is_none() {
            return a.clone();
        }
        if a.is_none() {
            return b.clone();
        }
        if a.is_all() || b.is_all() {
            return self.tb.all();
        }
        let key = CacheKey::commutative(OpTag::Union, a, b);
        if let Some(r) = self.cached(&key) {
            return r;
        }
        let result = match (a.op(), b.op()) {
            (TermOp::Ite(c1, t1, e1), TermOp::Ite(c2, t2, e2)) if c1 == c2 => {
                let t = self.union(t1, t2);
                let e = self.union(e1, e2);
                self.mk_ite(c1, &t, &e)
            }
            _ if is_leaf(a) && is_leaf(b) => self.union_normalize(a, b),
            _ => self.antimirov_of(vec![a.clone(), b.clone()]),
        };
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }

    /// The intersection of two derivatives under the path condition `path`.
    pub(crate) fn intersection(&mut self, a: &Term, b: &Term, path: &Term) -> Term {
        if a.is_none() || b.is_none() || path.is_false() {
            return self.tb.none();
        }
        if a.is_all() || a == b {
            return self.restrict(b, path);
        }
        if b.is_all() {
            return self.restrict(a, path);
        }
        let key = CacheKey::commutative_with(OpTag::Inter, a, b, path);
        if let Some(r) = self.cached(&key) {
            return r;
        }

        let result = if a.is_antimirov_union() || b.is_antimirov_union() {
            let (xs, ys) = (antimirov_branches(a), antimirov_branches(b));
            let mut parts = Vec::with_capacity(xs.len() * ys.len());
            for x in &xs {
                for y in &ys {
                    parts.push(self.intersection(x, y, path));
                }
            }
            self.antimirov_of(parts)
        } else if let Some(c) = max_top(&[a, b]) {
            let c = c.clone();
            let (pt, pe) = self.split_path(path, &c);
            let (a1, a0) = (cofactor(a, &c, true), cofactor(a, &c, false));
            let (b1, b0) = (cofactor(b, &c, true), cofactor(b, &c, false));
            match (pt.is_false(), pe.is_false()) {
                (true, true) => self.tb.none(),
                (true, false) => self.intersection(&a0, &b0, &pe),
                (false, true) => self.intersection(&a1, &b1, &pt),
                (false, false) => {
                    let t = self.intersection(&a1, &b1, &pt);
                    let e = self.intersection(&a0, &b0, &pe);
                    self.mk_ite(&c, &t, &e)
                }
            }
        } else {
            self.intersect_plain(a, b)
        };
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }

    /// Intersection of two plain regexes, distributed over their unions.
    fn intersect_plain(&mut self, a: &Term, b: &Term) -> Term {
        match (a.op(), b.op()) {
            (TermOp::Union(x, y), _) => {
                let l = self.intersect_plain(x, b);
                let r = self.intersect_plain(y, b);
                self.union_normalize(&l, &r)
            }
            (_, TermOp::Union(x, y)) => {
                let l = self.intersect_plain(a, x);
                let r = self.intersect_plain(a, y);
                self.union_normalize(&l, &r)
            }
            _ => self.inter_normalize(a, b),
        }
    }

    /// Removes the branches of `d` that cannot be taken under `path`.
    pub(crate) fn restrict(&mut self, d: &Term, path: &Term) -> Term {
        if path.is_true() || is_leaf(d) {
            return d.clone();
        }
        if path.is_false() {
            return self.tb.none();
        }
        let key = CacheKey::binary(OpTag::Restrict, d, path);
        if let Some(r) = self.cached(&key) {
            return r;
        }
        let result = match d.op() {
            TermOp::Ite(c, t, e) => {
                let (pt, pe) = self.split_path(path, c);
                match (pt.is_false(), pe.is_false()) {
                    (true, true) => self.tb.none(),
                    (true, false) => self.restrict(e, &pe),
                    (false, true) => self.restrict(t, &pt),
                    (false, false) => {
                        let t = self.restrict(t, &pt);
                        let e = self.restrict(e, &pe);
                        self.mk_ite(c, &t, &e)
                    }
                }
            }
            _ => {
                let branches = antimirov_branches(d);
                let parts = branches.iter().map(|x| self.restrict(x, path)).collect();
                self.antimirov_of(parts)
            }
        };
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }

    /// The derivative `d` followed by the regex `r`. The guards of `d` are kept, `r` is appended
    /// to every leaf.
    pub(crate) fn concat(&mut self, d: &Term, r: &Term) -> Term {
        if d.is_none() || r.is_none() {
            return self.tb.none();
        }
        if r.is_epsilon() {
            return d.clone();
        }
        let key = CacheKey::binary(OpTag::Concat, d, r);
        if let Some(res) = self.cached(&key) {
            return res;
        }
        let result = match d.op() {
            TermOp::AntimirovUnion(..) => {
                let branches = antimirov_branches(d);
                let parts = branches.iter().map(|x| self.concat(x, r)).collect();
                self.antimirov_of(parts)
            }
            TermOp::Ite(c, t, e) => {
                let t = self.concat(t, r);
                let e = self.concat(e, r);
                self.tb.guard_ite(c.clone(), t, e)
            }
            TermOp::Union(x, y) => {
                let l = self.concat(x, r);
                let rr = self.concat(y, r);
                self.union_normalize(&l, &rr)
            }
            _ => self.tb.concat(d.clone(), r.clone()),
        };
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }

    /// The complement of a derivative.
    pub(crate) fn negate(&mut self, d: &Term) -> Term {
        let key = CacheKey::unary(OpTag::Negate, d);
        if let Some(r) = self.cached(&key) {
            return r;
        }
        let result = match d.op() {
            TermOp::Empty => self.tb.all(),
            TermOp::FullSeq => self.tb.none(),
            TermOp::Epsilon => {
                let any = self.tb.any_char();
                self.tb.plus(any)
            }
            _ if d.is_dot_plus() => self.tb.epsilon(),
            TermOp::Complement(r) => r.clone(),
            TermOp::Ite(c, t, e) => {
                let t = self.negate(t);
                let e = self.negate(e);
                self.tb.guard_ite(c.clone(), t, e)
            }
            TermOp::AntimirovUnion(..) => {
                let tt = self.tb.boolean(true);
                let mut acc = self.tb.all();
                for b in antimirov_branches(d) {
                    let nb = self.negate(&b);
                    acc = self.intersection(&acc, &nb, &tt);
                }
                acc
            }
            TermOp::Union(x, y) => {
                let nx = self.negate(x);
                let ny = self.negate(y);
                self.inter_normalize(&nx, &ny)
            }
            TermOp::Inter(x, y) => {
                let nx = self.negate(x);
                let ny = self.negate(y);
                self.union_normalize(&nx, &ny)
            }
            _ => self.tb.comp(d.clone()),
        };
        let result = self.checked(result);
        self.remember(key, &result);
        result
    }
}
