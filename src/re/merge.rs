//! Normalization of plain unions and intersections.
//!
//! The operands of a union (intersection) are kept as a chain sorted by a merge key. Combining
//! two chains merges them like sorted lists, dropping duplicates, and then removes operands
//! subsumed by others and fuses repetitions of the same regex, e.g.,
//! `a{1,2}·r ∪ a{3,5}·r = a{1,5}·r`.

use itertools::{EitherOrBoth, Itertools};

use super::cache::{CacheKey, OpTag};
use super::Engine;
use crate::term::{Term, TermId, TermOp};
use crate::SmtString;

/// Orders the operands of a chain. Repetitions of the same body followed by the same tail are
/// adjacent, and so are a regex and its complement.
type MergeKey = (TermId, Option<TermId>, TermId);

/// A regex read as `body{lo,hi}·tail`. Regexes that are not repetitions have `lo = hi = 1`.
struct LoopView {
    body: Term,
    lo: u32,
    hi: Option<u32>,
    tail: Option<Term>,
}

fn head_view(h: &Term) -> Option<(Term, u32, Option<u32>)> {
    match h.op() {
        TermOp::Loop(b, lo, hi) => Some((b.clone(), *lo, *hi)),
        TermOp::Star(b) => Some((b.clone(), 0, None)),
        TermOp::Plus(b) => Some((b.clone(), 1, None)),
        _ => None,
    }
}

fn loop_view(t: &Term) -> LoopView {
    let (head, tail) = match t.op() {
        TermOp::Concat(h, tail) => (h, Some(tail.clone())),
        _ => (t, None),
    };
    match head_view(head) {
        Some((body, lo, hi)) => LoopView { body, lo, hi, tail },
        None => LoopView {
            body: head.clone(),
            lo: 1,
            hi: Some(1),
            tail,
        },
    }
}

fn merge_key(t: &Term) -> MergeKey {
    if let TermOp::Complement(inner) = t.op() {
        return (inner.id(), None, t.id());
    }
    let v = loop_view(t);
    (v.body.id(), v.tail.map(|t| t.id()), t.id())
}

/// `a ≤ b` for upper bounds, where `None` is unbounded.
fn bound_le(a: Option<u32>, b: Option<u32>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(x), Some(y)) => x <= y,
    }
}

/// Whether `x ⊆ y` can be shown syntactically.
pub(crate) fn is_subset(x: &Term, y: &Term) -> bool {
    if x == y || x.is_none() || y.is_all() {
        return true;
    }
    if y.is_dot_plus() && x.static_nullable() == Some(false) {
        return true;
    }
    if let TermOp::Concat(h, t) = y.op() {
        if h.is_all() {
            // x ⊆ Σ*·t if x = t or x = p·t
            if x == t || matches!(x.op(), TermOp::Concat(_, xt) if xt == t) {
                return true;
            }
            // adjacent literals are merged, so "yx" ⊆ Σ*·"x" needs a suffix test
            if let (Some(suffix), Some(w)) = (literal_word(t), last_literal(x)) {
                if w.ends_with(suffix) {
                    return true;
                }
            }
        }
    }
    if let TermOp::Complement(z) = y.op() {
        if disjoint(x, z) {
            return true;
        }
    }
    let (vx, vy) = (loop_view(x), loop_view(y));
    vx.body == vy.body && vx.tail == vy.tail && vy.lo <= vx.lo && bound_le(vx.hi, vy.hi)
}

fn literal_word(t: &Term) -> Option<&SmtString> {
    match t.op() {
        TermOp::ToRe(s) => s.as_str(),
        _ => None,
    }
}

/// The literal word every word of `t` ends with, if `t` is a literal or a concatenation ending
/// in one.
fn last_literal(t: &Term) -> Option<&SmtString> {
    match t.op() {
        TermOp::Concat(_, tail) => last_literal(tail),
        _ => literal_word(t),
    }
}

/// Whether one regex is the complement of the other.
pub(crate) fn are_complements(x: &Term, y: &Term) -> bool {
    matches!(x.op(), TermOp::Complement(z) if z == y)
        || matches!(y.op(), TermOp::Complement(z) if z == x)
        || (x.is_epsilon() && y.is_dot_plus())
        || (y.is_epsilon() && x.is_dot_plus())
        || (x.is_none() && y.is_all())
        || (y.is_none() && x.is_all())
}

fn flatten(t: &Term, inter: bool, out: &mut Vec<Term>) {
    match (t.op(), inter) {
        (TermOp::Union(a, b), false) | (TermOp::Inter(a, b), true) => {
            flatten(a, inter, out);
            flatten(b, inter, out);
        }
        _ => out.push(t.clone()),
    }
}

/// The operands of a union or intersection chain, sorted by merge key and without duplicates.
fn sorted_chain(t: &Term, inter: bool) -> Vec<(MergeKey, Term)> {
    let mut elems = Vec::new();
    flatten(t, inter, &mut elems);
    let mut keyed: Vec<(MergeKey, Term)> = elems.into_iter().map(|e| (merge_key(&e), e)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.1 == b.1);
    keyed
}

fn merge_chains(a: &Term, b: &Term, inter: bool) -> Vec<Term> {
    sorted_chain(a, inter)
        .into_iter()
        .merge_join_by(sorted_chain(b, inter), |(kx, _), (ky, _)| kx.cmp(ky))
        .map(|e| match e {
            EitherOrBoth::Both((_, x), _) | EitherOrBoth::Left((_, x)) | EitherOrBoth::Right((_, x)) => x,
        })
        .collect()
}

/// Whether the repetition counts `[l1, h1]` and `[l2, h2]` overlap or are adjacent.
fn counts_touch(l1: u32, h1: Option<u32>, l2: u32, h2: Option<u32>) -> bool {
    let (later, first_end) = if l1 <= l2 { (l2, h1) } else { (l1, h2) };
    match first_end {
        None => true,
        Some(h) => later <= h.saturating_add(1),
    }
}

impl Engine {
    /// The union of two plain regexes, normalized.
    pub(crate) fn union_normalize(&mut self, a: &Term, b: &Term) -> Term {
        if a == b || b.is_none() {
            return a.clone();
        }
        if a.is_none() {
            return b.clone();
        }
        if a.is_all() || b.is_all() {
            return self.tb.all();
        }
        let key = CacheKey::commutative(OpTag::UnionNormalize, a, b);
        if let Some(r) = self.cached(&key) {
            return r;
        }

        let mut out: Vec<Term> = Vec::new();
        let mut universal = false;
        for x in merge_chains(a, b, false) {
            if x.is_none() {
                continue;
            }
            if x.is_all() || out.iter().any(|y| are_complements(&x, y)) {
                universal = true;
                break;
            }
            if out.iter().any(|y| is_subset(&x, y)) {
                continue;
            }
            out.retain(|y| !is_subset(y, &x));
            match out.last().and_then(|y| self.union_compose(y, &x)) {
                Some(m) => {
                    out.pop();
                    out.push(m);
                }
                None => out.push(x),
            }
        }

        let result = if universal {
            self.tb.all()
        } else {
            let none = self.tb.none();
            out.into_iter()
                .rev()
                .fold(none, |acc, x| self.tb.union(x, acc))
        };
        self.remember(key, &result);
        result
    }

    /// Fuses `b{l1,h1}·t ∪ b{l2,h2}·t` into `b{min,max}·t` if the repetition counts touch.
    fn union_compose(&mut self, x: &Term, y: &Term) -> Option<Term> {
        let (vx, vy) = (loop_view(x), loop_view(y));
        if vx.body != vy.body || vx.tail != vy.tail || !counts_touch(vx.lo, vx.hi, vy.lo, vy.hi) {
            return None;
        }
        let hi = vx.hi.zip(vy.hi).map(|(a, b)| a.max(b));
        let head = self.tb.loop_(vx.body, vx.lo.min(vy.lo), hi);
        Some(match vx.tail {
            Some(t) => self.tb.concat(head, t),
            None => head,
        })
    }

    /// The intersection of two plain regexes, normalized.
    pub(crate) fn inter_normalize(&mut self, a: &Term, b: &Term) -> Term {
        if a == b || a.is_none() || b.is_all() {
            return a.clone();
        }
        if b.is_none() || a.is_all() {
            return b.clone();
        }
        let key = CacheKey::commutative(OpTag::InterNormalize, a, b);
        if let Some(r) = self.cached(&key) {
            return r;
        }

        let mut out: Vec<Term> = Vec::new();
        let mut empty = false;
        for x in merge_chains(a, b, true) {
            if x.is_all() {
                continue;
            }
            if x.is_none() || out.iter().any(|y| are_complements(&x, y) || disjoint(&x, y)) {
                empty = true;
                break;
            }
            if out.iter().any(|y| is_subset(y, &x)) {
                continue;
            }
            out.retain(|y| !is_subset(&x, y));
            match out.last().and_then(|y| self.inter_compose(y, &x)) {
                Some(m) if m.is_none() => {
                    empty = true;
                    break;
                }
                Some(m) => {
                    out.pop();
                    out.push(m);
                }
                None => out.push(x),
            }
        }

        let result = if empty {
            self.tb.none()
        } else {
            let all = self.tb.all();
            out.into_iter()
                .rev()
                .fold(all, |acc, x| self.tb.inter(x, acc))
        };
        self.remember(key, &result);
        result
    }

    /// Intersects two repetitions `b{l1,h1}` and `b{l2,h2}` of a body with a fixed, positive
    /// length, where equal words imply equal repetition counts.
    fn inter_compose(&mut self, x: &Term, y: &Term) -> Option<Term> {
        let (vx, vy) = (loop_view(x), loop_view(y));
        if vx.body != vy.body || vx.tail.is_some() || vy.tail.is_some() {
            return None;
        }
        if !matches!(vx.body.fixed_length(), Some(n) if n > 0) {
            return None;
        }
        let lo = vx.lo.max(vy.lo);
        let hi = match (vx.hi, vy.hi) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Some(self.tb.loop_(vx.body, lo, hi))
    }
}

/// Whether the regexes share no word, judged by their lengths or by being distinct literals.
fn disjoint(x: &Term, y: &Term) -> bool {
    let apart = |a: &Term, b: &Term| matches!(b.max_length(), Some(m) if a.min_length() > m);
    let word = |t: &Term| match t.op() {
        TermOp::ToRe(s) => s.as_str().cloned(),
        TermOp::Epsilon => Some(SmtString::empty()),
        _ => None,
    };
    if let (Some(u), Some(v)) = (word(x), word(y)) {
        return u != v;
    }
    apart(x, y)
        || apart(y, x)
        || matches!((x.fixed_length(), y.fixed_length()), (Some(n), Some(m)) if n != m)
}
