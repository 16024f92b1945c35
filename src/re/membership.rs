//! Membership constraints `s ∈ r`.
//!
//! Ground memberships are decided by deriving `r` by the characters of `s`. Otherwise the
//! constraint is rewritten into simpler ones where possible: equalities for singleton regexes,
//! prefix and suffix tests, and memberships of shorter sequences obtained by consuming a known
//! first or last character of `s`.

use super::cache::{CacheKey, OpTag};
use super::Engine;
use crate::term::{Term, TermOp};
use crate::SmtString;

impl Engine {
    pub(crate) fn membership(&mut self, s: &Term, r: &Term) -> Term {
        if r.is_none() {
            return self.tb.boolean(false);
        }
        if r.is_all() {
            return self.tb.boolean(true);
        }
        let key = CacheKey::binary(OpTag::InRegex, s, r);
        if let Some(m) = self.cached(&key) {
            return m;
        }
        let result = self.membership_uncached(s, r);
        self.remember(key, &result);
        result
    }

    fn membership_uncached(&mut self, s: &Term, r: &Term) -> Term {
        if let Some(w) = s.as_str() {
            if r.is_ground() {
                let w = w.clone();
                return self.member_word(&w, r);
            }
        }
        if let Some(t) = self.singleton_seq(r) {
            return self.tb.eq(s.clone(), t);
        }
        match r.op() {
            TermOp::Concat(h, t) if t.is_all() => {
                if let TermOp::ToRe(p) = h.op() {
                    return self.tb.prefix_of(p.clone(), s.clone());
                }
            }
            TermOp::Concat(h, t) if h.is_all() => {
                if let TermOp::ToRe(p) = t.op() {
                    return self.tb.suffix_of(p.clone(), s.clone());
                }
            }
            TermOp::Opt(b) => {
                let b = b.clone();
                return self.empty_or(s, &b);
            }
            TermOp::Union(a, b) if a.is_epsilon() || b.is_epsilon() => {
                let other = if a.is_epsilon() { b.clone() } else { a.clone() };
                return self.empty_or(s, &other);
            }
            _ => {}
        }
        if *s == self.tb.empty_str() {
            return self.nullable_term(r);
        }

        let tt = self.tb.boolean(true);
        if let Some((h, tail)) = self.split_first(s) {
            let d = self.deriv(&h, r, &tt);
            return self.in_antimirov(&tail, &d, false);
        }
        if let Some((init, l)) = self.split_last(s) {
            let rr = self.tb.reversed(r);
            if !matches!(rr.op(), TermOp::Reverse(_)) {
                let d = self.deriv(&l, &rr, &tt);
                return self.in_antimirov(&init, &d, true);
            }
        }
        if let TermOp::Concat(h, t) = r.op() {
            if let Some(m) = self.split_fixed(s, h, t) {
                return m;
            }
        }
        self.tb.in_re(s.clone(), r.clone())
    }

    /// Decides the membership of a word in a ground regex.
    fn member_word(&mut self, w: &SmtString, r: &Term) -> Term {
        let tt = self.tb.boolean(true);
        let mut current = r.clone();
        for c in w.iter() {
            if current.is_none() {
                return self.tb.boolean(false);
            }
            if current.is_all() {
                return tt;
            }
            let e = self.tb.char(*c);
            current = self.deriv(&e, &current, &tt);
        }
        self.nullable_term(&current)
    }

    /// `s ∈ r` for `r` accepting at most one word, as that word.
    fn singleton_seq(&mut self, r: &Term) -> Option<Term> {
        match r.op() {
            TermOp::ToRe(t) => Some(t.clone()),
            TermOp::Epsilon => Some(self.tb.empty_str()),
            TermOp::Conditional(c, a, b) => {
                let ta = self.singleton_seq(a)?;
                let tb = self.singleton_seq(b)?;
                Some(self.tb.ite(c.clone(), ta, tb))
            }
            _ => None,
        }
    }

    /// `s = "" ∨ s ∈ r`.
    fn empty_or(&mut self, s: &Term, r: &Term) -> Term {
        let empty = self.tb.empty_str();
        let is_empty = self.tb.eq(s.clone(), empty);
        let tt = self.tb.boolean(true);
        let m = self.membership(s, r);
        self.tb.ite(is_empty, tt, m)
    }

    /// The first character of `s` and the rest, if the first character is known.
    fn split_first(&mut self, s: &Term) -> Option<(Term, Term)> {
        match s.op() {
            TermOp::Str(w) => {
                let c = w.first()?;
                let rest = w.drop(1);
                Some((self.tb.char(c), self.tb.str(rest)))
            }
            TermOp::Unit(c) => Some((c.clone(), self.tb.empty_str())),
            TermOp::SeqConcat(a, b) => {
                let (h, t) = self.split_first(a)?;
                let tail = self.tb.seq_concat(t, b.clone());
                Some((h, tail))
            }
            _ => None,
        }
    }

    /// All but the last character of `s` and the last character, if it is known.
    fn split_last(&mut self, s: &Term) -> Option<(Term, Term)> {
        match s.op() {
            TermOp::Str(w) => {
                let c = w.last()?;
                let init = w.take(w.len() - 1);
                Some((self.tb.str(init), self.tb.char(c)))
            }
            TermOp::Unit(c) => Some((self.tb.empty_str(), c.clone())),
            TermOp::SeqConcat(a, b) => {
                let (i, l) = self.split_last(b)?;
                let init = self.tb.seq_concat(a.clone(), i);
                Some((init, l))
            }
            _ => None,
        }
    }

    /// `s ∈ h·t` where `h` or `t` only has words of one length `k > 0`: `s` is split at that
    /// length and both parts are tested separately.
    fn split_fixed(&mut self, s: &Term, h: &Term, t: &Term) -> Option<Term> {
        let len = self.tb.len(s.clone());
        let zero = self.tb.int(0);
        let (k, head_len) = match (h.fixed_length(), t.fixed_length()) {
            (Some(k), _) if k > 0 => {
                let k = self.tb.int(k as i64);
                (k.clone(), k)
            }
            (_, Some(k)) if k > 0 => {
                let k = self.tb.int(k as i64);
                (k.clone(), self.tb.sub(len.clone(), k))
            }
            _ => return None,
        };
        let long_enough = self.tb.int_le(k, len.clone());
        let head = self.tb.extract(s.clone(), zero, head_len.clone());
        let tail_len = self.tb.sub(len, head_len.clone());
        let tail = self.tb.extract(s.clone(), head_len, tail_len);
        let mh = self.membership(&head, h);
        let mt = self.membership(&tail, t);
        Some(self.tb.and_all([long_enough, mh, mt]))
    }

    /// `s ∈ d` for a derivative `d`. If `reversed` is set, the leaves of `d` are derivatives of
    /// a reversed regex and are reversed back before testing `s`.
    fn in_antimirov(&mut self, s: &Term, d: &Term, reversed: bool) -> Term {
        match d.op() {
            TermOp::AntimirovUnion(a, b) | TermOp::Union(a, b) => {
                let ma = self.in_antimirov(s, a, reversed);
                let mb = self.in_antimirov(s, b, reversed);
                self.tb.or(ma, mb)
            }
            TermOp::Ite(c, a, b) if d.is_ite() => {
                let ma = self.in_antimirov(s, a, reversed);
                let mb = self.in_antimirov(s, b, reversed);
                self.tb.ite(c.clone(), ma, mb)
            }
            _ if d.is_all() => self.tb.boolean(true),
            _ if d.is_none() => self.tb.boolean(false),
            _ => {
                let leaf = if reversed {
                    self.tb.reversed(d)
                } else {
                    d.clone()
                };
                self.membership(s, &leaf)
            }
        }
    }
}
