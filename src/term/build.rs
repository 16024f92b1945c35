use std::collections::HashMap;

use super::*;

/// A builder for terms that constructs unique term instances.
/// It is the only way to create terms.
///
/// Unless created with [TermBuilder::non_optimizing], the builder folds constants and applies
/// local simplifications when constructing terms, e.g., `x ∧ true` is built as `x` and
/// `'a' ≤ 'b'` as `true`. Regular expression constructors are defined in [crate::re].
#[derive(Debug)]
pub struct TermBuilder {
    registry: Registry,
    pub(crate) optimize: bool,
    fresh: usize,

    tt: Term,
    ff: Term,
    empty_str: Term,
    pub(crate) re_none: Term,
    pub(crate) re_all: Term,
    pub(crate) re_allchar: Term,
    pub(crate) re_epsilon: Term,
}

impl Default for TermBuilder {
    /// Creates a new builder with an empty registry.
    /// By default, on-the-fly simplification is enabled.
    fn default() -> Self {
        let mut registry = Registry::new();
        let tt = registry.intern(TermOp::True);
        let ff = registry.intern(TermOp::False);
        let empty_str = registry.intern(TermOp::Str(SmtString::empty()));
        let re_none = registry.intern(TermOp::Empty);
        let re_all = registry.intern(TermOp::FullSeq);
        let re_allchar = registry.intern(TermOp::FullChar);
        let re_epsilon = registry.intern(TermOp::Epsilon);
        Self {
            registry,
            optimize: true,
            fresh: 0,
            tt,
            ff,
            empty_str,
            re_none,
            re_all,
            re_allchar,
            re_epsilon,
        }
    }
}

impl TermBuilder {
    /// A builder that constructs every term exactly as requested, without simplification.
    pub fn non_optimizing() -> Self {
        Self {
            optimize: false,
            ..Default::default()
        }
    }

    pub(crate) fn intern(&mut self, op: TermOp) -> Term {
        self.registry.intern(op)
    }

    /// Checks if the builder manages the given term, i.e., whether the term was constructed by this builder.
    pub fn manages(&self, t: &Term) -> bool {
        match self.registry.registry.get(t.op()) {
            Some(r) => Rc::ptr_eq(r, t),
            None => false,
        }
    }

    /// The number of distinct terms created so far.
    pub fn num_terms(&self) -> usize {
        self.registry.next_id
    }

    /* Variables */

    /// A variable of the given sort. Variables with the same name and sort are the same term.
    pub fn var(&mut self, name: &str, sort: Sort) -> Term {
        self.intern(TermOp::Var(name.into(), sort))
    }

    /// A variable whose name has not been handed out by [TermBuilder::fresh_var] before.
    pub fn fresh_var(&mut self, prefix: &str, sort: Sort) -> Term {
        let name = format!("{}!{}", prefix, self.fresh);
        self.fresh += 1;
        self.var(&name, sort)
    }

    /* Booleans */

    pub fn boolean(&self, b: bool) -> Term {
        if b {
            self.tt.clone()
        } else {
            self.ff.clone()
        }
    }

    pub fn not(&mut self, a: Term) -> Term {
        if self.optimize {
            match a.op() {
                TermOp::True => return self.ff.clone(),
                TermOp::False => return self.tt.clone(),
                TermOp::Not(b) => return b.clone(),
                _ => {}
            }
        }
        self.intern(TermOp::Not(a))
    }

    pub fn and(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if a.is_false() || b.is_false() || complementary(&a, &b) {
                return self.ff.clone();
            }
            if a.is_true() || a == b {
                return b;
            }
            if b.is_true() {
                return a;
            }
            if let TermOp::And(b1, b2) = b.op() {
                if *b1 == a || *b2 == a {
                    return b;
                }
                if complementary(&a, b1) || complementary(&a, b2) {
                    return self.ff.clone();
                }
            }
        }
        self.intern(TermOp::And(a, b))
    }

    pub fn or(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if a.is_true() || b.is_true() || complementary(&a, &b) {
                return self.tt.clone();
            }
            if a.is_false() || a == b {
                return b;
            }
            if b.is_false() {
                return a;
            }
            if let TermOp::Or(b1, b2) = b.op() {
                if *b1 == a || *b2 == a {
                    return b;
                }
            }
        }
        self.intern(TermOp::Or(a, b))
    }

    /// The conjunction of all terms, `true` if there are none.
    pub fn and_all(&mut self, ts: impl IntoIterator<Item = Term>) -> Term {
        let ts: Vec<Term> = ts.into_iter().collect();
        ts.into_iter()
            .rev()
            .fold(self.tt.clone(), |acc, t| self.and(t, acc))
    }

    /// The disjunction of all terms, `false` if there are none.
    pub fn or_all(&mut self, ts: impl IntoIterator<Item = Term>) -> Term {
        let ts: Vec<Term> = ts.into_iter().collect();
        ts.into_iter()
            .rev()
            .fold(self.ff.clone(), |acc, t| self.or(t, acc))
    }

    pub fn implies(&mut self, a: Term, b: Term) -> Term {
        let na = self.not(a);
        self.or(na, b)
    }

    /// If-then-else over values. For regexes, this is the conditional regex.
    pub fn ite(&mut self, c: Term, t: Term, e: Term) -> Term {
        if t.sort() == Sort::RegLan {
            return self.conditional(c, t, e);
        }
        if self.optimize {
            if c.is_true() || t == e {
                return t;
            }
            if c.is_false() {
                return e;
            }
            if let TermOp::Not(c0) = c.op() {
                return self.ite(c0.clone(), e, t);
            }
            if t.sort() == Sort::Bool {
                match (t.as_bool(), e.as_bool()) {
                    (Some(true), _) => return self.or(c, e),
                    (Some(false), _) => {
                        let nc = self.not(c);
                        return self.and(nc, e);
                    }
                    (_, Some(false)) => return self.and(c, t),
                    (_, Some(true)) => {
                        let nc = self.not(c);
                        return self.or(nc, t);
                    }
                    _ => {}
                }
            }
        }
        self.intern(TermOp::Ite(c, t, e))
    }

    /// Equality of two terms of the same sort.
    pub fn eq(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if a == b {
                return self.tt.clone();
            }
            if is_value(&a) && is_value(&b) {
                // distinct values are interned into distinct nodes
                return self.ff.clone();
            }
            match (a.as_bool(), b.as_bool()) {
                (_, Some(true)) => return a,
                (Some(true), _) => return b,
                (_, Some(false)) => return self.not(a),
                (Some(false), _) => return self.not(b),
                _ => {}
            }
            if let (TermOp::Unit(x), TermOp::Unit(y)) = (a.op(), b.op()) {
                let (x, y) = (x.clone(), y.clone());
                return self.eq(x, y);
            }
            if a.sort() == Sort::Seq {
                if let Some(s) = a.as_str().or(b.as_str()) {
                    let other = if a.as_str().is_some() { &b } else { &a };
                    if other.min_length() > s.len() {
                        return self.ff.clone();
                    }
                }
            }
            if b < a {
                return self.intern(TermOp::Eq(b, a));
            }
        }
        self.intern(TermOp::Eq(a, b))
    }

    /// Code point comparison `a ≤ b` of two characters.
    pub fn char_le(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if let (Some(x), Some(y)) = (a.as_char(), b.as_char()) {
                return self.boolean(x <= y);
            }
            if a == b || a.as_char() == Some(SmtChar::MIN) || b.as_char() == Some(SmtChar::MAX) {
                return self.tt.clone();
            }
        }
        self.intern(TermOp::CharLe(a, b))
    }

    pub fn int_le(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                return self.boolean(x <= y);
            }
            if a == b {
                return self.tt.clone();
            }
            // lengths are never negative
            if matches!(a.as_int(), Some(x) if x <= 0) && matches!(b.op(), TermOp::Len(_)) {
                return self.tt.clone();
            }
        }
        self.intern(TermOp::IntLe(a, b))
    }

    pub fn int_ge(&mut self, a: Term, b: Term) -> Term {
        self.int_le(b, a)
    }

    /// `p` is a prefix of `s`.
    pub fn prefix_of(&mut self, p: Term, s: Term) -> Term {
        if self.optimize {
            if p == self.empty_str || p == s {
                return self.tt.clone();
            }
            if let (Some(x), Some(y)) = (p.as_str(), s.as_str()) {
                return self.boolean(y.starts_with(x));
            }
        }
        self.intern(TermOp::PrefixOf(p, s))
    }

    /// `p` is a suffix of `s`.
    pub fn suffix_of(&mut self, p: Term, s: Term) -> Term {
        if self.optimize {
            if p == self.empty_str || p == s {
                return self.tt.clone();
            }
            if let (Some(x), Some(y)) = (p.as_str(), s.as_str()) {
                return self.boolean(y.ends_with(x));
            }
        }
        self.intern(TermOp::SuffixOf(p, s))
    }

    /// The unevaluated membership constraint `s ∈ r`.
    /// Use [crate::re::Engine::in_regex] to decide or reduce a membership.
    pub fn in_re(&mut self, s: Term, r: Term) -> Term {
        self.intern(TermOp::InRe(s, r))
    }

    /// Applies a predicate to a character. Abstractions are beta-reduced.
    pub fn apply(&mut self, p: Term, c: Term) -> Term {
        if self.optimize {
            if let TermOp::Lambda(x, body) = p.op() {
                let (x, body) = (x.clone(), body.clone());
                return self.substitute(&body, &x, &c);
            }
        }
        self.intern(TermOp::Apply(p, c))
    }

    /* Characters */

    pub fn char(&mut self, c: impl Into<SmtChar>) -> Term {
        self.intern(TermOp::Char(c.into()))
    }

    /// The first character of `s`.
    pub fn first(&mut self, s: Term) -> Term {
        if self.optimize {
            match s.op() {
                TermOp::Str(w) if !w.is_empty() => {
                    if let Some(c) = w.first() {
                        return self.char(c);
                    }
                }
                TermOp::Unit(c) => return c.clone(),
                TermOp::SeqConcat(a, _) if a.min_length() > 0 => {
                    let a = a.clone();
                    return self.first(a);
                }
                _ => {}
            }
        }
        self.intern(TermOp::First(s))
    }

    /// The last character of `s`.
    pub fn last(&mut self, s: Term) -> Term {
        if self.optimize {
            match s.op() {
                TermOp::Str(w) if !w.is_empty() => {
                    if let Some(c) = w.last() {
                        return self.char(c);
                    }
                }
                TermOp::Unit(c) => return c.clone(),
                TermOp::SeqConcat(_, b) if b.min_length() > 0 => {
                    let b = b.clone();
                    return self.last(b);
                }
                _ => {}
            }
        }
        self.intern(TermOp::Last(s))
    }

    /* Integers */

    pub fn int(&mut self, i: i64) -> Term {
        self.intern(TermOp::Int(i))
    }

    pub fn len(&mut self, s: Term) -> Term {
        if self.optimize {
            match s.op() {
                TermOp::Str(w) => return self.int(w.len() as i64),
                TermOp::Unit(_) => return self.int(1),
                TermOp::SeqConcat(a, b) => {
                    let (a, b) = (a.clone(), b.clone());
                    let la = self.len(a);
                    let lb = self.len(b);
                    return self.add(la, lb);
                }
                _ => {}
            }
        }
        self.intern(TermOp::Len(s))
    }

    pub fn add(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => return self.int(x.saturating_add(y)),
                (Some(0), _) => return b,
                (_, Some(0)) => return a,
                _ => {}
            }
        }
        self.intern(TermOp::Add(a, b))
    }

    pub fn sub(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => return self.int(x.saturating_sub(y)),
                (_, Some(0)) => return a,
                _ => {}
            }
            if a == b {
                return self.int(0);
            }
            if let TermOp::Add(x, y) = a.op() {
                if *y == b {
                    return x.clone();
                }
                if *x == b {
                    return y.clone();
                }
            }
        }
        self.intern(TermOp::Sub(a, b))
    }

    /* Sequences */

    pub fn str(&mut self, s: impl Into<SmtString>) -> Term {
        self.intern(TermOp::Str(s.into()))
    }

    /// The empty sequence.
    pub fn empty_str(&self) -> Term {
        self.empty_str.clone()
    }

    /// The sequence of length one containing `c`.
    pub fn unit(&mut self, c: Term) -> Term {
        if self.optimize {
            if let Some(ch) = c.as_char() {
                return self.str(ch);
            }
        }
        self.intern(TermOp::Unit(c))
    }

    /// Sequence concatenation, kept right-associated with adjacent literals merged.
    pub fn seq_concat(&mut self, a: Term, b: Term) -> Term {
        if self.optimize {
            if a == self.empty_str {
                return b;
            }
            if b == self.empty_str {
                return a;
            }
            if let TermOp::SeqConcat(a1, a2) = a.op() {
                let (a1, a2) = (a1.clone(), a2.clone());
                let rest = self.seq_concat(a2, b);
                return self.seq_concat(a1, rest);
            }
            if let Some(x) = a.as_str() {
                if let Some(y) = b.as_str() {
                    let w = x.concat(y);
                    return self.str(w);
                }
                if let TermOp::SeqConcat(b1, b2) = b.op() {
                    if let Some(y) = b1.as_str() {
                        let w = x.concat(y);
                        let b2 = b2.clone();
                        let head = self.str(w);
                        return self.intern(TermOp::SeqConcat(head, b2));
                    }
                }
            }
        }
        self.intern(TermOp::SeqConcat(a, b))
    }

    /// The subsequence of at most `n` elements of `s` starting at offset `i`.
    /// Empty if `i` is out of bounds or `n` is not positive.
    pub fn extract(&mut self, s: Term, i: Term, n: Term) -> Term {
        if self.optimize {
            if let (Some(w), Some(i), Some(n)) = (s.as_str(), i.as_int(), n.as_int()) {
                if i < 0 || n <= 0 || i as usize >= w.len() {
                    return self.empty_str.clone();
                }
                let sub = w.extract(i as usize, n as usize);
                return self.str(sub);
            }
            if matches!(n.as_int(), Some(k) if k <= 0) {
                return self.empty_str.clone();
            }
            if i.as_int() == Some(0) {
                if let (Some(k), Some(max)) = (n.as_int(), s.max_length()) {
                    if k as usize >= max {
                        return s;
                    }
                }
            }
        }
        self.intern(TermOp::Extract(s, i, n))
    }

    /// `s` without its first element.
    pub fn rest(&mut self, s: Term) -> Term {
        if self.optimize {
            match s.op() {
                TermOp::Str(w) => {
                    let w = w.drop(1);
                    return self.str(w);
                }
                TermOp::Unit(_) => return self.empty_str.clone(),
                TermOp::SeqConcat(a, b) => match a.op() {
                    TermOp::Unit(_) => return b.clone(),
                    TermOp::Str(w) if !w.is_empty() => {
                        let (w, b) = (w.drop(1), b.clone());
                        let head = self.str(w);
                        return self.seq_concat(head, b);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        self.intern(TermOp::Rest(s))
    }

    /// `s` without its last element.
    pub fn butlast(&mut self, s: Term) -> Term {
        if self.optimize {
            match s.op() {
                TermOp::Str(w) => {
                    let w = w.take(w.len().saturating_sub(1));
                    return self.str(w);
                }
                TermOp::Unit(_) => return self.empty_str.clone(),
                TermOp::SeqConcat(a, b) => match b.op() {
                    TermOp::Unit(_) => return a.clone(),
                    TermOp::Str(w) if !w.is_empty() => {
                        let (w, a) = (w.take(w.len() - 1), a.clone());
                        let tail = self.str(w);
                        return self.seq_concat(a, tail);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        self.intern(TermOp::ButLast(s))
    }

    /* Predicates */

    /// The predicate `λx. body` over the character variable `x`.
    pub fn lambda(&mut self, x: Term, body: Term) -> Term {
        self.intern(TermOp::Lambda(x, body))
    }

    /* Substitution */

    /// Replaces every occurrence of `from` in `t` by `to`, re-simplifying the rebuilt terms.
    /// Occurrences bound by a predicate abstraction over `from` are left untouched.
    pub fn substitute(&mut self, t: &Term, from: &Term, to: &Term) -> Term {
        let mut memo = HashMap::new();
        self.substitute_rec(t, from, to, &mut memo)
    }

    fn substitute_rec(
        &mut self,
        t: &Term,
        from: &Term,
        to: &Term,
        memo: &mut HashMap<TermId, Term>,
    ) -> Term {
        if t == from {
            return to.clone();
        }
        if let Some(r) = memo.get(&t.id()) {
            return r.clone();
        }
        if matches!(t.op(), TermOp::Lambda(x, _) if x == from) {
            return t.clone();
        }
        let mut kids = Vec::with_capacity(3);
        let mut changed = false;
        for c in t.children() {
            let k = self.substitute_rec(c, from, to, memo);
            changed |= k != *c;
            kids.push(k);
        }
        let result = if changed {
            self.rebuild(t.op(), kids)
        } else {
            t.clone()
        };
        memo.insert(t.id(), result.clone());
        result
    }

    /// Constructs a term with the operation of `op` but the children `kids`, through the
    /// simplifying constructors.
    pub(crate) fn rebuild(&mut self, op: &TermOp, kids: Vec<Term>) -> Term {
        use TermOp::*;
        let k = kids;
        match (op, k.as_slice()) {
            (Not(_), [a]) => self.not(a.clone()),
            (And(..), [a, b]) => self.and(a.clone(), b.clone()),
            (Or(..), [a, b]) => self.or(a.clone(), b.clone()),
            (Eq(..), [a, b]) => self.eq(a.clone(), b.clone()),
            (CharLe(..), [a, b]) => self.char_le(a.clone(), b.clone()),
            (IntLe(..), [a, b]) => self.int_le(a.clone(), b.clone()),
            (PrefixOf(..), [a, b]) => self.prefix_of(a.clone(), b.clone()),
            (SuffixOf(..), [a, b]) => self.suffix_of(a.clone(), b.clone()),
            (InRe(..), [a, b]) => self.in_re(a.clone(), b.clone()),
            (Apply(..), [a, b]) => self.apply(a.clone(), b.clone()),
            (Ite(..), [c, t, e]) if t.sort() == Sort::RegLan => {
                self.guard_ite(c.clone(), t.clone(), e.clone())
            }
            (Ite(..), [c, t, e]) => self.ite(c.clone(), t.clone(), e.clone()),
            (First(_), [a]) => self.first(a.clone()),
            (Last(_), [a]) => self.last(a.clone()),
            (Len(_), [a]) => self.len(a.clone()),
            (Add(..), [a, b]) => self.add(a.clone(), b.clone()),
            (Sub(..), [a, b]) => self.sub(a.clone(), b.clone()),
            (Unit(_), [a]) => self.unit(a.clone()),
            (SeqConcat(..), [a, b]) => self.seq_concat(a.clone(), b.clone()),
            (Extract(..), [s, i, n]) => self.extract(s.clone(), i.clone(), n.clone()),
            (Rest(_), [a]) => self.rest(a.clone()),
            (ButLast(_), [a]) => self.butlast(a.clone()),
            (Lambda(..), [x, b]) => self.lambda(x.clone(), b.clone()),
            (ToRe(_), [s]) => self.to_re(s.clone()),
            (Range(..), [lo, hi]) => self.range(lo.clone(), hi.clone()),
            (Concat(..), [a, b]) => self.concat(a.clone(), b.clone()),
            (Union(..), [a, b]) => self.union(a.clone(), b.clone()),
            (Inter(..), [a, b]) => self.inter(a.clone(), b.clone()),
            (Diff(..), [a, b]) => self.diff(a.clone(), b.clone()),
            (Star(_), [a]) => self.star(a.clone()),
            (Plus(_), [a]) => self.plus(a.clone()),
            (Opt(_), [a]) => self.opt(a.clone()),
            (Loop(_, lo, hi), [a]) => self.loop_(a.clone(), *lo, *hi),
            (Complement(_), [a]) => self.comp(a.clone()),
            (Reverse(_), [a]) => self.reverse(a.clone()),
            (OfPred(_), [p]) => self.of_pred(p.clone()),
            (Conditional(..), [c, t, e]) => self.conditional(c.clone(), t.clone(), e.clone()),
            (AntimirovUnion(..), [a, b]) => self.antimirov_union(a.clone(), b.clone()),
            (Derivative(..), [e, r]) => self.stuck_derivative(e.clone(), r.clone()),
            _ => self.intern(op.clone()),
        }
    }
}

/// Literal values: distinct literal terms denote distinct values.
fn is_value(t: &Term) -> bool {
    matches!(
        t.op(),
        TermOp::True | TermOp::False | TermOp::Char(_) | TermOp::Int(_) | TermOp::Str(_)
    )
}

/// Whether one of the terms is the negation of the other.
fn complementary(a: &Term, b: &Term) -> bool {
    matches!(a.op(), TermOp::Not(x) if x == b) || matches!(b.op(), TermOp::Not(x) if x == a)
}

/// A registry that stores the unique instance of every term.
#[derive(Debug)]
struct Registry {
    registry: HashMap<TermOp, Term>,
    /// The id to assign to the next term.
    next_id: usize,
}

impl Registry {
    fn new() -> Self {
        Registry {
            registry: HashMap::new(),
            next_id: 0,
        }
    }

    /// Returns the stored term for `op`, creating it if it does not exist yet.
    fn intern(&mut self, op: TermOp) -> Term {
        if let Some(existing) = self.registry.get(&op) {
            existing.clone()
        } else {
            let term = Rc::new(TermNode::new(self.next_id, op.clone()));
            self.next_id += 1;
            self.registry.insert(op, term.clone());
            term
        }
    }
}
