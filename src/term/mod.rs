//! Hash-consed terms.
//!
//! Booleans, characters, integers, sequences, predicates and regular expressions are all
//! [Term]s. Every term is created through a [TermBuilder], which interns structurally equal
//! terms into the same node. Equality, hashing and ordering of terms therefore only compare
//! the node identifiers and run in O(1).

mod build;

use std::cell::RefCell;
use std::fmt::Display;
use std::hash::Hash;
use std::rc::Rc;

use smallvec::{smallvec, SmallVec};

pub use build::TermBuilder;

use crate::{SmtChar, SmtString};

pub type TermId = usize;

type LazyProp<T> = RefCell<Option<T>>;

/// A reference-counted, immutable term.
///
/// Identical terms created by the same [TermBuilder] share one node, so `Rc::ptr_eq` and `==`
/// agree for terms of the same builder.
pub type Term = Rc<TermNode>;

/// The sort of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Char,
    Int,
    Seq,
    /// Regular languages over characters.
    RegLan,
    /// Unary predicates over characters.
    Pred,
}

impl Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Char => write!(f, "Char"),
            Sort::Int => write!(f, "Int"),
            Sort::Seq => write!(f, "Seq"),
            Sort::RegLan => write!(f, "RegLan"),
            Sort::Pred => write!(f, "Pred"),
        }
    }
}

/// A node of the term graph.
///
/// Besides its identifier and operation, a node caches a few structural properties that are
/// computed on first access.
#[derive(Debug)]
pub struct TermNode {
    id: TermId,
    op: TermOp,
    sort: Sort,

    /// Whether the term contains no free variables.
    ground: LazyProp<bool>,
    /// Lower bound on the length of the sequence or of every word in the regex.
    min_length: LazyProp<usize>,
    /// Upper bound on the length of the sequence or of every word in the regex, if bounded.
    max_length: LazyProp<Option<usize>>,
    /// Whether the regex accepts the empty word, if this can be decided without conditions.
    nullable: LazyProp<Option<bool>>,
}

impl PartialEq for TermNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for TermNode {}
impl Hash for TermNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
impl PartialOrd for TermNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TermNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl TermNode {
    fn new(id: TermId, op: TermOp) -> Self {
        let sort = op.sort();
        Self {
            id,
            op,
            sort,
            ground: RefCell::new(None),
            min_length: RefCell::new(None),
            max_length: RefCell::new(None),
            nullable: RefCell::new(None),
        }
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    pub fn op(&self) -> &TermOp {
        &self.op
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    /// Returns whether the term is free of variables.
    /// Variables bound by a predicate abstraction do not count.
    pub fn is_ground(&self) -> bool {
        if let Some(g) = *self.ground.borrow() {
            return g;
        }
        let g = self.op.ground();
        *self.ground.borrow_mut() = Some(g);
        g
    }

    /// A lower bound on the length of this sequence, or on the length of every word accepted by this regex.
    /// The empty regex has the bound `usize::MAX`.
    pub fn min_length(&self) -> usize {
        if let Some(l) = *self.min_length.borrow() {
            return l;
        }
        let l = self.op.min_length();
        *self.min_length.borrow_mut() = Some(l);
        l
    }

    /// An upper bound on the length of this sequence, or on the length of every word accepted by this regex.
    /// `None` if no bound is known.
    pub fn max_length(&self) -> Option<usize> {
        if let Some(l) = *self.max_length.borrow() {
            return l;
        }
        let l = self.op.max_length();
        *self.max_length.borrow_mut() = Some(l);
        l
    }

    /// The length shared by all words of this regex, if it is known to be fixed.
    pub fn fixed_length(&self) -> Option<usize> {
        let min = self.min_length();
        match self.max_length() {
            Some(max) if max == min => Some(min),
            _ => None,
        }
    }

    /// Whether this regex accepts the empty word, provided this does not depend on conditions or variables.
    pub fn static_nullable(&self) -> Option<bool> {
        if let Some(n) = *self.nullable.borrow() {
            return n;
        }
        let n = self.op.static_nullable();
        *self.nullable.borrow_mut() = Some(n);
        n
    }

    /// The direct subterms of this term.
    pub fn children(&self) -> SmallVec<[&Term; 3]> {
        self.op.children()
    }

    /// Returns whether `t` occurs in this term.
    pub fn contains(&self, t: &Term) -> bool {
        self.id == t.id || self.children().into_iter().any(|c| c.contains(t))
    }

    pub fn is_true(&self) -> bool {
        matches!(self.op, TermOp::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self.op, TermOp::False)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.op {
            TermOp::True => Some(true),
            TermOp::False => Some(false),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<SmtChar> {
        match self.op {
            TermOp::Char(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.op {
            TermOp::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&SmtString> {
        match &self.op {
            TermOp::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The empty regex ∅.
    pub fn is_none(&self) -> bool {
        matches!(self.op, TermOp::Empty)
    }

    /// The regex Σ* of all words.
    pub fn is_all(&self) -> bool {
        matches!(self.op, TermOp::FullSeq)
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self.op, TermOp::Epsilon)
    }

    /// The regex Σ+ of all non-empty words.
    pub fn is_dot_plus(&self) -> bool {
        matches!(&self.op, TermOp::Plus(r) if matches!(r.op, TermOp::FullChar))
    }

    /// An internal guard node of a derivative.
    pub fn is_ite(&self) -> bool {
        matches!(self.op, TermOp::Ite(..)) && self.sort == Sort::RegLan
    }

    pub fn is_antimirov_union(&self) -> bool {
        matches!(self.op, TermOp::AntimirovUnion(..))
    }
}

impl Display for TermNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.op)
    }
}

/// The operations terms are built from.
///
/// Children are [Term]s and thus shared. The variants are grouped by the sort of the term they
/// produce; [TermOp::Ite] and [TermOp::Var] have the sort of their branches and declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermOp {
    /* Booleans */
    True,
    False,
    Not(Term),
    And(Term, Term),
    Or(Term, Term),
    Eq(Term, Term),
    /// Code point comparison of two characters.
    CharLe(Term, Term),
    IntLe(Term, Term),
    /// `PrefixOf(p, s)`: `p` is a prefix of `s`.
    PrefixOf(Term, Term),
    /// `SuffixOf(p, s)`: `p` is a suffix of `s`.
    SuffixOf(Term, Term),
    /// Membership `s ∈ r`.
    InRe(Term, Term),
    /// Application of a predicate to a character.
    Apply(Term, Term),

    /* Any sort */
    /// If-then-else. Over regexes this is the guard node of derivatives; the user-level regex
    /// conditional is [TermOp::Conditional].
    Ite(Term, Term, Term),
    Var(Rc<str>, Sort),

    /* Characters */
    Char(SmtChar),
    /// The first character of a non-empty sequence.
    First(Term),
    /// The last character of a non-empty sequence.
    Last(Term),

    /* Integers */
    Int(i64),
    Len(Term),
    Add(Term, Term),
    Sub(Term, Term),

    /* Sequences */
    Str(SmtString),
    Unit(Term),
    SeqConcat(Term, Term),
    /// `Extract(s, i, n)`: the subsequence of at most `n` elements of `s` starting at `i`.
    Extract(Term, Term, Term),
    /// All but the first element.
    Rest(Term),
    /// All but the last element.
    ButLast(Term),

    /* Predicates */
    /// `Lambda(x, body)` is the predicate `λx. body`, where `x` is a character variable.
    Lambda(Term, Term),

    /* Regular expressions */
    /// ∅
    Empty,
    /// The regex accepting only the empty word.
    Epsilon,
    /// Σ, all words of length one.
    FullChar,
    /// Σ*, all words.
    FullSeq,
    /// The regex accepting exactly the given sequence.
    ToRe(Term),
    /// Single characters between two bounds, each given as a sequence of length one.
    Range(Term, Term),
    Concat(Term, Term),
    Union(Term, Term),
    Inter(Term, Term),
    Diff(Term, Term),
    Star(Term),
    Plus(Term),
    Opt(Term),
    /// Between `lo` and `hi` repetitions; no upper bound if `hi` is `None`.
    Loop(Term, u32, Option<u32>),
    Complement(Term),
    /// The words of the regex, read backwards.
    Reverse(Term),
    /// Single characters satisfying the predicate.
    OfPred(Term),
    /// Regex-valued conditional on a boolean.
    Conditional(Term, Term, Term),
    /// Union of top-level branches of a derivative.
    AntimirovUnion(Term, Term),
    /// A derivative `D(e, r)` that could not be computed.
    Derivative(Term, Term),
}

impl TermOp {
    pub fn sort(&self) -> Sort {
        use TermOp::*;
        match self {
            True | False | Not(_) | And(..) | Or(..) | Eq(..) | CharLe(..) | IntLe(..)
            | PrefixOf(..) | SuffixOf(..) | InRe(..) | Apply(..) => Sort::Bool,
            Ite(_, t, _) => t.sort(),
            Var(_, s) => *s,
            Char(_) | First(_) | Last(_) => Sort::Char,
            Int(_) | Len(_) | Add(..) | Sub(..) => Sort::Int,
            Str(_) | Unit(_) | SeqConcat(..) | Extract(..) | Rest(_) | ButLast(_) => Sort::Seq,
            Lambda(..) => Sort::Pred,
            Empty | Epsilon | FullChar | FullSeq | ToRe(_) | Range(..) | Concat(..) | Union(..)
            | Inter(..) | Diff(..) | Star(_) | Plus(_) | Opt(_) | Loop(..) | Complement(_)
            | Reverse(_) | OfPred(_) | Conditional(..) | AntimirovUnion(..) | Derivative(..) => {
                Sort::RegLan
            }
        }
    }

    fn children(&self) -> SmallVec<[&Term; 3]> {
        use TermOp::*;
        match self {
            True | False | Var(..) | Char(_) | Int(_) | Str(_) | Empty | Epsilon | FullChar
            | FullSeq => smallvec![],
            Not(a) | First(a) | Last(a) | Len(a) | Unit(a) | Rest(a) | ButLast(a) | ToRe(a)
            | Star(a) | Plus(a) | Opt(a) | Loop(a, _, _) | Complement(a) | Reverse(a)
            | OfPred(a) => smallvec![a],
            And(a, b)
            | Or(a, b)
            | Eq(a, b)
            | CharLe(a, b)
            | IntLe(a, b)
            | PrefixOf(a, b)
            | SuffixOf(a, b)
            | InRe(a, b)
            | Apply(a, b)
            | Add(a, b)
            | Sub(a, b)
            | SeqConcat(a, b)
            | Lambda(a, b)
            | Range(a, b)
            | Concat(a, b)
            | Union(a, b)
            | Inter(a, b)
            | Diff(a, b)
            | AntimirovUnion(a, b)
            | Derivative(a, b) => smallvec![a, b],
            Ite(a, b, c) | Extract(a, b, c) | Conditional(a, b, c) => smallvec![a, b, c],
        }
    }

    fn ground(&self) -> bool {
        match self {
            TermOp::Var(..) => false,
            TermOp::Lambda(x, body) => ground_except(body, x),
            _ => self.children().into_iter().all(|c| c.is_ground()),
        }
    }

    fn min_length(&self) -> usize {
        use TermOp::*;
        match self {
            Str(s) => s.len(),
            Unit(_) | FullChar | Range(..) | OfPred(_) => 1,
            SeqConcat(a, b) | Concat(a, b) => a.min_length().saturating_add(b.min_length()),
            ToRe(s) => s.min_length(),
            Empty => usize::MAX,
            Union(a, b) | AntimirovUnion(a, b) | Ite(_, a, b) | Conditional(_, a, b) => {
                a.min_length().min(b.min_length())
            }
            Inter(a, b) => a.min_length().max(b.min_length()),
            Diff(a, _) | Plus(a) | Reverse(a) => a.min_length(),
            Loop(_, 0, _) => 0,
            Loop(a, lo, _) => a.min_length().saturating_mul(*lo as usize),
            _ => 0,
        }
    }

    fn max_length(&self) -> Option<usize> {
        use TermOp::*;
        match self {
            Str(s) => Some(s.len()),
            Unit(_) | FullChar | Range(..) | OfPred(_) => Some(1),
            Empty | Epsilon => Some(0),
            SeqConcat(a, b) | Concat(a, b) => a.max_length()?.checked_add(b.max_length()?),
            ToRe(s) => s.max_length(),
            Union(a, b) | AntimirovUnion(a, b) | Ite(_, a, b) | Conditional(_, a, b) => {
                Some(a.max_length()?.max(b.max_length()?))
            }
            Inter(a, b) => match (a.max_length(), b.max_length()) {
                (Some(x), Some(y)) => Some(x.min(y)),
                (x, y) => x.or(y),
            },
            Diff(a, _) | Opt(a) | Reverse(a) => a.max_length(),
            Star(a) | Plus(a) | Loop(a, _, None) => match a.max_length() {
                Some(0) => Some(0),
                _ => None,
            },
            Loop(a, _, Some(hi)) => a.max_length()?.checked_mul(*hi as usize),
            _ => None,
        }
    }

    fn static_nullable(&self) -> Option<bool> {
        use TermOp::*;
        match self {
            Empty | FullChar | Range(..) | OfPred(_) => Some(false),
            Epsilon | FullSeq | Star(_) | Opt(_) | Loop(_, 0, _) => Some(true),
            ToRe(s) => match s.op() {
                Str(w) => Some(w.is_empty()),
                _ if s.min_length() > 0 => Some(false),
                _ => None,
            },
            Concat(a, b) | Inter(a, b) => and3(a.static_nullable(), b.static_nullable()),
            Union(a, b) | AntimirovUnion(a, b) => or3(a.static_nullable(), b.static_nullable()),
            Diff(a, b) => and3(a.static_nullable(), b.static_nullable().map(|n| !n)),
            Plus(a) | Reverse(a) | Loop(a, _, _) => a.static_nullable(),
            Complement(a) => a.static_nullable().map(|n| !n),
            Ite(_, a, b) | Conditional(_, a, b) => match (a.static_nullable(), b.static_nullable()) {
                (Some(x), Some(y)) if x == y => Some(x),
                _ => None,
            },
            _ => None,
        }
    }
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Whether `t` has no free variables other than `bound`.
fn ground_except(t: &Term, bound: &Term) -> bool {
    if t == bound || t.is_ground() {
        return true;
    }
    match t.op() {
        TermOp::Var(..) => false,
        _ => t.children().into_iter().all(|c| ground_except(c, bound)),
    }
}

impl Display for TermOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TermOp::*;
        match self {
            True => write!(f, "true"),
            False => write!(f, "false"),
            Not(a) => write!(f, "¬{}", a),
            And(a, b) => write!(f, "({} ∧ {})", a, b),
            Or(a, b) => write!(f, "({} ∨ {})", a, b),
            Eq(a, b) => write!(f, "({} = {})", a, b),
            CharLe(a, b) | IntLe(a, b) => write!(f, "({} ≤ {})", a, b),
            PrefixOf(a, b) => write!(f, "prefixof({}, {})", a, b),
            SuffixOf(a, b) => write!(f, "suffixof({}, {})", a, b),
            InRe(s, r) => write!(f, "({} ∈ {})", s, r),
            Apply(p, c) => write!(f, "{}({})", p, c),
            Ite(c, t, e) => write!(f, "ite({}, {}, {})", c, t, e),
            Var(name, _) => write!(f, "{}", name),
            Char(c) => write!(f, "'{}'", c),
            First(s) => write!(f, "first({})", s),
            Last(s) => write!(f, "last({})", s),
            Int(i) => write!(f, "{}", i),
            Len(s) => write!(f, "len({})", s),
            Add(a, b) => write!(f, "({} + {})", a, b),
            Sub(a, b) => write!(f, "({} - {})", a, b),
            Str(s) => write!(f, "\"{}\"", s),
            Unit(c) => write!(f, "unit({})", c),
            SeqConcat(a, b) => write!(f, "({} ++ {})", a, b),
            Extract(s, i, n) => write!(f, "extract({}, {}, {})", s, i, n),
            Rest(s) => write!(f, "rest({})", s),
            ButLast(s) => write!(f, "butlast({})", s),
            Lambda(x, b) => write!(f, "(λ{}. {})", x, b),
            Empty => write!(f, "∅"),
            Epsilon => write!(f, "ε"),
            FullChar => write!(f, "Σ"),
            FullSeq => write!(f, "(Σ*)"),
            ToRe(s) => match s.op() {
                Str(_) => write!(f, "{}", s),
                _ => write!(f, "to_re({})", s),
            },
            Range(lo, hi) => write!(f, "[{}-{}]", lo, hi),
            Concat(a, b) => write!(f, "({}{})", a, b),
            Union(a, b) => write!(f, "({} | {})", a, b),
            Inter(a, b) => write!(f, "({} & {})", a, b),
            Diff(a, b) => write!(f, "({} - {})", a, b),
            Star(r) => write!(f, "{}*", r),
            Plus(r) => write!(f, "{}+", r),
            Opt(r) => write!(f, "{}?", r),
            Loop(r, lo, Some(hi)) => write!(f, "({}{{{},{}}})", r, lo, hi),
            Loop(r, lo, None) => write!(f, "({}{{{},}})", r, lo),
            Complement(r) => write!(f, "~{}", r),
            Reverse(r) => write!(f, "rev({})", r),
            OfPred(p) => write!(f, "of_pred({})", p),
            Conditional(c, t, e) => write!(f, "if({}, {}, {})", c, t, e),
            AntimirovUnion(a, b) => write!(f, "({} ⊕ {})", a, b),
            Derivative(e, r) => write!(f, "D({}, {})", e, r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_of_ops() {
        let mut tb = TermBuilder::default();
        let x = tb.var("x", Sort::Seq);
        let c = tb.var("c", Sort::Char);
        let len = tb.len(x.clone());
        let a = tb.char('a');
        let le = tb.char_le(c, a);
        let r = tb.to_re(x.clone());
        assert_eq!(x.sort(), Sort::Seq);
        assert_eq!(len.sort(), Sort::Int);
        assert_eq!(le.sort(), Sort::Bool);
        assert_eq!(r.sort(), Sort::RegLan);
        assert_eq!(tb.first(x).sort(), Sort::Char);
    }

    #[test]
    fn ground_ignores_bound_variable() {
        let mut tb = TermBuilder::default();
        let x = tb.var("x", Sort::Char);
        let z = tb.char('z');
        let le = tb.char_le(x.clone(), z);
        let p = tb.lambda(x.clone(), le.clone());
        assert!(!le.is_ground());
        assert!(p.is_ground());
        assert!(tb.of_pred(p).is_ground());
    }

    #[test]
    fn regex_length_bounds() {
        let mut tb = TermBuilder::default();
        let abc = tb.str("abc");
        let abc = tb.to_re(abc);
        let digit = tb.range_from_to('0', '9');
        let r = tb.concat(abc.clone(), digit.clone());
        assert_eq!(r.fixed_length(), Some(4));
        let s = tb.star(digit.clone());
        assert_eq!(s.min_length(), 0);
        assert_eq!(s.max_length(), None);
        let l = tb.loop_(digit, 2, Some(3));
        assert_eq!(l.min_length(), 2);
        assert_eq!(l.max_length(), Some(3));
        assert_eq!(tb.none().min_length(), usize::MAX);
    }

    #[test]
    fn static_nullable_of_symbolic_literal() {
        let mut tb = TermBuilder::default();
        let x = tb.var("x", Sort::Seq);
        let r = tb.to_re(x.clone());
        assert_eq!(r.static_nullable(), None);
        let a = tb.str("a");
        let ax = tb.seq_concat(a, x);
        let r = tb.to_re(ax);
        assert_eq!(r.static_nullable(), Some(false));
        let s = tb.star(r);
        assert_eq!(s.static_nullable(), Some(true));
    }

    #[test]
    fn display_regex() {
        let mut tb = TermBuilder::default();
        let ab = tb.str("ab");
        let ab = tb.to_re(ab);
        let r = tb.star(ab);
        assert_eq!(r.to_string(), "\"ab\"*");
        let any = tb.any_char();
        assert_eq!(tb.comp(any).to_string(), "~Σ");
    }
}
