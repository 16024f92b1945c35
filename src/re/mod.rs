//! The derivative engine.
//!
//! An [Engine] computes symbolic derivatives of regexes and uses them to decide nullability and
//! membership. Derivatives are kept in *derivative normal form*:
//!
//! - at the top, a right-nested [TermOp::AntimirovUnion] of branches,
//! - each branch an if-then-else tree over character conditions, where the conditions along
//!   every path are distinct and ordered, largest key outermost,
//! - at the leaves, plain regexes, which may contain ordinary unions.
//!
//! All operations of an engine share one [OpCache](cache::OpCache), so a derivative or
//! combination of the same operands is only computed once until the cache is reset.

mod build;
mod cache;
mod combine;
mod cond;
mod deriv;
mod membership;
mod merge;
mod normal_form;
mod nullable;
#[cfg(feature = "sampling")]
pub mod sampling;
mod witness;

use tracing::debug;

pub use witness::Witness;

use crate::config::DerivConfig;
use crate::error::{Error, Result};
use crate::term::{Sort, Term, TermBuilder, TermOp};
use crate::{SmtChar, SmtString};

use cache::{CacheKey, OpCache};

/// Counters of an [Engine]'s work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_resets: u64,
    /// Derivatives computed, not counting cache hits.
    pub derivatives: u64,
    /// Membership queries posed through [Engine::in_regex] or [Engine::accepts].
    pub membership_queries: u64,
}

/// Computes derivatives, nullability and membership of regexes.
///
/// The engine owns the [TermBuilder] all its terms are created with; obtain it through
/// [Engine::terms] to construct inputs.
#[derive(Debug)]
pub struct Engine {
    tb: TermBuilder,
    config: DerivConfig,
    cache: OpCache,
    stats: EngineStats,
    /// The character variable symbolic derivatives are taken with respect to.
    ch: Term,
}

impl Engine {
    pub fn new(config: DerivConfig) -> Result<Self> {
        config.validate()?;
        let mut tb = TermBuilder::default();
        let ch = tb.fresh_var("ch", Sort::Char);
        Ok(Self {
            tb,
            cache: OpCache::new(config.cache_limit),
            config,
            stats: EngineStats::default(),
            ch,
        })
    }

    /// The builder of this engine's terms.
    pub fn terms(&mut self) -> &mut TermBuilder {
        &mut self.tb
    }

    pub fn config(&self) -> &DerivConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// The character variable used by [Engine::derivative_symbolic].
    pub fn char_var(&self) -> &Term {
        &self.ch
    }

    /// Drops all cached results.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// The number of cached results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The derivative of `r` with respect to the character term `e`.
    ///
    /// The result is a regex in which character conditions on `e` appear as if-then-else nodes.
    /// Alternatives the engine keeps apart internally are joined by ordinary unions. If the
    /// derivative cannot be computed, e.g., because `r` is a regex variable, the result is the
    /// unevaluated [TermOp::Derivative] of `r`.
    pub fn derivative(&mut self, e: &Term, r: &Term) -> Result<Term> {
        expect_sort("derivative", e, Sort::Char)?;
        expect_sort("derivative", r, Sort::RegLan)?;
        let tt = self.tb.boolean(true);
        let d = self.deriv(e, r, &tt);
        Ok(self.to_plain(&d))
    }

    /// The derivative of `r` with respect to a concrete character.
    pub fn derivative_char(&mut self, c: SmtChar, r: &Term) -> Result<Term> {
        let e = self.tb.char(c);
        self.derivative(&e, r)
    }

    /// The derivative of `r` with respect to the engine's character variable, see [Engine::char_var].
    pub fn derivative_symbolic(&mut self, r: &Term) -> Result<Term> {
        let e = self.ch.clone();
        self.derivative(&e, r)
    }

    /// The condition under which `r` accepts the empty word, as a boolean term.
    pub fn nullable(&mut self, r: &Term) -> Result<Term> {
        expect_sort("nullable", r, Sort::RegLan)?;
        Ok(self.nullable_term(r))
    }

    /// Decides or simplifies the membership `s ∈ r`.
    ///
    /// The result is `true` or `false` if membership can be decided. Otherwise it is an
    /// equivalent constraint on smaller terms: an equality, a prefix or suffix test, or a
    /// residual membership.
    pub fn in_regex(&mut self, s: &Term, r: &Term) -> Result<Term> {
        expect_sort("in_regex", s, Sort::Seq)?;
        expect_sort("in_regex", r, Sort::RegLan)?;
        self.stats.membership_queries += 1;
        let result = self.membership(s, r);
        debug!(%s, %r, %result, "membership");
        Ok(result)
    }

    /// Whether the ground regex `r` accepts the word `w`.
    pub fn accepts(&mut self, w: &SmtString, r: &Term) -> Result<bool> {
        expect_sort("accepts", r, Sort::RegLan)?;
        expect_ground("accepts", r)?;
        let s = self.tb.str(w.clone());
        let result = self.in_regex(&s, r)?;
        Ok(result.is_true())
    }

    /// Simplifies a conjunction of character constraints, see [Engine::simplify_cond].
    pub fn simplify(&mut self, cond: &Term) -> Result<Term> {
        expect_sort("simplify", cond, Sort::Bool)?;
        Ok(self.simplify_cond(cond))
    }

    /// Replaces every antimirov union by an ordinary union.
    fn to_plain(&mut self, d: &Term) -> Term {
        match d.op() {
            TermOp::AntimirovUnion(a, b) => {
                let a = self.to_plain(a);
                let b = self.to_plain(b);
                self.tb.union(a, b)
            }
            _ => d.clone(),
        }
    }

    fn cached(&mut self, key: &CacheKey) -> Option<Term> {
        let found = self.cache.find(key);
        if found.is_some() {
            self.stats.cache_hits += 1;
        } else {
            self.stats.cache_misses += 1;
        }
        found
    }

    fn remember(&mut self, key: CacheKey, result: &Term) {
        if self.cache.insert(key, result.clone()) {
            self.stats.cache_resets += 1;
        }
    }

    /// Asserts that a result is in derivative normal form, if checking is enabled.
    fn checked(&self, d: Term) -> Term {
        if cfg!(debug_assertions) && self.config.check_normal_form {
            debug_assert!(
                normal_form::is_deriv_normal_form(&d),
                "not in derivative normal form: {}",
                d
            );
        }
        d
    }
}

fn expect_sort(operation: &'static str, t: &Term, expected: Sort) -> Result<()> {
    if t.sort() == expected {
        Ok(())
    } else {
        Err(Error::SortMismatch {
            operation,
            expected,
            found: t.sort(),
        })
    }
}

fn expect_ground(operation: &'static str, t: &Term) -> Result<()> {
    if t.is_ground() {
        Ok(())
    } else {
        Err(Error::NotGround {
            operation,
            term: t.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::config::CacheLimit;

    fn engine() -> Engine {
        Engine::new(DerivConfig::default()).unwrap()
    }

    /// A ground regex over the characters `a`, `b` and `c`, described without a builder.
    #[derive(Debug, Clone)]
    pub(crate) enum RegexShape {
        Lit(String),
        Range(char, char),
        Any,
        All,
        Eps,
        Concat(Box<RegexShape>, Box<RegexShape>),
        Union(Box<RegexShape>, Box<RegexShape>),
        Inter(Box<RegexShape>, Box<RegexShape>),
        Diff(Box<RegexShape>, Box<RegexShape>),
        Star(Box<RegexShape>),
        Plus(Box<RegexShape>),
        Opt(Box<RegexShape>),
        Loop(Box<RegexShape>, u32, Option<u32>),
        Comp(Box<RegexShape>),
    }

    impl RegexShape {
        pub(crate) fn build(&self, tb: &mut TermBuilder) -> Term {
            match self {
                RegexShape::Lit(w) => tb.literal(w.as_str()),
                RegexShape::Range(l, u) => tb.range_from_to(*l, *u),
                RegexShape::Any => tb.any_char(),
                RegexShape::All => tb.all(),
                RegexShape::Eps => tb.epsilon(),
                RegexShape::Concat(a, b) => {
                    let (a, b) = (a.build(tb), b.build(tb));
                    tb.concat(a, b)
                }
                RegexShape::Union(a, b) => {
                    let (a, b) = (a.build(tb), b.build(tb));
                    tb.union(a, b)
                }
                RegexShape::Inter(a, b) => {
                    let (a, b) = (a.build(tb), b.build(tb));
                    tb.inter(a, b)
                }
                RegexShape::Diff(a, b) => {
                    let (a, b) = (a.build(tb), b.build(tb));
                    tb.diff(a, b)
                }
                RegexShape::Star(a) => {
                    let a = a.build(tb);
                    tb.star(a)
                }
                RegexShape::Plus(a) => {
                    let a = a.build(tb);
                    tb.plus(a)
                }
                RegexShape::Opt(a) => {
                    let a = a.build(tb);
                    tb.opt(a)
                }
                RegexShape::Loop(a, lo, hi) => {
                    let a = a.build(tb);
                    tb.loop_(a, *lo, *hi)
                }
                RegexShape::Comp(a) => {
                    let a = a.build(tb);
                    tb.comp(a)
                }
            }
        }

        fn generate(g: &mut Gen, depth: usize) -> Self {
            let leaf = depth == 0 || bool::arbitrary(g);
            if leaf {
                match u8::arbitrary(g) % 5 {
                    0 => {
                        let len = usize::arbitrary(g) % 3;
                        let w: String = (0..len).map(|_| *g.choose(&['a', 'b', 'c']).unwrap()).collect();
                        RegexShape::Lit(w)
                    }
                    1 => {
                        let l = *g.choose(&['a', 'b', 'c']).unwrap();
                        let u = *g.choose(&['a', 'b', 'c']).unwrap();
                        RegexShape::Range(l.min(u), l.max(u))
                    }
                    2 => RegexShape::Any,
                    3 => RegexShape::Eps,
                    _ => RegexShape::All,
                }
            } else {
                let sub = |g: &mut Gen| Box::new(RegexShape::generate(g, depth - 1));
                match u8::arbitrary(g) % 9 {
                    0 => RegexShape::Concat(sub(g), sub(g)),
                    1 => RegexShape::Union(sub(g), sub(g)),
                    2 => RegexShape::Inter(sub(g), sub(g)),
                    3 => RegexShape::Diff(sub(g), sub(g)),
                    4 => RegexShape::Star(sub(g)),
                    5 => RegexShape::Plus(sub(g)),
                    6 => RegexShape::Opt(sub(g)),
                    7 => {
                        let lo = u32::arbitrary(g) % 3;
                        let hi = if bool::arbitrary(g) {
                            Some(lo + u32::arbitrary(g) % 3)
                        } else {
                            None
                        };
                        RegexShape::Loop(sub(g), lo, hi)
                    }
                    _ => RegexShape::Comp(sub(g)),
                }
            }
        }
    }

    impl Arbitrary for RegexShape {
        fn arbitrary(g: &mut Gen) -> Self {
            RegexShape::generate(g, 3)
        }
    }

    /// A short word over `a`, `b` and `c`.
    #[derive(Debug, Clone)]
    pub(crate) struct SmallWord(pub SmtString);

    impl Arbitrary for SmallWord {
        fn arbitrary(g: &mut Gen) -> Self {
            let len = usize::arbitrary(g) % 5;
            let w: String = (0..len).map(|_| *g.choose(&['a', 'b', 'c']).unwrap()).collect();
            SmallWord(w.as_str().into())
        }
    }

    #[test]
    fn scenario_star_of_union() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("a");
        let b = tb.literal("b");
        let ab = tb.union(a, b);
        let r = tb.star(ab);
        assert!(engine.accepts(&"ab".into(), &r).unwrap());
        assert!(!engine.accepts(&"ac".into(), &r).unwrap());
    }

    #[test]
    fn scenario_bounded_loop() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("a");
        let r = tb.loop_(a, 2, Some(4));
        assert!(!engine.accepts(&"a".into(), &r).unwrap());
        assert!(engine.accepts(&"aa".into(), &r).unwrap());
        assert!(engine.accepts(&"aaaa".into(), &r).unwrap());
        assert!(!engine.accepts(&"aaaaa".into(), &r).unwrap());
    }

    #[test]
    fn scenario_nullable() {
        let mut engine = engine();
        let tb = engine.terms();
        let eps = tb.epsilon();
        let none = tb.none();
        let x = tb.re_var("X");
        let sx = tb.star(x);
        assert!(engine.nullable(&eps).unwrap().is_true());
        assert!(engine.nullable(&none).unwrap().is_false());
        assert!(engine.nullable(&sx).unwrap().is_true());
    }

    #[test]
    fn scenario_union_with_all_is_all() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.re_var("X");
        let all = tb.all();
        let u = tb.union(all.clone(), x.clone());
        assert_eq!(u, all);
        assert_eq!(engine.union(&all, &x), all);
    }

    #[test]
    fn scenario_range_derivative() {
        let mut engine = engine();
        let r = engine.terms().range_from_to('a', 'z');
        let d = engine.derivative_char(SmtChar::new('m'), &r).unwrap();
        assert!(d.is_epsilon());
        let d = engine.derivative_char(SmtChar::new('5'), &r).unwrap();
        assert!(d.is_none());
    }

    #[test]
    fn scenario_double_complement() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.literal("x");
        let c = tb.comp(x.clone());
        let cc = tb.comp(c);
        assert_eq!(cc, x);

        // built verbatim, the double complement still accepts exactly "x"
        let tb = engine.terms();
        tb.optimize = false;
        let rc = tb.comp(x);
        let rcc = tb.comp(rc);
        tb.optimize = true;
        assert!(matches!(rcc.op(), TermOp::Complement(_)));
        let d = engine.derivative_char(SmtChar::new('x'), &rcc).unwrap();
        assert!(engine.nullable(&d).unwrap().is_true());
        assert!(engine.accepts(&"x".into(), &rcc).unwrap());
        assert!(!engine.accepts(&"xx".into(), &rcc).unwrap());
    }

    #[test]
    fn derivative_is_cached() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("ab");
        let r = tb.star(a);
        let e = engine.char_var().clone();
        let d1 = engine.derivative(&e, &r).unwrap();
        let hits = engine.stats().cache_hits;
        let d2 = engine.derivative(&e, &r).unwrap();
        assert!(std::rc::Rc::ptr_eq(&d1, &d2));
        assert!(engine.stats().cache_hits > hits);
    }

    #[test]
    fn clear_cache_empties() {
        let mut engine = engine();
        let r = engine.terms().literal("abc");
        engine.derivative_symbolic(&r).unwrap();
        assert!(engine.cache_len() > 0);
        engine.clear_cache();
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn small_cache_still_correct() {
        let config = DerivConfig::default().with_cache_limit(CacheLimit::Entries(3));
        let mut engine = Engine::new(config).unwrap();
        let tb = engine.terms();
        let a = tb.literal("a");
        let b = tb.range_from_to('b', 'd');
        let ab = tb.concat(a, b);
        let r = tb.star(ab);
        assert!(engine.accepts(&"acabad".into(), &r).unwrap());
        assert!(!engine.accepts(&"acae".into(), &r).unwrap());
        assert!(engine.stats().cache_resets > 0);
    }

    #[test]
    fn sort_mismatch_reported() {
        let mut engine = engine();
        let tb = engine.terms();
        let a = tb.literal("a");
        let s = tb.str("a");
        assert_eq!(
            engine.derivative(&a, &a),
            Err(Error::SortMismatch {
                operation: "derivative",
                expected: Sort::Char,
                found: Sort::RegLan
            })
        );
        assert!(engine.in_regex(&a, &a).is_err());
        assert!(engine.nullable(&s).is_err());
    }

    #[test]
    fn accepts_requires_ground_regex() {
        let mut engine = engine();
        let x = engine.terms().re_var("X");
        assert!(matches!(
            engine.accepts(&"a".into(), &x),
            Err(Error::NotGround { .. })
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = DerivConfig::default().with_max_witness_length(0);
        assert!(matches!(Engine::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn public_derivative_has_no_antimirov_union() {
        let mut engine = engine();
        let tb = engine.terms();
        let x = tb.var("x", Sort::Seq);
        let tx = tb.to_re(x);
        let a = tb.range_from_to('a', 'c');
        let sa = tb.star(a);
        let r = tb.union(tx, sa);
        let d = engine.derivative_symbolic(&r).unwrap();
        fn no_au(t: &Term) -> bool {
            !t.is_antimirov_union() && t.children().into_iter().all(no_au)
        }
        assert!(no_au(&d));
    }

    #[quickcheck]
    fn derivative_correctness(shape: RegexShape, c: u8, w: SmallWord) -> bool {
        let c = ['a', 'b', 'c', 'd'][(c % 4) as usize];
        let mut engine = engine();
        let r = shape.build(engine.terms());
        let mut cw = SmtString::from(SmtChar::new(c));
        cw.append(&w.0);
        let d = engine.derivative_char(SmtChar::new(c), &r).unwrap();
        engine.accepts(&cw, &r).unwrap() == engine.accepts(&w.0, &d).unwrap()
    }

    #[quickcheck]
    fn nullable_agrees_with_empty_membership(shape: RegexShape) -> bool {
        let mut engine = engine();
        let r = shape.build(engine.terms());
        let n = engine.nullable(&r).unwrap();
        let m = engine.accepts(&SmtString::empty(), &r).unwrap();
        n.as_bool() == Some(m)
    }

    #[quickcheck]
    fn symbolic_and_concrete_derivatives_agree(shape: RegexShape, c: u8) -> TestResult {
        let c = SmtChar::new(['a', 'b', 'c', 'z'][(c % 4) as usize]);
        let mut engine = engine();
        let r = shape.build(engine.terms());
        let sym = engine.derivative_symbolic(&r).unwrap();
        let ch = engine.char_var().clone();
        let cc = engine.terms().char(c);
        let inst = engine.terms().substitute(&sym, &ch, &cc);
        if !inst.is_ground() {
            return TestResult::discard();
        }
        let conc = engine.derivative_char(c, &r).unwrap();
        for w in ["", "a", "b", "ab", "ca", "abc"] {
            let w: SmtString = w.into();
            if engine.accepts(&w, &inst).unwrap() != engine.accepts(&w, &conc).unwrap() {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }
}
