//! Memoization of engine operations.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::CacheLimit;
use crate::term::Term;

/// Identifies the operation a cached result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OpTag {
    Derivative,
    Union,
    Inter,
    Concat,
    Negate,
    Restrict,
    Ite,
    UnionNormalize,
    InterNormalize,
    Simplify,
    Nullable,
    InRegex,
}

/// An operation together with up to three operands. Unused operand slots are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    tag: OpTag,
    args: [Option<Term>; 3],
}

impl CacheKey {
    pub fn unary(tag: OpTag, a: &Term) -> Self {
        Self {
            tag,
            args: [Some(a.clone()), None, None],
        }
    }

    pub fn binary(tag: OpTag, a: &Term, b: &Term) -> Self {
        Self {
            tag,
            args: [Some(a.clone()), Some(b.clone()), None],
        }
    }

    pub fn ternary(tag: OpTag, a: &Term, b: &Term, c: &Term) -> Self {
        Self {
            tag,
            args: [Some(a.clone()), Some(b.clone()), Some(c.clone())],
        }
    }

    /// A key for a commutative binary operation, independent of the operand order.
    pub fn commutative(tag: OpTag, a: &Term, b: &Term) -> Self {
        if a <= b {
            Self::binary(tag, a, b)
        } else {
            Self::binary(tag, b, a)
        }
    }

    /// Like [CacheKey::commutative] with an additional, ordered third operand.
    pub fn commutative_with(tag: OpTag, a: &Term, b: &Term, c: &Term) -> Self {
        if a <= b {
            Self::ternary(tag, a, b, c)
        } else {
            Self::ternary(tag, b, a, c)
        }
    }
}

/// Results of previous operations.
///
/// The cache holds on to the keys' and results' terms. When an insert finds the cache full, all
/// entries are dropped at once.
#[derive(Debug)]
pub(crate) struct OpCache {
    table: FxHashMap<CacheKey, Term>,
    limit: CacheLimit,
}

impl OpCache {
    pub fn new(limit: CacheLimit) -> Self {
        Self {
            table: FxHashMap::default(),
            limit,
        }
    }

    pub fn find(&self, key: &CacheKey) -> Option<Term> {
        self.table.get(key).cloned()
    }

    /// Stores a result. Returns `true` if the cache had to be reset to make room for it.
    pub fn insert(&mut self, key: CacheKey, result: Term) -> bool {
        let reset = match self.limit {
            CacheLimit::Entries(max) => self.table.len() > max,
            CacheLimit::Unbounded => false,
        };
        if reset {
            debug!(entries = self.table.len(), "operation cache full, resetting");
            self.table.clear();
        }
        self.table.insert(key, result);
        reset
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}
