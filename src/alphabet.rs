//! Character ranges and sets of characters.
//!
//! The condition simplifier reduces conjunctions of character bounds to an [Alphabet], a sorted
//! set of disjoint, non-adjacent [CharRange]s, and the witness search uses the same type to
//! track which characters a guard admits.

use std::{collections::BTreeSet, fmt::Display};

use crate::SmtChar;

/// A closed interval `[start, end]` of characters.
/// The range is empty if `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharRange {
    start: SmtChar,
    end: SmtChar,
}

impl CharRange {
    /// Create the range `[l, r]`.
    pub fn new(l: impl Into<SmtChar>, r: impl Into<SmtChar>) -> Self {
        CharRange {
            start: l.into(),
            end: r.into(),
        }
    }

    /// The range containing only `c`.
    pub fn singleton(c: impl Into<SmtChar>) -> Self {
        let c = c.into();
        CharRange { start: c, end: c }
    }

    /// The range of all characters.
    pub fn all() -> Self {
        CharRange {
            start: SmtChar::MIN,
            end: SmtChar::MAX,
        }
    }

    /// The range of all characters up to and including `c`.
    pub fn up_to(c: impl Into<SmtChar>) -> Self {
        CharRange::new(SmtChar::MIN, c)
    }

    /// The range of all characters from `c` on.
    pub fn from_char(c: impl Into<SmtChar>) -> Self {
        CharRange::new(c, SmtChar::MAX)
    }

    pub fn start(&self) -> SmtChar {
        self.start
    }

    pub fn end(&self) -> SmtChar {
        self.end
    }

    /// Number of characters in the range.
    ///
    /// # Example
    /// ```
    /// use smt_re_deriv::alphabet::CharRange;
    /// assert_eq!(CharRange::new('a', 'z').size(), 26);
    /// assert_eq!(CharRange::new('z', 'a').size(), 0);
    /// ```
    pub fn size(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end.as_u32() - self.start.as_u32()) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn is_full(&self) -> bool {
        self.start == SmtChar::MIN && self.end == SmtChar::MAX
    }

    pub fn contains(&self, c: impl Into<SmtChar>) -> bool {
        let c = c.into();
        self.start <= c && c <= self.end
    }

    /// The overlap of two ranges, possibly empty.
    pub fn intersect(&self, other: &Self) -> Self {
        CharRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Whether the two ranges overlap or touch, i.e., whether their union is a single range.
    fn joins(&self, other: &Self) -> bool {
        self.start <= other.end.saturating_next() && other.start <= self.end.saturating_next()
    }
}

impl Display for CharRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "[]")
        } else if self.start == self.end {
            write!(f, "[{}]", self.start)
        } else {
            write!(f, "[{}-{}]", self.start, self.end)
        }
    }
}

/// A set of characters, stored as disjoint and non-adjacent [CharRange]s in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Alphabet {
    ranges: BTreeSet<CharRange>,
}

impl Alphabet {
    /// The set of all characters.
    pub fn full() -> Self {
        CharRange::all().into()
    }

    /// The empty set.
    pub fn empty() -> Self {
        Alphabet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1 && self.ranges.iter().all(CharRange::is_full)
    }

    /// The number of characters in the set.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(CharRange::size).sum()
    }

    pub fn contains(&self, c: impl Into<SmtChar>) -> bool {
        let c = c.into();
        self.ranges.iter().any(|r| r.contains(c))
    }

    /// Adds a range, merging it with every range it overlaps or touches.
    ///
    /// # Example
    /// ```
    /// use smt_re_deriv::alphabet::{Alphabet, CharRange};
    ///
    /// let mut a = Alphabet::empty();
    /// a.insert(CharRange::new('a', 'd'));
    /// a.insert(CharRange::new('x', 'z'));
    /// a.insert(CharRange::new('e', 'g'));
    /// let ranges: Vec<_> = a.iter_ranges().collect();
    /// assert_eq!(ranges, vec![CharRange::new('a', 'g'), CharRange::new('x', 'z')]);
    /// ```
    pub fn insert(&mut self, new: CharRange) {
        if new.is_empty() {
            return;
        }
        let merged: Vec<CharRange> = self
            .ranges
            .iter()
            .filter(|r| r.joins(&new))
            .copied()
            .collect();
        let mut start = new.start;
        let mut end = new.end;
        for r in merged {
            start = start.min(r.start);
            end = end.max(r.end);
            self.ranges.remove(&r);
        }
        self.ranges.insert(CharRange::new(start, end));
    }

    /// The characters in both sets.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut result = Alphabet::empty();
        for r1 in &self.ranges {
            for r2 in &other.ranges {
                result.insert(r1.intersect(r2));
            }
        }
        result
    }

    /// The characters in either set.
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for r in &other.ranges {
            result.insert(*r);
        }
        result
    }

    /// The characters not in this set.
    ///
    /// # Example
    /// ```
    /// use smt_re_deriv::alphabet::{Alphabet, CharRange};
    /// use smt_re_deriv::SmtChar;
    ///
    /// let a: Alphabet = CharRange::new('b', 'y').into();
    /// let c = a.complement();
    /// assert!(c.contains('a') && c.contains('z') && c.contains(SmtChar::MAX));
    /// assert!(!c.contains('m'));
    /// assert!(a.complement().complement() == a);
    /// ```
    pub fn complement(&self) -> Self {
        let mut result = Alphabet::empty();
        let mut next = Some(SmtChar::MIN);
        for r in &self.ranges {
            if let Some(lo) = next {
                if lo < r.start {
                    result.insert(CharRange::new(lo, r.start.saturating_prev()));
                }
            }
            next = r.end.next();
        }
        if let Some(lo) = next {
            result.insert(CharRange::from_char(lo));
        }
        result
    }

    /// The characters in this set but not in `other`.
    pub fn subtract(&self, other: &Self) -> Self {
        self.intersect(&other.complement())
    }

    /// Picks a member of the set, preferring the smallest one not below `preferred`.
    /// Returns `None` if the set is empty.
    ///
    /// # Example
    /// ```
    /// use smt_re_deriv::alphabet::{Alphabet, CharRange};
    /// use smt_re_deriv::SmtChar;
    ///
    /// let a: Alphabet = CharRange::new('0', '9').into();
    /// assert_eq!(a.choose_from(SmtChar::new('a')), Some(SmtChar::new('0')));
    /// assert_eq!(a.choose_from(SmtChar::new('5')), Some(SmtChar::new('5')));
    /// ```
    pub fn choose_from(&self, preferred: SmtChar) -> Option<SmtChar> {
        self.ranges
            .iter()
            .find(|r| r.end >= preferred)
            .map(|r| r.start.max(preferred))
            .or_else(|| self.ranges.iter().next().map(|r| r.start))
    }

    /// Return an iterator over the ranges in ascending order.
    pub fn iter_ranges(&self) -> impl Iterator<Item = CharRange> + '_ {
        self.ranges.iter().copied()
    }
}

impl From<CharRange> for Alphabet {
    fn from(r: CharRange) -> Self {
        let mut a = Alphabet::empty();
        a.insert(r);
        a
    }
}

impl FromIterator<CharRange> for Alphabet {
    fn from_iter<T: IntoIterator<Item = CharRange>>(iter: T) -> Self {
        let mut alphabet = Alphabet::empty();
        for r in iter {
            alphabet.insert(r);
        }
        alphabet
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.iter_ranges().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, "}}")
    }
}
