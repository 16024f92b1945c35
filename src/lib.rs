//! Symbolic derivatives of SMT-LIB regular expressions.
//!
//! The crate computes Brzozowski/Antimirov derivatives of regexes with respect to a character
//! that may be a concrete [SmtChar] or a symbolic character term. Derivatives are kept in a
//! normal form of character guards (if-then-else trees) over plain regexes, which keeps the
//! result of every step small and lets membership constraints `s ∈ r` be decided or reduced.
//!
//! The entry point is [re::Engine], which owns a [term::TermBuilder] used to create all terms.
//!
//! ```
//! use smt_re_deriv::re::Engine;
//! use smt_re_deriv::config::DerivConfig;
//! use smt_re_deriv::SmtChar;
//!
//! let mut engine = Engine::new(DerivConfig::default()).unwrap();
//! let tb = engine.terms();
//! let ab = tb.str("ab");
//! let ab = tb.to_re(ab);
//! let r = tb.star(ab);
//!
//! assert!(engine.accepts(&"abab".into(), &r).unwrap());
//! assert!(!engine.accepts(&"aba".into(), &r).unwrap());
//!
//! let d = engine.derivative_char(SmtChar::new('a'), &r).unwrap();
//! assert!(engine.accepts(&"bab".into(), &d).unwrap());
//! ```

pub mod alphabet;
pub mod config;
pub mod error;
pub mod re;
pub mod term;

pub use error::{Error, Result};

use std::{fmt::Display, ops::Index};

use quickcheck::Arbitrary;

/// A unicode character in the range 0x0000 to 0x2FFFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SmtChar(u32);

/// The maximum unicode character.
pub const SMT_MAX_CODEPOINT: u32 = 0x2FFFF;

/// The minimum unicode character.
pub const SMT_MIN_CODEPOINT: u32 = 0x0000;

impl SmtChar {
    /// The maximum `SmtChar`.
    pub const MAX: Self = Self(SMT_MAX_CODEPOINT);

    /// The minimum `SmtChar`.
    pub const MIN: Self = Self(SMT_MIN_CODEPOINT);

    /// Create a new `SmtChar` from a `char`.
    /// Panics if the `char` is not in the range 0x0000 to 0x2FFFF.
    pub fn new(c: char) -> Self {
        let code = c as u32;
        assert!(code <= SMT_MAX_CODEPOINT, "character out of range: {}", c);
        SmtChar(code)
    }

    /// Get the `char` representation of this `SmtChar`, if it can be represented as a `char`.
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtChar;
    /// assert_eq!(SmtChar::new('a').as_char(), Some('a'));
    /// // surrogate code points are not chars
    /// assert_eq!(SmtChar::from(55296).as_char(), None);
    ///```
    pub fn as_char(self) -> Option<char> {
        char::from_u32(self.0)
    }

    /// The unicode code point of this `SmtChar`.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the next `SmtChar`, or `None` if this is [SmtChar::MAX].
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtChar;
    /// assert_eq!(SmtChar::new('a').next(), Some(SmtChar::new('b')));
    /// assert_eq!(SmtChar::MAX.next(), None);
    /// ```
    pub fn next(self) -> Option<Self> {
        if self.0 == SMT_MAX_CODEPOINT {
            None
        } else {
            Some(SmtChar(self.0 + 1))
        }
    }

    /// Like `next`, but stays at [SmtChar::MAX].
    pub fn saturating_next(self) -> Self {
        self.next().unwrap_or(SmtChar::MAX)
    }

    /// Returns the previous `SmtChar`, or `None` if this is [SmtChar::MIN].
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtChar;
    /// assert_eq!(SmtChar::new('b').prev(), Some(SmtChar::new('a')));
    /// assert_eq!(SmtChar::MIN.prev(), None);
    /// ```
    pub fn prev(self) -> Option<Self> {
        if self.0 == SMT_MIN_CODEPOINT {
            None
        } else {
            Some(SmtChar(self.0 - 1))
        }
    }

    /// Like `prev`, but stays at [SmtChar::MIN].
    pub fn saturating_prev(self) -> Self {
        self.prev().unwrap_or(SmtChar::MIN)
    }

    /// Returns `true` if this is a printable ASCII character (0x20 to 0x7E).
    pub fn printable(self) -> bool {
        (0x00020..0x0007E).contains(&self.0)
    }

    /// Escape this character as `\u{X}`, using the shortest hexadecimal representation.
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtChar;
    /// assert_eq!(SmtChar::new('\n').escape(), r#"\u{A}"#);
    /// assert_eq!(SmtChar::MAX.escape(), r#"\u{2FFFF}"#);
    /// ```
    pub fn escape(self) -> String {
        format!("\\u{{{:X}}}", self.0)
    }
}

impl From<char> for SmtChar {
    fn from(c: char) -> Self {
        SmtChar::new(c)
    }
}

impl From<u32> for SmtChar {
    fn from(c: u32) -> Self {
        assert!(c <= SMT_MAX_CODEPOINT, "character out of range: {}", c);
        SmtChar(c)
    }
}

impl Display for SmtChar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_char() {
            Some(c) if self.printable() && c != '\\' && c != '"' && c != '\'' => write!(f, "{}", c),
            _ => write!(f, "{}", self.escape()),
        }
    }
}

/// An SMT-LIB string, a sequence of [SmtChar]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SmtString(Vec<SmtChar>);

impl SmtString {
    /// The empty string.
    pub fn empty() -> Self {
        SmtString(Vec::new())
    }

    /// Create a new string from a vector of characters.
    pub fn new(chars: Vec<SmtChar>) -> Self {
        SmtString(chars)
    }

    /// Returns whether this string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of characters in this string.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Appends the characters of `other` to this string.
    pub fn append(&mut self, other: &SmtString) {
        self.0.extend(other.0.iter().copied());
    }

    /// Pushes a character to the end of this string.
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::{SmtString, SmtChar};
    /// let mut s = SmtString::empty();
    /// s.push('a');
    /// s.push(SmtChar::new('b'));
    /// assert_eq!(s, SmtString::from("ab"));
    /// ```
    pub fn push(&mut self, c: impl Into<SmtChar>) {
        self.0.push(c.into());
    }

    /// Returns the concatenation of this string and `other`.
    pub fn concat(&self, other: &SmtString) -> SmtString {
        let mut s = self.clone();
        s.append(other);
        s
    }

    /// Returns whether `prefix` is a prefix of this string.
    pub fn starts_with(&self, prefix: &SmtString) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns whether `suffix` is a suffix of this string.
    pub fn ends_with(&self, suffix: &SmtString) -> bool {
        self.0.ends_with(&suffix.0)
    }

    /// The first character, if any.
    pub fn first(&self) -> Option<SmtChar> {
        self.0.first().copied()
    }

    /// The last character, if any.
    pub fn last(&self) -> Option<SmtChar> {
        self.0.last().copied()
    }

    /// Returns the prefix of length `n`, or the whole string if it is shorter.
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtString;
    /// let s: SmtString = "foo".into();
    /// assert_eq!(s.take(2), SmtString::from("fo"));
    /// assert_eq!(s.take(10), s);
    /// ```
    pub fn take(&self, n: usize) -> SmtString {
        SmtString(self.0.iter().copied().take(n).collect())
    }

    /// Returns the suffix after removing the first `n` characters.
    ///
    /// # Examples
    /// ```
    /// use smt_re_deriv::SmtString;
    /// let s: SmtString = "foo".into();
    /// assert_eq!(s.drop(1), SmtString::from("oo"));
    /// assert_eq!(s.drop(10), SmtString::empty());
    /// ```
    pub fn drop(&self, n: usize) -> SmtString {
        SmtString(self.0.iter().copied().skip(n).collect())
    }

    /// The substring of at most `len` characters starting at `offset`.
    pub fn extract(&self, offset: usize, len: usize) -> SmtString {
        self.drop(offset).take(len)
    }

    /// Returns the reverse of this string.
    pub fn reversed(&self) -> Self {
        SmtString(self.0.iter().rev().copied().collect())
    }

    /// Returns an iterator over the characters of this string.
    pub fn iter(&self) -> std::slice::Iter<SmtChar> {
        self.0.iter()
    }
}

impl FromIterator<SmtChar> for SmtString {
    fn from_iter<I: IntoIterator<Item = SmtChar>>(iter: I) -> Self {
        SmtString(iter.into_iter().collect())
    }
}

impl From<&str> for SmtString {
    fn from(s: &str) -> Self {
        SmtString(s.chars().map(SmtChar::new).collect())
    }
}

impl From<String> for SmtString {
    fn from(s: String) -> Self {
        SmtString::from(s.as_str())
    }
}

impl From<SmtChar> for SmtString {
    fn from(c: SmtChar) -> Self {
        SmtString(vec![c])
    }
}

impl Index<usize> for SmtString {
    type Output = SmtChar;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Display for SmtString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.0 {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl Arbitrary for SmtChar {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let code = u32::arbitrary(g) % (SMT_MAX_CODEPOINT + 1);
        SmtChar(code)
    }
}

impl Arbitrary for SmtString {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let len = usize::arbitrary(g) % 100;
        let chars = std::iter::repeat_with(|| SmtChar::arbitrary(g))
            .take(len)
            .collect();
        SmtString(chars)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(SmtString))
    }
}
