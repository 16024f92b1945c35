//! Random words of ground regexes.

use rand::Rng;

use super::Engine;
use crate::alphabet::Alphabet;
use crate::error::Result;
use crate::term::Term;
use crate::{SmtChar, SmtString};

impl Engine {
    /// Tries to sample a word accepted by the ground regex `r` by a random walk over its
    /// transitions. The walk stops at an accepting regex with probability 1/2, or when no
    /// transition is left.
    ///
    /// Returns `None` if the walk runs into a dead end or exceeds the configured maximum
    /// witness length.
    pub fn sample<R: Rng>(&mut self, r: &Term, rng: &mut R) -> Result<Option<SmtString>> {
        let mut w = SmtString::empty();
        let mut current = r.clone();
        loop {
            let accepting = self.nullable_term(&current).is_true();
            let options = self.transitions(&current)?;
            if accepting && (options.is_empty() || rng.random_bool(0.5)) {
                break;
            }
            if options.is_empty() || w.len() >= self.config.max_witness_length {
                return Ok(None);
            }
            let (set, next) = &options[rng.random_range(0..options.len())];
            match random_char(set, rng) {
                Some(c) => w.push(c),
                None => return Ok(None),
            }
            current = next.clone();
        }
        if self.accepts(&w, r)? {
            Ok(Some(w))
        } else {
            Ok(None)
        }
    }
}

fn random_char<R: Rng>(set: &Alphabet, rng: &mut R) -> Option<SmtChar> {
    let ranges: Vec<_> = set.iter_ranges().collect();
    if ranges.is_empty() {
        return None;
    }
    let r = ranges[rng.random_range(0..ranges.len())];
    let code = rng.random_range(r.start().as_u32()..=r.end().as_u32());
    Some(SmtChar::from(code))
}
