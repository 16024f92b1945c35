//! Words accepted by ground regexes, found by exploring their derivatives.

use std::collections::VecDeque;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::debug;

use super::{expect_ground, expect_sort, Engine};
use crate::alphabet::{Alphabet, CharRange};
use crate::error::Result;
use crate::term::{Sort, Term, TermOp};
use crate::{SmtChar, SmtString};

/// The outcome of a witness search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Witness {
    /// A word accepted by the regex.
    Found(SmtString),
    /// The regex accepts no word.
    Empty,
    /// The search was inconclusive, e.g., because it hit the depth bound.
    Unknown,
}

impl Engine {
    /// The transitions of the ground regex `r`: pairs of a set of characters and the regex
    /// that remains after reading any of them.
    ///
    /// A word `c·w` is accepted by `r` iff some pair `(set, r')` has `c ∈ set` and `w ∈ r'`. The
    /// sets of different pairs may overlap. Pairs leading to ∅ are omitted.
    pub fn transitions(&mut self, r: &Term) -> Result<Vec<(Alphabet, Term)>> {
        expect_sort("transitions", r, Sort::RegLan)?;
        expect_ground("transitions", r)?;
        let mut exact = true;
        Ok(self.partition(r, &mut exact))
    }

    /// Searches for a shortest word accepted by `r`, up to the configured maximum length.
    ///
    /// Regexes with variables are not searched and yield [Witness::Unknown].
    pub fn some_string(&mut self, r: &Term) -> Result<Witness> {
        expect_sort("some_string", r, Sort::RegLan)?;
        if !r.is_ground() {
            return Ok(Witness::Unknown);
        }
        let max = self.config.max_witness_length;
        let mut exact = true;
        let mut truncated = false;
        let mut visited: FxHashSet<Term> = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(r.clone());
        queue.push_back((r.clone(), SmtString::empty()));

        while let Some((t, w)) = queue.pop_front() {
            let n = self.nullable_term(&t);
            if n.is_true() && (exact || self.accepts(&w, r)?) {
                debug!(%r, %w, "witness found");
                return Ok(Witness::Found(w));
            }
            if n.as_bool().is_none() {
                exact = false;
            }
            if w.len() >= max {
                truncated = true;
                continue;
            }
            for (set, next) in self.partition(&t, &mut exact) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                if let Some(c) = set.choose_from(SmtChar::new('a')) {
                    let mut w = w.clone();
                    w.push(c);
                    queue.push_back((next, w));
                }
            }
        }

        let outcome = if truncated || !exact {
            Witness::Unknown
        } else {
            Witness::Empty
        };
        debug!(%r, ?outcome, "witness search exhausted");
        Ok(outcome)
    }

    /// Flattens the symbolic derivative of `r` into transitions. Clears `exact` if a guard
    /// does not bound the character, in which case both of its branches are kept for the
    /// same characters.
    fn partition(&mut self, r: &Term, exact: &mut bool) -> Vec<(Alphabet, Term)> {
        let tt = self.tb.boolean(true);
        let ch = self.ch.clone();
        let d = self.deriv(&ch, r, &tt);
        let mut targets: IndexMap<Term, Alphabet> = IndexMap::new();
        collect_transitions(&ch, &d, Alphabet::full(), exact, &mut targets);
        targets.into_iter().map(|(t, set)| (set, t)).collect()
    }
}

fn collect_transitions(
    ch: &Term,
    d: &Term,
    set: Alphabet,
    exact: &mut bool,
    out: &mut IndexMap<Term, Alphabet>,
) {
    if set.is_empty() || d.is_none() {
        return;
    }
    match d.op() {
        TermOp::AntimirovUnion(a, b) => {
            collect_transitions(ch, a, set.clone(), exact, out);
            collect_transitions(ch, b, set, exact, out);
        }
        TermOp::Ite(c, a, b) if d.is_ite() => {
            let bound = match c.op() {
                TermOp::CharLe(x, k) if x == ch => k.as_char(),
                _ => None,
            };
            match bound {
                Some(k) => {
                    let below: Alphabet = CharRange::up_to(k).into();
                    collect_transitions(ch, a, set.intersect(&below), exact, out);
                    collect_transitions(ch, b, set.subtract(&below), exact, out);
                }
                None => {
                    *exact = false;
                    collect_transitions(ch, a, set.clone(), exact, out);
                    collect_transitions(ch, b, set, exact, out);
                }
            }
        }
        _ => {
            let entry = out.entry(d.clone()).or_insert_with(Alphabet::empty);
            *entry = entry.union(&set);
        }
    }
}
