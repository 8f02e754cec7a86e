//! Sorted set: member -> float score, ordered by (score, member bytes)
//! per spec §3/§4.2. See SPEC_FULL.md "Sorted-set data structure
//! decision" for why this is a `BTreeSet` order-statistics index rather
//! than a hand-ported skip list.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;

/// `f64` isn't `Ord`; scores here are never NaN (parsing rejects NaN,
/// see `util::parse_float`), so `total_cmp` gives a consistent total
/// order matching IEEE-754 ordering for all other values.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedScore(f64);

impl Eq for OrderedScore {}
impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ordered: BTreeSet<(OrderedScore, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Inserts or updates a member's score. Returns `true` iff the
    /// member is new (spec §4.2: "the return value is the count of
    /// *new* members, not updated ones").
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        if let Some(&old) = self.scores.get(&member) {
            if old != score {
                self.ordered.remove(&(OrderedScore(old), member.clone()));
                self.ordered.insert((OrderedScore(score), member.clone()));
                self.scores.insert(member, score);
            }
            false
        } else {
            self.ordered.insert((OrderedScore(score), member.clone()));
            self.scores.insert(member, score);
            true
        }
    }

    /// ZINCRBY: inserts the member with the increment as its initial
    /// score if missing (spec §4.2).
    pub fn incr_by(&mut self, member: Bytes, delta: f64) -> f64 {
        let new_score = self.scores.get(&member).copied().unwrap_or(0.0) + delta;
        self.insert(member, new_score);
        new_score
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        if let Some(score) = self.scores.remove(member) {
            self.ordered.remove(&(OrderedScore(score), Bytes::copy_from_slice(member)));
            true
        } else {
            false
        }
    }

    pub fn count_by_score(&self, min: f64, max: f64) -> usize {
        self.ordered
            .range((OrderedScore(min), Bytes::new())..)
            .take_while(|(s, _)| s.0 <= max)
            .count()
    }

    /// Ascending members with score in `[min, max]`.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        self.ordered
            .range((OrderedScore(min), Bytes::new())..)
            .take_while(|(s, _)| s.0 <= max)
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    /// Ascending (`rev = false`) or descending (`rev = true`) members by
    /// rank, clamped and empty for `start > stop` (spec §4.2, mirroring
    /// list LRANGE semantics).
    pub fn range_by_rank(&self, start: i64, stop: i64, rev: bool) -> Vec<(Bytes, f64)> {
        let len = self.len();
        let Some((start, stop)) = crate::util::normalize_range(start, stop, len) else {
            return Vec::new();
        };
        let ascending: Vec<(Bytes, f64)> = self.ordered.iter().map(|(s, m)| (m.clone(), s.0)).collect();
        if rev {
            let rev_vec: Vec<(Bytes, f64)> = ascending.into_iter().rev().collect();
            rev_vec[start..=stop].to_vec()
        } else {
            ascending[start..=stop].to_vec()
        }
    }

    pub fn iter_ascending(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.ordered.iter().map(|(s, m)| (m, s.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn insert_reports_new_vs_updated() {
        let mut z = SortedSet::new();
        assert!(z.insert(b("a"), 1.0));
        assert!(!z.insert(b("a"), 2.0));
        assert_eq!(z.score(b"a"), Some(2.0));
        assert_eq!(z.len(), 1);
    }

    #[test]
    fn scenario_3_from_spec() {
        let mut z = SortedSet::new();
        z.insert(b("a"), 100.0);
        z.insert(b("b"), 75.0);
        z.insert(b("c"), 150.0);
        assert_eq!(z.len(), 3);
        let range = z.range_by_rank(0, -1, false);
        assert_eq!(range, vec![(b("b"), 75.0), (b("a"), 100.0), (b("c"), 150.0)]);

        let new_score = z.incr_by(b("b"), 50.0);
        assert_eq!(new_score, 125.0);

        let by_score = z.range_by_score(100.0, 200.0);
        assert_eq!(by_score, vec![(b("a"), 100.0), (b("b"), 125.0), (b("c"), 150.0)]);
    }

    #[test]
    fn ties_break_on_member_bytes() {
        let mut z = SortedSet::new();
        z.insert(b("zebra"), 1.0);
        z.insert(b("apple"), 1.0);
        let range = z.range_by_rank(0, -1, false);
        assert_eq!(range, vec![(b("apple"), 1.0), (b("zebra"), 1.0)]);
    }

    #[test]
    fn zincrby_on_missing_member_inserts() {
        let mut z = SortedSet::new();
        assert_eq!(z.incr_by(b("x"), 5.0), 5.0);
        assert_eq!(z.score(b"x"), Some(5.0));
    }

    #[test]
    fn rank_range_start_after_stop_is_empty() {
        let mut z = SortedSet::new();
        z.insert(b("a"), 1.0);
        assert!(z.range_by_rank(3, 1, false).is_empty());
    }
}
