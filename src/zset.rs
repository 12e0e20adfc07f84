//! The Z-set value type: a multiset with signed integer multiplicities.
//!
//! Physically a [`MultiSet`] is an ordered sequence of `(record,
//! multiplicity)` pairs; the same logical record may appear more than once
//! before [`MultiSet::consolidate`] collapses it into a single entry.

use hashbrown::HashMap;
use std::hash::Hash;

/// A multiset with signed integer multiplicities ("Z-set").
///
/// Positive multiplicities denote insertions, negative multiplicities
/// denote retractions. Before consolidation the same record may appear
/// more than once; [`MultiSet::consolidate`] sums duplicate multiplicities
/// and drops records whose total is zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSet<T> {
    entries: Vec<(T, i64)>,
}

impl<T> MultiSet<T> {
    /// An empty Z-set.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Wrap a vector of `(record, multiplicity)` pairs without consolidating.
    pub fn from_pairs(entries: Vec<(T, i64)>) -> Self {
        Self { entries }
    }

    /// Number of physical `(record, multiplicity)` pairs, pre-consolidation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff there are no physical pairs.
    ///
    /// Note this does *not* imply the Z-set is logically empty unless it
    /// has been consolidated first.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the physical `(record, multiplicity)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(T, i64)> {
        self.entries.iter()
    }

    /// Consume the Z-set, yielding its physical pairs.
    pub fn into_pairs(self) -> Vec<(T, i64)> {
        self.entries
    }

    /// Transform every record, preserving multiplicities.
    pub fn map<U, F>(&self, mut f: F) -> MultiSet<U>
    where
        F: FnMut(&T) -> U,
    {
        MultiSet {
            entries: self.entries.iter().map(|(t, w)| (f(t), *w)).collect(),
        }
    }

    /// Keep only the records for which `p` holds, preserving multiplicities.
    pub fn filter<P>(&self, mut p: P) -> Self
    where
        T: Clone,
        P: FnMut(&T) -> bool,
    {
        MultiSet {
            entries: self
                .entries
                .iter()
                .filter(|(t, _)| p(t))
                .cloned()
                .collect(),
        }
    }

    /// Flip every multiplicity. Zero multiplicities are not pruned.
    pub fn negate(&self) -> Self
    where
        T: Clone,
    {
        MultiSet {
            entries: self
                .entries
                .iter()
                .cloned()
                .map(|(t, w)| (t, checked_neg(w)))
                .collect(),
        }
    }

    /// Concatenate the physical pairs of `self` and `other`. No consolidation.
    pub fn concat(&self, other: &Self) -> Self
    where
        T: Clone,
    {
        let mut entries = Vec::with_capacity(self.entries.len() + other.entries.len());
        entries.extend(self.entries.iter().cloned());
        entries.extend(other.entries.iter().cloned());
        MultiSet { entries }
    }

    /// Append `other`'s physical pairs to `self`, in place.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Push a single `(record, multiplicity)` pair.
    pub fn push(&mut self, record: T, weight: i64) {
        self.entries.push((record, weight));
    }
}

impl<T> MultiSet<T>
where
    T: Clone + Eq + Hash,
{
    /// Collapse physically-duplicated records, summing multiplicities and
    /// dropping any whose total is zero.
    ///
    /// The order of output records is deterministic given a deterministic
    /// input order (first-seen order is preserved), but otherwise
    /// unspecified.
    pub fn consolidate(&self) -> Self {
        // `hashbrown`'s default map doesn't preserve insertion order, so we
        // track first-seen order in a side vector to keep output
        // deterministic.
        let mut totals: HashMap<T, i64, fxhash::FxBuildHasher> =
            HashMap::with_capacity_and_hasher(self.entries.len(), fxhash::FxBuildHasher::default());
        let mut order: Vec<T> = Vec::with_capacity(self.entries.len());

        for (record, weight) in &self.entries {
            match totals.get_mut(record) {
                Some(total) => *total = checked_add(*total, *weight),
                None => {
                    totals.insert(record.clone(), *weight);
                    order.push(record.clone());
                }
            }
        }

        let mut entries = Vec::with_capacity(order.len());
        for record in order {
            let weight = totals.remove(&record).expect("tracked in `order`");
            if weight != 0 {
                entries.push((record, weight));
            }
        }

        MultiSet { entries }
    }

    /// `true` iff every record appears at most once with nonzero
    /// multiplicity. Intended for test assertions.
    pub fn is_consolidated(&self) -> bool {
        self == &self.consolidate()
    }
}

impl<T> Default for MultiSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(T, i64)> for MultiSet<T> {
    fn from_iter<I: IntoIterator<Item = (T, i64)>>(iter: I) -> Self {
        MultiSet {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for MultiSet<T> {
    type Item = (T, i64);
    type IntoIter = std::vec::IntoIter<(T, i64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a MultiSet<T> {
    type Item = &'a (T, i64);
    type IntoIter = std::slice::Iter<'a, (T, i64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// `Vec<(T, i64)>` is accepted wherever `StreamWriter::send_data` expects a
/// `MultiSet`; it is wrapped without consolidating, leaving deduplication
/// to the caller or to an explicit `consolidate()` call.
impl<T> From<Vec<(T, i64)>> for MultiSet<T> {
    fn from(entries: Vec<(T, i64)>) -> Self {
        MultiSet { entries }
    }
}

fn checked_add(a: i64, b: i64) -> i64 {
    a.checked_add(b).expect("Z-set multiplicity overflow")
}

fn checked_neg(a: i64) -> i64 {
    a.checked_neg().expect("Z-set multiplicity overflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidate_sums_and_drops_zero() {
        let m: MultiSet<&str> = vec![("a", -1), ("b", -2), ("a", 1)].into();
        assert_eq!(m.consolidate().into_pairs(), vec![("b", -2)]);

        let m: MultiSet<&str> = vec![("a", -1), ("b", 0), ("a", 1)].into();
        assert_eq!(m.consolidate().into_pairs(), Vec::<(&str, i64)>::new());
    }

    #[test]
    fn consolidate_is_idempotent() {
        let m: MultiSet<&str> = vec![("a", 1), ("a", 1), ("b", -1)].into();
        let once = m.consolidate();
        let twice = once.consolidate();
        assert_eq!(once, twice);
    }

    #[test]
    fn negate_is_involutive() {
        let m: MultiSet<&str> = vec![("a", 3), ("b", -2)].into();
        assert_eq!(m.negate().negate(), m);
    }

    #[test]
    fn map_filter_fusion() {
        let m: MultiSet<i32> = vec![(1, 1), (2, 1), (3, 1), (4, 1)].into();
        let p = |x: &i32| x % 2 == 0;
        let f = |x: &i32| x * 10;

        let a = m.filter(p).map(f);
        let b = m.map(f).filter(|y: &i32| (y / 10) % 2 == 0);

        assert_eq!(a.consolidate(), b.consolidate());
    }
}
