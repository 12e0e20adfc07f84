//! `join`: equi-join of two keyed streams, with inner/left/right/full kinds.
//!
//! Each side keeps a per-key index of the other; index-then-cross-product,
//! then index update, following the "match the delta against the
//! *pre-existing* opposite index" discipline used by differential
//! dataflow's half-join.

use crate::builder::StreamBuilder;
use crate::graph::{Binary, BinaryOperator, Graph, KeyProperties, StreamReader, StreamWriter};
use crate::zset::MultiSet;
use hashbrown::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

/// Which side(s) of an equi-join are preserved when the other side has no
/// match at a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

type Side<V> = HashMap<V, i64>;

fn prune_zero<V: Eq + Hash>(side: &mut Side<V>) {
    side.retain(|_, total| *total != 0);
}

fn group_and_consolidate<K, V>(inputs: Vec<MultiSet<(K, V)>>) -> HashMap<K, Side<V>>
where
    K: KeyProperties,
    V: Eq + Hash,
{
    let mut out: HashMap<K, Side<V>> = HashMap::new();
    for input in inputs {
        for ((k, v), w) in input.into_pairs() {
            let side = out.entry(k).or_default();
            let total = side.entry(v).or_insert(0);
            *total = total.checked_add(w).expect("join delta overflow");
        }
    }
    for side in out.values_mut() {
        prune_zero(side);
    }
    out
}

fn total<V>(side: Option<&Side<V>>) -> i64 {
    side.map(|m| m.values().sum()).unwrap_or(0)
}

type Out<K, A, B> = (K, (Option<A>, Option<B>));

fn emit<K, A, B>(
    out: &mut MultiSet<Out<K, A, B>>,
    k: &K,
    a: Option<&A>,
    b: Option<&B>,
    weight: i64,
) where
    K: Clone,
    A: Clone,
    B: Clone,
{
    if weight != 0 {
        out.push((k.clone(), (a.cloned(), b.cloned())), weight);
    }
}

struct Join<K, A, B> {
    kind: JoinKind,
    left: StreamReader<(K, A)>,
    right: StreamReader<(K, B)>,
    writer: Rc<StreamWriter<Out<K, A, B>>>,
    left_index: HashMap<K, Side<A>>,
    right_index: HashMap<K, Side<B>>,
}

impl<K, A, B> BinaryOperator<(K, A), (K, B), Out<K, A, B>> for Join<K, A, B>
where
    K: KeyProperties,
    A: Clone + Eq + Hash,
    B: Clone + Eq + Hash,
{
    fn eval(
        &mut self,
        left_inputs: Vec<MultiSet<(K, A)>>,
        right_inputs: Vec<MultiSet<(K, B)>>,
    ) -> MultiSet<Out<K, A, B>> {
        let left_delta = group_and_consolidate(left_inputs);
        let right_delta = group_and_consolidate(right_inputs);

        let touched_keys: HashSet<K> = left_delta
            .keys()
            .chain(right_delta.keys())
            .cloned()
            .collect();
        let right_before: HashMap<K, i64> = touched_keys
            .iter()
            .map(|k| (k.clone(), total(self.right_index.get(k))))
            .collect();
        let left_before: HashMap<K, i64> = touched_keys
            .iter()
            .map(|k| (k.clone(), total(self.left_index.get(k))))
            .collect();

        let mut out = MultiSet::new();

        // Bilinear expansion of `(L+dl) x (R+dr) - L x R`: `dl x R + L x dr
        // + dl x dr`. Steps 2 and 3 below are the first two terms (matched
        // against the *pre-existing* opposite index); the delta-delta term
        // is needed too, or two same-step inserts on both sides at a fresh
        // key would never be matched against each other.
        for (k, a_deltas) in &left_delta {
            if let Some(b_deltas) = right_delta.get(k) {
                for (a, da) in a_deltas {
                    for (b, db) in b_deltas {
                        emit(&mut out, k, Some(a), Some(b), da * db);
                    }
                }
            }
        }

        let right_total_after = |k: &K| {
            total(self.right_index.get(k))
                + right_delta.get(k).map(|m| m.values().sum::<i64>()).unwrap_or(0)
        };
        let left_total_after = |k: &K| {
            total(self.left_index.get(k))
                + left_delta.get(k).map(|m| m.values().sum::<i64>()).unwrap_or(0)
        };

        // Step 2: left delta against the pre-existing right index.
        for (k, a_deltas) in &left_delta {
            let right_map = self.right_index.get(k);
            for (a, da) in a_deltas {
                if let Some(right_map) = right_map {
                    for (b, mb) in right_map {
                        emit(&mut out, k, Some(a), Some(b), da * mb);
                    }
                }
                if matches!(self.kind, JoinKind::Left | JoinKind::Full) && right_total_after(k) == 0
                {
                    emit(&mut out, k, Some(a), None, *da);
                }
            }
        }

        // Step 3: right delta against the pre-existing left index.
        for (k, b_deltas) in &right_delta {
            let left_map = self.left_index.get(k);
            for (b, db) in b_deltas {
                if let Some(left_map) = left_map {
                    for (a, ma) in left_map {
                        emit(&mut out, k, Some(a), Some(b), ma * db);
                    }
                }
                if matches!(self.kind, JoinKind::Right | JoinKind::Full) && left_total_after(k) == 0
                {
                    emit(&mut out, k, None, Some(b), *db);
                }
            }
        }

        // Step 4: apply both deltas to their own index, now that the cross
        // products above have matched them against the pre-existing
        // opposite side.
        for (k, a_deltas) in left_delta.iter() {
            let entry = self.left_index.entry(k.clone()).or_default();
            for (a, da) in a_deltas {
                bump_total(entry, a.clone(), *da);
            }
            prune_zero(entry);
            if entry.is_empty() {
                self.left_index.remove(k);
            }
        }
        for (k, b_deltas) in right_delta.iter() {
            let entry = self.right_index.entry(k.clone()).or_default();
            for (b, db) in b_deltas {
                bump_total(entry, b.clone(), *db);
            }
            prune_zero(entry);
            if entry.is_empty() {
                self.right_index.remove(k);
            }
        }

        // Step 5: when the opposite side's total presence transitions
        // across zero, correct the null-pad rows for entries that already
        // existed on this side before the current step's own delta.
        if matches!(self.kind, JoinKind::Left | JoinKind::Full) {
            for k in &touched_keys {
                let before = right_before.get(k).copied().unwrap_or(0);
                let after = total(self.right_index.get(k));
                if before == after {
                    continue;
                }
                if let Some(left_map) = self.left_index.get(k) {
                    let new_this_step = left_delta.get(k);
                    for (a, ma_after) in left_map {
                        let added_this_step =
                            new_this_step.and_then(|m| m.get(a)).copied().unwrap_or(0);
                        let existing_before = ma_after - added_this_step;
                        if existing_before == 0 {
                            continue;
                        }
                        if before == 0 {
                            emit(&mut out, k, Some(a), None, -existing_before);
                        } else {
                            emit(&mut out, k, Some(a), None, existing_before);
                        }
                    }
                }
            }
        }
        if matches!(self.kind, JoinKind::Right | JoinKind::Full) {
            for k in &touched_keys {
                let before = left_before.get(k).copied().unwrap_or(0);
                let after = total(self.left_index.get(k));
                if before == after {
                    continue;
                }
                if let Some(right_map) = self.right_index.get(k) {
                    let new_this_step = right_delta.get(k);
                    for (b, mb_after) in right_map {
                        let added_this_step =
                            new_this_step.and_then(|m| m.get(b)).copied().unwrap_or(0);
                        let existing_before = mb_after - added_this_step;
                        if existing_before == 0 {
                            continue;
                        }
                        if before == 0 {
                            emit(&mut out, k, None, Some(b), -existing_before);
                        } else {
                            emit(&mut out, k, None, Some(b), existing_before);
                        }
                    }
                }
            }
        }

        out
    }

    fn left_reader(&self) -> &StreamReader<(K, A)> {
        &self.left
    }

    fn right_reader(&self) -> &StreamReader<(K, B)> {
        &self.right
    }

    fn writer(&self) -> &Rc<StreamWriter<Out<K, A, B>>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_binary!([K, A, B] Join<K, A, B>; K: KeyProperties, A: Clone + Eq + Hash, B: Clone + Eq + Hash);

fn bump_total<V: Eq + Hash>(side: &mut Side<V>, value: V, weight: i64) {
    let total = side.entry(value).or_insert(0);
    *total = total.checked_add(weight).expect("join index overflow");
}

/// Equi-join two keyed streams `(K, A)` and `(K, B)` into `(K, (A?, B?))`
/// according to `kind`.
pub fn join<K, A, B>(
    graph: &mut Graph,
    left: StreamBuilder<(K, A)>,
    right: StreamBuilder<(K, B)>,
    kind: JoinKind,
) -> StreamBuilder<Out<K, A, B>>
where
    K: KeyProperties + 'static,
    A: Clone + Eq + Hash + 'static,
    B: Clone + Eq + Hash + 'static,
{
    let left_reader = left.connect_reader();
    let right_reader = right.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Binary(Join {
            kind,
            left: left_reader,
            right: right_reader,
            writer: writer.clone(),
            left_index: HashMap::new(),
            right_index: HashMap::new(),
        })),
    );
    StreamBuilder::from_writer(writer)
}
