//! Ordered top-K: `top_k`, `top_k_with_index`, `top_k_with_fractional_index`,
//! and the `order_by_with_fractional_index` convenience wrapper.

use crate::builder::StreamBuilder;
use crate::fractional_index;
use crate::graph::{Graph, KeyProperties, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use hashbrown::HashMap;
use std::cmp::Ordering;
use std::rc::Rc;

/// Windowing and ordering options shared by every top-K flavour.
///
/// Default offset is 0; default limit is unbounded (`None`).
pub struct TopKOptions<V> {
    limit: Option<usize>,
    offset: usize,
    comparator: Box<dyn Fn(&V, &V) -> Ordering>,
}

impl<V: Ord + 'static> Default for TopKOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Ord + 'static> TopKOptions<V> {
    /// Default options: no offset, no limit, natural ordering.
    pub fn new() -> Self {
        Self {
            limit: None,
            offset: 0,
            comparator: Box::new(|a, b| a.cmp(b)),
        }
    }
}

impl<V> TopKOptions<V> {
    /// Options with a custom three-way comparator.
    pub fn with_comparator(comparator: impl Fn(&V, &V) -> Ordering + 'static) -> Self {
        Self {
            limit: None,
            offset: 0,
            comparator: Box::new(comparator),
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn window_bounds(&self, len: usize) -> (usize, usize) {
        let start = self.offset.min(len);
        let end = match self.limit {
            Some(limit) => (self.offset.saturating_add(limit)).min(len),
            None => len,
        };
        (start, end)
    }
}

struct Entry<V> {
    value: V,
    weight: i64,
    seq: u64,
}

/// A per-key sorted view of the group, ordered by the operator's
/// comparator with a monotonic insertion-sequence-number tie-break.
struct Group<V> {
    entries: Vec<Entry<V>>,
    next_seq: u64,
}

impl<V: PartialEq> Group<V> {
    fn new() -> Self {
        Self { entries: Vec::new(), next_seq: 0 }
    }

    fn apply(&mut self, deltas: Vec<(V, i64)>, comparator: &dyn Fn(&V, &V) -> Ordering) {
        for (value, weight) in deltas {
            if let Some(idx) = self.entries.iter().position(|e| e.value == value) {
                self.entries[idx].weight = self.entries[idx]
                    .weight
                    .checked_add(weight)
                    .expect("topK multiplicity overflow");
                if self.entries[idx].weight == 0 {
                    self.entries.remove(idx);
                }
            } else if weight != 0 {
                let seq = self.next_seq;
                self.next_seq += 1;
                let pos = self
                    .entries
                    .partition_point(|e| match comparator(&e.value, &value) {
                        Ordering::Less => true,
                        Ordering::Equal => e.seq < seq,
                        Ordering::Greater => false,
                    });
                self.entries.insert(pos, Entry { value, weight, seq });
            }
        }
    }

    fn window(&self, offset: usize, len: usize) -> &[Entry<V>] {
        &self.entries[offset..offset + len]
    }
}

fn group_by_key<K, V>(inputs: Vec<MultiSet<(K, V)>>) -> HashMap<K, Vec<(V, i64)>>
where
    K: KeyProperties,
{
    let mut by_key: HashMap<K, Vec<(V, i64)>> = HashMap::new();
    for input in inputs {
        for ((k, v), w) in input.into_pairs() {
            by_key.entry(k).or_default().push((v, w));
        }
    }
    by_key
}

struct TopK<K, V> {
    options: TopKOptions<V>,
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K, V)>>,
    groups: HashMap<K, Group<V>>,
    windows: HashMap<K, Vec<(V, i64)>>,
}

impl<K, V> UnaryOperator<(K, V), (K, V)> for TopK<K, V>
where
    K: KeyProperties,
    V: Clone + PartialEq,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K, V)> {
        let mut out = MultiSet::new();
        for (key, deltas) in group_by_key(inputs) {
            let group = self.groups.entry(key.clone()).or_insert_with(Group::new);
            group.apply(deltas, self.options.comparator.as_ref());

            let (start, end) = self.options.window_bounds(group.entries.len());
            let new_window: Vec<(V, i64)> = group
                .window(start, end - start)
                .iter()
                .map(|e| (e.value.clone(), e.weight))
                .collect();
            let old_window = self.windows.remove(&key).unwrap_or_default();

            for (v, w) in &old_window {
                if !new_window.iter().any(|(v2, w2)| v2 == v && w2 == w) {
                    out.push((key.clone(), v.clone()), -*w);
                }
            }
            for (v, w) in &new_window {
                if !old_window.iter().any(|(v2, w2)| v2 == v && w2 == w) {
                    out.push((key.clone(), v.clone()), *w);
                }
            }

            if new_window.is_empty() {
                self.groups.remove(&key);
            } else {
                self.windows.insert(key, new_window);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, V)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] TopK<K, V>; K: KeyProperties, V: Clone + PartialEq);

/// Per key, maintain the sorted `[offset, offset+limit)` window of the
/// group and emit `(K, V)` deltas to it.
pub fn top_k<K, V>(
    graph: &mut Graph,
    input: StreamBuilder<(K, V)>,
    options: TopKOptions<V>,
) -> StreamBuilder<(K, V)>
where
    K: KeyProperties + 'static,
    V: Clone + PartialEq + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(TopK {
            options,
            reader,
            writer: writer.clone(),
            groups: HashMap::new(),
            windows: HashMap::new(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

struct TopKWithIndex<K, V> {
    options: TopKOptions<V>,
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K, (V, i64))>>,
    groups: HashMap<K, Group<V>>,
    windows: HashMap<K, Vec<(V, i64, i64)>>,
}

impl<K, V> UnaryOperator<(K, V), (K, (V, i64))> for TopKWithIndex<K, V>
where
    K: KeyProperties,
    V: Clone + PartialEq,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K, (V, i64))> {
        let mut out = MultiSet::new();
        for (key, deltas) in group_by_key(inputs) {
            let group = self.groups.entry(key.clone()).or_insert_with(Group::new);
            group.apply(deltas, self.options.comparator.as_ref());

            let (start, end) = self.options.window_bounds(group.entries.len());
            let new_window: Vec<(V, i64, i64)> = group
                .window(start, end - start)
                .iter()
                .enumerate()
                .map(|(i, e)| (e.value.clone(), e.weight, i as i64))
                .collect();
            let old_window = self.windows.remove(&key).unwrap_or_default();

            for (v, w, i) in &old_window {
                if !new_window.iter().any(|(v2, w2, i2)| v2 == v && w2 == w && i2 == i) {
                    out.push((key.clone(), (v.clone(), *i)), -*w);
                }
            }
            for (v, w, i) in &new_window {
                if !old_window.iter().any(|(v2, w2, i2)| v2 == v && w2 == w && i2 == i) {
                    out.push((key.clone(), (v.clone(), *i)), *w);
                }
            }

            if new_window.is_empty() {
                self.groups.remove(&key);
            } else {
                self.windows.insert(key, new_window);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, (V, i64))>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] TopKWithIndex<K, V>; K: KeyProperties, V: Clone + PartialEq);

/// As [`top_k`], but emits `(K, (V, i))` where `i` is the zero-based rank
/// within the window. When an item's rank shifts, its old `(V, i)` is
/// retracted and its new `(V, i')` is inserted.
pub fn top_k_with_index<K, V>(
    graph: &mut Graph,
    input: StreamBuilder<(K, V)>,
    options: TopKOptions<V>,
) -> StreamBuilder<(K, (V, i64))>
where
    K: KeyProperties + 'static,
    V: Clone + PartialEq + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(TopKWithIndex {
            options,
            reader,
            writer: writer.clone(),
            groups: HashMap::new(),
            windows: HashMap::new(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

struct TopKWithFractionalIndex<K, V> {
    options: TopKOptions<V>,
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K, (V, String))>>,
    groups: HashMap<K, Group<V>>,
    // Previous window, in order, paired with its assigned string and weight.
    windows: HashMap<K, Vec<(V, i64, String)>>,
}

impl<K, V> UnaryOperator<(K, V), (K, (V, String))> for TopKWithFractionalIndex<K, V>
where
    K: KeyProperties,
    V: Clone + PartialEq,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K, (V, String))> {
        let mut out = MultiSet::new();
        for (key, deltas) in group_by_key(inputs) {
            let group = self.groups.entry(key.clone()).or_insert_with(Group::new);
            group.apply(deltas, self.options.comparator.as_ref());

            let (start, end) = self.options.window_bounds(group.entries.len());
            let old_window = self.windows.remove(&key).unwrap_or_default();

            // Reuse the previous string for every item still present;
            // assign a fresh one, via `between` of its decided neighbours,
            // for everything else.
            let ordered: Vec<(V, i64)> = group
                .window(start, end - start)
                .iter()
                .map(|e| (e.value.clone(), e.weight))
                .collect();

            let mut new_window: Vec<(V, i64, String)> = Vec::with_capacity(ordered.len());
            let mut last_assigned: Option<String> = None;
            for (i, (value, weight)) in ordered.iter().enumerate() {
                if let Some((_, _, s)) = old_window.iter().find(|(v, _, _)| v == value) {
                    new_window.push((value.clone(), *weight, s.clone()));
                    last_assigned = Some(s.clone());
                    continue;
                }
                // Look ahead for the nearest following item that keeps its
                // old string, to bound the new string from above.
                let after = ordered[i + 1..]
                    .iter()
                    .find_map(|(v, _)| old_window.iter().find(|(v2, _, _)| v2 == v).map(|(_, _, s)| s.clone()));
                let s = fractional_index::between(last_assigned.as_deref(), after.as_deref());
                last_assigned = Some(s.clone());
                new_window.push((value.clone(), *weight, s));
            }

            for (v, w, s) in &old_window {
                if !new_window.iter().any(|(v2, w2, s2)| v2 == v && w2 == w && s2 == s) {
                    out.push((key.clone(), (v.clone(), s.clone())), -*w);
                }
            }
            for (v, w, s) in &new_window {
                if !old_window.iter().any(|(v2, w2, s2)| v2 == v && w2 == w && s2 == s) {
                    out.push((key.clone(), (v.clone(), s.clone())), *w);
                }
            }

            if new_window.is_empty() {
                self.groups.remove(&key);
            } else {
                self.windows.insert(key, new_window);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, (V, String))>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] TopKWithFractionalIndex<K, V>; K: KeyProperties, V: Clone + PartialEq);

/// As [`top_k`], but emits `(K, (V, s))` where `s` is a fractional string
/// index (see [`crate::fractional_index`]). Inserting a new item between
/// existing ones only emits a message for the new item; existing items
/// keep their strings.
pub fn top_k_with_fractional_index<K, V>(
    graph: &mut Graph,
    input: StreamBuilder<(K, V)>,
    options: TopKOptions<V>,
) -> StreamBuilder<(K, (V, String))>
where
    K: KeyProperties + 'static,
    V: Clone + PartialEq + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(TopKWithFractionalIndex {
            options,
            reader,
            writer: writer.clone(),
            groups: HashMap::new(),
            windows: HashMap::new(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

/// `top_k_with_fractional_index` over a single implicit group, for
/// ordering an entire unkeyed stream.
pub fn order_by_with_fractional_index<V>(
    graph: &mut Graph,
    input: StreamBuilder<V>,
    options: TopKOptions<V>,
) -> StreamBuilder<(V, String)>
where
    V: Clone + PartialEq + 'static,
{
    let keyed = super::key_by(graph, input, |_: &V| ());
    let windowed = top_k_with_fractional_index(graph, keyed, options);
    super::unkey(graph, windowed)
}
