//! `group_by` / `reduce`: per-key materialised aggregate state.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, KeyProperties, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use hashbrown::HashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A single named aggregate over extracted `f64` values.
///
/// Each variant owns the value-extractor closure it needs (`Count` needs
/// none — it aggregates record weights directly).
pub enum AggregateSpec<V> {
    Sum(Box<dyn Fn(&V) -> f64>),
    Count,
    Avg(Box<dyn Fn(&V) -> f64>),
    Min(Box<dyn Fn(&V) -> f64>),
    Max(Box<dyn Fn(&V) -> f64>),
}

impl<V> AggregateSpec<V> {
    pub fn sum(f: impl Fn(&V) -> f64 + 'static) -> Self {
        AggregateSpec::Sum(Box::new(f))
    }
    pub fn count() -> Self {
        AggregateSpec::Count
    }
    pub fn avg(f: impl Fn(&V) -> f64 + 'static) -> Self {
        AggregateSpec::Avg(Box::new(f))
    }
    pub fn min(f: impl Fn(&V) -> f64 + 'static) -> Self {
        AggregateSpec::Min(Box::new(f))
    }
    pub fn max(f: impl Fn(&V) -> f64 + 'static) -> Self {
        AggregateSpec::Max(Box::new(f))
    }
}

/// The materialised value of one named aggregate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AggregateValue {
    Int(i64),
    Float(f64),
    /// `avg`/`min`/`max` of an empty group.
    Null,
}

/// One row of a `group_by` materialisation: named aggregate values keyed
/// by alias. A `BTreeMap` gives deterministic iteration/equality, which
/// `group_by`'s "suppress emission when new row equals old row" contract
/// relies on.
pub type AggregateRow = BTreeMap<String, AggregateValue>;

#[derive(Clone, Copy, PartialEq)]
struct OrderedF64(f64);

impl Eq for OrderedF64 {}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).expect("NaN in aggregate value")
    }
}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum AggState {
    Sum(f64),
    Count(i64),
    Avg { sum: f64, count: i64 },
    Min(BTreeMap<OrderedF64, i64>),
    Max(BTreeMap<OrderedF64, i64>),
}

impl AggState {
    fn empty_for<V>(spec: &AggregateSpec<V>) -> Self {
        match spec {
            AggregateSpec::Sum(_) => AggState::Sum(0.0),
            AggregateSpec::Count => AggState::Count(0),
            AggregateSpec::Avg(_) => AggState::Avg { sum: 0.0, count: 0 },
            AggregateSpec::Min(_) => AggState::Min(BTreeMap::new()),
            AggregateSpec::Max(_) => AggState::Max(BTreeMap::new()),
        }
    }

    fn apply<V>(&mut self, spec: &AggregateSpec<V>, value: &V, weight: i64) {
        match (self, spec) {
            (AggState::Sum(total), AggregateSpec::Sum(f)) => {
                *total += f(value) * weight as f64;
            }
            (AggState::Count(total), AggregateSpec::Count) => {
                *total = total.checked_add(weight).expect("count overflow");
            }
            (AggState::Avg { sum, count }, AggregateSpec::Avg(f)) => {
                *sum += f(value) * weight as f64;
                *count = count.checked_add(weight).expect("count overflow");
            }
            (AggState::Min(multiset), AggregateSpec::Min(f)) => {
                bump(multiset, OrderedF64(f(value)), weight);
            }
            (AggState::Max(multiset), AggregateSpec::Max(f)) => {
                bump(multiset, OrderedF64(f(value)), weight);
            }
            _ => unreachable!("AggState variant must match its AggregateSpec"),
        }
    }

    fn value(&self) -> AggregateValue {
        match self {
            AggState::Sum(total) => AggregateValue::Float(*total),
            AggState::Count(total) => AggregateValue::Int(*total),
            AggState::Avg { sum, count } => {
                if *count == 0 {
                    AggregateValue::Null
                } else {
                    AggregateValue::Float(sum / *count as f64)
                }
            }
            AggState::Min(multiset) => multiset
                .keys()
                .next()
                .map(|k| AggregateValue::Float(k.0))
                .unwrap_or(AggregateValue::Null),
            AggState::Max(multiset) => multiset
                .keys()
                .next_back()
                .map(|k| AggregateValue::Float(k.0))
                .unwrap_or(AggregateValue::Null),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AggState::Sum(total) => *total == 0.0,
            AggState::Count(total) => *total == 0,
            AggState::Avg { count, .. } => *count == 0,
            AggState::Min(m) | AggState::Max(m) => m.is_empty(),
        }
    }
}

fn bump(multiset: &mut BTreeMap<OrderedF64, i64>, key: OrderedF64, weight: i64) {
    let total = multiset.entry(key).or_insert(0);
    *total = total.checked_add(weight).expect("aggregate multiplicity overflow");
    if *total == 0 {
        multiset.remove(&key);
    }
}

struct GroupByState<V> {
    aggregates: Vec<(String, AggregateSpec<V>)>,
}

struct GroupBy<K, V, KF> {
    key_fn: KF,
    spec: GroupByState<V>,
    reader: StreamReader<V>,
    writer: Rc<StreamWriter<(K, AggregateRow)>>,
    state: HashMap<K, HashMap<String, AggState>, fxhash::FxBuildHasher>,
}

impl<K, V, KF> UnaryOperator<V, (K, AggregateRow)> for GroupBy<K, V, KF>
where
    K: KeyProperties,
    KF: FnMut(&V) -> K,
{
    fn eval(&mut self, inputs: Vec<MultiSet<V>>) -> MultiSet<(K, AggregateRow)> {
        let mut by_key: HashMap<K, Vec<(V, i64)>, fxhash::FxBuildHasher> = HashMap::default();
        for input in inputs {
            for (v, w) in input.into_pairs() {
                let k = (self.key_fn)(&v);
                by_key.entry(k).or_default().push((v, w));
            }
        }

        let mut out = MultiSet::new();
        for (key, deltas) in by_key {
            let states = self.state.entry(key.clone()).or_insert_with(|| {
                self.spec
                    .aggregates
                    .iter()
                    .map(|(alias, spec)| (alias.clone(), AggState::empty_for(spec)))
                    .collect()
            });
            let old_row: AggregateRow = states
                .iter()
                .map(|(alias, state)| (alias.clone(), state.value()))
                .collect();

            for (value, weight) in &deltas {
                for (alias, spec) in &self.spec.aggregates {
                    states.get_mut(alias).unwrap().apply(spec, value, *weight);
                }
            }

            let new_row: AggregateRow = states
                .iter()
                .map(|(alias, state)| (alias.clone(), state.value()))
                .collect();

            let all_empty = states.values().all(AggState::is_empty);
            if all_empty {
                self.state.remove(&key);
            }

            if old_row != new_row {
                out.push((key.clone(), old_row), -1);
                out.push((key, new_row), 1);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<V> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, AggregateRow)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V, KF] GroupBy<K, V, KF>; K: KeyProperties, KF: FnMut(&V) -> K);

/// Partition `input` by `key_fn` and maintain one materialised
/// [`AggregateRow`] per key, computed from `aggregates`.
///
/// For each affected key, emits `(K, old_row)` at -1 and `(K, new_row)` at
/// +1; suppresses emission when the row is unchanged. Keys untouched in a
/// step emit nothing.
pub fn group_by<K, V, KF>(
    graph: &mut Graph,
    input: StreamBuilder<V>,
    key_fn: KF,
    aggregates: Vec<(String, AggregateSpec<V>)>,
) -> StreamBuilder<(K, AggregateRow)>
where
    K: KeyProperties + 'static,
    V: Clone + 'static,
    KF: FnMut(&V) -> K + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(GroupBy {
            key_fn,
            spec: GroupByState { aggregates },
            reader,
            writer: writer.clone(),
            state: HashMap::default(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

struct Reduce<K, V> {
    spec: AggregateSpec<V>,
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K, AggregateValue)>>,
    state: HashMap<K, AggState, fxhash::FxBuildHasher>,
}

impl<K, V> UnaryOperator<(K, V), (K, AggregateValue)> for Reduce<K, V>
where
    K: KeyProperties,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K, AggregateValue)> {
        let mut by_key: HashMap<K, Vec<(V, i64)>, fxhash::FxBuildHasher> = HashMap::default();
        for input in inputs {
            for ((k, v), w) in input.into_pairs() {
                by_key.entry(k).or_default().push((v, w));
            }
        }

        let mut out = MultiSet::new();
        for (key, deltas) in by_key {
            let state = self
                .state
                .entry(key.clone())
                .or_insert_with(|| AggState::empty_for(&self.spec));
            let old = state.value();
            for (value, weight) in &deltas {
                state.apply(&self.spec, value, *weight);
            }
            let new = state.value();
            if state.is_empty() {
                self.state.remove(&key);
            }
            if old != new {
                out.push((key.clone(), old), -1);
                out.push((key, new), 1);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, AggregateValue)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] Reduce<K, V>; K: KeyProperties);

/// Single-aggregate special case of [`group_by`], operating directly on an
/// already-keyed `(K, V)` stream.
pub fn reduce<K, V>(
    graph: &mut Graph,
    input: StreamBuilder<(K, V)>,
    spec: AggregateSpec<V>,
) -> StreamBuilder<(K, AggregateValue)>
where
    K: KeyProperties + 'static,
    V: Clone + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Reduce {
            spec,
            reader,
            writer: writer.clone(),
            state: HashMap::default(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Graph;

    #[derive(Clone)]
    struct Sale {
        product_id: i64,
        amount: f64,
        quantity: f64,
    }

    #[test]
    fn multiple_aggregates_over_one_step() {
        let mut graph = Graph::new();
        let input = graph.new_input::<Sale>().unwrap();
        let output = group_by(
            &mut graph,
            input.clone(),
            |s: &Sale| s.product_id,
            vec![
                ("total_amount".to_string(), AggregateSpec::sum(|s: &Sale| s.amount)),
                (
                    "total_quantity".to_string(),
                    AggregateSpec::sum(|s: &Sale| s.quantity),
                ),
                ("avg_amount".to_string(), AggregateSpec::avg(|s: &Sale| s.amount)),
                ("sale_count".to_string(), AggregateSpec::count()),
            ],
        );
        let reader = output.connect_reader();
        graph.finalize().unwrap();

        let sales = vec![
            (Sale { product_id: 101, amount: 100.0, quantity: 2.0 }, 1),
            (Sale { product_id: 101, amount: 125.0, quantity: 3.0 }, 1),
            (Sale { product_id: 101, amount: 100.0, quantity: 1.0 }, 1),
            (Sale { product_id: 102, amount: 300.0, quantity: 2.0 }, 1),
            (Sale { product_id: 102, amount: 200.0, quantity: 1.0 }, 1),
            (Sale { product_id: 103, amount: 50.0, quantity: 1.0 }, 1),
        ];
        input.send_data(sales);
        graph.run().unwrap();

        let mut materialised: HashMap<i64, AggregateRow, fxhash::FxBuildHasher> =
            HashMap::default();
        for zset in reader.drain() {
            for ((key, row), weight) in zset.into_pairs() {
                assert_eq!(weight, 1, "single step, no prior state to retract against");
                materialised.insert(key, row);
            }
        }

        let row101 = &materialised[&101];
        assert_eq!(row101["total_amount"], AggregateValue::Float(325.0));
        assert_eq!(row101["total_quantity"], AggregateValue::Float(6.0));
        assert_eq!(row101["sale_count"], AggregateValue::Int(3));

        let row102 = &materialised[&102];
        assert_eq!(row102["total_amount"], AggregateValue::Float(500.0));
        assert_eq!(row102["sale_count"], AggregateValue::Int(2));

        let row103 = &materialised[&103];
        assert_eq!(row103["total_amount"], AggregateValue::Float(50.0));
        assert_eq!(row103["avg_amount"], AggregateValue::Float(50.0));
    }
}
