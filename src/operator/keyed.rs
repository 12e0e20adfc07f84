//! `key_by`, `unkey`, `rekey`, `count`: the keyed-record primitives.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, KeyProperties, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use hashbrown::HashMap;
use std::rc::Rc;

struct KeyBy<K, V, F> {
    f: F,
    reader: StreamReader<V>,
    writer: Rc<StreamWriter<(K, V)>>,
}

impl<K, V, F> UnaryOperator<V, (K, V)> for KeyBy<K, V, F>
where
    V: Clone,
    F: FnMut(&V) -> K,
{
    fn eval(&mut self, inputs: Vec<MultiSet<V>>) -> MultiSet<(K, V)> {
        let mut out = MultiSet::new();
        for input in inputs {
            for (v, w) in input.into_pairs() {
                let k = (self.f)(&v);
                out.push((k, v), w);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<V> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, V)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V, F] KeyBy<K, V, F>; K: Clone, V: Clone, F: FnMut(&V) -> K);

/// `(V) -> (f(V), V)`, stateless.
pub fn key_by<K, V, F>(graph: &mut Graph, input: StreamBuilder<V>, f: F) -> StreamBuilder<(K, V)>
where
    K: KeyProperties + 'static,
    V: Clone + 'static,
    F: FnMut(&V) -> K + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(KeyBy { f, reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}

struct Unkey<K, V> {
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<V>>,
}

impl<K, V> UnaryOperator<(K, V), V> for Unkey<K, V>
where
    V: Clone,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<V> {
        let mut out = MultiSet::new();
        for input in inputs {
            for ((_, v), w) in input.into_pairs() {
                out.push(v, w);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<V>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] Unkey<K, V>; V: Clone);

/// `(K, V) -> V`, stateless.
pub fn unkey<K, V>(graph: &mut Graph, input: StreamBuilder<(K, V)>) -> StreamBuilder<V>
where
    K: 'static,
    V: Clone + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Unkey { reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}

struct Rekey<K, K2, V, G> {
    g: G,
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K2, V)>>,
}

impl<K, K2, V, G> UnaryOperator<(K, V), (K2, V)> for Rekey<K, K2, V, G>
where
    V: Clone,
    G: FnMut(&V) -> K2,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K2, V)> {
        let mut out = MultiSet::new();
        for input in inputs {
            for ((_, v), w) in input.into_pairs() {
                let k2 = (self.g)(&v);
                out.push((k2, v), w);
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K2, V)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, K2, V, G] Rekey<K, K2, V, G>; K2: Clone, V: Clone, G: FnMut(&V) -> K2);

/// `(K, V) -> (g(V), V)`, stateless.
pub fn rekey<K, K2, V, G>(
    graph: &mut Graph,
    input: StreamBuilder<(K, V)>,
    g: G,
) -> StreamBuilder<(K2, V)>
where
    K: 'static,
    K2: KeyProperties + 'static,
    V: Clone + 'static,
    G: FnMut(&V) -> K2 + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Rekey { g, reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}

struct Count<K, V> {
    reader: StreamReader<(K, V)>,
    writer: Rc<StreamWriter<(K, i64)>>,
    running: HashMap<K, i64, fxhash::FxBuildHasher>,
}

impl<K, V> UnaryOperator<(K, V), (K, i64)> for Count<K, V>
where
    K: KeyProperties,
{
    fn eval(&mut self, inputs: Vec<MultiSet<(K, V)>>) -> MultiSet<(K, i64)> {
        // Per-key total delta this step; V's payload only determines the
        // weight contributed, not the count value itself.
        let mut deltas: HashMap<K, i64, fxhash::FxBuildHasher> = HashMap::default();
        for input in inputs {
            for ((k, _v), w) in input.into_pairs() {
                let entry = deltas.entry(k).or_insert(0);
                *entry = entry.checked_add(w).expect("count overflow");
            }
        }

        let mut out = MultiSet::new();
        for (key, delta) in deltas {
            if delta == 0 {
                continue;
            }
            let old_count = self.running.get(&key).copied().unwrap_or(0);
            let new_count = old_count
                .checked_add(delta)
                .expect("count overflow");
            if new_count == old_count {
                continue;
            }
            if new_count == 0 {
                self.running.remove(&key);
            } else {
                self.running.insert(key.clone(), new_count);
            }
            out.push((key.clone(), old_count), -1);
            out.push((key, new_count), 1);
        }
        out
    }

    fn reader(&self) -> &StreamReader<(K, V)> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, i64)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([K, V] Count<K, V>; K: KeyProperties);

/// Per key, maintain a running count (sum of multiplicities).
///
/// On each step, for every affected key, emits `(K, old_count)` at -1 and
/// `(K, new_count)` at +1, suppressing emission when `new_count ==
/// old_count`. Keys untouched in the step emit no messages.
pub fn count<K, V>(graph: &mut Graph, input: StreamBuilder<(K, V)>) -> StreamBuilder<(K, i64)>
where
    K: KeyProperties + 'static,
    V: Clone + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Count {
            reader,
            writer: writer.clone(),
            running: HashMap::default(),
        }),
    );
    StreamBuilder::from_writer(writer)
}
