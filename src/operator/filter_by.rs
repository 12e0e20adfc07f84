//! `filter_by`: anti-semi-join against a keyed "set" stream.

use crate::builder::StreamBuilder;
use crate::graph::{Binary, BinaryOperator, Graph, KeyProperties, StreamReader, StreamWriter};
use crate::zset::MultiSet;
use hashbrown::HashMap;
use std::hash::Hash;
use std::rc::Rc;

struct FilterBy<K, V, S> {
    left: StreamReader<(K, V)>,
    right: StreamReader<(K, S)>,
    writer: Rc<StreamWriter<(K, V)>>,
    // Running right-side multiplicity per key; only its sign matters.
    right_presence: HashMap<K, i64>,
    // The left payloads currently "in" (right key present), so a
    // presence-loss can retract them in full.
    left_state: HashMap<K, HashMap<V, i64>>,
}

impl<K, V, S> BinaryOperator<(K, V), (K, S), (K, V)> for FilterBy<K, V, S>
where
    K: KeyProperties,
    V: Clone + Eq + Hash,
{
    fn eval(
        &mut self,
        left_inputs: Vec<MultiSet<(K, V)>>,
        right_inputs: Vec<MultiSet<(K, S)>>,
    ) -> MultiSet<(K, V)> {
        let mut left_delta: HashMap<K, HashMap<V, i64>> = HashMap::new();
        for input in left_inputs {
            for ((k, v), w) in input.into_pairs() {
                let side = left_delta.entry(k).or_default();
                *side.entry(v).or_insert(0) += w;
            }
        }

        let mut right_delta: HashMap<K, i64> = HashMap::new();
        for input in right_inputs {
            for ((k, _s), w) in input.into_pairs() {
                *right_delta.entry(k).or_insert(0) += w;
            }
        }

        let mut out = MultiSet::new();

        // Update both indexes first; filterBy only cares about the sign of
        // right presence and the full cached left payload per key, so
        // there's no pre/post-update ordering hazard like `join`'s cross
        // product has.
        for (k, v_deltas) in &left_delta {
            let cached = self.left_state.entry(k.clone()).or_default();
            for (v, dv) in v_deltas {
                let total = cached.entry(v.clone()).or_insert(0);
                *total += dv;
                if *total == 0 {
                    cached.remove(v);
                }
            }
        }

        for (k, dr) in &right_delta {
            let before = self.right_presence.get(k).copied().unwrap_or(0);
            let after = before + dr;
            if after == 0 {
                self.right_presence.remove(k);
            } else {
                self.right_presence.insert(k.clone(), after);
            }

            if (before != 0) == (after != 0) {
                continue;
            }
            // Presence transitioned across zero: emit the full cached
            // left payload for this key as an insertion or retraction.
            if let Some(cached) = self.left_state.get(k) {
                let sign = if after != 0 { 1 } else { -1 };
                for (v, mv) in cached {
                    out.push((k.clone(), v.clone()), sign * mv);
                }
            }
        }

        // Left deltas at keys whose right presence is already (still)
        // nonzero pass straight through; a key whose presence *just*
        // transitioned was already fully emitted above via the cached
        // state, so skip it here to avoid double-counting.
        for (k, v_deltas) in &left_delta {
            if right_delta.contains_key(k) {
                continue;
            }
            if self.right_presence.get(k).copied().unwrap_or(0) != 0 {
                for (v, dv) in v_deltas {
                    out.push((k.clone(), v.clone()), *dv);
                }
            }
        }

        out
    }

    fn left_reader(&self) -> &StreamReader<(K, V)> {
        &self.left
    }

    fn right_reader(&self) -> &StreamReader<(K, S)> {
        &self.right
    }

    fn writer(&self) -> &Rc<StreamWriter<(K, V)>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_binary!([K, V, S] FilterBy<K, V, S>; K: KeyProperties, V: Clone + Eq + Hash);

/// Keep only the `(K, V)` records on `left` whose key is currently present
/// (nonzero multiplicity) in `right`. Only key presence on `right` matters,
/// not its payload.
pub fn filter_by<K, V, S>(
    graph: &mut Graph,
    left: StreamBuilder<(K, V)>,
    right: StreamBuilder<(K, S)>,
) -> StreamBuilder<(K, V)>
where
    K: KeyProperties + 'static,
    V: Clone + Eq + Hash + 'static,
    S: 'static,
{
    let left_reader = left.connect_reader();
    let right_reader = right.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Binary(FilterBy {
            left: left_reader,
            right: right_reader,
            writer: writer.clone(),
            right_presence: HashMap::new(),
            left_state: HashMap::new(),
        })),
    );
    StreamBuilder::from_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Graph;

    #[test]
    fn keeps_only_keys_present_on_the_right() {
        let mut graph = Graph::new();
        let left = graph.new_input::<(i64, &'static str)>().unwrap();
        let right = graph.new_input::<(i64, bool)>().unwrap();
        let output = filter_by(&mut graph, left.clone(), right.clone());
        let reader = output.connect_reader();
        graph.finalize().unwrap();

        left.send_data(vec![
            ((1, "apple"), 1),
            ((2, "banana"), 1),
            ((3, "cherry"), 1),
        ]);
        right.send_data(vec![((2, true), 1), ((3, false), 1)]);
        graph.run().unwrap();

        let mut materialised = MultiSet::new();
        for zset in reader.drain() {
            materialised.extend(zset);
        }
        let materialised = materialised.consolidate();
        let mut pairs = materialised.into_pairs();
        pairs.sort();
        assert_eq!(pairs, vec![((2, "banana"), 1), ((3, "cherry"), 1)]);
    }
}
