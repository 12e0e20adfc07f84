//! `distinct`: collapse running multiplicities to their sign.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use hashbrown::HashMap;
use std::hash::Hash;
use std::rc::Rc;

struct Distinct<T> {
    reader: StreamReader<T>,
    writer: Rc<StreamWriter<T>>,
    // Running multiplicity per logically distinct record, carried across
    // steps, plus the sign last emitted for it (the output state).
    totals: HashMap<T, i64, fxhash::FxBuildHasher>,
}

impl<T> UnaryOperator<T, T> for Distinct<T>
where
    T: Clone + Eq + Hash,
{
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<T> {
        let mut combined = MultiSet::new();
        for input in inputs {
            combined.extend(input);
        }
        let combined = combined.consolidate();

        let mut out = MultiSet::new();
        for (record, delta) in combined.into_pairs() {
            let old_total = self.totals.get(&record).copied().unwrap_or(0);
            let new_total = old_total
                .checked_add(delta)
                .expect("Z-set multiplicity overflow");

            let old_sign = sign(old_total);
            let new_sign = sign(new_total);

            if new_total == 0 {
                self.totals.remove(&record);
            } else {
                self.totals.insert(record.clone(), new_total);
            }

            if old_sign != new_sign {
                if old_sign != 0 {
                    out.push(record.clone(), -old_sign);
                }
                if new_sign != 0 {
                    out.push(record, new_sign);
                }
            }
        }
        out
    }

    fn reader(&self) -> &StreamReader<T> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<T>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([T] Distinct<T>; T: Clone + Eq + Hash);

fn sign(n: i64) -> i64 {
    n.signum()
}

/// Maintain running multiplicities per record across steps, emitting
/// `distinct`'s contract: a record with total multiplicity `m` is present
/// at `+1` iff `m > 0`, at `-1` iff `m < 0`, and absent iff `m == 0`. Only
/// the records whose sign actually flips this step are emitted.
pub fn distinct<T>(graph: &mut Graph, input: StreamBuilder<T>) -> StreamBuilder<T>
where
    T: Clone + Eq + Hash + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Distinct {
            reader,
            writer: writer.clone(),
            totals: HashMap::default(),
        }),
    );
    StreamBuilder::from_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Graph;

    #[test]
    fn flips_sign_only_on_transition() {
        let mut graph = Graph::new();
        let input = graph.new_input::<&'static str>().unwrap();
        let output = distinct(&mut graph, input.clone());
        let reader = output.connect_reader();
        graph.finalize().unwrap();

        input.send_data(vec![("a", 1), ("a", 1)]);
        graph.run().unwrap();
        let first = reader.drain();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].clone().into_pairs(), vec![("a", 1)]);

        // Another insertion of "a" keeps the sign positive: no new output.
        input.send_data(vec![("a", 1)]);
        graph.run().unwrap();
        assert!(reader.is_empty());

        // Three retractions bring the running total to -1: sign flips.
        input.send_data(vec![("a", -3)]);
        graph.run().unwrap();
        let third = reader.drain();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].clone().into_pairs(), vec![("a", -1)]);
    }
}
