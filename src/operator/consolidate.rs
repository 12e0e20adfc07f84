//! `consolidate`: collapse every Z-set drained in a step into one.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use std::hash::Hash;
use std::rc::Rc;

struct Consolidate<T> {
    reader: StreamReader<T>,
    writer: Rc<StreamWriter<T>>,
}

impl<T> UnaryOperator<T, T> for Consolidate<T>
where
    T: Clone + Eq + Hash,
{
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<T> {
        let mut combined = MultiSet::new();
        for input in inputs {
            combined.extend(input);
        }
        combined.consolidate()
    }

    fn reader(&self) -> &StreamReader<T> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<T>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([T] Consolidate<T>; T: Clone + Eq + Hash);

/// Accumulate every Z-set drained in a step into one combined Z-set, then
/// emit its consolidation if nonempty.
///
/// Does not carry state across steps beyond what arrives in a single
/// `run()` call.
pub fn consolidate<T>(graph: &mut Graph, input: StreamBuilder<T>) -> StreamBuilder<T>
where
    T: Clone + Eq + Hash + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Consolidate { reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}
