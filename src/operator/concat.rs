//! `concat`: binary union of two Z-set streams, no consolidation.

use crate::builder::StreamBuilder;
use crate::graph::{Binary, BinaryOperator, Graph, StreamReader, StreamWriter};
use crate::zset::MultiSet;
use std::rc::Rc;

struct Concat<T> {
    left: StreamReader<T>,
    right: StreamReader<T>,
    writer: Rc<StreamWriter<T>>,
}

impl<T> BinaryOperator<T, T, T> for Concat<T>
where
    T: Clone,
{
    fn eval(&mut self, left: Vec<MultiSet<T>>, right: Vec<MultiSet<T>>) -> MultiSet<T> {
        let mut out = MultiSet::new();
        for m in left {
            out.extend(m);
        }
        for m in right {
            out.extend(m);
        }
        out
    }

    fn left_reader(&self) -> &StreamReader<T> {
        &self.left
    }

    fn right_reader(&self) -> &StreamReader<T> {
        &self.right
    }

    fn writer(&self) -> &Rc<StreamWriter<T>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_binary!([T] Concat<T>; T: Clone);

/// Emit, for each step, the concatenation of whatever was drained from
/// `left` and `right` this step.
pub fn concat<T>(graph: &mut Graph, left: StreamBuilder<T>, right: StreamBuilder<T>) -> StreamBuilder<T>
where
    T: Clone + 'static,
{
    let left_reader = left.connect_reader();
    let right_reader = right.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(
        graph,
        Box::new(Binary(Concat {
            left: left_reader,
            right: right_reader,
            writer: writer.clone(),
        })),
    );
    StreamBuilder::from_writer(writer)
}
