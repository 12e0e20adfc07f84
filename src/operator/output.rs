//! `output`: a pipeline-terminating sink.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, Operator, StreamReader};
use crate::zset::MultiSet;

struct Output<T, F> {
    reader: StreamReader<T>,
    sink: F,
}

impl<T, F> Operator for Output<T, F>
where
    F: FnMut(&MultiSet<T>),
{
    fn run(&mut self) {
        if self.reader.is_empty() {
            return;
        }
        for zset in self.reader.drain() {
            (self.sink)(&zset);
        }
    }

    fn has_pending_work(&self) -> bool {
        !self.reader.is_empty()
    }
}

/// For each input Z-set, pass it to `sink`; emits nothing downstream.
///
/// Intended as a pipeline terminator for sampling or sinking results.
pub fn output<T, F>(graph: &mut Graph, input: StreamBuilder<T>, sink: F)
where
    T: Clone + 'static,
    F: FnMut(&MultiSet<T>) + 'static,
{
    let reader = input.connect_reader();
    super::register(graph, Box::new(Output { reader, sink }));
}
