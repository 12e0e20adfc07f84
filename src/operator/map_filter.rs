//! `map`, `filter`, and `negate`: stateless unary operators.

use crate::builder::StreamBuilder;
use crate::graph::{Graph, StreamReader, StreamWriter, UnaryOperator};
use crate::zset::MultiSet;
use std::rc::Rc;

struct Map<T, U, F> {
    f: F,
    reader: StreamReader<T>,
    writer: Rc<StreamWriter<U>>,
}

impl<T, U, F> UnaryOperator<T, U> for Map<T, U, F>
where
    F: FnMut(&T) -> U,
{
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<U> {
        let mut out = MultiSet::new();
        for input in inputs {
            out.extend(input.map(&mut self.f));
        }
        out
    }

    fn reader(&self) -> &StreamReader<T> {
        &self.reader
    }

    fn writer(&self) -> &Rc<StreamWriter<U>> {
        &self.writer
    }
}

crate::graph::impl_operator_for_unary!([T, U, F] Map<T, U, F>; U: Clone, F: FnMut(&T) -> U);

/// For each input Z-set, emit `input.map(f)`.
pub fn map<T, U, F>(
    graph: &mut Graph,
    input: StreamBuilder<T>,
    f: F,
) -> StreamBuilder<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnMut(&T) -> U + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Map { f, reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}

struct Filter<T, P> {
    p: P,
    reader: StreamReader<T>,
    writer: Rc<StreamWriter<T>>,
}

impl<T, P> UnaryOperator<T, T> for Filter<T, P>
where
    T: Clone,
    P: FnMut(&T) -> bool,
{
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<T> {
        let mut out = MultiSet::new();
        for input in inputs {
            out.extend(input.filter(&mut self.p));
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

crate::graph::impl_operator_for_unary!([T, P] Filter<T, P>; T: Clone, P: FnMut(&T) -> bool);

/// For each input Z-set, emit `input.filter(p)`.
pub fn filter<T, P>(graph: &mut Graph, input: StreamBuilder<T>, p: P) -> StreamBuilder<T>
where
    T: Clone + 'static,
    P: FnMut(&T) -> bool + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Filter { p, reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}

struct Negate<T> {
    reader: StreamReader<T>,
    writer: Rc<StreamWriter<T>>,
}

impl<T> UnaryOperator<T, T> for Negate<T>
where
    T: Clone,
{
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<T> {
        let mut out = MultiSet::new();
        for input in inputs {
            out.extend(input.negate());
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

crate::graph::impl_operator_for_unary!([T] Negate<T>; T: Clone);

/// For each input Z-set, emit `input.negate()`.
pub fn negate<T>(graph: &mut Graph, input: StreamBuilder<T>) -> StreamBuilder<T>
where
    T: Clone + 'static,
{
    let reader = input.connect_reader();
    let writer = crate::graph::new_writer();
    super::register(graph, Box::new(Negate { reader, writer: writer.clone() }));
    StreamBuilder::from_writer(writer)
}
