//! Composable pipeline sugar: [`StreamBuilder`] and the `pipe` combinator.
//!
//! An operator factory (e.g. [`crate::operator::map`]) takes a `&mut Graph`
//! and an input [`StreamBuilder`], registers a new operator wired to the
//! input's writer via [`StreamBuilder::connect_reader`], and returns a
//! builder wrapping the operator's own output writer.

use crate::graph::{Graph, StreamReader, StreamWriter};
use crate::zset::MultiSet;
use std::rc::Rc;

/// A handle to one stream in the graph: wraps the stream's writer so
/// operator factories can attach new readers to it.
///
/// Every [`StreamBuilder`], root or derived, can [`StreamBuilder::send_data`]
/// directly on its own writer; in practice only root builders returned by
/// [`crate::Graph::new_input`] are used this way, since derived builders'
/// writers are fed exclusively by their operator.
pub struct StreamBuilder<T> {
    writer: Rc<StreamWriter<T>>,
}

impl<T> StreamBuilder<T> {
    pub(crate) fn new_root(writer: Rc<StreamWriter<T>>) -> Self {
        Self { writer }
    }

    pub(crate) fn from_writer(writer: Rc<StreamWriter<T>>) -> Self {
        Self { writer }
    }

    /// Allocate a new reader on this builder's writer.
    pub fn connect_reader(&self) -> StreamReader<T> {
        self.writer.new_reader()
    }

    pub(crate) fn writer(&self) -> &Rc<StreamWriter<T>> {
        &self.writer
    }

    /// Push a Z-set delta onto this stream. For a root stream builder, this
    /// is the graph's external ingress.
    pub fn send_data(&self, data: impl Into<MultiSet<T>>)
    where
        T: Clone,
    {
        self.writer.send_data(data);
    }

    /// Thread `self` through a single operator factory.
    pub fn pipe<U>(
        self,
        graph: &mut Graph,
        op: impl FnOnce(&mut Graph, StreamBuilder<T>) -> StreamBuilder<U>,
    ) -> StreamBuilder<U> {
        op(graph, self)
    }

    /// Thread `self` through two operator factories in sequence.
    pub fn pipe2<U, V>(
        self,
        graph: &mut Graph,
        op1: impl FnOnce(&mut Graph, StreamBuilder<T>) -> StreamBuilder<U>,
        op2: impl FnOnce(&mut Graph, StreamBuilder<U>) -> StreamBuilder<V>,
    ) -> StreamBuilder<V> {
        let mid = op1(graph, self);
        op2(graph, mid)
    }

    /// Thread `self` through three operator factories in sequence.
    pub fn pipe3<U, V, W>(
        self,
        graph: &mut Graph,
        op1: impl FnOnce(&mut Graph, StreamBuilder<T>) -> StreamBuilder<U>,
        op2: impl FnOnce(&mut Graph, StreamBuilder<U>) -> StreamBuilder<V>,
        op3: impl FnOnce(&mut Graph, StreamBuilder<V>) -> StreamBuilder<W>,
    ) -> StreamBuilder<W> {
        let mid = op1(graph, self);
        let mid = op2(graph, mid);
        op3(graph, mid)
    }

    /// Thread `self` through four operator factories in sequence.
    pub fn pipe4<U, V, W, X>(
        self,
        graph: &mut Graph,
        op1: impl FnOnce(&mut Graph, StreamBuilder<T>) -> StreamBuilder<U>,
        op2: impl FnOnce(&mut Graph, StreamBuilder<U>) -> StreamBuilder<V>,
        op3: impl FnOnce(&mut Graph, StreamBuilder<V>) -> StreamBuilder<W>,
        op4: impl FnOnce(&mut Graph, StreamBuilder<W>) -> StreamBuilder<X>,
    ) -> StreamBuilder<X> {
        let mid = op1(graph, self);
        let mid = op2(graph, mid);
        let mid = op3(graph, mid);
        op4(graph, mid)
    }
}

impl<T> Clone for StreamBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}
