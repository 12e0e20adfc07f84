//! The dataflow graph: a container of operators and registered streams,
//! plus the scheduler that steps them to quiescence.

pub(crate) mod operator;
mod stream;

pub use operator::{Binary, BinaryOperator, KeyProperties, Operator, UnaryOperator};
pub(crate) use operator::{impl_operator_for_binary, impl_operator_for_unary};
pub use stream::{StreamReader, StreamWriter};

use crate::builder::StreamBuilder;
use crate::error::GraphError;
use std::rc::Rc;

/// Trait-object façade so the graph can hold readers of heterogeneous
/// payload types without naming them.
trait ErasedReader {
    fn is_empty(&self) -> bool;
}

impl<T> ErasedReader for StreamReader<T> {
    fn is_empty(&self) -> bool {
        StreamReader::is_empty(self)
    }
}

/// A bag of operators plus registered root readers, stepped in registration
/// order until quiescent.
///
/// Inputs and operators may only be added before [`Graph::finalize`];
/// [`Graph::step`]/[`Graph::run`] may only be called after.
pub struct Graph {
    operators: Vec<Box<dyn Operator>>,
    root_readers: Vec<Box<dyn ErasedReader>>,
    next_operator_id: usize,
    finalized: bool,
}

impl Graph {
    /// Create an empty, unfinalized graph.
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            root_readers: Vec::new(),
            next_operator_id: 0,
            finalized: false,
        }
    }

    /// Allocate a new root input stream and return a builder bound to it.
    ///
    /// Fails with [`GraphError::AlreadyFinalized`] if the graph has already
    /// been finalized.
    pub fn new_input<T>(&mut self) -> Result<StreamBuilder<T>, GraphError>
    where
        T: Clone + 'static,
    {
        self.ensure_not_finalized()?;
        let writer = StreamWriter::<T>::new();
        let reader = writer.new_reader();
        self.root_readers.push(Box::new(reader));
        Ok(StreamBuilder::new_root(writer))
    }

    /// Register an operator, returning its unique id.
    pub fn add_operator(&mut self, operator: Box<dyn Operator>) -> Result<usize, GraphError> {
        self.ensure_not_finalized()?;
        let id = self.next_operator_id();
        self.operators.push(operator);
        Ok(id)
    }

    /// Allocate the next monotonically increasing operator id without
    /// registering an operator.
    pub fn next_operator_id(&mut self) -> usize {
        let id = self.next_operator_id;
        self.next_operator_id += 1;
        id
    }

    /// Mark the graph finalized: no further inputs or operators may be
    /// added, and it becomes steppable.
    ///
    /// Idempotent-error: fails with [`GraphError::FinalizeCalledTwice`] if
    /// called a second time.
    pub fn finalize(&mut self) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::FinalizeCalledTwice);
        }
        self.finalized = true;
        Ok(())
    }

    /// Run every operator's [`Operator::run`] once, in registration order.
    pub fn step(&mut self) -> Result<(), GraphError> {
        self.ensure_finalized()?;
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("graph_step").entered();
        for operator in &mut self.operators {
            operator.run();
        }
        Ok(())
    }

    /// `true` iff some operator still has pending work.
    pub fn pending_work(&self) -> bool {
        self.operators.iter().any(|op| op.has_pending_work())
    }

    /// Repeatedly [`Graph::step`] until no operator reports pending work.
    pub fn run(&mut self) -> Result<(), GraphError> {
        self.ensure_finalized()?;
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("graph_run").entered();
        while self.pending_work() {
            self.step()?;
        }
        Ok(())
    }

    fn ensure_not_finalized(&self) -> Result<(), GraphError> {
        if self.finalized {
            Err(GraphError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    fn ensure_finalized(&self) -> Result<(), GraphError> {
        if self.finalized {
            Ok(())
        } else {
            Err(GraphError::NotFinalized)
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-exported so operator factories can construct [`StreamWriter`]s without
/// importing through `graph::stream` directly.
pub(crate) fn new_writer<T>() -> Rc<StreamWriter<T>> {
    StreamWriter::new()
}
