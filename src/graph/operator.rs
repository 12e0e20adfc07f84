//! Operator base contract.
//!
//! Every operator in the graph is a trait object (`Box<dyn Operator>`)
//! rather than a closed tagged enum, since the operator set is extended by
//! user closures (`map`/`filter`/`output`) that can't be enumerated ahead
//! of time.

use crate::graph::stream::{StreamReader, StreamWriter};
use crate::zset::MultiSet;
use std::hash::Hash;
use std::rc::Rc;

/// A node in the dataflow graph.
///
/// The graph calls [`Operator::run`] once per step; an operator must
/// tolerate being run with no new input (producing no output in that
/// case). [`Operator::has_pending_work`] tells the graph's `run` loop
/// whether quiescence has been reached.
pub trait Operator {
    /// Consume whatever input is pending and push output to the writer(s).
    fn run(&mut self);

    /// `true` iff this operator still has work to do: unconsumed input, or
    /// output deferred across steps (e.g. top-K windows that batch multiple
    /// passes).
    fn has_pending_work(&self) -> bool;
}

/// Helper trait for operators that read one input and write one output.
///
/// A blanket [`Operator`] impl drains the reader, calls [`Self::eval`] on
/// each pending Z-set, and forwards non-empty results to the writer.
pub trait UnaryOperator<T, U> {
    /// Evaluate one step's worth of input (every Z-set drained from the
    /// reader since the previous step) and produce the output delta.
    fn eval(&mut self, inputs: Vec<MultiSet<T>>) -> MultiSet<U>;

    fn reader(&self) -> &StreamReader<T>;
    fn writer(&self) -> &Rc<StreamWriter<U>>;
}

/// Implements [`Operator`] for a concrete [`UnaryOperator`] type by
/// delegating to its trait methods.
///
/// A single blanket `impl<T, U, Op> Operator for Op where Op: UnaryOperator<T, U>`
/// would conflict under coherence with other concrete `Operator` impls
/// (e.g. [`Binary`]'s), since the compiler cannot prove those concrete
/// types never implement `UnaryOperator` too. Each concrete operator
/// therefore invokes this macro instead, producing the exact same body
/// the blanket impl would have.
macro_rules! impl_operator_for_unary {
    ([$($g:ident),*] $ty:ty ; $($w:tt)*) => {
        impl<$($g),*> $crate::graph::operator::Operator for $ty
        where $($w)*
        {
            fn run(&mut self) {
                use $crate::graph::operator::UnaryOperator;
                if self.reader().is_empty() {
                    return;
                }
                let inputs = self.reader().drain();
                let output = self.eval(inputs);
                if !output.is_empty() {
                    self.writer().send_data(output);
                }
            }

            fn has_pending_work(&self) -> bool {
                use $crate::graph::operator::UnaryOperator;
                !self.reader().is_empty()
            }
        }
    };
}
pub(crate) use impl_operator_for_unary;

/// Helper trait for operators that read two inputs and write one output,
/// draining both readers together one step at a time.
pub trait BinaryOperator<T, U, V> {
    fn eval(&mut self, left: Vec<MultiSet<T>>, right: Vec<MultiSet<U>>) -> MultiSet<V>;

    fn left_reader(&self) -> &StreamReader<T>;
    fn right_reader(&self) -> &StreamReader<U>;
    fn writer(&self) -> &Rc<StreamWriter<V>>;
}

/// Newtype wrapper so a [`BinaryOperator`] impl can opt into the blanket
/// [`Operator`] impl without conflicting with [`UnaryOperator`]'s.
pub struct Binary<Op>(pub Op);

/// Implements [`Operator`] for `Binary<$ty>` by delegating to `$ty`'s
/// [`BinaryOperator`] methods. See [`impl_operator_for_unary`] for why a
/// blanket impl isn't used.
macro_rules! impl_operator_for_binary {
    ([$($g:ident),*] $ty:ty ; $($w:tt)*) => {
        impl<$($g),*> $crate::graph::operator::Operator for $crate::graph::operator::Binary<$ty>
        where $($w)*
        {
            fn run(&mut self) {
                use $crate::graph::operator::BinaryOperator;
                if self.0.left_reader().is_empty() && self.0.right_reader().is_empty() {
                    return;
                }
                let left = self.0.left_reader().drain();
                let right = self.0.right_reader().drain();
                let output = self.0.eval(left, right);
                if !output.is_empty() {
                    self.0.writer().send_data(output);
                }
            }

            fn has_pending_work(&self) -> bool {
                use $crate::graph::operator::BinaryOperator;
                !self.0.left_reader().is_empty() || !self.0.right_reader().is_empty()
            }
        }
    };
}
pub(crate) use impl_operator_for_binary;

/// Marker bound shared by every key type used by keyed operators.
pub trait KeyProperties: Clone + Eq + Hash {}
impl<K> KeyProperties for K where K: Clone + Eq + Hash {}
