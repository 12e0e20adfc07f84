//! Operator factories: the concrete incremental operators layered on top
//! of the [`crate::graph`] base contract.

mod concat;
mod consolidate;
mod distinct;
mod filter_by;
mod group;
mod join;
mod keyed;
mod map_filter;
mod output;
pub mod topk;

pub use concat::concat;
pub use consolidate::consolidate;
pub use distinct::distinct;
pub use filter_by::filter_by;
pub use group::{group_by, reduce, AggregateRow, AggregateSpec, AggregateValue};
pub use join::{join, JoinKind};
pub use keyed::{count, key_by, rekey, unkey};
pub use map_filter::{filter, map, negate};
pub use output::output;
pub use topk::{
    order_by_with_fractional_index, top_k, top_k_with_fractional_index, top_k_with_index,
    TopKOptions,
};

use crate::graph::Graph;

/// Register a boxed operator with the graph, panicking if the graph has
/// already been finalized.
///
/// Adding operators to a finalized graph is a programmer error, not a
/// recoverable condition; unlike `Graph`'s own public methods, operator
/// factories do not thread a `Result` through every `pipe` call for it,
/// matching the ergonomics of a circuit under active construction where
/// every operator is wired up before the first `finalize`.
pub(crate) fn register(graph: &mut Graph, operator: Box<dyn crate::graph::Operator>) {
    graph
        .add_operator(operator)
        .expect("cannot add an operator to an already-finalized graph");
}
