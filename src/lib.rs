//! `flowset` is an incremental view maintenance engine.
//!
//! Inputs and outputs are [`MultiSet`](zset::MultiSet)s — multisets with
//! signed integer multiplicities, also called Z-sets. A [`Graph`] wires
//! together [operators](operator) that consume Z-set deltas from their
//! inputs and produce Z-set deltas on their outputs, doing work
//! proportional to the size of the change rather than the size of the
//! materialized collection.
//!
//! The external surface is intentionally small: build a graph, obtain root
//! [`StreamBuilder`](builder::StreamBuilder)s from [`Graph::new_input`],
//! [`pipe`](builder::StreamBuilder::pipe) operator factories together,
//! finalize the graph, then alternate [`StreamBuilder::send_data`] and
//! [`Graph::run`].

pub mod builder;
pub mod error;
pub mod fractional_index;
pub mod graph;
pub mod operator;
pub mod zset;

pub use builder::StreamBuilder;
pub use error::GraphError;
pub use graph::Graph;
pub use zset::MultiSet;
