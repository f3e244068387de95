#![doc(test(attr(deny(warnings))))]

//! The tuple algebra of RDF Tuples.
//!
//! Intermediate query results are represented as [Tuples]: lazily evaluated sequences of rows
//! that bind variables to node ids. This crate provides the cursor contract ([TupleSource]),
//! the base sequences, and the operators that combine sequences (joins, differences, appends,
//! projections, filters, ...). The operators do not reorder their operands. Use the planner
//! crate to build efficient operator trees.

mod append;
mod base;
mod bind;
mod distinct;
pub mod expr;
mod filter;
mod join;
mod projection;
mod slice;
mod source;
mod tuples;

pub use append::{OrderedAppend, UnorderedAppend};
pub use base::*;
pub use bind::Bind;
pub use distinct::Distinct;
pub use expr::{Expression, RowContext};
pub use filter::{Condition, Filter, RowPredicate};
pub use join::{Join, Minus, MinusKind, OptionalJoin};
pub use projection::{Projection, ProjectionKind};
pub use slice::{Limit, Offset};
pub use source::TupleSource;
pub use tuples::{Tuples, TuplesKind};
