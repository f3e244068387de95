#![doc(test(attr(deny(warnings))))]

//! Builds and optimizes operator trees of the [RDF Tuples algebra](../../rdf-tuples-algebra).
//!
//! [TuplesOperations] is the entry point. It establishes the preconditions of the operators
//! (e.g., sorted operands) and plans joins: single-row operands are folded into a binding row
//! and the remaining operands are ordered by their estimated cost.

mod join_planning;
mod operations;
mod options;

pub use operations::TuplesOperations;
pub use options::{OptimizationLevel, PlannerOptions, DEFAULT_BOUND_COLUMN_DISCOUNT};
