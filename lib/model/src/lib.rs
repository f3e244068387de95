#![doc(test(attr(deny(warnings))))]

//! Contains the data model shared by the tuple algebra of [RDF Tuples](../../rdf-tuples-algebra):
//! node identifiers, variables, row orderings, optimizer annotations and the error types.

mod annotation;
mod cardinality;
mod comparator;
mod error;
mod node;
mod resolver;
mod variable;

pub use annotation::*;
pub use cardinality::*;
pub use comparator::*;
pub use error::*;
pub use node::*;
pub use resolver::*;
pub use variable::*;

// Re-export some oxrdf types.
pub use oxrdf::vocab;
pub use oxrdf::{
    BlankNode, BlankNodeRef, Literal, LiteralRef, NamedNode, NamedNodeRef, Term, TermRef,
};
