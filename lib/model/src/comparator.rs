use crate::NodeId;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A total order over rows of the same width.
///
/// Storage layers may order their rows by something else than the raw node ids (e.g., by the
/// lexical form of the nodes). They can use [RowComparator::Custom] to declare such an order.
pub trait RowOrder: Debug + Send + Sync {
    /// A short name used when displaying the order.
    fn name(&self) -> &str;

    /// Compares two rows.
    fn compare(&self, lhs: &[NodeId], rhs: &[NodeId]) -> Ordering;
}

/// Describes the sort order of a tuple sequence.
#[derive(Debug, Clone)]
pub enum RowComparator {
    /// Rows are compared column by column, in column order. [NodeId::UNBOUND] sorts first.
    ///
    /// Prefix searches on materialized sequences rely on this order.
    Lexicographic,
    /// An order defined outside of this crate.
    Custom(Arc<dyn RowOrder>),
}

impl RowComparator {
    /// Compares two rows according to this order.
    pub fn compare(&self, lhs: &[NodeId], rhs: &[NodeId]) -> Ordering {
        match self {
            RowComparator::Lexicographic => lhs.cmp(rhs),
            RowComparator::Custom(order) => order.compare(lhs, rhs),
        }
    }

    /// Returns true if `rows` are in non-decreasing order.
    pub fn is_sorted<'rows>(&self, rows: impl IntoIterator<Item = &'rows [NodeId]>) -> bool {
        let mut previous: Option<&[NodeId]> = None;
        for row in rows {
            if let Some(previous) = previous {
                if self.compare(previous, row) == Ordering::Greater {
                    return false;
                }
            }
            previous = Some(row);
        }
        true
    }
}

impl PartialEq for RowComparator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowComparator::Lexicographic, RowComparator::Lexicographic) => true,
            (RowComparator::Custom(lhs), RowComparator::Custom(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl Eq for RowComparator {}

impl Display for RowComparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RowComparator::Lexicographic => f.write_str("lexicographic"),
            RowComparator::Custom(order) => f.write_str(order.name()),
        }
    }
}
