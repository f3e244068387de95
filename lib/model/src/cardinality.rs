use std::fmt::{Display, Formatter};

/// A coarse classification of the number of rows in a tuple sequence.
///
/// The cardinality is exact in the sense that [Cardinality::One] is only returned if the
/// sequence has exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cardinality {
    Zero,
    One,
    Many,
}

impl Cardinality {
    /// Classifies an exact row count.
    pub fn from_count(count: u64) -> Self {
        match count {
            0 => Cardinality::Zero,
            1 => Cardinality::One,
            _ => Cardinality::Many,
        }
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Zero => f.write_str("zero"),
            Cardinality::One => f.write_str("one"),
            Cardinality::Many => f.write_str("many"),
        }
    }
}
