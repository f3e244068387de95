use crate::Variable;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Hints attached to a tuple sequence that are only consumed by the join planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// The sequence can only be evaluated once the given variables are bound by operands placed
    /// before it.
    MandatoryBindings(BTreeSet<Variable>),
    /// The sequence can rearrange its columns such that variables bound at join time form the
    /// search prefix.
    DefinablePrefix,
    /// The planner may merge the operands of this sequence into an enclosing join and reorder
    /// them freely.
    Reorderable,
}

impl Annotation {
    /// Returns the kind of this annotation.
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::MandatoryBindings(_) => AnnotationKind::MandatoryBindings,
            Annotation::DefinablePrefix => AnnotationKind::DefinablePrefix,
            Annotation::Reorderable => AnnotationKind::Reorderable,
        }
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Annotation::MandatoryBindings(variables) => {
                f.write_str("mandatory(")?;
                for (i, variable) in variables.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{variable}")?;
                }
                f.write_str(")")
            }
            Annotation::DefinablePrefix => f.write_str("definable-prefix"),
            Annotation::Reorderable => f.write_str("reorderable"),
        }
    }
}

/// The key used for looking up an [Annotation].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    MandatoryBindings,
    DefinablePrefix,
    Reorderable,
}
