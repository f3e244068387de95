use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A variable names a column of a tuple sequence.
///
/// Variables are immutable and compared by name. Cloning a variable is cheap as the name is
/// shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(Arc<str>);

impl Variable {
    /// Creates a new [Variable] with the given `name`.
    ///
    /// The name is stored without the leading `?`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the variable for the given `position` of a statement.
    pub fn positional(position: PositionalVariable) -> Self {
        Self::new(position.name())
    }

    /// Returns the name of the variable.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the statement position if this variable is one of the positional variables.
    pub fn position(&self) -> Option<PositionalVariable> {
        PositionalVariable::ALL
            .into_iter()
            .find(|p| p.name() == self.as_str())
    }

    /// Returns true if this variable is one of the positional variables.
    pub fn is_positional(&self) -> bool {
        self.position().is_some()
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl Debug for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// The positions of a quad.
///
/// Sequences produced directly from a storage scan use these variables as column names. When a
/// scan is attached to a constraint, the positional variables are renamed to the constraint's
/// variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionalVariable {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl PositionalVariable {
    /// All positions, in quad order.
    pub const ALL: [PositionalVariable; 4] = [
        PositionalVariable::Subject,
        PositionalVariable::Predicate,
        PositionalVariable::Object,
        PositionalVariable::Graph,
    ];

    /// The reserved variable name of this position.
    ///
    /// The names are not valid SPARQL variable names and thus cannot clash with user variables.
    pub fn name(self) -> &'static str {
        match self {
            PositionalVariable::Subject => "@subject",
            PositionalVariable::Predicate => "@predicate",
            PositionalVariable::Object => "@object",
            PositionalVariable::Graph => "@graph",
        }
    }
}
