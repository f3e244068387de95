use crate::source::{check_column, check_distinct_variables, validate_prefix, CursorState};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{
    ArgumentError, Cardinality, NodeId, RowComparator, TuplesError, TuplesResult, Variable,
};
use std::fmt::{Display, Formatter};

/// A sequence without rows.
///
/// The variables are retained such that an empty sub-result still has the schema of the
/// operation it replaces.
#[derive(Debug, Default)]
pub struct EmptyTuples {
    variables: Vec<Variable>,
    state: CursorState,
}

impl EmptyTuples {
    /// Creates a new [EmptyTuples] with the given `variables`.
    pub fn new(variables: Vec<Variable>) -> TuplesResult<Self> {
        check_distinct_variables(&variables)?;
        Ok(Self {
            variables,
            state: CursorState::Unpositioned,
        })
    }
}

impl TupleSource for EmptyTuples {
    fn name(&self) -> &str {
        "Empty"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables.len())?;
        Err(TuplesError::CursorNotPositioned)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables.len())?;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        if self.state == CursorState::Unpositioned {
            return Err(TuplesError::CursorNotPositioned);
        }
        self.state = CursorState::AfterLast;
        Ok(false)
    }

    fn close(&mut self) -> TuplesResult<()> {
        Ok(())
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        Ok(EmptyTuples::new(self.variables.clone())?.into())
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn row_count(&self) -> TuplesResult<u64> {
        Ok(0)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        Ok(0)
    }

    fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        Ok(Cardinality::Zero)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables.len())?;
        Ok(false)
    }

    fn comparator(&self) -> Option<RowComparator> {
        Some(RowComparator::Lexicographic)
    }

    fn has_no_duplicates(&self) -> bool {
        true
    }
}

impl Display for EmptyTuples {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Empty")
    }
}

/// A sequence with a single row and no variables.
///
/// This is the identity element of the join.
#[derive(Debug, Default)]
pub struct UnconstrainedTuples {
    state: CursorState,
}

impl UnconstrainedTuples {
    /// Creates a new [UnconstrainedTuples].
    pub fn new() -> Self {
        Self::default()
    }
}

impl TupleSource for UnconstrainedTuples {
    fn name(&self) -> &str {
        "Unconstrained"
    }

    fn variables(&self) -> &[Variable] {
        &[]
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, 0)?;
        Err(TuplesError::CursorNotPositioned)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, 0)?;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => Err(TuplesError::CursorNotPositioned),
            CursorState::BeforeFirst => {
                self.state = CursorState::OnRow;
                Ok(true)
            }
            CursorState::OnRow | CursorState::AfterLast => {
                self.state = CursorState::AfterLast;
                Ok(false)
            }
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        Ok(())
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        Ok(UnconstrainedTuples::new().into())
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn row_count(&self) -> TuplesResult<u64> {
        Ok(1)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        Ok(1)
    }

    fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        Ok(Cardinality::One)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, 0)?;
        Ok(false)
    }

    fn comparator(&self) -> Option<RowComparator> {
        Some(RowComparator::Lexicographic)
    }

    fn has_no_duplicates(&self) -> bool {
        true
    }
}

impl Display for UnconstrainedTuples {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unconstrained")
    }
}

/// A sequence that binds a single variable to a single value.
#[derive(Debug)]
pub struct Assignment {
    variables: [Variable; 1],
    value: NodeId,
    state: CursorState,
    /// Whether the current prefix search matches the value.
    matches: bool,
}

impl Assignment {
    /// Creates a new [Assignment] of `value` to `variable`.
    ///
    /// # Errors
    ///
    /// Returns [ArgumentError::UnboundAssignment] if `value` is [NodeId::UNBOUND].
    pub fn new(variable: Variable, value: NodeId) -> TuplesResult<Self> {
        if value.is_unbound() {
            return Err(ArgumentError::UnboundAssignment(variable).into());
        }
        Ok(Self {
            variables: [variable],
            value,
            state: CursorState::Unpositioned,
            matches: false,
        })
    }

    /// Returns the assigned variable.
    pub fn variable(&self) -> &Variable {
        &self.variables[0]
    }

    /// Returns the assigned value.
    pub fn value(&self) -> NodeId {
        self.value
    }
}

impl TupleSource for Assignment {
    fn name(&self) -> &str {
        "Assignment"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, 1)?;
        self.state.ensure_on_row()?;
        Ok(self.value)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, 1)?;
        self.matches = prefix.first().is_none_or(|value| *value == self.value);
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => Err(TuplesError::CursorNotPositioned),
            CursorState::BeforeFirst if self.matches => {
                self.state = CursorState::OnRow;
                Ok(true)
            }
            _ => {
                self.state = CursorState::AfterLast;
                Ok(false)
            }
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        Ok(())
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        Ok(Assignment::new(self.variable().clone(), self.value)?.into())
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn row_count(&self) -> TuplesResult<u64> {
        Ok(1)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        Ok(1)
    }

    fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        Ok(Cardinality::One)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, 1)?;
        Ok(false)
    }

    fn comparator(&self) -> Option<RowComparator> {
        Some(RowComparator::Lexicographic)
    }

    fn has_no_duplicates(&self) -> bool {
        true
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Assignment {} = {}", self.variable(), self.value)
    }
}
