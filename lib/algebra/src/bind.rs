use crate::expr::{Expression, RowContext};
use crate::source::{check_column, fail_construction, validate_prefix, CursorState};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{
    ArgumentError, NodeId, RowComparator, TuplesError, TuplesResult, ValueResolver, Variable,
};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Appends a column whose value is computed from the other columns of the row.
///
/// If the expression cannot be evaluated for a row, the new column is [NodeId::UNBOUND].
#[derive(Debug)]
pub struct Bind {
    operand: Box<Tuples>,
    expression: Expression,
    resolver: Arc<dyn ValueResolver>,
    variables: Vec<Variable>,
    /// The value the computed column must have, given by the prefix of the current search.
    required: Option<NodeId>,
    row: Vec<NodeId>,
    value: NodeId,
    state: CursorState,
}

impl Bind {
    /// Creates a new [Bind] that binds `variable` to the value of `expression`.
    ///
    /// # Errors
    ///
    /// Returns [ArgumentError::VariableAlreadyBound] if `operand` already has `variable`.
    pub fn try_new(
        operand: Tuples,
        variable: Variable,
        expression: Expression,
        resolver: Arc<dyn ValueResolver>,
    ) -> TuplesResult<Self> {
        if operand.has_variable(&variable) {
            return fail_construction([operand], ArgumentError::VariableAlreadyBound(variable));
        }

        tracing::trace!("Creating bind of {variable} to {expression}");
        let mut variables = operand.variables().to_vec();
        variables.push(variable);
        Ok(Self {
            row: Vec::with_capacity(operand.width()),
            operand: Box::new(operand),
            expression,
            resolver,
            variables,
            required: None,
            value: NodeId::UNBOUND,
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }

    /// Returns the bound variable.
    pub fn variable(&self) -> &Variable {
        &self.variables[self.operand.width()]
    }
}

impl TupleSource for Bind {
    fn name(&self) -> &str {
        "Bind"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables.len())?;
        self.state.ensure_on_row()?;
        if column == self.operand.width() {
            Ok(self.value)
        } else {
            self.operand.column_value(column)
        }
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables.len())?;
        let width = self.operand.width();
        let operand_prefix = &prefix[..prefix.len().min(width)];
        self.operand.before_first(operand_prefix, 0)?;
        self.required = prefix.get(width).copied();
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }

        while self.operand.next()? {
            self.operand.read_row(&mut self.row)?;
            let context = RowContext::new(self.operand.variables(), &self.row);
            self.value = self
                .expression
                .evaluate_node(&context, self.resolver.as_ref())?;
            if self.required.is_none_or(|required| required == self.value) {
                self.state = CursorState::OnRow;
                return Ok(true);
            }
        }
        self.state = CursorState::AfterLast;
        Ok(false)
    }

    fn close(&mut self) -> TuplesResult<()> {
        self.operand.close()
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let bind = Bind::try_new(
            self.operand.duplicate()?,
            self.variable().clone(),
            self.expression.clone(),
            Arc::clone(&self.resolver),
        )?;
        Ok(bind.into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.operand.row_upper_bound()
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        self.operand.row_expected_count()
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables.len())?;
        if column == self.operand.width() {
            return Ok(true);
        }
        self.operand.is_column_ever_unbound(column)
    }

    /// The lexicographic order survives if the computed column never breaks a tie.
    fn comparator(&self) -> Option<RowComparator> {
        match self.operand.comparator() {
            Some(RowComparator::Lexicographic) if self.operand.has_no_duplicates() => {
                Some(RowComparator::Lexicographic)
            }
            _ => None,
        }
    }

    fn has_no_duplicates(&self) -> bool {
        self.operand.has_no_duplicates()
    }
}

impl Display for Bind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bind {} := {}", self.variable(), self.expression)
    }
}
