use crate::expr::{Expression, RowContext};
use crate::source::{validate_prefix, CursorState};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, ValueResolver, Variable};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A boolean function of a row that is implemented outside of the expression language.
pub trait RowPredicate: Debug + Send + Sync {
    /// A short name used when rendering an operator tree.
    fn name(&self) -> &str {
        "predicate"
    }

    /// Returns true if the row in `context` satisfies the predicate.
    fn test(&self, context: &RowContext<'_>) -> TuplesResult<bool>;
}

/// The condition of a [Filter], an optional join, or a left-filtered join.
#[derive(Debug, Clone)]
pub enum Condition {
    /// A filter expression. The `resolver` translates node ids into terms if the expression
    /// inspects values.
    Expression {
        expression: Expression,
        resolver: Arc<dyn ValueResolver>,
    },
    /// A restriction by a [RowPredicate].
    Predicate(Arc<dyn RowPredicate>),
}

impl Condition {
    /// Creates a condition from a filter `expression`.
    pub fn expression(expression: Expression, resolver: Arc<dyn ValueResolver>) -> Self {
        Condition::Expression {
            expression,
            resolver,
        }
    }

    /// Creates a condition from a row `predicate`.
    pub fn predicate(predicate: impl RowPredicate + 'static) -> Self {
        Condition::Predicate(Arc::new(predicate))
    }

    /// Evaluates the condition against the row in `context`.
    pub fn test(&self, context: &RowContext<'_>) -> TuplesResult<bool> {
        match self {
            Condition::Expression {
                expression,
                resolver,
            } => expression.test(context, resolver.as_ref()),
            Condition::Predicate(predicate) => predicate.test(context),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Expression { expression, .. } => write!(f, "{expression}"),
            Condition::Predicate(predicate) => f.write_str(predicate.name()),
        }
    }
}

/// Emits the rows of the operand that satisfy a [Condition].
///
/// Filtering by an expression and restricting by a row predicate only differ in the kind of
/// the condition.
#[derive(Debug)]
pub struct Filter {
    operand: Box<Tuples>,
    condition: Condition,
    row: Vec<NodeId>,
    state: CursorState,
}

impl Filter {
    /// Creates a new [Filter].
    pub fn new(operand: Tuples, condition: Condition) -> Self {
        tracing::trace!("Creating filter with condition {condition}");
        Self {
            row: Vec::with_capacity(operand.width()),
            operand: Box::new(operand),
            condition,
            state: CursorState::Unpositioned,
        }
    }

    /// Returns the filtered operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }

    /// Returns the condition.
    pub fn condition(&self) -> &Condition {
        &self.condition
    }
}

impl TupleSource for Filter {
    fn name(&self) -> &str {
        "Filter"
    }

    fn variables(&self) -> &[Variable] {
        self.operand.variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        self.state.ensure_on_row()?;
        self.operand.column_value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.operand.width())?;
        self.operand.before_first(prefix, 0)?;
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
            if self.condition.test(&context)? {
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
        let operand = self.operand.duplicate()?;
        Ok(Filter::new(operand, self.condition.clone()).into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.operand.row_upper_bound()
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        self.operand.row_expected_count()
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        self.operand.is_column_ever_unbound(column)
    }

    fn comparator(&self) -> Option<RowComparator> {
        self.operand.comparator()
    }

    fn has_no_duplicates(&self) -> bool {
        self.operand.has_no_duplicates()
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.condition {
            Condition::Expression { expression, .. } => write!(f, "Filter {expression}"),
            Condition::Predicate(predicate) => write!(f, "Restriction {}", predicate.name()),
        }
    }
}
