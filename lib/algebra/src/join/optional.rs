use crate::expr::RowContext;
use crate::filter::Condition;
use crate::join::probe::Probe;
use crate::source::{
    check_column, close_all, duplicate_pair, fail_construction, validate_prefix, CursorState,
};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::fmt::{Display, Formatter};

/// The left outer join of two operands with an optional condition.
///
/// Every left row is emitted once for each compatible right row that satisfies the condition.
/// If no such right row exists, the left row is emitted once with the columns that only the
/// right operand binds set to [NodeId::UNBOUND]. Operands that share no variables yield a
/// (filtered) cartesian product.
///
/// The right operand is searched with the shared values of each left row. It must be sorted
/// with the shared variables leading.
#[derive(Debug)]
pub struct OptionalJoin {
    left: Box<Tuples>,
    probe: Probe,
    condition: Option<Condition>,
    variables: Vec<Variable>,
    no_duplicates: bool,
    left_row: Vec<NodeId>,
    row: Vec<NodeId>,
    prefix: Vec<NodeId>,
    /// The number of prefix values that have been passed to the left operand.
    left_prefix_len: usize,
    /// Whether the right operand is being searched for the current left row.
    probing: bool,
    /// Whether a right row has been combined with the current left row.
    matched: bool,
    state: CursorState,
}

impl OptionalJoin {
    /// Creates a new [OptionalJoin].
    ///
    /// If a `condition` is given, it is evaluated on the combined row.
    pub fn try_new(
        left: Tuples,
        right: Tuples,
        condition: Option<Condition>,
    ) -> TuplesResult<Self> {
        let probe = match Probe::try_new(left.variables(), right) {
            Ok(probe) => probe,
            Err(error) => return fail_construction([left], error),
        };
        let no_duplicates = match compute_no_duplicates(&left, &probe) {
            Ok(no_duplicates) => no_duplicates,
            Err(error) => return fail_construction([left, probe.into_right()], error),
        };

        let variables = probe.combined_variables(left.variables());
        tracing::trace!("Creating optional join with variables {variables:?}");
        Ok(Self {
            left_row: Vec::with_capacity(left.width()),
            row: Vec::with_capacity(variables.len()),
            left: Box::new(left),
            probe,
            condition,
            variables,
            no_duplicates,
            prefix: Vec::new(),
            left_prefix_len: 0,
            probing: false,
            matched: false,
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the left operand.
    pub fn left(&self) -> &Tuples {
        &self.left
    }

    /// Returns the right operand.
    pub fn right(&self) -> &Tuples {
        self.probe.right()
    }

    /// Returns the condition.
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    fn passes_condition(&self) -> TuplesResult<bool> {
        match &self.condition {
            None => Ok(true),
            Some(condition) => condition.test(&RowContext::new(&self.variables, &self.row)),
        }
    }

    fn matches_prefix(&self) -> bool {
        (self.left_prefix_len..self.prefix.len())
            .all(|column| self.row[column] == self.prefix[column])
    }
}

/// The join is free of duplicates if both operands are and the shared columns are always bound.
fn compute_no_duplicates(left: &Tuples, probe: &Probe) -> TuplesResult<bool> {
    if !left.has_no_duplicates() || !probe.right().has_no_duplicates() {
        return Ok(false);
    }
    for (left_column, right_column) in probe.shared() {
        if left.is_column_ever_unbound(*left_column)?
            || probe.right().is_column_ever_unbound(*right_column)?
        {
            return Ok(false);
        }
    }
    Ok(true)
}

impl TupleSource for OptionalJoin {
    fn name(&self) -> &str {
        "OptionalJoin"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables.len())?;
        self.state.ensure_on_row()?;
        Ok(self.row[column])
    }

    /// Only the leading left columns that are never unbound are searched in the left operand.
    /// The remaining prefix values are checked on the combined row.
    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables.len())?;
        let mut left_prefix_len = 0;
        while left_prefix_len < prefix.len().min(self.left.width())
            && !self.left.is_column_ever_unbound(left_prefix_len)?
        {
            left_prefix_len += 1;
        }

        self.left.before_first(&prefix[..left_prefix_len], 0)?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
        self.left_prefix_len = left_prefix_len;
        self.probing = false;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }

        loop {
            if !self.probing {
                if !self.left.next()? {
                    self.state = CursorState::AfterLast;
                    return Ok(false);
                }
                self.left.read_row(&mut self.left_row)?;
                self.probe.position(&self.left_row)?;
                self.probing = true;
                self.matched = false;
            }

            if self.probe.next_compatible(&self.left_row)?.is_some() {
                self.probe.combine(&self.left_row, &mut self.row);
                if !self.passes_condition()? {
                    continue;
                }
                self.matched = true;
            } else {
                self.probing = false;
                if self.matched {
                    continue;
                }
                self.probe.combine_unmatched(&self.left_row, &mut self.row);
            }

            if self.matches_prefix() {
                self.state = CursorState::OnRow;
                return Ok(true);
            }
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        close_all([self.left.as_mut(), self.probe.right_mut()])
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let (left, right) = duplicate_pair(&self.left, self.probe.right())?;
        let join = OptionalJoin::try_new(left, right, self.condition.clone())?;
        Ok(join.into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        let right = self.probe.right().row_upper_bound()?.max(1);
        Ok(self.left.row_upper_bound()?.saturating_mul(right))
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        self.left.row_expected_count()
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables.len())?;
        if column < self.left.width() {
            self.left.is_column_ever_unbound(column)
        } else {
            Ok(true)
        }
    }

    fn comparator(&self) -> Option<RowComparator> {
        None
    }

    fn has_no_duplicates(&self) -> bool {
        self.no_duplicates
    }
}

impl Display for OptionalJoin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Optional join")?;
        if let Some(condition) = &self.condition {
            write!(f, " filter {condition}")?;
        }
        Ok(())
    }
}
