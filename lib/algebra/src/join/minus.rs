use crate::expr::RowContext;
use crate::filter::Condition;
use crate::join::probe::Probe;
use crate::source::{close_all, duplicate_pair, fail_construction, CursorState};
use crate::{TupleSource, Tuples};
use itertools::Itertools;
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::fmt::{Display, Formatter};

/// Distinguishes the two operators implemented by [Minus].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinusKind {
    /// Removes the left rows that agree with a right row on the shared variables.
    Difference,
    /// Removes the left rows for which a matching right row satisfies a condition.
    LeftFiltered,
}

/// Emits the rows of the left operand for which no right row matches.
///
/// For [MinusKind::Difference], a right row matches a left row if the two are compatible and
/// bind at least one shared variable to the same value. Operands without shared variables
/// therefore never match and the left operand is emitted unchanged. For
/// [MinusKind::LeftFiltered], every compatible right row is a candidate and the combined row
/// must also satisfy the condition.
///
/// The right operand is searched with the shared values of each left row. It must be sorted
/// with the shared variables leading.
#[derive(Debug)]
pub struct Minus {
    kind: MinusKind,
    left: Box<Tuples>,
    probe: Probe,
    condition: Option<Condition>,
    /// The variables of the combined row, used for evaluating the condition.
    combined_variables: Vec<Variable>,
    left_row: Vec<NodeId>,
    combined_row: Vec<NodeId>,
    state: CursorState,
}

impl Minus {
    /// Creates a new difference that removes the rows of `minuend` that agree with a row of
    /// `subtrahend`.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::NoSharedVariables] if both operands have variables but share
    /// none of them. If one of them has no variables, the difference is the minuend.
    pub fn difference(minuend: Tuples, subtrahend: Tuples) -> TuplesResult<Self> {
        let shares_variable = minuend
            .variables()
            .iter()
            .any(|variable| subtrahend.has_variable(variable));
        if !shares_variable && minuend.width() > 0 && subtrahend.width() > 0 {
            let error = TuplesError::NoSharedVariables(format!(
                "[{}] and [{}]",
                minuend.variables().iter().join(" "),
                subtrahend.variables().iter().join(" ")
            ));
            return fail_construction([minuend, subtrahend], error);
        }

        Self::try_new(MinusKind::Difference, minuend, subtrahend, None)
    }

    /// Creates a new left-filtered join that removes the rows of `left` for which a matching
    /// row of `right` satisfies `condition`.
    pub fn left_filtered(left: Tuples, right: Tuples, condition: Condition) -> TuplesResult<Self> {
        Self::try_new(MinusKind::LeftFiltered, left, right, Some(condition))
    }

    fn try_new(
        kind: MinusKind,
        left: Tuples,
        right: Tuples,
        condition: Option<Condition>,
    ) -> TuplesResult<Self> {
        let probe = match Probe::try_new(left.variables(), right) {
            Ok(probe) => probe,
            Err(error) => return fail_construction([left], error),
        };
        let combined_variables = probe.combined_variables(left.variables());
        tracing::trace!("Creating {kind:?} over [{}]", left.variables().iter().join(" "));
        Ok(Self {
            kind,
            left_row: Vec::with_capacity(left.width()),
            combined_row: Vec::with_capacity(combined_variables.len()),
            left: Box::new(left),
            probe,
            condition,
            combined_variables,
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the kind of this operator.
    pub fn kind(&self) -> MinusKind {
        self.kind
    }

    /// Returns the left operand (the minuend).
    pub fn left(&self) -> &Tuples {
        &self.left
    }

    /// Returns the right operand (the subtrahend).
    pub fn right(&self) -> &Tuples {
        self.probe.right()
    }

    /// Returns true if the operands cannot remove any left row.
    fn is_disjoint(&self) -> bool {
        self.kind == MinusKind::Difference && !self.probe.has_shared_variables()
    }

    /// Returns true if a right row matches the current left row.
    fn has_match(&mut self) -> TuplesResult<bool> {
        if self.is_disjoint() {
            return Ok(false);
        }

        self.probe.position(&self.left_row)?;
        while let Some(intersects) = self.probe.next_compatible(&self.left_row)? {
            if self.kind == MinusKind::Difference && !intersects {
                continue;
            }

            let Some(condition) = &self.condition else {
                return Ok(true);
            };
            self.probe.combine(&self.left_row, &mut self.combined_row);
            let context = RowContext::new(&self.combined_variables, &self.combined_row);
            if condition.test(&context)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl TupleSource for Minus {
    fn name(&self) -> &str {
        match self.kind {
            MinusKind::Difference => "Difference",
            MinusKind::LeftFiltered => "LeftFiltered",
        }
    }

    fn variables(&self) -> &[Variable] {
        self.left.variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        self.state.ensure_on_row()?;
        self.left.column_value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        self.left.before_first(prefix, suffix_truncation)?;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }

        while self.left.next()? {
            self.left.read_row(&mut self.left_row)?;
            if !self.has_match()? {
                self.state = CursorState::OnRow;
                return Ok(true);
            }
        }
        self.state = CursorState::AfterLast;
        Ok(false)
    }

    fn close(&mut self) -> TuplesResult<()> {
        close_all([self.left.as_mut(), self.probe.right_mut()])
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let (left, right) = duplicate_pair(&self.left, self.probe.right())?;
        Ok(Minus::try_new(self.kind, left, right, self.condition.clone())?.into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.left.row_upper_bound()
    }

    /// Assumes that half of the left rows are removed unless no left row can match.
    fn row_expected_count(&self) -> TuplesResult<u64> {
        let left = self.left.row_expected_count()?;
        if self.is_disjoint() || self.probe.right().row_upper_bound()? == 0 {
            Ok(left)
        } else {
            Ok(left / 2)
        }
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        self.left.is_column_ever_unbound(column)
    }

    fn comparator(&self) -> Option<RowComparator> {
        self.left.comparator()
    }

    fn has_no_duplicates(&self) -> bool {
        self.left.has_no_duplicates()
    }
}

impl Display for Minus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.condition) {
            (MinusKind::LeftFiltered, Some(condition)) => {
                write!(f, "Left-filtered join {condition}")
            }
            _ => f.write_str("Difference"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RowPredicate;
    use crate::LiteralTuples;

    fn literal(names: &[&str], rows: &[&[u32]]) -> Tuples {
        let variables = names.iter().copied().map(Variable::new).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().copied().map(NodeId::from).collect())
            .collect();
        LiteralTuples::new_sorted(variables, rows).unwrap().into()
    }

    fn ids(rows: Vec<Vec<NodeId>>) -> Vec<Vec<u64>> {
        rows.into_iter()
            .map(|row| row.into_iter().map(NodeId::as_u64).collect())
            .collect()
    }

    #[derive(Debug)]
    struct Different(&'static str, &'static str);

    impl RowPredicate for Different {
        fn name(&self) -> &str {
            "different"
        }

        fn test(&self, context: &RowContext<'_>) -> TuplesResult<bool> {
            let lhs = context.value(&Variable::new(self.0));
            let rhs = context.value(&Variable::new(self.1));
            Ok(lhs != rhs)
        }
    }

    #[test]
    fn test_difference() {
        let minuend = literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
        let subtrahend = literal(&["y"], &[&[2]]);
        let mut difference = Tuples::from(Minus::difference(minuend, subtrahend).unwrap());

        assert_eq!(ids(difference.read_all_rows().unwrap()), vec![vec![3, 4]]);
        assert_eq!(difference.comparator(), Some(RowComparator::Lexicographic));
    }

    #[test]
    fn test_difference_requires_shared_variables() {
        let result = Minus::difference(literal(&["x"], &[&[1]]), literal(&["y"], &[&[1]]));
        assert!(matches!(result, Err(TuplesError::NoSharedVariables(_))));
    }

    #[test]
    fn test_difference_with_variable_less_subtrahend() {
        let minuend = literal(&["x"], &[&[1], &[2]]);
        let mut difference =
            Tuples::from(Minus::difference(minuend, Tuples::unconstrained()).unwrap());
        assert_eq!(ids(difference.read_all_rows().unwrap()), vec![vec![1], vec![2]]);
        assert_eq!(difference.row_expected_count().unwrap(), 2);

        let minuend = literal(&["x"], &[&[1]]);
        let difference = Minus::difference(minuend, Tuples::empty()).unwrap();
        assert_eq!(difference.row_count().unwrap(), 1);
        assert_eq!(difference.row_expected_count().unwrap(), 1);
    }

    #[test]
    fn test_difference_with_variable_less_minuend() {
        let subtrahend = literal(&["x"], &[&[1]]);
        let difference = Minus::difference(Tuples::unconstrained(), subtrahend).unwrap();
        assert_eq!(difference.row_count().unwrap(), 1);
        assert_eq!(difference.variables(), &[] as &[Variable]);
    }

    #[test]
    fn test_left_filtered_without_shared_variables() {
        let left = literal(&["x"], &[&[1], &[2]]);
        let right = literal(&["y"], &[&[2]]);
        let condition = Condition::predicate(Different("x", "y"));
        let mut minus = Tuples::from(Minus::left_filtered(left, right, condition).unwrap());
        assert_eq!(ids(minus.read_all_rows().unwrap()), vec![vec![2]]);
    }

    #[test]
    fn test_unbound_does_not_match() {
        let minuend = literal(&["x", "y"], &[&[1, 0], &[2, 5]]);
        let subtrahend = literal(&["y"], &[&[5]]);
        let mut difference = Tuples::from(Minus::difference(minuend, subtrahend).unwrap());
        assert_eq!(ids(difference.read_all_rows().unwrap()), vec![vec![1, 0]]);
    }

    #[test]
    fn test_left_filtered() {
        let left = literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
        let right = literal(&["y", "z"], &[&[2, 2], &[4, 4], &[4, 5]]);
        let condition = Condition::predicate(Different("y", "z"));
        let mut minus = Tuples::from(Minus::left_filtered(left, right, condition).unwrap());

        assert_eq!(ids(minus.read_all_rows().unwrap()), vec![vec![1, 2]]);
        insta::assert_snapshot!(minus, @r"
        Left-filtered join different [?x ?y]
          Literal (2 rows, sorted) [?x ?y]
          Literal (3 rows, sorted) [?y ?z]
        ");
    }
}
