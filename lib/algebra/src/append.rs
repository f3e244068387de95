use crate::source::{
    check_column, close_all, duplicate_all, fail_construction, validate_prefix, CursorState,
};
use crate::{TupleSource, Tuples};
use itertools::Itertools;
use rdf_tuples_model::{
    ArgumentError, NodeId, RowComparator, TuplesError, TuplesResult, Variable,
};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Checks that all operands have the same variables in the same order.
fn check_union_compatible(operands: &[Tuples]) -> TuplesResult<()> {
    let Some(first) = operands.first() else {
        return Err(ArgumentError::TooFewOperands(1).into());
    };

    if let Some(other) = operands
        .iter()
        .find(|operand| operand.variables() != first.variables())
    {
        return Err(TuplesError::NotUnionCompatible(format!(
            "[{}] and [{}]",
            first.variables().iter().join(" "),
            other.variables().iter().join(" ")
        )));
    }
    Ok(())
}

fn sum_of(
    operands: &[Tuples],
    count: impl Fn(&Tuples) -> TuplesResult<u64>,
) -> TuplesResult<u64> {
    operands
        .iter()
        .try_fold(0_u64, |sum, operand| Ok(sum.saturating_add(count(operand)?)))
}

fn any_ever_unbound(operands: &[Tuples], column: usize) -> TuplesResult<bool> {
    for operand in operands {
        if operand.is_column_ever_unbound(column)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Merges identically sorted operands into a single sorted sequence.
///
/// Rows that compare equal are emitted in the order of the operands.
#[derive(Debug)]
pub struct OrderedAppend {
    operands: Vec<Tuples>,
    comparator: RowComparator,
    /// The current row of each operand, or [None] if the operand is exhausted.
    heads: Vec<Option<Vec<NodeId>>>,
    /// The operand whose head is the current row.
    current: Option<usize>,
    state: CursorState,
}

impl OrderedAppend {
    /// Creates a new [OrderedAppend].
    ///
    /// # Errors
    ///
    /// Fails if the operands are not union-compatible or do not share the same sort order.
    pub fn try_new(operands: Vec<Tuples>) -> TuplesResult<Self> {
        if let Err(error) = check_union_compatible(&operands) {
            return fail_construction(operands, error);
        }

        let comparators = operands.iter().map(Tuples::comparator).collect::<Vec<_>>();
        let comparator = match comparators.first() {
            Some(Some(first)) if comparators.iter().all(|c| c.as_ref() == Some(first)) => {
                first.clone()
            }
            _ => {
                return fail_construction(
                    operands,
                    TuplesError::UnsortedInput(String::from(
                        "All operands of an ordered append must have the same sort order.",
                    )),
                )
            }
        };

        tracing::trace!("Creating ordered append of {} operands", operands.len());
        Ok(Self {
            heads: vec![None; operands.len()],
            operands,
            comparator,
            current: None,
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the operands.
    pub fn operands(&self) -> &[Tuples] {
        &self.operands
    }

    /// Advances the operand at `index` and updates its head.
    fn advance(&mut self, index: usize) -> TuplesResult<()> {
        let operand = &mut self.operands[index];
        if operand.next()? {
            let head = self.heads[index].get_or_insert_with(Vec::new);
            operand.read_row(head)?;
        } else {
            self.heads[index] = None;
        }
        Ok(())
    }
}

impl TupleSource for OrderedAppend {
    fn name(&self) -> &str {
        "OrderedAppend"
    }

    fn variables(&self) -> &[Variable] {
        self.operands[0].variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables().len())?;
        self.state.ensure_on_row()?;
        let row = self
            .current
            .and_then(|index| self.heads[index].as_ref())
            .ok_or(TuplesError::CursorNotPositioned)?;
        Ok(row[column])
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables().len())?;
        for operand in &mut self.operands {
            operand.before_first(prefix, 0)?;
        }
        self.current = None;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst => {
                for index in 0..self.operands.len() {
                    self.advance(index)?;
                }
            }
            CursorState::OnRow => {
                if let Some(index) = self.current {
                    self.advance(index)?;
                }
            }
        }

        let mut smallest: Option<(usize, &Vec<NodeId>)> = None;
        for (index, head) in self.heads.iter().enumerate() {
            let Some(head) = head else { continue };
            let is_smaller = smallest
                .is_none_or(|(_, min)| self.comparator.compare(head, min) == Ordering::Less);
            if is_smaller {
                smallest = Some((index, head));
            }
        }

        self.current = smallest.map(|(index, _)| index);
        if self.current.is_some() {
            self.state = CursorState::OnRow;
            Ok(true)
        } else {
            self.state = CursorState::AfterLast;
            Ok(false)
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        close_all(&mut self.operands)
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let operands = duplicate_all(&self.operands)?;
        Ok(OrderedAppend::try_new(operands)?.into())
    }

    fn row_count(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_count)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_upper_bound)
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_expected_count)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables().len())?;
        any_ever_unbound(&self.operands, column)
    }

    fn comparator(&self) -> Option<RowComparator> {
        Some(self.comparator.clone())
    }

    fn has_no_duplicates(&self) -> bool {
        self.operands.len() == 1 && self.operands[0].has_no_duplicates()
    }
}

impl Display for OrderedAppend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ordered append ({})", self.comparator)
    }
}

/// Concatenates union-compatible operands.
#[derive(Debug)]
pub struct UnorderedAppend {
    operands: Vec<Tuples>,
    /// The operand that is currently iterated.
    index: usize,
    prefix: Vec<NodeId>,
    state: CursorState,
}

impl UnorderedAppend {
    /// Creates a new [UnorderedAppend].
    ///
    /// # Errors
    ///
    /// Fails if the operands are not union-compatible.
    pub fn try_new(operands: Vec<Tuples>) -> TuplesResult<Self> {
        if let Err(error) = check_union_compatible(&operands) {
            return fail_construction(operands, error);
        }

        tracing::trace!("Creating unordered append of {} operands", operands.len());
        Ok(Self {
            operands,
            index: 0,
            prefix: Vec::new(),
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the operands.
    pub fn operands(&self) -> &[Tuples] {
        &self.operands
    }
}

impl TupleSource for UnorderedAppend {
    fn name(&self) -> &str {
        "UnorderedAppend"
    }

    fn variables(&self) -> &[Variable] {
        self.operands[0].variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables().len())?;
        self.state.ensure_on_row()?;
        self.operands[self.index].column_value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables().len())?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
        self.index = 0;
        self.operands[0].before_first(prefix, 0)?;
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
            if self.operands[self.index].next()? {
                self.state = CursorState::OnRow;
                return Ok(true);
            }
            if self.index + 1 == self.operands.len() {
                self.state = CursorState::AfterLast;
                return Ok(false);
            }
            self.index += 1;
            self.operands[self.index].before_first(&self.prefix, 0)?;
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        close_all(&mut self.operands)
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let operands = duplicate_all(&self.operands)?;
        Ok(UnorderedAppend::try_new(operands)?.into())
    }

    fn row_count(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_count)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_upper_bound)
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        sum_of(&self.operands, Tuples::row_expected_count)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables().len())?;
        any_ever_unbound(&self.operands, column)
    }

    fn comparator(&self) -> Option<RowComparator> {
        match self.operands.as_slice() {
            [operand] => operand.comparator(),
            _ => None,
        }
    }

    fn has_no_duplicates(&self) -> bool {
        self.operands.len() == 1 && self.operands[0].has_no_duplicates()
    }
}

impl Display for UnorderedAppend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unordered append")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_ordered_append_merges() {
        let mut append = Tuples::from(
            OrderedAppend::try_new(vec![
                literal(&["x"], &[&[1], &[4], &[5]]),
                literal(&["x"], &[&[2], &[4]]),
                literal(&["x"], &[]),
            ])
            .unwrap(),
        );

        assert_eq!(
            ids(append.read_all_rows().unwrap()),
            vec![vec![1], vec![2], vec![4], vec![4], vec![5]]
        );
        assert_eq!(append.row_count().unwrap(), 5);
        assert_eq!(append.comparator(), Some(RowComparator::Lexicographic));
    }

    #[test]
    fn test_ordered_append_prefix_search() {
        let mut append = Tuples::from(
            OrderedAppend::try_new(vec![
                literal(&["x", "y"], &[&[1, 1], &[2, 7]]),
                literal(&["x", "y"], &[&[2, 3], &[3, 1]]),
            ])
            .unwrap(),
        );

        append.before_first(&[NodeId::from(2)], 0).unwrap();
        let mut rows = Vec::new();
        while append.next().unwrap() {
            rows.push(append.column_value(1).unwrap().as_u64());
        }
        assert_eq!(rows, vec![3, 7]);
    }

    #[test]
    fn test_union_compatibility_is_required() {
        let result = UnorderedAppend::try_new(vec![
            literal(&["x", "y"], &[]),
            literal(&["y", "x"], &[]),
        ]);
        assert!(matches!(result, Err(TuplesError::NotUnionCompatible(_))));

        let result = OrderedAppend::try_new(Vec::new());
        assert!(result.is_err_and(|e| e.is_argument_error()));
    }

    #[test]
    fn test_unordered_append_concatenates() {
        let unsorted = LiteralTuples::new(
            vec![Variable::new("x")],
            vec![vec![NodeId::from(9)], vec![NodeId::from(3)]],
        )
        .unwrap();
        let mut append = Tuples::from(
            UnorderedAppend::try_new(vec![unsorted.into(), literal(&["x"], &[&[1], &[3]])])
                .unwrap(),
        );

        assert_eq!(
            ids(append.read_all_rows().unwrap()),
            vec![vec![9], vec![3], vec![1], vec![3]]
        );

        append.before_first(&[NodeId::from(3)], 0).unwrap();
        let mut count = 0;
        while append.next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
