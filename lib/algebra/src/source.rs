use crate::Tuples;
use rdf_tuples_model::{
    Annotation, Cardinality, NodeId, RowComparator, TuplesError, TuplesResult, Variable,
};
use std::collections::BTreeSet;
use std::fmt::Debug;

/// The cursor contract implemented by every tuple sequence.
///
/// A sequence declares its variables (the columns), whether it is materialized, its sort order,
/// whether it is free of duplicates, and whether a column may contain [NodeId::UNBOUND]. The
/// only mutable state is the cursor position, which is either *before the first row*, *on a
/// row*, or *after the last row*.
///
/// Storage layers implement this trait for their index scans and wrap them with
/// [Tuples::from_source]. All operators of this crate implement it as well.
///
/// # Prefix Search
///
/// [TupleSource::before_first] restricts the following iteration to the rows whose leading
/// columns equal the given prefix. Callers must make sure that the sequence is sorted on (at
/// least) the prefix columns if the implementation relies on the order for the search.
pub trait TupleSource: Debug + Send {
    /// A short name used when rendering an operator tree.
    fn name(&self) -> &str {
        "Source"
    }

    /// Returns the variables of the sequence in column order.
    fn variables(&self) -> &[Variable];

    /// Returns the value of `column` in the current row.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::InvalidColumn] if the column is out of range and
    /// [TuplesError::CursorNotPositioned] if the cursor is not on a row.
    fn column_value(&self, column: usize) -> TuplesResult<NodeId>;

    /// Positions the cursor before the first row that starts with `prefix`.
    ///
    /// `prefix` must not contain [NodeId::UNBOUND] and must not be longer than the number of
    /// columns. Suffix truncation is reserved for storage layers; the operators of this crate
    /// fail with [TuplesError::SuffixTruncationUnsupported] for any value other than zero.
    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()>;

    /// Advances the cursor to the next row. Returns false if there are no more rows.
    fn next(&mut self) -> TuplesResult<bool>;

    /// Releases the resources held by this sequence, including all owned operands.
    fn close(&mut self) -> TuplesResult<()>;

    /// Creates an independent cursor over the same rows.
    ///
    /// The new cursor must be positioned with [TupleSource::before_first] before it is used.
    fn duplicate(&self) -> TuplesResult<Tuples>;

    /// Returns true if the rows are physically stored.
    fn is_materialized(&self) -> bool {
        false
    }

    /// Returns the exact number of rows.
    ///
    /// For sequences that are not materialized, this iterates over a duplicate.
    fn row_count(&self) -> TuplesResult<u64> {
        let mut duplicate = self.duplicate()?;
        let result = count_rows(&mut duplicate, u64::MAX);
        close_after(result, &mut duplicate)
    }

    /// Returns a cheap upper bound for the number of rows.
    fn row_upper_bound(&self) -> TuplesResult<u64>;

    /// Returns an estimate of the number of rows. Only used for planning.
    fn row_expected_count(&self) -> TuplesResult<u64> {
        self.row_upper_bound()
    }

    /// Classifies the number of rows.
    fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        if self.row_upper_bound()? == 0 {
            return Ok(Cardinality::Zero);
        }

        let mut duplicate = self.duplicate()?;
        let result = count_rows(&mut duplicate, 2);
        close_after(result, &mut duplicate).map(Cardinality::from_count)
    }

    /// Returns true if `column` contains [NodeId::UNBOUND] in any row.
    ///
    /// Returning true is always safe but prevents using the column as a search key.
    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool>;

    /// Returns the sort order of the sequence, if any.
    fn comparator(&self) -> Option<RowComparator>;

    /// Returns true if the sequence provably contains no duplicate rows.
    fn has_no_duplicates(&self) -> bool;

    /// Returns the planner hints of this sequence.
    fn annotations(&self) -> &[Annotation] {
        &[]
    }

    /// Rearranges the columns such that the `bound` variables form the leading columns.
    ///
    /// Only sequences with the [Annotation::DefinablePrefix] annotation support this.
    fn define_prefix(&mut self, _bound: &BTreeSet<Variable>) -> TuplesResult<()> {
        Err(TuplesError::Planning(String::from(
            "The sequence does not support defining its prefix.",
        )))
    }
}

/// Counts the rows of `tuples`, stopping at `limit`.
pub(crate) fn count_rows(tuples: &mut Tuples, limit: u64) -> TuplesResult<u64> {
    tuples.before_first(&[], 0)?;
    let mut count = 0;
    while count < limit && tuples.next()? {
        count += 1;
    }
    Ok(count)
}

/// Closes `tuples` after computing `result`. An error of the computation takes precedence.
pub(crate) fn close_after<T>(result: TuplesResult<T>, tuples: &mut Tuples) -> TuplesResult<T> {
    let close_result = tuples.close();
    let value = result?;
    close_result?;
    Ok(value)
}

/// Closes all `operands`, even if closing one of them fails.
///
/// Returns the first error encountered.
pub(crate) fn close_all<'tuples>(
    operands: impl IntoIterator<Item = &'tuples mut Tuples>,
) -> TuplesResult<()> {
    let mut first_error = None;
    for operand in operands {
        if let Err(error) = operand.close() {
            if first_error.is_none() {
                first_error = Some(error);
            } else {
                tracing::trace!("Suppressed error while closing operands: {error}");
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Duplicates every operand. If one duplication fails, the duplicates made so far are closed.
pub(crate) fn duplicate_all<'tuples>(
    operands: impl IntoIterator<Item = &'tuples Tuples>,
) -> TuplesResult<Vec<Tuples>> {
    let mut duplicates = Vec::new();
    for operand in operands {
        match operand.duplicate() {
            Ok(duplicate) => duplicates.push(duplicate),
            Err(error) => return fail_construction(duplicates, error),
        }
    }
    Ok(duplicates)
}

/// Duplicates the operands of a binary operator. Closes the left duplicate if the right one
/// fails.
pub(crate) fn duplicate_pair(left: &Tuples, right: &Tuples) -> TuplesResult<(Tuples, Tuples)> {
    let left = left.duplicate()?;
    match right.duplicate() {
        Ok(right) => Ok((left, right)),
        Err(error) => fail_construction([left], error),
    }
}

/// Closes the operands of a failed construction and returns `error`.
pub(crate) fn fail_construction<T>(
    operands: impl IntoIterator<Item = Tuples>,
    error: impl Into<TuplesError>,
) -> TuplesResult<T> {
    let mut operands = operands.into_iter().collect::<Vec<_>>();
    if let Err(close_error) = close_all(operands.iter_mut()) {
        tracing::trace!("Suppressed error while closing operands: {close_error}");
    }
    Err(error.into())
}

/// Validates the arguments of [TupleSource::before_first].
pub(crate) fn validate_prefix(
    prefix: &[NodeId],
    suffix_truncation: usize,
    width: usize,
) -> TuplesResult<()> {
    if suffix_truncation != 0 {
        return Err(TuplesError::SuffixTruncationUnsupported(suffix_truncation));
    }
    if prefix.len() > width {
        return Err(TuplesError::InvalidPrefix(format!(
            "The prefix has {} values but the sequence only has {width} columns.",
            prefix.len()
        )));
    }
    if prefix.iter().any(|value| value.is_unbound()) {
        return Err(TuplesError::InvalidPrefix(String::from(
            "The prefix must not contain unbound values.",
        )));
    }
    Ok(())
}

/// Checks whether `row` matches `prefix` in the columns `from..prefix.len()`.
pub(crate) fn matches_prefix(row: &[NodeId], prefix: &[NodeId], from: usize) -> bool {
    prefix
        .iter()
        .enumerate()
        .skip(from)
        .all(|(column, value)| row.get(column) == Some(value))
}

/// Validates a column index against the `width` of a sequence.
pub(crate) fn check_column(column: usize, width: usize) -> TuplesResult<()> {
    if column >= width {
        return Err(TuplesError::InvalidColumn { column, width });
    }
    Ok(())
}

/// Validates that `variables` contains no variable twice.
pub(crate) fn check_distinct_variables(variables: &[Variable]) -> TuplesResult<()> {
    let mut seen = BTreeSet::new();
    for variable in variables {
        if !seen.insert(variable) {
            return Err(rdf_tuples_model::ArgumentError::DuplicateVariable(variable.clone()).into());
        }
    }
    Ok(())
}

/// The position of a cursor of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum CursorState {
    /// [TupleSource::before_first] has not been called yet.
    #[default]
    Unpositioned,
    /// Positioned before the first row.
    BeforeFirst,
    /// Positioned on a row.
    OnRow,
    /// All rows have been visited.
    AfterLast,
}

impl CursorState {
    /// Fails with [TuplesError::CursorNotPositioned] unless the cursor is on a row.
    pub(crate) fn ensure_on_row(self) -> TuplesResult<()> {
        match self {
            CursorState::OnRow => Ok(()),
            _ => Err(TuplesError::CursorNotPositioned),
        }
    }
}
