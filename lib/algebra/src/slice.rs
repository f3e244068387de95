use crate::source::{validate_prefix, CursorState};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::fmt::{Display, Formatter};

/// Emits at most `limit` rows of the operand.
///
/// The limit counts the rows of the whole operand. A search started with
/// [TupleSource::before_first] emits the rows within the limit that start with the prefix.
#[derive(Debug)]
pub struct Limit {
    operand: Box<Tuples>,
    limit: u64,
    /// The number of operand rows read since the last [TupleSource::before_first].
    read: u64,
    prefix: Vec<NodeId>,
    state: CursorState,
}

impl Limit {
    /// Creates a new [Limit].
    pub fn new(operand: Tuples, limit: u64) -> Self {
        Self {
            operand: Box::new(operand),
            limit,
            read: 0,
            prefix: Vec::new(),
            state: CursorState::Unpositioned,
        }
    }

    /// Returns the operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }
}

impl TupleSource for Limit {
    fn name(&self) -> &str {
        "Limit"
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
        self.operand.before_first(&[], 0)?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
        self.read = 0;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }

        while self.read < self.limit && self.operand.next()? {
            self.read += 1;
            if starts_with_prefix(&self.operand, &self.prefix)? {
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
        Ok(Limit::new(self.operand.duplicate()?, self.limit).into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        Ok(self.operand.row_upper_bound()?.min(self.limit))
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        Ok(self.operand.row_expected_count()?.min(self.limit))
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

impl Display for Limit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Limit {}", self.limit)
    }
}

/// Skips the first `offset` rows of the operand.
///
/// The rows are skipped lazily on the first call to [TupleSource::next] after each
/// [TupleSource::before_first]. As for [Limit], the skipped rows are counted over the whole
/// operand and the prefix only selects among the remaining rows.
#[derive(Debug)]
pub struct Offset {
    operand: Box<Tuples>,
    offset: u64,
    prefix: Vec<NodeId>,
    state: CursorState,
}

impl Offset {
    /// Creates a new [Offset].
    pub fn new(operand: Tuples, offset: u64) -> Self {
        Self {
            operand: Box::new(operand),
            offset,
            prefix: Vec::new(),
            state: CursorState::Unpositioned,
        }
    }

    /// Returns the operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }
}

impl TupleSource for Offset {
    fn name(&self) -> &str {
        "Offset"
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
        self.operand.before_first(&[], 0)?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst => {
                for _ in 0..self.offset {
                    if !self.operand.next()? {
                        self.state = CursorState::AfterLast;
                        return Ok(false);
                    }
                }
            }
            CursorState::OnRow => {}
        }

        while self.operand.next()? {
            if starts_with_prefix(&self.operand, &self.prefix)? {
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
        Ok(Offset::new(self.operand.duplicate()?, self.offset).into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        Ok(self.operand.row_upper_bound()?.saturating_sub(self.offset))
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        Ok(self.operand.row_expected_count()?.saturating_sub(self.offset))
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

impl Display for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Offset {}", self.offset)
    }
}

/// Checks whether the current row of `operand` starts with `prefix`.
fn starts_with_prefix(operand: &Tuples, prefix: &[NodeId]) -> TuplesResult<bool> {
    for (column, value) in prefix.iter().enumerate() {
        if operand.column_value(column)? != *value {
            return Ok(false);
        }
    }
    Ok(true)
}
