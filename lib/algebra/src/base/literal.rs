use crate::source::{
    check_column, check_distinct_variables, close_after, matches_prefix, validate_prefix,
    CursorState,
};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{
    ArgumentError, Cardinality, NodeId, RowComparator, TuplesError, TuplesResult, Variable,
};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Immutable row storage that is shared between duplicates of a [LiteralTuples].
#[derive(Debug)]
struct RowBuffer {
    width: usize,
    row_count: usize,
    /// The values in row-major order.
    values: Vec<NodeId>,
    /// Whether a column contains [NodeId::UNBOUND] in any row.
    ever_unbound: Vec<bool>,
}

impl RowBuffer {
    fn try_new(width: usize, rows: Vec<Vec<NodeId>>) -> TuplesResult<Self> {
        let row_count = rows.len();
        let mut values = Vec::with_capacity(width * row_count);
        let mut ever_unbound = vec![false; width];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ArgumentError::RaggedRow {
                    row: i,
                    expected: width,
                    actual: row.len(),
                }
                .into());
            }
            for (column, value) in row.iter().enumerate() {
                ever_unbound[column] |= value.is_unbound();
            }
            values.extend(row);
        }

        Ok(Self {
            width,
            row_count,
            values,
            ever_unbound,
        })
    }

    fn row(&self, index: usize) -> &[NodeId] {
        &self.values[index * self.width..(index + 1) * self.width]
    }

    fn rows(&self) -> impl Iterator<Item = &[NodeId]> {
        (0..self.row_count).map(|i| self.row(i))
    }

    /// Returns the index of the first row for which `predicate` is false. The rows must be
    /// partitioned by `predicate`.
    fn partition_point(&self, predicate: impl Fn(&[NodeId]) -> bool) -> usize {
        let (mut low, mut high) = (0, self.row_count);
        while low < high {
            let mid = low + (high - low) / 2;
            if predicate(self.row(mid)) {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }
}

/// A materialized sequence over rows given by the caller.
///
/// The rows are stored in a buffer that is shared by all duplicates. If the rows are sorted
/// lexicographically, prefix searches use a binary search. Otherwise, the rows are scanned.
#[derive(Debug)]
pub struct LiteralTuples {
    variables: Vec<Variable>,
    rows: Arc<RowBuffer>,
    sorted: bool,
    /// A caller-defined order of the rows. Prefix searches still scan.
    custom_order: Option<RowComparator>,
    no_duplicates: bool,
    /// Whether closing the sequence twice is an error.
    strict_close: bool,
    closed: bool,
    state: CursorState,
    /// The prefix of the current search. Only checked if the rows are not sorted.
    prefix: Vec<NodeId>,
    current: usize,
    cursor: usize,
    end: usize,
}

impl LiteralTuples {
    /// Creates a new [LiteralTuples] with rows in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an [ArgumentError] if a variable occurs twice or a row does not have exactly one
    /// value per variable.
    pub fn new(variables: Vec<Variable>, rows: Vec<Vec<NodeId>>) -> TuplesResult<Self> {
        check_distinct_variables(&variables)?;
        let rows = RowBuffer::try_new(variables.len(), rows)?;
        let no_duplicates = rows.row_count <= 1;
        Ok(Self::from_buffer(variables, rows, false, no_duplicates))
    }

    /// Creates a new [LiteralTuples] and sorts the rows lexicographically.
    ///
    /// Duplicate rows are retained.
    pub fn new_sorted(
        variables: Vec<Variable>,
        mut rows: Vec<Vec<NodeId>>,
    ) -> TuplesResult<Self> {
        rows.sort_unstable();
        Self::from_sorted_rows(variables, rows)
    }

    /// Creates a new [LiteralTuples] from rows that are already sorted lexicographically.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::UnsortedInput] if the rows are not sorted.
    pub fn from_sorted_rows(
        variables: Vec<Variable>,
        rows: Vec<Vec<NodeId>>,
    ) -> TuplesResult<Self> {
        check_distinct_variables(&variables)?;
        let rows = RowBuffer::try_new(variables.len(), rows)?;
        if !RowComparator::Lexicographic.is_sorted(rows.rows()) {
            return Err(TuplesError::UnsortedInput(String::from(
                "The rows of a sorted literal sequence must be in lexicographic order.",
            )));
        }
        let no_duplicates = rows
            .rows()
            .zip(rows.rows().skip(1))
            .all(|(lhs, rhs)| lhs != rhs);
        Ok(Self::from_buffer(variables, rows, true, no_duplicates))
    }

    /// Drains `tuples` into a new [LiteralTuples] and closes it.
    ///
    /// The sort order is kept if the rows are in lexicographic order.
    pub fn materialize(mut tuples: Tuples) -> TuplesResult<Self> {
        let result = tuples.read_all_rows();
        let rows = close_after(result, &mut tuples)?;

        let variables = tuples.variables().to_vec();
        let sorted = tuples.comparator() == Some(RowComparator::Lexicographic);
        let no_duplicates = tuples.has_no_duplicates() || rows.len() <= 1;
        let rows = RowBuffer::try_new(variables.len(), rows)?;
        Ok(Self::from_buffer(variables, rows, sorted, no_duplicates))
    }

    /// Drains `tuples` into a new [LiteralTuples] that is sorted lexicographically.
    pub fn materialize_sorted(mut tuples: Tuples) -> TuplesResult<Self> {
        let result = tuples.read_all_rows();
        let mut rows = close_after(result, &mut tuples)?;
        if tuples.comparator() != Some(RowComparator::Lexicographic) {
            rows.sort_unstable();
        }

        let mut literal = Self::from_sorted_rows(tuples.variables().to_vec(), rows)?;
        literal.no_duplicates |= tuples.has_no_duplicates();
        Ok(literal)
    }

    /// Drains `tuples` into a new [LiteralTuples] whose rows are ordered by `comparator`.
    pub fn materialize_ordered(
        mut tuples: Tuples,
        comparator: RowComparator,
    ) -> TuplesResult<Self> {
        let RowComparator::Custom(_) = &comparator else {
            return Self::materialize_sorted(tuples);
        };

        let result = tuples.read_all_rows();
        let mut rows = close_after(result, &mut tuples)?;
        if tuples.comparator().as_ref() != Some(&comparator) {
            rows.sort_by(|lhs, rhs| comparator.compare(lhs, rhs));
        }

        let variables = tuples.variables().to_vec();
        let no_duplicates = tuples.has_no_duplicates() || rows.len() <= 1;
        let rows = RowBuffer::try_new(variables.len(), rows)?;
        let mut literal = Self::from_buffer(variables, rows, false, no_duplicates);
        literal.custom_order = Some(comparator);
        Ok(literal)
    }

    /// Makes closing the sequence a second time fail with [TuplesError::AlreadyClosed].
    #[must_use]
    pub fn with_strict_close(mut self) -> Self {
        self.strict_close = true;
        self
    }

    /// Returns true if the rows are sorted lexicographically.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    fn from_buffer(
        variables: Vec<Variable>,
        rows: RowBuffer,
        sorted: bool,
        no_duplicates: bool,
    ) -> Self {
        Self {
            variables,
            rows: Arc::new(rows),
            sorted,
            custom_order: None,
            no_duplicates,
            strict_close: false,
            closed: false,
            state: CursorState::Unpositioned,
            prefix: Vec::new(),
            current: 0,
            cursor: 0,
            end: 0,
        }
    }

    fn ensure_open(&self) -> TuplesResult<()> {
        if self.closed {
            return Err(TuplesError::AlreadyClosed);
        }
        Ok(())
    }
}

impl TupleSource for LiteralTuples {
    fn name(&self) -> &str {
        "Literal"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        self.ensure_open()?;
        check_column(column, self.rows.width)?;
        self.state.ensure_on_row()?;
        Ok(self.rows.row(self.current)[column])
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        self.ensure_open()?;
        validate_prefix(prefix, suffix_truncation, self.rows.width)?;

        self.prefix.clear();
        if self.sorted && !prefix.is_empty() {
            let len = prefix.len();
            self.cursor = self.rows.partition_point(|row| &row[..len] < prefix);
            self.end = self.rows.partition_point(|row| &row[..len] <= prefix);
        } else {
            self.prefix.extend_from_slice(prefix);
            self.cursor = 0;
            self.end = self.rows.row_count;
        }
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        self.ensure_open()?;
        if self.state == CursorState::Unpositioned {
            return Err(TuplesError::CursorNotPositioned);
        }

        while self.cursor < self.end {
            let index = self.cursor;
            self.cursor += 1;
            if matches_prefix(self.rows.row(index), &self.prefix, 0) {
                self.current = index;
                self.state = CursorState::OnRow;
                return Ok(true);
            }
        }
        self.state = CursorState::AfterLast;
        Ok(false)
    }

    fn close(&mut self) -> TuplesResult<()> {
        if self.closed && self.strict_close {
            return Err(TuplesError::AlreadyClosed);
        }
        self.closed = true;
        Ok(())
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        self.ensure_open()?;
        let duplicate = Self {
            variables: self.variables.clone(),
            rows: Arc::clone(&self.rows),
            sorted: self.sorted,
            custom_order: self.custom_order.clone(),
            no_duplicates: self.no_duplicates,
            strict_close: self.strict_close,
            closed: false,
            state: CursorState::Unpositioned,
            prefix: Vec::new(),
            current: 0,
            cursor: 0,
            end: 0,
        };
        Ok(duplicate.into())
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn row_count(&self) -> TuplesResult<u64> {
        Ok(self.rows.row_count as u64)
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.row_count()
    }

    fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        self.row_count().map(Cardinality::from_count)
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.rows.width)?;
        Ok(self.rows.ever_unbound[column])
    }

    fn comparator(&self) -> Option<RowComparator> {
        if self.sorted {
            Some(RowComparator::Lexicographic)
        } else {
            self.custom_order.clone()
        }
    }

    fn has_no_duplicates(&self) -> bool {
        self.no_duplicates
    }

    /// Moves the `bound` variables to the front and re-sorts the rows.
    fn define_prefix(&mut self, bound: &BTreeSet<Variable>) -> TuplesResult<()> {
        self.ensure_open()?;
        let (leading, trailing): (Vec<usize>, Vec<usize>) =
            (0..self.variables.len()).partition(|i| bound.contains(&self.variables[*i]));
        let order = leading.into_iter().chain(trailing).collect::<Vec<_>>();

        let mut rows = self
            .rows
            .rows()
            .map(|row| order.iter().map(|i| row[*i]).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        rows.sort_unstable();
        let variables = order.iter().map(|i| self.variables[*i].clone()).collect();

        let buffer = RowBuffer::try_new(self.variables.len(), rows)?;
        self.variables = variables;
        self.rows = Arc::new(buffer);
        self.sorted = true;
        self.custom_order = None;
        self.state = CursorState::Unpositioned;
        Ok(())
    }
}

impl Display for LiteralTuples {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let count = self.rows.row_count;
        let unit = if count == 1 { "row" } else { "rows" };
        if self.sorted {
            write!(f, "Literal ({count} {unit}, sorted)")
        } else if let Some(order) = &self.custom_order {
            write!(f, "Literal ({count} {unit}, sorted by {order})")
        } else {
            write!(f, "Literal ({count} {unit})")
        }
    }
}
