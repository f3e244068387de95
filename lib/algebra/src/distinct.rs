use crate::source::{fail_construction, CursorState};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{ArgumentError, NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::fmt::{Display, Formatter};

/// Removes duplicate rows from a sorted operand.
///
/// As duplicates are adjacent in a sorted sequence, each row is only compared to the previously
/// emitted row.
#[derive(Debug)]
pub struct Distinct {
    operand: Box<Tuples>,
    /// The emitted row.
    row: Vec<NodeId>,
    candidate: Vec<NodeId>,
    state: CursorState,
}

impl Distinct {
    /// Creates a new [Distinct].
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::UnsortedInput] if the operand has no sort order and an
    /// [ArgumentError] if the operand is already free of duplicates.
    pub fn try_new(operand: Tuples) -> TuplesResult<Self> {
        if operand.comparator().is_none() {
            return fail_construction(
                [operand],
                TuplesError::UnsortedInput(String::from(
                    "Removing duplicates requires a sorted operand.",
                )),
            );
        }
        if operand.has_no_duplicates() {
            return fail_construction(
                [operand],
                ArgumentError::Invalid(String::from("The operand has no duplicates.")),
            );
        }

        Ok(Self {
            row: Vec::with_capacity(operand.width()),
            candidate: Vec::with_capacity(operand.width()),
            operand: Box::new(operand),
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }
}

impl TupleSource for Distinct {
    fn name(&self) -> &str {
        "Distinct"
    }

    fn variables(&self) -> &[Variable] {
        self.operand.variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        self.state.ensure_on_row()?;
        self.operand.column_value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        self.operand.before_first(prefix, suffix_truncation)?;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        let has_previous = match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst => false,
            CursorState::OnRow => true,
        };

        while self.operand.next()? {
            self.operand.read_row(&mut self.candidate)?;
            if has_previous && self.candidate == self.row {
                continue;
            }
            std::mem::swap(&mut self.row, &mut self.candidate);
            self.state = CursorState::OnRow;
            return Ok(true);
        }
        self.state = CursorState::AfterLast;
        Ok(false)
    }

    fn close(&mut self) -> TuplesResult<()> {
        self.operand.close()
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        Ok(Distinct::try_new(self.operand.duplicate()?)?.into())
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
        true
    }
}

impl Display for Distinct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Distinct")
    }
}
