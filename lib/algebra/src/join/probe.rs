use crate::source::fail_construction;
use crate::Tuples;
use rdf_tuples_model::{NodeId, TuplesResult, Variable};

/// Searches the right operand of a binary join for rows that are compatible with a left row.
///
/// The right operand is searched with a prefix built from the values of the left row, as long
/// as its leading columns are shared with the left operand and never unbound. The remaining
/// shared columns are checked row by row.
#[derive(Debug)]
pub(crate) struct Probe {
    right: Box<Tuples>,
    /// Pairs of (left column, right column) that bind the same variable.
    shared: Vec<(usize, usize)>,
    /// The right columns that are not shared with the left operand.
    right_only: Vec<usize>,
    /// The left columns that form the search prefix of the right operand.
    search: Vec<usize>,
    prefix: Vec<NodeId>,
    row: Vec<NodeId>,
}

impl Probe {
    /// Creates a new [Probe] that joins `right` to a left operand with `left_variables`.
    ///
    /// Closes `right` if its ever-unbound flags cannot be determined.
    pub(crate) fn try_new(left_variables: &[Variable], right: Tuples) -> TuplesResult<Self> {
        let mut shared = Vec::new();
        let mut right_only = Vec::new();
        for (right_column, variable) in right.variables().iter().enumerate() {
            match left_variables.iter().position(|v| v == variable) {
                Some(left_column) => shared.push((left_column, right_column)),
                None => right_only.push(right_column),
            }
        }

        let mut search = Vec::new();
        if right.comparator().is_some() || right.is_materialized() {
            for right_column in 0..right.width() {
                let Some((left_column, _)) = shared.iter().find(|(_, rc)| *rc == right_column)
                else {
                    break;
                };
                match right.is_column_ever_unbound(right_column) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(error) => return fail_construction([right], error),
                }
                search.push(*left_column);
            }
        }

        Ok(Self {
            row: Vec::with_capacity(right.width()),
            right: Box::new(right),
            shared,
            right_only,
            search,
            prefix: Vec::new(),
        })
    }

    pub(crate) fn right(&self) -> &Tuples {
        &self.right
    }

    pub(crate) fn right_mut(&mut self) -> &mut Tuples {
        &mut self.right
    }

    pub(crate) fn into_right(self) -> Tuples {
        *self.right
    }

    /// Returns true if the operands share at least one variable.
    pub(crate) fn has_shared_variables(&self) -> bool {
        !self.shared.is_empty()
    }

    pub(crate) fn shared(&self) -> &[(usize, usize)] {
        &self.shared
    }

    #[cfg(test)]
    pub(crate) fn right_only(&self) -> &[usize] {
        &self.right_only
    }

    /// Returns the variables of the combined row, the left variables followed by the variables
    /// that only the right operand binds.
    pub(crate) fn combined_variables(&self, left_variables: &[Variable]) -> Vec<Variable> {
        let right_variables = self.right.variables();
        left_variables
            .iter()
            .chain(self.right_only.iter().map(|column| &right_variables[*column]))
            .cloned()
            .collect()
    }

    /// Positions the right operand before the rows that may be compatible with `left_row`.
    pub(crate) fn position(&mut self, left_row: &[NodeId]) -> TuplesResult<()> {
        self.prefix.clear();
        for left_column in &self.search {
            let value = left_row[*left_column];
            if value.is_unbound() {
                break;
            }
            self.prefix.push(value);
        }
        self.right.before_first(&self.prefix, 0)
    }

    /// Advances to the next right row that is compatible with `left_row`.
    ///
    /// Returns [None] if there is no further compatible row. Otherwise, returns whether the
    /// two rows bind at least one shared variable to the same value.
    pub(crate) fn next_compatible(&mut self, left_row: &[NodeId]) -> TuplesResult<Option<bool>> {
        while self.right.next()? {
            self.right.read_row(&mut self.row)?;

            let mut compatible = true;
            let mut intersects = false;
            for (left_column, right_column) in &self.shared {
                let left = left_row[*left_column];
                let right = self.row[*right_column];
                if left.is_unbound() || right.is_unbound() {
                    continue;
                }
                if left != right {
                    compatible = false;
                    break;
                }
                intersects = true;
            }

            if compatible {
                return Ok(Some(intersects));
            }
        }
        Ok(None)
    }

    /// Writes the combination of `left_row` and the current right row to `output`.
    ///
    /// Unbound shared values of the left row are taken from the right row.
    pub(crate) fn combine(&self, left_row: &[NodeId], output: &mut Vec<NodeId>) {
        output.clear();
        output.extend_from_slice(left_row);
        for (left_column, right_column) in &self.shared {
            if output[*left_column].is_unbound() {
                output[*left_column] = self.row[*right_column];
            }
        }
        output.extend(self.right_only.iter().map(|column| self.row[*column]));
    }

    /// Writes `left_row` followed by unbound values for the right-only columns to `output`.
    pub(crate) fn combine_unmatched(&self, left_row: &[NodeId], output: &mut Vec<NodeId>) {
        output.clear();
        output.extend_from_slice(left_row);
        output.extend(self.right_only.iter().map(|_| NodeId::UNBOUND));
    }
}
