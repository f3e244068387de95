use crate::source::{
    check_column, close_all, duplicate_all, fail_construction, validate_prefix, CursorState,
};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{
    ArgumentError, NodeId, RowComparator, TuplesError, TuplesResult, Variable,
};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};

/// The natural join of any number of operands.
///
/// The join is evaluated with nested loops. Each operand is searched with a prefix built from
/// the values bound by the operands to its left (and the prefix of the caller), so the order
/// of the operands determines the cost of the evaluation. Advancing the join advances the
/// rightmost operand first and rolls over to the operands on the left once an operand is
/// exhausted.
///
/// [NodeId::UNBOUND] is compatible with any value. The output value of a variable is the
/// value of the leftmost operand that binds it, so a variable is only unbound in the output if
/// every operand that has the variable reports it as unbound.
#[derive(Debug)]
pub struct Join {
    operands: Vec<Tuples>,
    variables: Vec<Variable>,
    /// For each output column, the (operand, column) pairs that bind the variable.
    bindings: Vec<Vec<(usize, usize)>>,
    /// For each operand, the output column of each of its columns.
    operand_columns: Vec<Vec<usize>>,
    /// For each operand, whether each of its columns may be unbound.
    ever_unbound: Vec<Vec<bool>>,
    /// The current row of each positioned operand.
    rows: Vec<Vec<NodeId>>,
    /// The output row.
    row: Vec<NodeId>,
    prefix: Vec<NodeId>,
    search_prefix: Vec<NodeId>,
    state: CursorState,
}

impl Join {
    /// Creates a new [Join] that evaluates the `operands` from left to right.
    ///
    /// # Errors
    ///
    /// Fails if no operand is given.
    pub fn try_new(operands: Vec<Tuples>) -> TuplesResult<Self> {
        if operands.is_empty() {
            return fail_construction(operands, ArgumentError::TooFewOperands(1));
        }

        let ever_unbound = match compute_ever_unbound(&operands) {
            Ok(ever_unbound) => ever_unbound,
            Err(error) => return fail_construction(operands, error),
        };

        let mut variables = Vec::new();
        let mut bindings: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut operand_columns = Vec::with_capacity(operands.len());
        let mut output_columns = FxHashMap::default();
        for (operand_index, operand) in operands.iter().enumerate() {
            let mut columns = Vec::with_capacity(operand.width());
            for (column, variable) in operand.variables().iter().enumerate() {
                let output_column = *output_columns.entry(variable.clone()).or_insert_with(|| {
                    variables.push(variable.clone());
                    bindings.push(Vec::new());
                    variables.len() - 1
                });
                bindings[output_column].push((operand_index, column));
                columns.push(output_column);
            }
            operand_columns.push(columns);
        }

        tracing::trace!(
            "Creating join of {} operands with variables {variables:?}",
            operands.len()
        );
        Ok(Self {
            rows: vec![Vec::new(); operands.len()],
            row: Vec::with_capacity(variables.len()),
            operands,
            variables,
            bindings,
            operand_columns,
            ever_unbound,
            prefix: Vec::new(),
            search_prefix: Vec::new(),
            state: CursorState::Unpositioned,
        })
    }

    /// Returns the operands in evaluation order.
    pub fn operands(&self) -> &[Tuples] {
        &self.operands
    }

    /// Returns the operands in evaluation order, consuming the join.
    pub fn into_operands(self) -> Vec<Tuples> {
        self.operands
    }

    /// Returns the value of the output column `column` as bound by the caller prefix or the
    /// operands to the left of `operand`.
    fn left_value(&self, operand: usize, column: usize) -> NodeId {
        if let Some(value) = self.prefix.get(column) {
            return *value;
        }
        self.bindings[column]
            .iter()
            .take_while(|(index, _)| *index < operand)
            .map(|(index, operand_column)| self.rows[*index][*operand_column])
            .find(|value| value.is_bound())
            .unwrap_or(NodeId::UNBOUND)
    }

    /// Positions `operand` before the rows that match the values bound to its left.
    fn position(&mut self, operand: usize) -> TuplesResult<()> {
        let mut search_prefix = std::mem::take(&mut self.search_prefix);
        search_prefix.clear();
        for (column, output_column) in self.operand_columns[operand].iter().enumerate() {
            if self.ever_unbound[operand][column] {
                break;
            }
            let value = self.left_value(operand, *output_column);
            if value.is_unbound() {
                break;
            }
            search_prefix.push(value);
        }

        let result = self.operands[operand].before_first(&search_prefix, 0);
        self.search_prefix = search_prefix;
        result
    }

    /// Returns true if the current row of `operand` agrees with the values bound to its left.
    fn is_consistent(&self, operand: usize) -> bool {
        self.operand_columns[operand]
            .iter()
            .zip(&self.rows[operand])
            .all(|(output_column, value)| {
                let left = self.left_value(operand, *output_column);
                value.is_unbound() || left.is_unbound() || left == *value
            })
    }

    /// Advances `operand` to its next row that is consistent with the operands to its left.
    fn advance(&mut self, operand: usize) -> TuplesResult<bool> {
        while self.operands[operand].next()? {
            let mut row = std::mem::take(&mut self.rows[operand]);
            self.operands[operand].read_row(&mut row)?;
            self.rows[operand] = row;
            if self.is_consistent(operand) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Computes the output row from the current rows of the operands.
    fn build_row(&mut self) {
        self.row.clear();
        for bindings in &self.bindings {
            let value = bindings
                .iter()
                .map(|(index, column)| self.rows[*index][*column])
                .find(|value| value.is_bound())
                .unwrap_or(NodeId::UNBOUND);
            self.row.push(value);
        }
    }

    fn matches_prefix(&self) -> bool {
        self.prefix.iter().zip(&self.row).all(|(lhs, rhs)| lhs == rhs)
    }
}

fn compute_ever_unbound(operands: &[Tuples]) -> TuplesResult<Vec<Vec<bool>>> {
    operands
        .iter()
        .map(|operand| {
            (0..operand.width())
                .map(|column| operand.is_column_ever_unbound(column))
                .collect()
        })
        .collect()
}

impl TupleSource for Join {
    fn name(&self) -> &str {
        "Join"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables.len())?;
        self.state.ensure_on_row()?;
        Ok(self.row[column])
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables.len())?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
        self.position(0)?;
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    fn next(&mut self) -> TuplesResult<bool> {
        let last = self.operands.len() - 1;
        let mut operand = match self.state {
            CursorState::Unpositioned => return Err(TuplesError::CursorNotPositioned),
            CursorState::AfterLast => return Ok(false),
            CursorState::BeforeFirst => 0,
            CursorState::OnRow => last,
        };

        loop {
            if self.advance(operand)? {
                if operand < last {
                    operand += 1;
                    self.position(operand)?;
                    continue;
                }

                self.build_row();
                if self.matches_prefix() {
                    self.state = CursorState::OnRow;
                    return Ok(true);
                }
            } else if operand == 0 {
                self.state = CursorState::AfterLast;
                return Ok(false);
            } else {
                operand -= 1;
            }
        }
    }

    fn close(&mut self) -> TuplesResult<()> {
        close_all(&mut self.operands)
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        let operands = duplicate_all(&self.operands)?;
        Ok(Join::try_new(operands)?.into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.operands.iter().try_fold(1_u64, |product, operand| {
            Ok(product.saturating_mul(operand.row_upper_bound()?))
        })
    }

    /// The expected count of a group of operands that share variables is the minimum of their
    /// expected counts. Independent groups form a cartesian product.
    fn row_expected_count(&self) -> TuplesResult<u64> {
        let groups = variable_groups(self.operands.len(), &self.bindings);

        let mut minimum_per_group: FxHashMap<usize, u64> = FxHashMap::default();
        for (operand_index, operand) in self.operands.iter().enumerate() {
            let expected = operand.row_expected_count()?;
            minimum_per_group
                .entry(groups[operand_index])
                .and_modify(|minimum| *minimum = (*minimum).min(expected))
                .or_insert(expected);
        }

        Ok(minimum_per_group
            .values()
            .fold(1_u64, |product, minimum| product.saturating_mul(*minimum)))
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables.len())?;
        Ok(self.bindings[column]
            .iter()
            .all(|(operand, operand_column)| self.ever_unbound[*operand][*operand_column]))
    }

    fn comparator(&self) -> Option<RowComparator> {
        match self.operands.as_slice() {
            [operand] => operand.comparator(),
            _ => None,
        }
    }

    fn has_no_duplicates(&self) -> bool {
        self.operands.iter().all(Tuples::has_no_duplicates)
            && self.ever_unbound.iter().flatten().all(|unbound| !unbound)
    }
}

/// Partitions the operands into groups that are connected by shared variables.
///
/// Returns the representative of the group for each operand.
fn variable_groups(operand_count: usize, bindings: &[Vec<(usize, usize)>]) -> Vec<usize> {
    fn find(parents: &mut [usize], mut node: usize) -> usize {
        while parents[node] != node {
            parents[node] = parents[parents[node]];
            node = parents[node];
        }
        node
    }

    let mut parents = (0..operand_count).collect::<Vec<_>>();
    for binding in bindings {
        let mut operands = binding.iter().map(|(operand, _)| *operand);
        let Some(first) = operands.next() else {
            continue;
        };
        for other in operands {
            let lhs = find(&mut parents, first);
            let rhs = find(&mut parents, other);
            parents[rhs] = lhs;
        }
    }

    (0..operand_count)
        .map(|operand| find(&mut parents, operand))
        .collect()
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Join")
    }
}
