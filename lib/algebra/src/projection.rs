use crate::source::{
    check_column, check_distinct_variables, fail_construction, validate_prefix, CursorState,
};
use crate::{TupleSource, Tuples};
use rdf_tuples_model::{ArgumentError, NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::fmt::{Display, Formatter};

/// The flavor of a [Projection].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Keeps a subset of the columns in their original order. Columns may be renamed.
    Ordered,
    /// Selects and reorders columns. Variables the operand does not have are always unbound.
    Unordered,
    /// Appends columns that are always unbound.
    Expanded,
}

/// Maps the columns of the operand to new columns.
#[derive(Debug)]
pub struct Projection {
    kind: ProjectionKind,
    operand: Box<Tuples>,
    variables: Vec<Variable>,
    /// The operand column of each column, or [None] if the column is always unbound.
    mapping: Vec<Option<usize>>,
    /// The prefix of the current search.
    prefix: Vec<NodeId>,
    /// The length of the prefix that has been passed to the operand.
    operand_prefix_len: usize,
    state: CursorState,
}

impl Projection {
    /// Creates a projection onto `variables`, which must appear in the operand in the same
    /// order.
    pub fn ordered(operand: Tuples, variables: Vec<Variable>) -> TuplesResult<Self> {
        if let Err(error) = check_distinct_variables(&variables) {
            return fail_construction([operand], error);
        }

        let mut mapping = Vec::with_capacity(variables.len());
        for variable in &variables {
            match operand.column_index(variable) {
                Ok(column) => mapping.push(Some(column)),
                Err(error) => return fail_construction([operand], error),
            }
        }
        if !mapping.is_sorted() {
            return fail_construction(
                [operand],
                ArgumentError::Invalid(String::from(
                    "An ordered projection must retain the order of the columns.",
                )),
            );
        }

        Ok(Self::new(ProjectionKind::Ordered, operand, variables, mapping))
    }

    /// Renames the columns of the operand according to `renames`. Other columns keep their
    /// name.
    pub fn renamed(operand: Tuples, renames: &[(Variable, Variable)]) -> TuplesResult<Self> {
        for (from, _) in renames {
            if !operand.has_variable(from) {
                return fail_construction([operand], TuplesError::NoSuchVariable(from.clone()));
            }
        }

        let variables = operand
            .variables()
            .iter()
            .map(|variable| {
                renames
                    .iter()
                    .find(|(from, _)| from == variable)
                    .map_or_else(|| variable.clone(), |(_, to)| to.clone())
            })
            .collect::<Vec<_>>();
        if let Err(error) = check_distinct_variables(&variables) {
            return fail_construction([operand], error);
        }

        let mapping = (0..variables.len()).map(Some).collect();
        Ok(Self::new(ProjectionKind::Ordered, operand, variables, mapping))
    }

    /// Creates a projection onto `variables` in any order. Variables that are not part of the
    /// operand are always unbound.
    pub fn unordered(operand: Tuples, variables: Vec<Variable>) -> TuplesResult<Self> {
        if let Err(error) = check_distinct_variables(&variables) {
            return fail_construction([operand], error);
        }

        let mapping = variables
            .iter()
            .map(|variable| operand.variables().iter().position(|v| v == variable))
            .collect();
        Ok(Self::new(ProjectionKind::Unordered, operand, variables, mapping))
    }

    /// Appends the always-unbound `new_variables` to the columns of the operand.
    pub fn expanded(operand: Tuples, new_variables: Vec<Variable>) -> TuplesResult<Self> {
        let mut variables = operand.variables().to_vec();
        variables.extend(new_variables);
        if let Err(error) = check_distinct_variables(&variables) {
            return fail_construction([operand], error);
        }

        let width = operand.width();
        let mapping = (0..variables.len())
            .map(|i| (i < width).then_some(i))
            .collect();
        Ok(Self::new(ProjectionKind::Expanded, operand, variables, mapping))
    }

    fn new(
        kind: ProjectionKind,
        operand: Tuples,
        variables: Vec<Variable>,
        mapping: Vec<Option<usize>>,
    ) -> Self {
        tracing::trace!("Creating {kind:?} projection onto {variables:?}");
        Self {
            kind,
            operand: Box::new(operand),
            variables,
            mapping,
            prefix: Vec::new(),
            operand_prefix_len: 0,
            state: CursorState::Unpositioned,
        }
    }

    /// Returns the kind of the projection.
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    /// Returns the operand.
    pub fn operand(&self) -> &Tuples {
        &self.operand
    }

    /// The number of leading columns that are identical to the leading columns of the operand.
    fn identity_prefix_len(&self) -> usize {
        self.mapping
            .iter()
            .enumerate()
            .take_while(|(i, column)| **column == Some(*i))
            .count()
    }

    fn value(&self, column: usize) -> TuplesResult<NodeId> {
        match self.mapping[column] {
            Some(column) => self.operand.column_value(column),
            None => Ok(NodeId::UNBOUND),
        }
    }

    /// Checks the part of the prefix that has not been passed to the operand.
    fn matches_prefix(&self) -> TuplesResult<bool> {
        for column in self.operand_prefix_len..self.prefix.len() {
            if self.value(column)? != self.prefix[column] {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn keeps_all_operand_columns(&self) -> bool {
        (0..self.operand.width()).all(|column| self.mapping.contains(&Some(column)))
    }
}

impl TupleSource for Projection {
    fn name(&self) -> &str {
        "Projection"
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        check_column(column, self.variables.len())?;
        self.state.ensure_on_row()?;
        self.value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        validate_prefix(prefix, suffix_truncation, self.variables.len())?;
        self.operand_prefix_len = self.identity_prefix_len().min(prefix.len());
        self.operand.before_first(&prefix[..self.operand_prefix_len], 0)?;
        self.prefix.clear();
        self.prefix.extend_from_slice(prefix);
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
            if self.matches_prefix()? {
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
        let projection = Self::new(
            self.kind,
            self.operand.duplicate()?,
            self.variables.clone(),
            self.mapping.clone(),
        );
        Ok(projection.into())
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.operand.row_upper_bound()
    }

    fn row_expected_count(&self) -> TuplesResult<u64> {
        self.operand.row_expected_count()
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        check_column(column, self.variables.len())?;
        match self.mapping[column] {
            Some(column) => self.operand.is_column_ever_unbound(column),
            None => Ok(true),
        }
    }

    fn comparator(&self) -> Option<RowComparator> {
        let comparator = self.operand.comparator()?;
        match self.kind {
            ProjectionKind::Unordered => None,
            // Unbound columns at the end never break a tie of the lexicographic order.
            ProjectionKind::Expanded => {
                (comparator == RowComparator::Lexicographic).then_some(comparator)
            }
            // Dropping trailing columns keeps the lexicographic order. Other orders only
            // survive if no column is dropped.
            ProjectionKind::Ordered => {
                let identity = self.identity_prefix_len() == self.variables.len();
                let full = self.variables.len() == self.operand.width();
                match comparator {
                    RowComparator::Lexicographic if identity => Some(comparator),
                    RowComparator::Custom(_) if identity && full => Some(comparator),
                    _ => None,
                }
            }
        }
    }

    fn has_no_duplicates(&self) -> bool {
        self.operand.has_no_duplicates() && self.keeps_all_operand_columns()
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ProjectionKind::Ordered => f.write_str("Projection"),
            ProjectionKind::Unordered => f.write_str("Unordered projection"),
            ProjectionKind::Expanded => f.write_str("Expanded projection"),
        }
    }
}
