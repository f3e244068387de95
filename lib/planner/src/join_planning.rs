use itertools::Itertools;
use rdf_tuples_algebra::{Join, LiteralTuples, Tuples, TuplesKind};
use rdf_tuples_model::{
    Annotation, AnnotationKind, Cardinality, NodeId, TuplesError, TuplesResult, Variable,
};
use std::collections::BTreeSet;

/// Closes sequences that the planner no longer needs.
///
/// Errors are only logged as the sequences have not produced any rows for the caller.
pub(crate) fn discard(operands: impl IntoIterator<Item = Tuples>) {
    for mut operand in operands {
        if let Err(error) = operand.close() {
            tracing::debug!("Ignoring error while closing a discarded operand: {error}");
        }
    }
}

/// Returns the variables of all `operands` in the order of their first appearance.
pub(crate) fn union_variables(operands: &[Tuples]) -> Vec<Variable> {
    operands
        .iter()
        .flat_map(Tuples::variables)
        .unique()
        .cloned()
        .collect()
}

/// Replaces joins annotated with [Annotation::Reorderable] by their operands.
pub(crate) fn flatten(operands: Vec<Tuples>) -> Vec<Tuples> {
    let mut result = Vec::with_capacity(operands.len());
    let mut stack = operands;
    stack.reverse();

    while let Some(operand) = stack.pop() {
        let reorderable = operand.annotation(AnnotationKind::Reorderable).is_some()
            && matches!(operand.kind(), TuplesKind::Join(_));
        if !reorderable {
            result.push(operand);
            continue;
        }

        if let TuplesKind::Join(join) = operand.into_kind() {
            stack.extend(join.into_operands().into_iter().rev());
        }
    }
    result
}

/// The combined row of all operands with a single row.
#[derive(Debug, Default)]
pub(crate) struct BindingRow {
    variables: Vec<Variable>,
    values: Vec<NodeId>,
}

impl BindingRow {
    pub(crate) fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub(crate) fn bound_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .zip(&self.values)
            .filter(|(_, value)| value.is_bound())
            .map(|(variable, _)| variable)
    }

    fn is_bound(&self, variable: &Variable) -> bool {
        self.bound_variables().any(|bound| bound == variable)
    }

    /// Adds a row to the binding row. Returns false if the row conflicts with a bound value.
    fn merge(&mut self, variables: &[Variable], values: &[NodeId]) -> bool {
        for (variable, value) in variables.iter().zip(values) {
            let Some(index) = self.variables.iter().position(|v| v == variable) else {
                self.variables.push(variable.clone());
                self.values.push(*value);
                continue;
            };

            let current = self.values[index];
            if current.is_unbound() {
                self.values[index] = *value;
            } else if value.is_bound() && current != *value {
                return false;
            }
        }
        true
    }

    /// Creates a sequence with the binding row as its only row.
    pub(crate) fn to_tuples(&self) -> TuplesResult<Tuples> {
        let literal =
            LiteralTuples::new_sorted(self.variables.clone(), vec![self.values.clone()])?;
        Ok(literal.into())
    }
}

/// The outcome of unifying the operands of a join.
#[derive(Debug)]
pub(crate) enum Unification {
    /// The join has no rows. All operands have been closed.
    Empty,
    /// The operands with more than one row, and the folded rows of the others.
    Unified {
        bindings: BindingRow,
        operands: Vec<Tuples>,
    },
}

/// Folds the operands that have at most one row into a [BindingRow].
///
/// Folding repeats until no operand, constrained by the bound values, has at most one row.
pub(crate) fn unify(mut operands: Vec<Tuples>) -> TuplesResult<Unification> {
    match fold_single_rows(&mut operands) {
        Ok(Some(bindings)) => Ok(Unification::Unified { bindings, operands }),
        Ok(None) => {
            discard(operands);
            Ok(Unification::Empty)
        }
        Err(error) => {
            discard(operands);
            Err(error)
        }
    }
}

/// Returns [None] if the join is known to have no rows.
fn fold_single_rows(operands: &mut Vec<Tuples>) -> TuplesResult<Option<BindingRow>> {
    let mut bindings = BindingRow::default();

    let mut index = 0;
    while index < operands.len() {
        match operands[index].row_cardinality()? {
            Cardinality::Zero => {
                tracing::debug!("Join operand {index} is empty");
                return Ok(None);
            }
            Cardinality::One => {
                let mut operand = operands.remove(index);
                let row = read_single_row(&mut operand)?;
                if !bindings.merge(operand.variables(), &row) {
                    tracing::debug!("Join operand {index} conflicts with the bound values");
                    return Ok(None);
                }
            }
            Cardinality::Many => index += 1,
        }
    }

    while let Some(folded) = fold_constrained(operands, &mut bindings)? {
        match folded {
            Folded::Row(index) => {
                tracing::debug!("Join operand {index} has a single row for the bound values");
                operands.remove(index).close()?;
            }
            Folded::Conflict(index) => {
                tracing::debug!("Join operand {index} has no rows for the bound values");
                return Ok(None);
            }
        }
    }
    Ok(Some(bindings))
}

enum Folded {
    Row(usize),
    Conflict(usize),
}

/// Looks for an operand that has at most one row once the variables of `bindings` are bound.
///
/// If such an operand has one row, the row is merged into `bindings`.
fn fold_constrained(
    operands: &[Tuples],
    bindings: &mut BindingRow,
) -> TuplesResult<Option<Folded>> {
    for (index, operand) in operands.iter().enumerate() {
        let constrains = operand
            .variables()
            .iter()
            .any(|variable| bindings.is_bound(variable));
        if !constrains {
            continue;
        }

        let mut constrained = Tuples::from(Join::try_new(vec![
            bindings.to_tuples()?,
            operand.duplicate()?,
        ])?);
        match constrained.row_cardinality() {
            Ok(Cardinality::Zero) => {
                constrained.close()?;
                return Ok(Some(Folded::Conflict(index)));
            }
            Ok(Cardinality::One) => {
                let row = read_single_row(&mut constrained)?;
                if !bindings.merge(constrained.variables(), &row) {
                    return Ok(Some(Folded::Conflict(index)));
                }
                return Ok(Some(Folded::Row(index)));
            }
            Ok(Cardinality::Many) => constrained.close()?,
            Err(error) => {
                discard([constrained]);
                return Err(error);
            }
        }
    }
    Ok(None)
}

/// Reads the only row of `tuples` and closes it.
fn read_single_row(tuples: &mut Tuples) -> TuplesResult<Vec<NodeId>> {
    let mut read = || -> TuplesResult<Vec<NodeId>> {
        tuples.rewind()?;
        let mut row = Vec::with_capacity(tuples.width());
        if tuples.next()? {
            tuples.read_row(&mut row)?;
        }
        Ok(row)
    };
    let result = read();
    let close_result = tuples.close();
    let row = result?;
    close_result?;
    Ok(row)
}

/// Orders `operands` greedily by their weighted expected row count.
///
/// `bound` holds the variables bound before the first operand is evaluated.
pub(crate) fn order(
    operands: Vec<Tuples>,
    bound: BTreeSet<Variable>,
    bound_column_discount: u64,
) -> TuplesResult<Vec<Tuples>> {
    let mut remaining = operands.into_iter().enumerate().collect::<Vec<_>>();
    let mut ordered = Vec::with_capacity(remaining.len());
    match place_all(&mut remaining, &mut ordered, bound, bound_column_discount) {
        Ok(()) => Ok(ordered),
        Err(error) => {
            discard(ordered);
            discard(remaining.into_iter().map(|(_, operand)| operand));
            Err(error)
        }
    }
}

fn place_all(
    remaining: &mut Vec<(usize, Tuples)>,
    ordered: &mut Vec<Tuples>,
    mut bound: BTreeSet<Variable>,
    bound_column_discount: u64,
) -> TuplesResult<()> {
    while !remaining.is_empty() {
        let Some(position) = choose_next(remaining, &bound, bound_column_discount)? else {
            return Err(TuplesError::Planning(format!(
                "No join operand can be evaluated with the bound variables [{}]. Remaining: {}",
                bound.iter().join(" "),
                remaining
                    .iter()
                    .map(|(_, operand)| format!("[{}]", operand.variables().iter().join(" ")))
                    .join(", ")
            )));
        };

        let (index, mut operand) = remaining.remove(position);
        if operand.annotation(AnnotationKind::DefinablePrefix).is_some() {
            let defined = operand
                .variables()
                .iter()
                .filter(|variable| bound.contains(*variable))
                .cloned()
                .collect();
            if let Err(error) = operand.define_prefix(&defined) {
                discard([operand]);
                return Err(error);
            }
        }

        tracing::debug!(
            "Placing join operand {index} [{}] at position {}",
            operand.variables().iter().join(" "),
            ordered.len()
        );
        bound.extend(operand.variables().iter().cloned());
        ordered.push(operand);
    }
    Ok(())
}

/// Returns the position of the eligible operand with the lowest weighted expected count.
///
/// `remaining` keeps the original order of the operands, hence ties go to the operand that
/// came first.
fn choose_next(
    remaining: &[(usize, Tuples)],
    bound: &BTreeSet<Variable>,
    bound_column_discount: u64,
) -> TuplesResult<Option<usize>> {
    let mut best: Option<(usize, u64)> = None;
    for (position, (_, operand)) in remaining.iter().enumerate() {
        if let Some(Annotation::MandatoryBindings(required)) =
            operand.annotation(AnnotationKind::MandatoryBindings)
        {
            if !required.is_subset(bound) {
                continue;
            }
        }

        let weight = weighted_expected_count(operand, bound, bound_column_discount)?;
        if best.is_none_or(|(_, best_weight)| weight < best_weight) {
            best = Some((position, weight));
        }
    }
    Ok(best.map(|(position, _)| position))
}

/// Divides the expected row count by the discount for each bound column.
pub(crate) fn weighted_expected_count(
    operand: &Tuples,
    bound: &BTreeSet<Variable>,
    bound_column_discount: u64,
) -> TuplesResult<u64> {
    let bound_columns = operand
        .variables()
        .iter()
        .filter(|variable| bound.contains(*variable))
        .count();
    let exponent = u32::try_from(bound_columns).unwrap_or(u32::MAX);
    let divisor = bound_column_discount.max(1).saturating_pow(exponent);
    Ok(operand.row_expected_count()? / divisor)
}
