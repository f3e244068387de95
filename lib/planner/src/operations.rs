use crate::join_planning::{discard, flatten, order, union_variables, unify, Unification};
use crate::options::{OptimizationLevel, PlannerOptions};
use itertools::Itertools;
use rdf_tuples_algebra::expr::Expression;
use rdf_tuples_algebra::{
    Assignment, Bind, Condition, Distinct, EmptyTuples, Filter, Join, Limit, LiteralTuples, Minus,
    Offset, OptionalJoin, OrderedAppend, Projection, RowPredicate, Tuples,
};
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, ValueResolver, Variable};
use std::sync::Arc;

/// The entry point for building operator trees.
///
/// In contrast to the constructors of the operators, the operations of [TuplesOperations]
/// establish the preconditions of an operator themselves (e.g., by sorting an operand) and
/// optimize the resulting tree. For joins, this includes folding operands with a single row
/// and choosing the evaluation order of the operands.
///
/// All operations take ownership of their operands. If an operation fails, its operands are
/// closed.
///
/// # Example
///
/// ```
/// use rdf_tuples_algebra::LiteralTuples;
/// use rdf_tuples_model::{NodeId, Variable};
/// use rdf_tuples_planner::TuplesOperations;
///
/// let people = LiteralTuples::new(
///     vec![Variable::new("person"), Variable::new("city")],
///     vec![
///         vec![NodeId::from(1_u32), NodeId::from(10_u32)],
///         vec![NodeId::from(2_u32), NodeId::from(20_u32)],
///     ],
/// )?;
/// let cities = LiteralTuples::new(
///     vec![Variable::new("city"), Variable::new("country")],
///     vec![vec![NodeId::from(10_u32), NodeId::from(100_u32)]],
/// )?;
///
/// let operations = TuplesOperations::default();
/// let mut join = operations.join(vec![people.into(), cities.into()])?;
/// assert_eq!(join.read_all_rows()?.len(), 1);
/// join.close()?;
/// # rdf_tuples_model::TuplesResult::<()>::Ok(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TuplesOperations {
    options: PlannerOptions,
}

#[allow(
    clippy::unused_self,
    reason = "Simple operations are offered next to the planned ones"
)]
impl TuplesOperations {
    /// Creates a new [TuplesOperations] with the given `options`.
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    /// Returns the options of the planner.
    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Joins `operands`.
    ///
    /// Depending on the [OptimizationLevel], operands with at most one row are folded into a
    /// single binding row and the remaining operands are ordered by their weighted expected row
    /// count. The order of the variables in the result may differ from the order of the
    /// operands.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::Planning] if the operands cannot be ordered such that the
    /// mandatory bindings of every operand are bound before it is evaluated.
    pub fn join(&self, operands: Vec<Tuples>) -> TuplesResult<Tuples> {
        let operands = flatten(operands);
        let level = self.options.optimization_level;
        if level == OptimizationLevel::None {
            return assemble_join(operands);
        }

        let variables = union_variables(&operands);
        let (bindings, operands) = match unify(operands)? {
            Unification::Empty => {
                tracing::debug!("Join over [{}] is empty", variables.iter().join(" "));
                return Ok(EmptyTuples::new(variables)?.into());
            }
            Unification::Unified { bindings, operands } => (bindings, operands),
        };

        let operands = if level == OptimizationLevel::Full {
            let bound = bindings.bound_variables().cloned().collect();
            order(operands, bound, self.options.bound_column_discount)?
        } else {
            operands
        };

        if bindings.is_empty() {
            return assemble_join(operands);
        }
        let binding_row = match bindings.to_tuples() {
            Ok(binding_row) => binding_row,
            Err(error) => {
                discard(operands);
                return Err(error);
            }
        };
        assemble_join(std::iter::once(binding_row).chain(operands).collect())
    }

    /// Extends the rows of `left` with the compatible rows of `right` for which `condition`
    /// holds. Rows of `left` without such a partner are kept.
    ///
    /// `right` is sorted by the shared variables if necessary.
    pub fn optional_join(
        &self,
        left: Tuples,
        right: Tuples,
        condition: Option<Condition>,
    ) -> TuplesResult<Tuples> {
        let shared = shared_variables(&left, &right);
        let right = match self.sort_by(right, &shared) {
            Ok(right) => right,
            Err(error) => {
                discard([left]);
                return Err(error);
            }
        };
        Ok(OptionalJoin::try_new(left, right, condition)?.into())
    }

    /// Removes the rows of `minuend` that agree with a row of `subtrahend` on a shared
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::NoSharedVariables] if both operands have variables but none in
    /// common. If one of them has no variables, the minuend is returned as it is.
    pub fn subtract(&self, minuend: Tuples, subtrahend: Tuples) -> TuplesResult<Tuples> {
        match subtrahend.is_empty() {
            Ok(true) => {
                discard([subtrahend]);
                return Ok(minuend);
            }
            Ok(false) => {}
            Err(error) => {
                discard([minuend, subtrahend]);
                return Err(error);
            }
        }

        let shared = shared_variables(&minuend, &subtrahend);
        if shared.is_empty() && (minuend.width() == 0 || subtrahend.width() == 0) {
            discard([subtrahend]);
            return Ok(minuend);
        }
        let subtrahend = match self.sort_by(subtrahend, &shared) {
            Ok(subtrahend) => subtrahend,
            Err(error) => {
                discard([minuend]);
                return Err(error);
            }
        };
        Ok(Minus::difference(minuend, subtrahend)?.into())
    }

    /// Removes the rows of `left` for which a compatible row of `right` satisfies `condition`.
    pub fn subtract_filtered(
        &self,
        left: Tuples,
        right: Tuples,
        condition: Condition,
    ) -> TuplesResult<Tuples> {
        let shared = shared_variables(&left, &right);
        let right = match self.sort_by(right, &shared) {
            Ok(right) => right,
            Err(error) => {
                discard([left]);
                return Err(error);
            }
        };
        Ok(Minus::left_filtered(left, right, condition)?.into())
    }

    /// Concatenates `operands`.
    ///
    /// Operands that do not have all variables are extended with unbound columns. The result is
    /// sorted lexicographically unless all operands already share a sort order.
    pub fn append(&self, operands: Vec<Tuples>) -> TuplesResult<Tuples> {
        let variables = union_variables(&operands);

        let empty = match check_all(&operands, Tuples::is_empty) {
            Ok(empty) => empty,
            Err(error) => {
                discard(operands);
                return Err(error);
            }
        };
        let (empty, mut operands): (Vec<_>, Vec<_>) = operands
            .into_iter()
            .zip(empty)
            .partition_map(|(operand, is_empty)| {
                if is_empty {
                    itertools::Either::Left(operand)
                } else {
                    itertools::Either::Right(operand)
                }
            });
        discard(empty);

        if operands.iter().any(|operand| operand.width() == 0) {
            tracing::debug!("Append with an unconstrained operand is unconstrained");
            discard(operands);
            return Ok(Tuples::unconstrained());
        }

        match operands.len() {
            0 => return Ok(EmptyTuples::new(variables)?.into()),
            1 => return Ok(operands.remove(0)),
            _ => {}
        }

        let comparator = operands[0].comparator();
        let compatible = comparator.is_some()
            && operands.iter().all(|operand| {
                operand.variables() == variables.as_slice() && operand.comparator() == comparator
            });
        if compatible {
            return Ok(OrderedAppend::try_new(operands)?.into());
        }

        let mut aligned = Vec::with_capacity(operands.len());
        let mut operands = operands.into_iter();
        while let Some(operand) = operands.next() {
            match self.align(operand, &variables) {
                Ok(operand) => aligned.push(operand),
                Err(error) => {
                    discard(aligned);
                    discard(operands);
                    return Err(error);
                }
            }
        }
        Ok(OrderedAppend::try_new(aligned)?.into())
    }

    /// Brings `operand` into the column layout `variables` and sorts it lexicographically.
    fn align(&self, operand: Tuples, variables: &[Variable]) -> TuplesResult<Tuples> {
        let width = operand.width();
        let operand = if operand.variables() == variables {
            operand
        } else if variables.starts_with(operand.variables()) {
            Projection::expanded(operand, variables[width..].to_vec())?.into()
        } else {
            Projection::unordered(operand, variables.to_vec())?.into()
        };
        self.sort(operand)
    }

    /// Restricts the columns of `tuples` to `variables`.
    ///
    /// Variables that `tuples` does not have are unbound in every row. If `distinct` is set,
    /// duplicate rows are removed from the result.
    pub fn project(
        &self,
        tuples: Tuples,
        variables: Vec<Variable>,
        distinct: bool,
    ) -> TuplesResult<Tuples> {
        let projected = if tuples.variables() == variables.as_slice() {
            tuples
        } else {
            let positions = variables
                .iter()
                .map(|variable| tuples.variables().iter().position(|v| v == variable))
                .collect::<Option<Vec<_>>>();
            let keeps_order = positions
                .is_some_and(|positions| positions.iter().tuple_windows().all(|(a, b)| a < b));
            if keeps_order {
                Projection::ordered(tuples, variables)?.into()
            } else {
                Projection::unordered(tuples, variables)?.into()
            }
        };

        if distinct {
            self.remove_duplicates(projected)
        } else {
            Ok(projected)
        }
    }

    /// Sorts `tuples` lexicographically. Sorted sequences are returned as they are.
    pub fn sort(&self, tuples: Tuples) -> TuplesResult<Tuples> {
        if tuples.comparator() == Some(RowComparator::Lexicographic) {
            return Ok(tuples);
        }
        tracing::debug!("Sorting [{}]", tuples.variables().iter().join(" "));
        Ok(LiteralTuples::materialize_sorted(tuples)?.into())
    }

    /// Sorts `tuples` by `comparator`. Sequences already in that order are returned as they
    /// are.
    pub fn sort_with(&self, tuples: Tuples, comparator: RowComparator) -> TuplesResult<Tuples> {
        if tuples.comparator().as_ref() == Some(&comparator) {
            return Ok(tuples);
        }
        tracing::debug!(
            "Sorting [{}] by {comparator}",
            tuples.variables().iter().join(" ")
        );
        Ok(LiteralTuples::materialize_ordered(tuples, comparator)?.into())
    }

    /// Sorts `tuples` lexicographically with `variables` as the leading columns.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::NoSuchVariable] if `tuples` does not have one of the `variables`.
    pub fn sort_by(&self, tuples: Tuples, variables: &[Variable]) -> TuplesResult<Tuples> {
        if let Some(missing) = variables.iter().find(|v| !tuples.has_variable(v)) {
            let error = TuplesError::NoSuchVariable(missing.clone());
            discard([tuples]);
            return Err(error);
        }

        if tuples.variables().starts_with(variables) {
            return self.sort(tuples);
        }

        let columns = variables
            .iter()
            .chain(tuples.variables().iter().filter(|v| !variables.contains(v)))
            .cloned()
            .collect();
        let reordered = Projection::unordered(tuples, columns)?;
        self.sort(reordered.into())
    }

    /// Emits at most `limit` rows of `tuples`.
    pub fn limit(&self, tuples: Tuples, limit: u64) -> Tuples {
        Limit::new(tuples, limit).into()
    }

    /// Skips the first `offset` rows of `tuples`.
    pub fn offset(&self, tuples: Tuples, offset: u64) -> Tuples {
        Offset::new(tuples, offset).into()
    }

    /// Removes duplicate rows from `tuples`, sorting it if necessary.
    pub fn remove_duplicates(&self, tuples: Tuples) -> TuplesResult<Tuples> {
        if tuples.has_no_duplicates() {
            return Ok(tuples);
        }

        let sorted = if tuples.comparator().is_some() {
            tuples
        } else {
            self.sort(tuples)?
        };
        if sorted.has_no_duplicates() {
            return Ok(sorted);
        }
        Ok(Distinct::try_new(sorted)?.into())
    }

    /// Keeps the rows of `tuples` for which `expression` is true.
    pub fn filter(
        &self,
        tuples: Tuples,
        expression: Expression,
        resolver: Arc<dyn ValueResolver>,
    ) -> Tuples {
        Filter::new(tuples, Condition::expression(expression, resolver)).into()
    }

    /// Keeps the rows of `tuples` that satisfy `predicate`.
    pub fn restrict(&self, tuples: Tuples, predicate: impl RowPredicate + 'static) -> Tuples {
        Filter::new(tuples, Condition::predicate(predicate)).into()
    }

    /// Creates a sequence with a single row that binds `variable` to `value`.
    ///
    /// # Errors
    ///
    /// Returns an argument error if `value` is [NodeId::UNBOUND].
    pub fn assign(&self, variable: Variable, value: NodeId) -> TuplesResult<Tuples> {
        Ok(Assignment::new(variable, value)?.into())
    }

    /// Adds a column for `variable` that holds the value of `expression`.
    ///
    /// # Errors
    ///
    /// Returns an argument error if `tuples` already has `variable`.
    pub fn bind(
        &self,
        tuples: Tuples,
        variable: Variable,
        expression: Expression,
        resolver: Arc<dyn ValueResolver>,
    ) -> TuplesResult<Tuples> {
        Ok(Bind::try_new(tuples, variable, expression, resolver)?.into())
    }

    /// Renames the variables of `tuples` according to `renames`, given as `(from, to)` pairs.
    pub fn rename(
        &self,
        tuples: Tuples,
        renames: &[(Variable, Variable)],
    ) -> TuplesResult<Tuples> {
        Ok(Projection::renamed(tuples, renames)?.into())
    }
}

/// Creates a join of `operands` without further planning.
fn assemble_join(mut operands: Vec<Tuples>) -> TuplesResult<Tuples> {
    match operands.len() {
        0 => Ok(Tuples::unconstrained()),
        1 => Ok(operands.remove(0)),
        _ => Ok(Join::try_new(operands)?.into()),
    }
}

/// Returns the variables of `right` that `left` also has, in the column order of `right`.
fn shared_variables(left: &Tuples, right: &Tuples) -> Vec<Variable> {
    right
        .variables()
        .iter()
        .filter(|variable| left.has_variable(variable))
        .cloned()
        .collect()
}

fn check_all(
    operands: &[Tuples],
    check: impl Fn(&Tuples) -> TuplesResult<bool>,
) -> TuplesResult<Vec<bool>> {
    operands.iter().map(check).collect()
}
