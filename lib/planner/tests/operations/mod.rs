use crate::{literal, rows, sorted_literal, variables};
use rdf_tuples_algebra::expr::Expression;
use rdf_tuples_algebra::{Condition, RowContext, RowPredicate, Tuples};
use rdf_tuples_model::{
    Literal, MemValueResolver, TuplesError, TuplesResult, ValueResolver, Variable,
};
use rdf_tuples_planner::TuplesOperations;
use std::sync::Arc;

#[derive(Debug)]
struct Below(&'static str, u64);

impl RowPredicate for Below {
    fn name(&self) -> &str {
        "below"
    }

    fn test(&self, context: &RowContext<'_>) -> TuplesResult<bool> {
        Ok(context.value(&Variable::new(self.0)).as_u64() < self.1)
    }
}

#[test]
fn optional_join_sorts_right_operand() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = literal(&["z", "y"], &[&[6, 2], &[5, 2]]);
    let mut join = TuplesOperations::default()
        .optional_join(left, right, None)
        .unwrap();

    insta::assert_snapshot!(join, @r"
    Optional join [?x ?y ?z]
      Literal (2 rows, sorted) [?x ?y]
      Literal (2 rows, sorted) [?y ?z]
    ");
    assert_eq!(
        rows(&mut join),
        vec![vec![1, 2, 5], vec![1, 2, 6], vec![3, 4, 0]]
    );
}

#[test]
fn optional_join_with_condition() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 5], &[2, 9], &[4, 9]]);
    let condition = Condition::predicate(Below("z", 8));
    let mut join = TuplesOperations::default()
        .optional_join(left, right, Some(condition))
        .unwrap();

    assert_eq!(rows(&mut join), vec![vec![1, 2, 5], vec![3, 4, 0]]);
}

#[test]
fn subtract_sorts_subtrahend() {
    let minuend = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4], &[5, 6]]);
    let subtrahend = literal(&["z", "y"], &[&[9, 6], &[8, 2]]);
    let mut difference = TuplesOperations::default()
        .subtract(minuend, subtrahend)
        .unwrap();

    assert_eq!(rows(&mut difference), vec![vec![3, 4]]);
}

#[test]
fn subtract_without_shared_variables_fails() {
    let minuend = sorted_literal(&["x"], &[&[1]]);
    let subtrahend = sorted_literal(&["y"], &[&[1]]);
    let result = TuplesOperations::default().subtract(minuend, subtrahend);

    assert!(matches!(result, Err(TuplesError::NoSharedVariables(_))));
}

#[test]
fn subtract_filtered_keeps_rows_without_satisfying_partner() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 9], &[4, 1]]);
    let mut minus = TuplesOperations::default()
        .subtract_filtered(left, right, Condition::predicate(Below("z", 5)))
        .unwrap();

    assert_eq!(rows(&mut minus), vec![vec![1, 2]]);
}

#[test]
fn append_aligns_columns() {
    let first = literal(&["x"], &[&[2], &[1]]);
    let second = literal(&["x", "y"], &[&[1, 5]]);
    let mut append = TuplesOperations::default()
        .append(vec![first, second, Tuples::empty()])
        .unwrap();

    insta::assert_snapshot!(append, @r"
    Ordered append (lexicographic) [?x ?y]
      Literal (2 rows, sorted) [?x ?y]
      Literal (1 row, sorted) [?x ?y]
    ");
    assert_eq!(rows(&mut append), vec![vec![1, 0], vec![1, 5], vec![2, 0]]);
}

#[test]
fn append_of_sorted_operands_is_not_sorted_again() {
    let first = sorted_literal(&["x"], &[&[1], &[3]]);
    let second = sorted_literal(&["x"], &[&[2]]);
    let mut append = TuplesOperations::default()
        .append(vec![first, second])
        .unwrap();

    insta::assert_snapshot!(append, @r"
    Ordered append (lexicographic) [?x]
      Literal (2 rows, sorted) [?x]
      Literal (1 row, sorted) [?x]
    ");
    assert_eq!(rows(&mut append), vec![vec![1], vec![2], vec![3]]);
}

#[test]
fn append_of_empty_operands() {
    let append = TuplesOperations::default()
        .append(vec![Tuples::empty(), Tuples::empty()])
        .unwrap();
    assert!(append.is_empty().unwrap());
}

#[test]
fn project_distinct() {
    let tuples = literal(&["x", "y"], &[&[2, 1], &[1, 1], &[2, 3]]);
    let mut projected = TuplesOperations::default()
        .project(tuples, variables(&["x"]), true)
        .unwrap();

    insta::assert_snapshot!(projected, @r"
    Distinct [?x]
      Literal (3 rows, sorted) [?x]
    ");
    assert_eq!(rows(&mut projected), vec![vec![1], vec![2]]);
}

#[test]
fn limit_and_offset() {
    let operations = TuplesOperations::default();
    let tuples = sorted_literal(&["x"], &[&[1], &[2], &[3], &[4]]);
    let mut sliced = operations.limit(operations.offset(tuples, 1), 2);

    assert_eq!(rows(&mut sliced), vec![vec![2], vec![3]]);
}

#[test]
fn filter_bind_and_rename() {
    let operations = TuplesOperations::default();
    let resolver = Arc::new(MemValueResolver::new());
    let value = |v: i64| resolver.localize(Literal::from(v).as_ref().into()).unwrap();

    let ages = rdf_tuples_algebra::LiteralTuples::new(
        variables(&["age"]),
        vec![vec![value(17)], vec![value(30)]],
    )
    .unwrap();
    let adults = operations.filter(
        ages.into(),
        Expression::variable("age").greater_or_equal(Expression::constant(Literal::from(18))),
        Arc::clone(&resolver) as Arc<dyn ValueResolver>,
    );
    let older = operations
        .bind(
            adults,
            Variable::new("older"),
            Expression::variable("age").add(Expression::constant(Literal::from(10))),
            Arc::clone(&resolver) as Arc<dyn ValueResolver>,
        )
        .unwrap();
    let mut renamed = operations
        .rename(older, &[(Variable::new("age"), Variable::new("years"))])
        .unwrap();

    assert_eq!(renamed.variables(), variables(&["years", "older"]));
    assert_eq!(
        rows(&mut renamed),
        vec![vec![value(30).as_u64(), value(40).as_u64()]]
    );
}

#[test]
fn restrict_with_predicate() {
    let tuples = sorted_literal(&["x"], &[&[1], &[5], &[9]]);
    let mut restricted = TuplesOperations::default().restrict(tuples, Below("x", 6));

    insta::assert_snapshot!(restricted, @r"
    Restriction below [?x]
      Literal (3 rows, sorted) [?x]
    ");
    assert_eq!(rows(&mut restricted), vec![vec![1], vec![5]]);
}
