use crate::{bindings, rows, sorted_literal, variables};
use rdf_tuples_algebra::expr::Expression;
use rdf_tuples_algebra::{
    Bind, Condition, Filter, Join, Limit, LiteralTuples, Minus, OptionalJoin, Projection, Tuples,
};
use rdf_tuples_model::{Literal, MemValueResolver, NodeId, ValueResolver, Variable};
use std::sync::Arc;

#[test]
fn join_scenario() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 5], &[4, 6]]);

    let join = Join::try_new(vec![left, right]).unwrap();
    let mut sorted = Tuples::from(LiteralTuples::materialize_sorted(join.into()).unwrap());

    assert_eq!(sorted.variables(), variables(&["x", "y", "z"]));
    assert_eq!(rows(&mut sorted), vec![vec![1, 2, 5], vec![3, 4, 6]]);
}

#[test]
fn optional_join_scenario() {
    let standard = sorted_literal(&["x", "y"], &[&[1, 2]]);
    let optional = sorted_literal(&["y", "z"], &[&[2, 5]]);
    let mut join = Tuples::from(OptionalJoin::try_new(standard, optional, None).unwrap());
    assert_eq!(rows(&mut join), vec![vec![1, 2, 5]]);

    let standard = sorted_literal(&["x", "y"], &[&[1, 9]]);
    let optional = sorted_literal(&["y", "z"], &[&[2, 5]]);
    let mut join = Tuples::from(OptionalJoin::try_new(standard, optional, None).unwrap());
    assert_eq!(rows(&mut join), vec![vec![1, 9, 0]]);
    assert_eq!(join.column_index(&Variable::new("z")).unwrap(), 2);
}

#[test]
fn difference_scenario() {
    let minuend = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let subtrahend = sorted_literal(&["y"], &[&[2]]);

    let mut difference = Tuples::from(Minus::difference(minuend, subtrahend).unwrap());
    assert_eq!(rows(&mut difference), vec![vec![3, 4]]);
}

#[test]
fn closing_a_tree_closes_every_operand_once() {
    let strict = |names: &[&str], values: &[u32]| -> Tuples {
        let rows = values.iter().map(|v| vec![NodeId::from(*v)]).collect();
        LiteralTuples::new_sorted(variables(names), rows)
            .unwrap()
            .with_strict_close()
            .into()
    };

    let join = Join::try_new(vec![strict(&["x"], &[1, 2]), strict(&["x"], &[2, 3])]).unwrap();
    let mut tree = Tuples::from(Projection::ordered(join.into(), variables(&["x"])).unwrap());
    assert_eq!(rows(&mut tree), vec![vec![2]]);

    tree.close().unwrap();
    assert!(tree.close().is_err());
}

#[test]
fn filter_and_bind() {
    let resolver = Arc::new(MemValueResolver::new());
    let value = |v: i64| resolver.localize(Literal::from(v).as_ref().into()).unwrap();

    let people = LiteralTuples::new_sorted(
        variables(&["person", "age"]),
        vec![
            vec![NodeId::from(100), value(17)],
            vec![NodeId::from(101), value(42)],
            vec![NodeId::from(102), value(65)],
        ],
    )
    .unwrap();
    let adults = Filter::new(
        people.into(),
        Condition::expression(
            Expression::variable("age").greater_or_equal(Expression::constant(Literal::from(18))),
            Arc::clone(&resolver) as Arc<dyn ValueResolver>,
        ),
    );
    let bind = Bind::try_new(
        adults.into(),
        Variable::new("next"),
        Expression::variable("age").add(Expression::constant(Literal::from(1))),
        Arc::clone(&resolver) as Arc<dyn ValueResolver>,
    )
    .unwrap();
    let mut tree = Tuples::from(bind);

    let expected = vec![
        vec![101, value(42).as_u64(), value(43).as_u64()],
        vec![102, value(65).as_u64(), value(66).as_u64()],
    ];
    assert_eq!(rows(&mut tree), expected);
}

#[test]
fn join_content_ignores_column_order() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 5], &[4, 6]]);
    let join = Join::try_new(vec![left, right]).unwrap();
    let mut reordered =
        Tuples::from(Projection::unordered(join.into(), variables(&["z", "y", "x"])).unwrap());

    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 5], &[4, 6]]);
    let mut join = Tuples::from(Join::try_new(vec![right, left]).unwrap());

    assert_eq!(bindings(&mut reordered), bindings(&mut join));
}

#[test]
fn explain_operator_tree() {
    let left = sorted_literal(&["x", "y"], &[&[1, 2], &[1, 3]]);
    let right = sorted_literal(&["y", "z"], &[&[2, 5]]);
    let join = Join::try_new(vec![left, right]).unwrap();
    let projection = Projection::unordered(join.into(), variables(&["z", "x"])).unwrap();
    let tree = Tuples::from(Limit::new(projection.into(), 10));

    insta::assert_snapshot!(tree, @r"
    Limit 10 [?z ?x]
      Unordered projection [?z ?x]
        Join [?x ?y ?z]
          Literal (2 rows, sorted) [?x ?y]
          Literal (1 row, sorted) [?y ?z]
    ");
}
