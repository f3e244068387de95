use crate::{bindings, literal, rows, sorted_literal, variables, IndexScan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdf_tuples_algebra::{Join, LiteralTuples, Tuples};
use rdf_tuples_model::{Annotation, NodeId, TuplesError};
use rdf_tuples_planner::{OptimizationLevel, PlannerOptions, TuplesOperations};
use std::collections::BTreeSet;

fn random_literal(rng: &mut StdRng, names: &[&str], row_count: usize) -> Tuples {
    let rows = (0..row_count)
        .map(|_| {
            names
                .iter()
                .map(|_| NodeId::from(rng.random_range(1..=4_u32)))
                .collect()
        })
        .collect();
    LiteralTuples::new(variables(names), rows).unwrap().into()
}

#[test]
fn planned_join_orders_by_weighted_count() {
    let operands = vec![
        sorted_literal(&["x", "y"], &[&[1, 1], &[2, 2], &[3, 9]]),
        sorted_literal(&["y", "z"], &[&[1, 7], &[2, 7]]),
        sorted_literal(&["z"], &[&[7]]),
    ];
    let mut join = TuplesOperations::default().join(operands).unwrap();

    insta::assert_snapshot!(join, @r"
    Join [?z ?y ?x]
      Literal (1 row, sorted) [?z]
      Literal (2 rows, sorted) [?y ?z]
      Literal (3 rows, sorted) [?x ?y]
    ");
    assert_eq!(rows(&mut join), vec![vec![7, 1, 1], vec![7, 2, 2]]);
}

#[test]
fn default_level_keeps_operand_order() {
    let operations = TuplesOperations::new(
        PlannerOptions::default().with_optimization_level(OptimizationLevel::Default),
    );
    let operands = vec![
        sorted_literal(&["x", "y"], &[&[1, 1], &[2, 2], &[3, 9]]),
        sorted_literal(&["y", "z"], &[&[1, 7], &[2, 7], &[2, 8]]),
    ];
    let join = operations.join(operands).unwrap();

    insta::assert_snapshot!(join, @r"
    Join [?x ?y ?z]
      Literal (3 rows, sorted) [?x ?y]
      Literal (3 rows, sorted) [?y ?z]
    ");
}

#[test]
fn unification_reaches_fixpoint() {
    let operands = vec![
        sorted_literal(&["x"], &[&[1]]),
        sorted_literal(&["x", "y"], &[&[1, 2], &[3, 4]]),
        sorted_literal(&["y", "z"], &[&[2, 5], &[4, 6]]),
    ];
    let mut join = TuplesOperations::default().join(operands).unwrap();

    insta::assert_snapshot!(join, @"Literal (1 row, sorted) [?x ?y ?z]");
    assert_eq!(rows(&mut join), vec![vec![1, 2, 5]]);
}

#[test]
fn unification_detects_empty_join() {
    let operands = vec![
        sorted_literal(&["x"], &[&[1]]),
        sorted_literal(&["x", "y"], &[&[2, 2], &[3, 4]]),
    ];
    let join = TuplesOperations::default().join(operands).unwrap();

    insta::assert_snapshot!(join, @"Empty [?x ?y]");
}

#[test]
fn reorderable_joins_are_flattened() {
    let inner = Join::try_new(vec![
        sorted_literal(&["x", "y"], &[&[1, 1], &[2, 2], &[3, 3]]),
        sorted_literal(&["y", "z"], &[&[1, 1], &[2, 2], &[3, 3]]),
    ])
    .unwrap();
    let inner = Tuples::from(inner).with_annotation(Annotation::Reorderable);
    let outer = sorted_literal(&["z", "w"], &[&[1, 1], &[2, 2]]);

    let join = TuplesOperations::default()
        .join(vec![inner, outer])
        .unwrap();
    insta::assert_snapshot!(join, @r"
    Join [?z ?w ?y ?x]
      Literal (2 rows, sorted) [?z ?w]
      Literal (3 rows, sorted) [?y ?z]
      Literal (3 rows, sorted) [?x ?y]
    ");
}

#[test]
fn mandatory_bindings_are_respected() {
    let dependent = sorted_literal(&["y"], &[&[1], &[2]]).with_annotation(
        Annotation::MandatoryBindings(BTreeSet::from_iter(variables(&["x"]))),
    );
    let provider = sorted_literal(&["x", "y"], &[&[1, 1], &[1, 2], &[2, 1], &[2, 3]]);
    let mut join = TuplesOperations::default()
        .join(vec![dependent, provider])
        .unwrap();

    assert_eq!(join.operands()[0].variables(), variables(&["x", "y"]));
    assert_eq!(rows(&mut join), vec![vec![1, 1], vec![1, 2], vec![2, 1]]);
}

#[test]
fn unsatisfiable_mandatory_bindings_fail() {
    let dependent = sorted_literal(&["y"], &[&[1], &[2]]).with_annotation(
        Annotation::MandatoryBindings(BTreeSet::from_iter(variables(&["x"]))),
    );
    let other = sorted_literal(&["y", "z"], &[&[1, 1], &[2, 2]]);
    let result = TuplesOperations::default().join(vec![dependent, other]);

    assert!(matches!(result, Err(TuplesError::Planning(_))));
}

#[test]
fn definable_prefix_follows_bound_variables() {
    let scan = Tuples::from_source(IndexScan::new(
        &["s", "p", "o"],
        &[&[1, 10, 100], &[2, 10, 200], &[3, 11, 100], &[4, 11, 300], &[5, 12, 100]],
    ));
    let objects = sorted_literal(&["o"], &[&[100], &[300]]);
    let mut join = TuplesOperations::default()
        .join(vec![scan, objects])
        .unwrap();

    insta::assert_snapshot!(join, @r"
    Join [?o ?s ?p]
      Literal (2 rows, sorted) [?o]
      Index scan [?o ?s ?p] definable-prefix
    ");
    assert_eq!(
        rows(&mut join),
        vec![
            vec![100, 1, 10],
            vec![100, 3, 11],
            vec![100, 5, 12],
            vec![300, 4, 11],
        ]
    );
}

#[test]
fn planning_keeps_join_content() {
    for seed in [1, 2, 3, 5, 8, 13, 21, 34] {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_literal(&mut rng, &["x", "y"], 12);
        let b = random_literal(&mut rng, &["y", "z"], 6);
        let c = random_literal(&mut rng, &["z"], 2);
        let d = literal(&["w", "x"], &[&[9, 1]]);

        let unplanned = TuplesOperations::new(
            PlannerOptions::default().with_optimization_level(OptimizationLevel::None),
        );
        let mut expected = unplanned
            .join(vec![
                a.duplicate().unwrap(),
                b.duplicate().unwrap(),
                c.duplicate().unwrap(),
                d.duplicate().unwrap(),
            ])
            .unwrap();
        let mut planned = TuplesOperations::default().join(vec![a, b, c, d]).unwrap();

        assert_eq!(bindings(&mut planned), bindings(&mut expected));
    }
}
