use crate::{bindings, random_literal, rows, variables};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdf_tuples_algebra::{
    Distinct, Join, Limit, LiteralTuples, Minus, Offset, OptionalJoin, Projection, TupleSource, Tuples,
};
use rdf_tuples_model::NodeId;

const SEEDS: [u64; 8] = [1, 2, 3, 5, 8, 13, 21, 34];

#[test]
fn join_with_unconstrained_is_identity() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut operand = random_literal(&mut rng, &["x", "y"], 20, 5);

        let operands = vec![operand.duplicate().unwrap(), Tuples::unconstrained()];
        let mut join = Tuples::from(Join::try_new(operands).unwrap());
        assert_eq!(rows(&mut join), rows(&mut operand));
    }
}

#[test]
fn join_with_empty_is_empty() {
    let mut rng = StdRng::seed_from_u64(7);
    let operand = random_literal(&mut rng, &["x", "y"], 20, 5);

    let join = Join::try_new(vec![operand, Tuples::empty()]).unwrap();
    assert_eq!(join.row_count().unwrap(), 0);
    assert!(Tuples::from(join).is_empty().unwrap());
}

#[test]
fn join_is_commutative_on_row_content() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_literal(&mut rng, &["x", "y"], 15, 4);
        let b = random_literal(&mut rng, &["y", "z"], 15, 4);

        let mut ab = Tuples::from(
            Join::try_new(vec![a.duplicate().unwrap(), b.duplicate().unwrap()]).unwrap(),
        );
        let mut ba = Tuples::from(Join::try_new(vec![b, a]).unwrap());
        assert_eq!(bindings(&mut ab), bindings(&mut ba));
    }
}

#[test]
fn difference_removes_agreeing_rows() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut minuend = random_literal(&mut rng, &["x", "y"], 20, 6);
        let mut subtrahend = random_literal(&mut rng, &["y", "z"], 5, 6);

        let subtracted_values = rows(&mut subtrahend)
            .into_iter()
            .map(|row| row[0])
            .collect::<Vec<_>>();
        let expected = rows(&mut minuend)
            .into_iter()
            .filter(|row| !subtracted_values.contains(&row[1]))
            .collect::<Vec<_>>();

        let mut difference = Tuples::from(Minus::difference(minuend, subtrahend).unwrap());
        assert_eq!(rows(&mut difference), expected);
    }
}

#[test]
fn optional_join_keeps_every_left_row() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut left = random_literal(&mut rng, &["x", "y"], 12, 5);
        let mut right = random_literal(&mut rng, &["y", "z"], 6, 5);

        let right_rows = rows(&mut right);
        let mut expected = Vec::new();
        for row in rows(&mut left) {
            let matches = right_rows
                .iter()
                .filter(|right_row| right_row[0] == row[1])
                .collect::<Vec<_>>();
            if matches.is_empty() {
                expected.push(vec![row[0], row[1], 0]);
            }
            for right_row in matches {
                expected.push(vec![row[0], row[1], right_row[1]]);
            }
        }

        let mut join = Tuples::from(OptionalJoin::try_new(left, right, None).unwrap());
        let mut actual = rows(&mut join);
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected);
    }
}

/// Checks that searching `tuples` with every prefix of its rows (and with a missing value)
/// yields the matching subset of a full iteration, in the same relative order.
fn assert_prefix_search_consistent(tuples: &mut Tuples) {
    let all_rows = tuples.read_all_rows().unwrap();
    let mut prefixes = Vec::new();
    for row in &all_rows {
        for length in 1..=row.len() {
            if row[..length].iter().all(|value| value.is_bound()) {
                prefixes.push(row[..length].to_vec());
            }
        }
    }
    prefixes.push(vec![NodeId::from(999)]);
    prefixes.sort();
    prefixes.dedup();

    for prefix in prefixes {
        let expected = all_rows
            .iter()
            .filter(|row| row.starts_with(&prefix))
            .cloned()
            .collect::<Vec<_>>();

        tuples.before_first(&prefix, 0).unwrap();
        let mut actual = Vec::new();
        while tuples.next().unwrap() {
            let mut row = Vec::new();
            tuples.read_row(&mut row).unwrap();
            actual.push(row);
        }
        assert_eq!(actual, expected, "prefix {prefix:?}");
    }
}

#[test]
fn prefix_search_is_consistent() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut literal = random_literal(&mut rng, &["x", "y", "z"], 25, 4);
        assert_prefix_search_consistent(&mut literal);

        let a = random_literal(&mut rng, &["x", "y"], 10, 4);
        let b = random_literal(&mut rng, &["y", "z"], 10, 4);
        let mut join = Tuples::from(Join::try_new(vec![a, b]).unwrap());
        assert_prefix_search_consistent(&mut join);

        let a = random_literal(&mut rng, &["x", "y"], 10, 4);
        let b = random_literal(&mut rng, &["y", "z"], 4, 4);
        let mut optional = Tuples::from(OptionalJoin::try_new(a, b, None).unwrap());
        assert_prefix_search_consistent(&mut optional);

        let operand = random_literal(&mut rng, &["x", "y", "z"], 25, 4);
        let mut projection =
            Tuples::from(Projection::ordered(operand, variables(&["x", "z"])).unwrap());
        assert_prefix_search_consistent(&mut projection);
    }
}

#[test]
fn prefix_search_over_slices_is_consistent() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let limit = rng.random_range(0..12);
        let offset = rng.random_range(0..12);

        let operand = random_literal(&mut rng, &["x", "y"], 15, 3);
        let mut limited = Tuples::from(Limit::new(operand, limit));
        assert_prefix_search_consistent(&mut limited);

        let operand = random_literal(&mut rng, &["x", "y"], 15, 3);
        let mut skipped = Tuples::from(Offset::new(operand, offset));
        assert_prefix_search_consistent(&mut skipped);

        let operand = random_literal(&mut rng, &["x", "y"], 15, 3);
        let window = Offset::new(operand, offset);
        let mut window = Tuples::from(Limit::new(window.into(), limit));
        assert_prefix_search_consistent(&mut window);

        let operand = random_literal(&mut rng, &["x", "y"], 15, 3);
        let mut distinct = Tuples::from(Distinct::try_new(operand).unwrap());
        assert_prefix_search_consistent(&mut distinct);
    }
}

#[test]
fn join_over_limit_matches_join_over_materialized_limit() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_literal(&mut rng, &["x", "y"], 12, 4);
        let b = random_literal(&mut rng, &["x", "z"], 12, 4);
        let limit = rng.random_range(1..8);

        let lazy_limit = Limit::new(b.duplicate().unwrap(), limit);
        let mut lazy = Tuples::from(
            Join::try_new(vec![a.duplicate().unwrap(), lazy_limit.into()]).unwrap(),
        );

        let materialized_limit =
            LiteralTuples::materialize(Limit::new(b, limit).into()).unwrap();
        let mut expected =
            Tuples::from(Join::try_new(vec![a, materialized_limit.into()]).unwrap());

        assert_eq!(bindings(&mut lazy), bindings(&mut expected), "seed {seed}");
        assert_prefix_search_consistent(&mut lazy);
    }
}

#[test]
fn materialized_join_matches_lazy_join() {
    let mut rng = StdRng::seed_from_u64(99);
    let a = random_literal(&mut rng, &["x", "y"], 20, 5);
    let b = random_literal(&mut rng, &["y", "z"], 20, 5);

    let mut lazy = Tuples::from(
        Join::try_new(vec![a.duplicate().unwrap(), b.duplicate().unwrap()]).unwrap(),
    );
    let mut materialized = Tuples::from(
        LiteralTuples::materialize(Join::try_new(vec![a, b]).unwrap().into()).unwrap(),
    );
    assert!(materialized.is_materialized());
    assert_eq!(rows(&mut lazy), rows(&mut materialized));
    assert_eq!(lazy.row_count().unwrap(), materialized.row_count().unwrap());
}
