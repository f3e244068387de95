use crate::sorted_literal;
use rdf_tuples_algebra::{
    Join, Minus, OptionalJoin, OrderedAppend, TupleSource, Tuples, UnorderedAppend,
};
use rdf_tuples_model::{NodeId, RowComparator, TuplesError, TuplesResult, Variable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a sequence and counts how many of its copies are open.
#[derive(Debug)]
struct Tracked {
    inner: Tuples,
    open: Arc<AtomicUsize>,
    closed: bool,
    fail_duplicate: bool,
    fail_unbound_check: bool,
}

impl Tracked {
    fn new(inner: Tuples, open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            inner,
            open: Arc::clone(open),
            closed: false,
            fail_duplicate: false,
            fail_unbound_check: false,
        }
    }

    fn failing_duplicate(mut self) -> Self {
        self.fail_duplicate = true;
        self
    }

    fn failing_unbound_check(mut self) -> Self {
        self.fail_unbound_check = true;
        self
    }
}

impl TupleSource for Tracked {
    fn name(&self) -> &str {
        "Tracked"
    }

    fn variables(&self) -> &[Variable] {
        self.inner.variables()
    }

    fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        self.inner.column_value(column)
    }

    fn before_first(&mut self, prefix: &[NodeId], suffix_truncation: usize) -> TuplesResult<()> {
        self.inner.before_first(prefix, suffix_truncation)
    }

    fn next(&mut self) -> TuplesResult<bool> {
        self.inner.next()
    }

    fn close(&mut self) -> TuplesResult<()> {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.close()
    }

    fn duplicate(&self) -> TuplesResult<Tuples> {
        if self.fail_duplicate {
            return Err(TuplesError::evaluation("The sequence cannot be duplicated."));
        }
        let mut duplicate = Tracked::new(self.inner.duplicate()?, &self.open);
        duplicate.fail_unbound_check = self.fail_unbound_check;
        Ok(Tuples::from_source(duplicate))
    }

    fn row_upper_bound(&self) -> TuplesResult<u64> {
        self.inner.row_upper_bound()
    }

    fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        if self.fail_unbound_check {
            return Err(TuplesError::evaluation("The column flags are unavailable."));
        }
        self.inner.is_column_ever_unbound(column)
    }

    fn comparator(&self) -> Option<RowComparator> {
        self.inner.comparator()
    }

    fn has_no_duplicates(&self) -> bool {
        self.inner.has_no_duplicates()
    }
}

fn tracked(open: &Arc<AtomicUsize>, names: &[&str], values: &[&[u32]]) -> Tracked {
    Tracked::new(sorted_literal(names, values), open)
}

#[test]
fn failed_join_duplicate_closes_finished_duplicates() {
    let open = Arc::new(AtomicUsize::new(0));
    let operands = vec![
        Tuples::from_source(tracked(&open, &["x"], &[&[1], &[2]])),
        Tuples::from_source(tracked(&open, &["x"], &[&[2]]).failing_duplicate()),
    ];
    let join = Join::try_new(operands).unwrap();
    assert_eq!(open.load(Ordering::SeqCst), 2);

    assert!(join.duplicate().is_err());
    assert_eq!(open.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_append_duplicate_closes_finished_duplicates() {
    let open = Arc::new(AtomicUsize::new(0));
    let operands = || {
        vec![
            Tuples::from_source(tracked(&open, &["x"], &[&[1]])),
            Tuples::from_source(tracked(&open, &["x"], &[&[2]])),
            Tuples::from_source(tracked(&open, &["x"], &[&[3]]).failing_duplicate()),
        ]
    };

    let ordered = OrderedAppend::try_new(operands()).unwrap();
    let unordered = UnorderedAppend::try_new(operands()).unwrap();
    assert_eq!(open.load(Ordering::SeqCst), 6);

    assert!(ordered.duplicate().is_err());
    assert!(unordered.duplicate().is_err());
    assert_eq!(open.load(Ordering::SeqCst), 6);
}

#[test]
fn failed_binary_duplicate_closes_left_duplicate() {
    let open = Arc::new(AtomicUsize::new(0));
    let left = || Tuples::from_source(tracked(&open, &["x", "y"], &[&[1, 2]]));
    let right = || Tuples::from_source(tracked(&open, &["y"], &[&[2]]).failing_duplicate());

    let optional = OptionalJoin::try_new(left(), right(), None).unwrap();
    let difference = Minus::difference(left(), right()).unwrap();
    assert_eq!(open.load(Ordering::SeqCst), 4);

    assert!(optional.duplicate().is_err());
    assert!(difference.duplicate().is_err());
    assert_eq!(open.load(Ordering::SeqCst), 4);
}

#[test]
fn unknown_column_flags_fail_construction() {
    let open = Arc::new(AtomicUsize::new(0));
    let left = Tuples::from_source(tracked(&open, &["x", "y"], &[&[1, 2]]));
    let right = Tuples::from_source(tracked(&open, &["y"], &[&[2]]).failing_unbound_check());
    let result = OptionalJoin::try_new(left, right, None);
    assert!(result.is_err());
    assert_eq!(open.load(Ordering::SeqCst), 0);

    let left = Tuples::from_source(tracked(&open, &["x", "y"], &[&[1, 2]]));
    let right = Tuples::from_source(tracked(&open, &["y"], &[&[2]]).failing_unbound_check());
    let result = Minus::difference(left, right);
    assert!(result.is_err());
    assert_eq!(open.load(Ordering::SeqCst), 0);
}
