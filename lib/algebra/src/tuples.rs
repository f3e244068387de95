use crate::append::{OrderedAppend, UnorderedAppend};
use crate::base::{Assignment, EmptyTuples, LiteralTuples, UnconstrainedTuples};
use crate::bind::Bind;
use crate::distinct::Distinct;
use crate::filter::Filter;
use crate::join::{Join, Minus, OptionalJoin};
use crate::projection::Projection;
use crate::slice::{Limit, Offset};
use crate::source::TupleSource;
use rdf_tuples_model::{
    Annotation, AnnotationKind, Cardinality, NodeId, RowComparator, TuplesError, TuplesResult,
    Variable,
};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// The closed set of tuple sequence implementations.
///
/// The planner inspects the kind of a sequence (e.g., to flatten nested joins). Sequences
/// provided by a storage layer are represented by [TuplesKind::Source].
#[derive(Debug)]
pub enum TuplesKind {
    Empty(EmptyTuples),
    Unconstrained(UnconstrainedTuples),
    Assignment(Assignment),
    Literal(LiteralTuples),
    Source(Box<dyn TupleSource>),
    Join(Join),
    OptionalJoin(OptionalJoin),
    Minus(Minus),
    OrderedAppend(OrderedAppend),
    UnorderedAppend(UnorderedAppend),
    Projection(Projection),
    Distinct(Distinct),
    Filter(Filter),
    Bind(Bind),
    Limit(Limit),
    Offset(Offset),
}

/// Dispatches a method call to the implementation of the given kind.
macro_rules! delegate {
    ($kind:expr, $inner:ident => $body:expr) => {
        match $kind {
            TuplesKind::Empty($inner) => $body,
            TuplesKind::Unconstrained($inner) => $body,
            TuplesKind::Assignment($inner) => $body,
            TuplesKind::Literal($inner) => $body,
            TuplesKind::Source($inner) => $body,
            TuplesKind::Join($inner) => $body,
            TuplesKind::OptionalJoin($inner) => $body,
            TuplesKind::Minus($inner) => $body,
            TuplesKind::OrderedAppend($inner) => $body,
            TuplesKind::UnorderedAppend($inner) => $body,
            TuplesKind::Projection($inner) => $body,
            TuplesKind::Distinct($inner) => $body,
            TuplesKind::Filter($inner) => $body,
            TuplesKind::Bind($inner) => $body,
            TuplesKind::Limit($inner) => $body,
            TuplesKind::Offset($inner) => $body,
        }
    };
}

/// A tuple sequence: a lazily evaluated multiset of rows that bind variables to node ids.
///
/// A [Tuples] owns its operands. Use [Tuples::duplicate] to obtain an independent cursor over
/// the same rows before handing a sequence to an operator if the original is still needed.
/// Sequences must be closed with [Tuples::close] once they are no longer needed.
///
/// See [TupleSource] for the cursor contract.
#[derive(Debug)]
pub struct Tuples {
    kind: TuplesKind,
    annotations: Vec<Annotation>,
}

impl Tuples {
    /// Creates a sequence with no variables and no rows.
    pub fn empty() -> Self {
        EmptyTuples::default().into()
    }

    /// Creates a sequence with no variables and a single row, the identity of the join.
    pub fn unconstrained() -> Self {
        UnconstrainedTuples::new().into()
    }

    /// Wraps a sequence provided by a storage layer.
    pub fn from_source(source: impl TupleSource + 'static) -> Self {
        Self::from(TuplesKind::Source(Box::new(source)))
    }

    /// Returns the kind of this sequence.
    pub fn kind(&self) -> &TuplesKind {
        &self.kind
    }

    /// Returns the kind of this sequence, dropping its annotations.
    pub fn into_kind(self) -> TuplesKind {
        self.kind
    }

    /// Attaches `annotation` to this sequence, replacing an annotation of the same kind.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.retain(|a| a.kind() != annotation.kind());
        self.annotations.push(annotation);
        self
    }

    /// Looks up the annotation of the given `kind`.
    pub fn annotation(&self, kind: AnnotationKind) -> Option<&Annotation> {
        let source_annotations = match &self.kind {
            TuplesKind::Source(source) => source.annotations(),
            _ => &[],
        };
        self.annotations
            .iter()
            .chain(source_annotations)
            .find(|a| a.kind() == kind)
    }

    /// Returns all annotations attached to this sequence.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        let source_annotations = match &self.kind {
            TuplesKind::Source(source) => source.annotations(),
            _ => &[],
        };
        self.annotations.iter().chain(source_annotations)
    }

    /// Returns the variables of the sequence in column order.
    pub fn variables(&self) -> &[Variable] {
        delegate!(&self.kind, inner => inner.variables())
    }

    /// Returns the number of columns.
    pub fn width(&self) -> usize {
        self.variables().len()
    }

    /// Returns the column of `variable`.
    ///
    /// # Errors
    ///
    /// Returns [TuplesError::NoSuchVariable] if the variable is not part of the sequence.
    pub fn column_index(&self, variable: &Variable) -> TuplesResult<usize> {
        self.variables()
            .iter()
            .position(|v| v == variable)
            .ok_or_else(|| TuplesError::NoSuchVariable(variable.clone()))
    }

    /// Returns true if `variable` is part of the sequence.
    pub fn has_variable(&self, variable: &Variable) -> bool {
        self.variables().contains(variable)
    }

    /// See [TupleSource::column_value].
    pub fn column_value(&self, column: usize) -> TuplesResult<NodeId> {
        delegate!(&self.kind, inner => inner.column_value(column))
    }

    /// Returns the value of `variable` in the current row.
    pub fn variable_value(&self, variable: &Variable) -> TuplesResult<NodeId> {
        self.column_value(self.column_index(variable)?)
    }

    /// Copies the current row into `row`.
    pub fn read_row(&self, row: &mut Vec<NodeId>) -> TuplesResult<()> {
        row.clear();
        for column in 0..self.width() {
            row.push(self.column_value(column)?);
        }
        Ok(())
    }

    /// See [TupleSource::before_first].
    pub fn before_first(
        &mut self,
        prefix: &[NodeId],
        suffix_truncation: usize,
    ) -> TuplesResult<()> {
        delegate!(&mut self.kind, inner => inner.before_first(prefix, suffix_truncation))
    }

    /// Positions the cursor before the first row without restricting the rows.
    pub fn rewind(&mut self) -> TuplesResult<()> {
        self.before_first(&[], 0)
    }

    /// See [TupleSource::next].
    #[allow(
        clippy::should_implement_trait,
        reason = "A cursor cannot lend its rows as an Iterator."
    )]
    pub fn next(&mut self) -> TuplesResult<bool> {
        delegate!(&mut self.kind, inner => inner.next())
    }

    /// See [TupleSource::close].
    pub fn close(&mut self) -> TuplesResult<()> {
        delegate!(&mut self.kind, inner => inner.close())
    }

    /// See [TupleSource::duplicate]. The annotations are duplicated as well.
    pub fn duplicate(&self) -> TuplesResult<Tuples> {
        let mut duplicate = delegate!(&self.kind, inner => inner.duplicate())?;
        duplicate.annotations = self.annotations.clone();
        Ok(duplicate)
    }

    /// See [TupleSource::is_materialized].
    pub fn is_materialized(&self) -> bool {
        delegate!(&self.kind, inner => inner.is_materialized())
    }

    /// See [TupleSource::row_count].
    pub fn row_count(&self) -> TuplesResult<u64> {
        delegate!(&self.kind, inner => inner.row_count())
    }

    /// See [TupleSource::row_upper_bound].
    pub fn row_upper_bound(&self) -> TuplesResult<u64> {
        delegate!(&self.kind, inner => inner.row_upper_bound())
    }

    /// See [TupleSource::row_expected_count].
    pub fn row_expected_count(&self) -> TuplesResult<u64> {
        delegate!(&self.kind, inner => inner.row_expected_count())
    }

    /// See [TupleSource::row_cardinality].
    pub fn row_cardinality(&self) -> TuplesResult<Cardinality> {
        delegate!(&self.kind, inner => inner.row_cardinality())
    }

    /// Returns true if the sequence has no rows.
    pub fn is_empty(&self) -> TuplesResult<bool> {
        Ok(self.row_cardinality()? == Cardinality::Zero)
    }

    /// Returns true if the sequence has no variables and at least one row.
    pub fn is_unconstrained(&self) -> TuplesResult<bool> {
        Ok(self.width() == 0 && !self.is_empty()?)
    }

    /// See [TupleSource::is_column_ever_unbound].
    pub fn is_column_ever_unbound(&self, column: usize) -> TuplesResult<bool> {
        delegate!(&self.kind, inner => inner.is_column_ever_unbound(column))
    }

    /// See [TupleSource::comparator].
    pub fn comparator(&self) -> Option<RowComparator> {
        delegate!(&self.kind, inner => inner.comparator())
    }

    /// See [TupleSource::has_no_duplicates].
    pub fn has_no_duplicates(&self) -> bool {
        delegate!(&self.kind, inner => inner.has_no_duplicates())
    }

    /// See [TupleSource::define_prefix].
    pub fn define_prefix(&mut self, bound: &BTreeSet<Variable>) -> TuplesResult<()> {
        delegate!(&mut self.kind, inner => inner.define_prefix(bound))
    }

    /// Returns the operands of this sequence for inspecting the operator tree.
    pub fn operands(&self) -> Vec<&Tuples> {
        match &self.kind {
            TuplesKind::Empty(_)
            | TuplesKind::Unconstrained(_)
            | TuplesKind::Assignment(_)
            | TuplesKind::Literal(_)
            | TuplesKind::Source(_) => Vec::new(),
            TuplesKind::Join(join) => join.operands().iter().collect(),
            TuplesKind::OptionalJoin(join) => vec![join.left(), join.right()],
            TuplesKind::Minus(minus) => vec![minus.left(), minus.right()],
            TuplesKind::OrderedAppend(append) => append.operands().iter().collect(),
            TuplesKind::UnorderedAppend(append) => append.operands().iter().collect(),
            TuplesKind::Projection(projection) => vec![projection.operand()],
            TuplesKind::Distinct(distinct) => vec![distinct.operand()],
            TuplesKind::Filter(filter) => vec![filter.operand()],
            TuplesKind::Bind(bind) => vec![bind.operand()],
            TuplesKind::Limit(limit) => vec![limit.operand()],
            TuplesKind::Offset(offset) => vec![offset.operand()],
        }
    }

    /// Positions the cursor before the first row and collects all rows.
    ///
    /// This is mainly intended for tests and diagnostics as it materializes the whole result.
    pub fn read_all_rows(&mut self) -> TuplesResult<Vec<Vec<NodeId>>> {
        self.rewind()?;
        let mut rows = Vec::new();
        while self.next()? {
            let mut row = Vec::with_capacity(self.width());
            self.read_row(&mut row)?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn fmt_header(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TuplesKind::Empty(inner) => write!(f, "{inner}"),
            TuplesKind::Unconstrained(inner) => write!(f, "{inner}"),
            TuplesKind::Assignment(inner) => write!(f, "{inner}"),
            TuplesKind::Literal(inner) => write!(f, "{inner}"),
            TuplesKind::Source(inner) => f.write_str(inner.name()),
            TuplesKind::Join(inner) => write!(f, "{inner}"),
            TuplesKind::OptionalJoin(inner) => write!(f, "{inner}"),
            TuplesKind::Minus(inner) => write!(f, "{inner}"),
            TuplesKind::OrderedAppend(inner) => write!(f, "{inner}"),
            TuplesKind::UnorderedAppend(inner) => write!(f, "{inner}"),
            TuplesKind::Projection(inner) => write!(f, "{inner}"),
            TuplesKind::Distinct(inner) => write!(f, "{inner}"),
            TuplesKind::Filter(inner) => write!(f, "{inner}"),
            TuplesKind::Bind(inner) => write!(f, "{inner}"),
            TuplesKind::Limit(inner) => write!(f, "{inner}"),
            TuplesKind::Offset(inner) => write!(f, "{inner}"),
        }
    }

    fn fmt_tree(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(f, "{:indent$}", "", indent = depth * 2)?;
        self.fmt_header(f)?;

        f.write_str(" [")?;
        for (i, variable) in self.variables().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{variable}")?;
        }
        f.write_str("]")?;

        for annotation in self.annotations() {
            write!(f, " {annotation}")?;
        }

        for operand in self.operands() {
            writeln!(f)?;
            operand.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl From<TuplesKind> for Tuples {
    fn from(kind: TuplesKind) -> Self {
        Self {
            kind,
            annotations: Vec::new(),
        }
    }
}

macro_rules! implement_from_kind {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Tuples {
            fn from(value: $t) -> Self {
                Self::from(TuplesKind::$variant(value))
            }
        }
    };
}

implement_from_kind!(EmptyTuples, Empty);
implement_from_kind!(UnconstrainedTuples, Unconstrained);
implement_from_kind!(Assignment, Assignment);
implement_from_kind!(LiteralTuples, Literal);
implement_from_kind!(Join, Join);
implement_from_kind!(OptionalJoin, OptionalJoin);
implement_from_kind!(Minus, Minus);
implement_from_kind!(OrderedAppend, OrderedAppend);
implement_from_kind!(UnorderedAppend, UnorderedAppend);
implement_from_kind!(Projection, Projection);
implement_from_kind!(Distinct, Distinct);
implement_from_kind!(Filter, Filter);
implement_from_kind!(Bind, Bind);
implement_from_kind!(Limit, Limit);
implement_from_kind!(Offset, Offset);

/// Renders the operator tree, one operator per line.
impl Display for Tuples {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_tree(f, 0)
    }
}
