//! The expression language of filters and binds.
//!
//! Expressions are evaluated against a [RowContext] that is passed explicitly to every
//! evaluation. Node ids are translated to RDF terms only if an operation needs to inspect the
//! value of a node.

mod eval;

use rdf_tuples_model::{NodeId, Term, TuplesError, Variable};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// An expression over the variables of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(Variable),
    Constant(Term),
    /// Returns true if the variable is bound in the row.
    Bound(Variable),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Equal(Box<Expression>, Box<Expression>),
    SameTerm(Box<Expression>, Box<Expression>),
    Less(Box<Expression>, Box<Expression>),
    LessOrEqual(Box<Expression>, Box<Expression>),
    Greater(Box<Expression>, Box<Expression>),
    GreaterOrEqual(Box<Expression>, Box<Expression>),
    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    IsIri(Box<Expression>),
    IsBlank(Box<Expression>),
    IsLiteral(Box<Expression>),
    Str(Box<Expression>),
    If(Box<Expression>, Box<Expression>, Box<Expression>),
    Coalesce(Vec<Expression>),
}

macro_rules! binary_builder {
    ($name: ident, $variant: ident) => {
        #[must_use]
        pub fn $name(self, rhs: Expression) -> Expression {
            Expression::$variant(Box::new(self), Box::new(rhs))
        }
    };
}

impl Expression {
    /// Creates an expression that refers to the variable with the given `name`.
    pub fn variable(name: &str) -> Self {
        Expression::Variable(Variable::new(name))
    }

    /// Creates a constant expression.
    pub fn constant(term: impl Into<Term>) -> Self {
        Expression::Constant(term.into())
    }

    /// Creates an expression that tests whether the variable with the given `name` is bound.
    pub fn bound(name: &str) -> Self {
        Expression::Bound(Variable::new(name))
    }

    #[must_use]
    pub fn not(self) -> Expression {
        Expression::Not(Box::new(self))
    }

    binary_builder!(and, And);
    binary_builder!(or, Or);
    binary_builder!(equal, Equal);
    binary_builder!(same_term, SameTerm);
    binary_builder!(less, Less);
    binary_builder!(less_or_equal, LessOrEqual);
    binary_builder!(greater, Greater);
    binary_builder!(greater_or_equal, GreaterOrEqual);
    binary_builder!(add, Add);
    binary_builder!(subtract, Subtract);
    binary_builder!(multiply, Multiply);
    binary_builder!(divide, Divide);

    /// Returns the variables referenced by this expression.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut result = BTreeSet::new();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables(&self, result: &mut BTreeSet<Variable>) {
        match self {
            Expression::Variable(variable) | Expression::Bound(variable) => {
                result.insert(variable.clone());
            }
            Expression::Constant(_) => {}
            Expression::Not(inner)
            | Expression::IsIri(inner)
            | Expression::IsBlank(inner)
            | Expression::IsLiteral(inner)
            | Expression::Str(inner) => inner.collect_variables(result),
            Expression::And(lhs, rhs)
            | Expression::Or(lhs, rhs)
            | Expression::Equal(lhs, rhs)
            | Expression::SameTerm(lhs, rhs)
            | Expression::Less(lhs, rhs)
            | Expression::LessOrEqual(lhs, rhs)
            | Expression::Greater(lhs, rhs)
            | Expression::GreaterOrEqual(lhs, rhs)
            | Expression::Add(lhs, rhs)
            | Expression::Subtract(lhs, rhs)
            | Expression::Multiply(lhs, rhs)
            | Expression::Divide(lhs, rhs) => {
                lhs.collect_variables(result);
                rhs.collect_variables(result);
            }
            Expression::If(condition, then, otherwise) => {
                condition.collect_variables(result);
                then.collect_variables(result);
                otherwise.collect_variables(result);
            }
            Expression::Coalesce(inner) => {
                for expression in inner {
                    expression.collect_variables(result);
                }
            }
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Variable(variable) => write!(f, "{variable}"),
            Expression::Constant(term) => write!(f, "{term}"),
            Expression::Bound(variable) => write!(f, "bound({variable})"),
            Expression::Not(inner) => write!(f, "!({inner})"),
            Expression::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Expression::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
            Expression::Equal(lhs, rhs) => write!(f, "({lhs} = {rhs})"),
            Expression::SameTerm(lhs, rhs) => write!(f, "sameTerm({lhs}, {rhs})"),
            Expression::Less(lhs, rhs) => write!(f, "({lhs} < {rhs})"),
            Expression::LessOrEqual(lhs, rhs) => write!(f, "({lhs} <= {rhs})"),
            Expression::Greater(lhs, rhs) => write!(f, "({lhs} > {rhs})"),
            Expression::GreaterOrEqual(lhs, rhs) => write!(f, "({lhs} >= {rhs})"),
            Expression::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            Expression::Subtract(lhs, rhs) => write!(f, "({lhs} - {rhs})"),
            Expression::Multiply(lhs, rhs) => write!(f, "({lhs} * {rhs})"),
            Expression::Divide(lhs, rhs) => write!(f, "({lhs} / {rhs})"),
            Expression::IsIri(inner) => write!(f, "isIRI({inner})"),
            Expression::IsBlank(inner) => write!(f, "isBlank({inner})"),
            Expression::IsLiteral(inner) => write!(f, "isLiteral({inner})"),
            Expression::Str(inner) => write!(f, "str({inner})"),
            Expression::If(condition, then, otherwise) => {
                write!(f, "if({condition}, {then}, {otherwise})")
            }
            Expression::Coalesce(inner) => {
                f.write_str("coalesce(")?;
                for (i, expression) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{expression}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// The bindings of the row an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'row> {
    variables: &'row [Variable],
    row: &'row [NodeId],
}

impl<'row> RowContext<'row> {
    /// Creates a new [RowContext]. `row` holds one value per variable.
    pub fn new(variables: &'row [Variable], row: &'row [NodeId]) -> Self {
        Self { variables, row }
    }

    /// Returns the variables of the row.
    pub fn variables(&self) -> &'row [Variable] {
        self.variables
    }

    /// Returns the value of `variable`. Variables that are not part of the row are
    /// [NodeId::UNBOUND].
    pub fn value(&self, variable: &Variable) -> NodeId {
        self.variables
            .iter()
            .position(|v| v == variable)
            .and_then(|i| self.row.get(i).copied())
            .unwrap_or(NodeId::UNBOUND)
    }
}

/// The error raised while evaluating an expression.
#[derive(Debug, Error)]
pub enum EvalError {
    /// An expected failure, e.g., an operand has the wrong type or a variable is unbound.
    ///
    /// Filters treat this error as false and binds as [NodeId::UNBOUND].
    #[error("The expression cannot be evaluated for this row.")]
    Expected,
    /// A failure that aborts the evaluation of the whole sequence.
    #[error(transparent)]
    Tuples(#[from] TuplesError),
}

/// A light-weight result used while evaluating expressions.
pub type EvalResult<T> = Result<T, EvalError>;

macro_rules! implement_expected_from {
    ($t:ty) => {
        impl From<$t> for EvalError {
            fn from(_: $t) -> Self {
                EvalError::Expected
            }
        }
    };
}

implement_expected_from!(ParseIntError);
implement_expected_from!(ParseFloatError);

/// The value of an evaluated expression.
///
/// Values read from the row stay node ids until an operation needs the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprValue {
    Node(NodeId),
    Term(Term),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_tuples_model::{Literal, NamedNode};

    #[test]
    fn test_variables() {
        let expression = Expression::variable("x")
            .add(Expression::constant(Literal::from(1)))
            .equal(Expression::variable("y"))
            .or(Expression::bound("z"));

        let names = expression
            .variables()
            .iter()
            .map(Variable::to_string)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["?x", "?y", "?z"]);
    }

    #[test]
    fn test_display() {
        let expression = Expression::If(
            Box::new(Expression::IsIri(Box::new(Expression::variable("s")))),
            Box::new(Expression::Str(Box::new(Expression::variable("s")))),
            Box::new(Expression::constant(NamedNode::new_unchecked(
                "http://example.com/none",
            ))),
        );

        insta::assert_snapshot!(expression, @"if(isIRI(?s), str(?s), <http://example.com/none>)");
    }

    #[test]
    fn test_row_context_defaults_to_unbound() {
        let variables = [Variable::new("x")];
        let row = [NodeId::from(3)];
        let context = RowContext::new(&variables, &row);

        assert_eq!(context.value(&Variable::new("x")), NodeId::from(3));
        assert_eq!(context.value(&Variable::new("y")), NodeId::UNBOUND);
    }
}
