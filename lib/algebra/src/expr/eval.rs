use crate::expr::{EvalError, EvalResult, ExprValue, Expression, RowContext};
use rdf_tuples_model::vocab::{rdf, xsd};
use rdf_tuples_model::{
    Literal, LiteralRef, NamedNodeRef, NodeId, Term, TuplesError, TuplesResult, ValueResolver,
};
use std::cmp::Ordering;

impl Expression {
    /// Evaluates the expression against the row in `context`.
    ///
    /// The `resolver` is only consulted if the value of a node must be inspected.
    pub fn evaluate(
        &self,
        context: &RowContext<'_>,
        resolver: &dyn ValueResolver,
    ) -> EvalResult<ExprValue> {
        match self {
            Expression::Variable(variable) => {
                let value = context.value(variable);
                if value.is_unbound() {
                    return Err(EvalError::Expected);
                }
                Ok(ExprValue::Node(value))
            }
            Expression::Constant(term) => Ok(ExprValue::Term(term.clone())),
            Expression::Bound(variable) => Ok(boolean(context.value(variable).is_bound())),
            Expression::Not(inner) => Ok(boolean(!inner.ebv(context, resolver)?)),
            Expression::And(lhs, rhs) => {
                let lhs = lhs.ebv(context, resolver);
                let rhs = rhs.ebv(context, resolver);
                and(lhs, rhs).map(boolean)
            }
            Expression::Or(lhs, rhs) => {
                let lhs = lhs.ebv(context, resolver);
                let rhs = rhs.ebv(context, resolver);
                or(lhs, rhs).map(boolean)
            }
            Expression::Equal(lhs, rhs) => {
                let lhs = lhs.evaluate(context, resolver)?;
                let rhs = rhs.evaluate(context, resolver)?;
                equal(lhs, rhs, resolver).map(boolean)
            }
            Expression::SameTerm(lhs, rhs) => {
                let lhs = lhs.evaluate(context, resolver)?;
                let rhs = rhs.evaluate(context, resolver)?;
                same_term(lhs, rhs, resolver).map(boolean)
            }
            Expression::Less(lhs, rhs) => {
                compare(lhs, rhs, context, resolver).map(|o| boolean(o == Ordering::Less))
            }
            Expression::LessOrEqual(lhs, rhs) => {
                compare(lhs, rhs, context, resolver).map(|o| boolean(o != Ordering::Greater))
            }
            Expression::Greater(lhs, rhs) => {
                compare(lhs, rhs, context, resolver).map(|o| boolean(o == Ordering::Greater))
            }
            Expression::GreaterOrEqual(lhs, rhs) => {
                compare(lhs, rhs, context, resolver).map(|o| boolean(o != Ordering::Less))
            }
            Expression::Add(lhs, rhs) => {
                arithmetic(ArithmeticOp::Add, lhs, rhs, context, resolver)
            }
            Expression::Subtract(lhs, rhs) => {
                arithmetic(ArithmeticOp::Subtract, lhs, rhs, context, resolver)
            }
            Expression::Multiply(lhs, rhs) => {
                arithmetic(ArithmeticOp::Multiply, lhs, rhs, context, resolver)
            }
            Expression::Divide(lhs, rhs) => {
                arithmetic(ArithmeticOp::Divide, lhs, rhs, context, resolver)
            }
            Expression::IsIri(inner) => {
                let term = to_term(inner.evaluate(context, resolver)?, resolver)?;
                Ok(boolean(matches!(term, Term::NamedNode(_))))
            }
            Expression::IsBlank(inner) => {
                let term = to_term(inner.evaluate(context, resolver)?, resolver)?;
                Ok(boolean(matches!(term, Term::BlankNode(_))))
            }
            Expression::IsLiteral(inner) => {
                let term = to_term(inner.evaluate(context, resolver)?, resolver)?;
                Ok(boolean(matches!(term, Term::Literal(_))))
            }
            Expression::Str(inner) => {
                let string = match to_term(inner.evaluate(context, resolver)?, resolver)? {
                    Term::NamedNode(node) => node.into_string(),
                    Term::Literal(literal) => literal.value().to_owned(),
                    _ => return Err(EvalError::Expected),
                };
                Ok(ExprValue::Term(Literal::new_simple_literal(string).into()))
            }
            Expression::If(condition, then, otherwise) => {
                if condition.ebv(context, resolver)? {
                    then.evaluate(context, resolver)
                } else {
                    otherwise.evaluate(context, resolver)
                }
            }
            Expression::Coalesce(inner) => {
                for expression in inner {
                    match expression.evaluate(context, resolver) {
                        Err(EvalError::Expected) => continue,
                        result => return result,
                    }
                }
                Err(EvalError::Expected)
            }
        }
    }

    /// Evaluates the expression as a filter condition.
    ///
    /// Rows for which the expression raises an [EvalError::Expected] do not pass the filter.
    pub fn test(
        &self,
        context: &RowContext<'_>,
        resolver: &dyn ValueResolver,
    ) -> TuplesResult<bool> {
        match self.ebv(context, resolver) {
            Ok(value) => Ok(value),
            Err(EvalError::Expected) => Ok(false),
            Err(EvalError::Tuples(error)) => Err(error),
        }
    }

    /// Evaluates the expression to a node id, localizing computed terms with `resolver`.
    ///
    /// Returns [NodeId::UNBOUND] if the expression raises an [EvalError::Expected].
    pub fn evaluate_node(
        &self,
        context: &RowContext<'_>,
        resolver: &dyn ValueResolver,
    ) -> TuplesResult<NodeId> {
        match self.evaluate(context, resolver) {
            Ok(ExprValue::Node(node)) => Ok(node),
            Ok(ExprValue::Term(term)) => resolver.localize(term.as_ref()),
            Err(EvalError::Expected) => Ok(NodeId::UNBOUND),
            Err(EvalError::Tuples(error)) => Err(error),
        }
    }

    /// Computes the effective boolean value of the expression.
    fn ebv(&self, context: &RowContext<'_>, resolver: &dyn ValueResolver) -> EvalResult<bool> {
        let term = to_term(self.evaluate(context, resolver)?, resolver)?;
        effective_boolean_value(&term)
    }
}

fn compare(
    lhs: &Expression,
    rhs: &Expression,
    context: &RowContext<'_>,
    resolver: &dyn ValueResolver,
) -> EvalResult<Ordering> {
    let lhs = to_term(lhs.evaluate(context, resolver)?, resolver)?;
    let rhs = to_term(rhs.evaluate(context, resolver)?, resolver)?;
    let (Term::Literal(lhs), Term::Literal(rhs)) = (lhs, rhs) else {
        return Err(EvalError::Expected);
    };

    if let (Some(lhs), Some(rhs)) = (
        Numeric::from_literal(lhs.as_ref())?,
        Numeric::from_literal(rhs.as_ref())?,
    ) {
        return lhs.compare(rhs).ok_or(EvalError::Expected);
    }
    if lhs.datatype() == xsd::STRING && rhs.datatype() == xsd::STRING {
        return Ok(lhs.value().cmp(rhs.value()));
    }
    if lhs.datatype() == xsd::BOOLEAN && rhs.datatype() == xsd::BOOLEAN {
        return Ok(parse_boolean(lhs.value())?.cmp(&parse_boolean(rhs.value())?));
    }
    Err(EvalError::Expected)
}

fn boolean(value: bool) -> ExprValue {
    ExprValue::Term(Literal::from(value).into())
}

fn to_term(value: ExprValue, resolver: &dyn ValueResolver) -> EvalResult<Term> {
    match value {
        ExprValue::Term(term) => Ok(term),
        ExprValue::Node(node) => {
            let term = resolver.globalize(node)?.ok_or_else(|| {
                TuplesError::Resolution(format!("The node {node} is unknown to the resolver."))
            })?;
            Ok(term)
        }
    }
}

/// The three-valued logical and. A false operand wins over an expected error.
fn and(lhs: EvalResult<bool>, rhs: EvalResult<bool>) -> EvalResult<bool> {
    match (lhs, rhs) {
        (Err(EvalError::Tuples(error)), _) | (_, Err(EvalError::Tuples(error))) => {
            Err(error.into())
        }
        (Ok(false), _) | (_, Ok(false)) => Ok(false),
        (Ok(true), Ok(true)) => Ok(true),
        _ => Err(EvalError::Expected),
    }
}

/// The three-valued logical or. A true operand wins over an expected error.
fn or(lhs: EvalResult<bool>, rhs: EvalResult<bool>) -> EvalResult<bool> {
    match (lhs, rhs) {
        (Err(EvalError::Tuples(error)), _) | (_, Err(EvalError::Tuples(error))) => {
            Err(error.into())
        }
        (Ok(true), _) | (_, Ok(true)) => Ok(true),
        (Ok(false), Ok(false)) => Ok(false),
        _ => Err(EvalError::Expected),
    }
}

fn equal(lhs: ExprValue, rhs: ExprValue, resolver: &dyn ValueResolver) -> EvalResult<bool> {
    if let (ExprValue::Node(lhs), ExprValue::Node(rhs)) = (&lhs, &rhs) {
        if lhs == rhs {
            return Ok(true);
        }
    }

    let lhs = to_term(lhs, resolver)?;
    let rhs = to_term(rhs, resolver)?;
    if lhs == rhs {
        return Ok(true);
    }

    match (lhs, rhs) {
        (Term::Literal(lhs), Term::Literal(rhs)) => {
            if let (Some(lhs), Some(rhs)) = (
                Numeric::from_literal(lhs.as_ref())?,
                Numeric::from_literal(rhs.as_ref())?,
            ) {
                return Ok(lhs.compare(rhs) == Some(Ordering::Equal));
            }
            if has_known_datatype(lhs.as_ref()) && has_known_datatype(rhs.as_ref()) {
                return Ok(false);
            }
            Err(EvalError::Expected)
        }
        _ => Ok(false),
    }
}

fn same_term(lhs: ExprValue, rhs: ExprValue, resolver: &dyn ValueResolver) -> EvalResult<bool> {
    match (lhs, rhs) {
        (ExprValue::Node(lhs), ExprValue::Node(rhs)) => Ok(lhs == rhs),
        (ExprValue::Term(lhs), ExprValue::Term(rhs)) => Ok(lhs == rhs),
        (lhs, rhs) => Ok(to_term(lhs, resolver)? == to_term(rhs, resolver)?),
    }
}

fn has_known_datatype(literal: LiteralRef<'_>) -> bool {
    let datatype = literal.datatype();
    datatype == xsd::STRING
        || datatype == xsd::BOOLEAN
        || datatype == rdf::LANG_STRING
        || is_numeric_datatype(literal)
}

fn is_numeric_datatype(literal: LiteralRef<'_>) -> bool {
    let datatype = literal.datatype();
    INTEGER_DATATYPES.contains(&datatype)
        || datatype == xsd::DECIMAL
        || datatype == xsd::DOUBLE
        || datatype == xsd::FLOAT
}

fn effective_boolean_value(term: &Term) -> EvalResult<bool> {
    let Term::Literal(literal) = term else {
        return Err(EvalError::Expected);
    };

    if literal.datatype() == xsd::BOOLEAN {
        return parse_boolean(literal.value());
    }
    if literal.datatype() == xsd::STRING {
        return Ok(!literal.value().is_empty());
    }
    match Numeric::from_literal(literal.as_ref())? {
        Some(Numeric::Integer(value)) => Ok(value != 0),
        Some(Numeric::Decimal(value) | Numeric::Double(value)) => {
            Ok(value != 0.0 && !value.is_nan())
        }
        None => Err(EvalError::Expected),
    }
}

fn parse_boolean(value: &str) -> EvalResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(EvalError::Expected),
    }
}

const INTEGER_DATATYPES: [NamedNodeRef<'static>; 13] = [
    xsd::INTEGER,
    xsd::INT,
    xsd::LONG,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

/// A numeric value. Operations promote integers to decimals and decimals to doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Numeric {
    /// Parses a numeric literal. Returns [None] if the literal is not numeric.
    fn from_literal(literal: LiteralRef<'_>) -> EvalResult<Option<Self>> {
        let datatype = literal.datatype();
        let value = literal.value();
        let numeric = if INTEGER_DATATYPES.contains(&datatype) {
            Numeric::Integer(value.parse()?)
        } else if datatype == xsd::DECIMAL {
            Numeric::Decimal(value.parse()?)
        } else if datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
            Numeric::Double(value.parse()?)
        } else {
            return Ok(None);
        };
        Ok(Some(numeric))
    }

    #[allow(clippy::cast_precision_loss, reason = "Integers are promoted like in SPARQL")]
    fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(value) => value as f64,
            Numeric::Decimal(value) | Numeric::Double(value) => value,
        }
    }

    fn compare(self, other: Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(lhs), Numeric::Integer(rhs)) => Some(lhs.cmp(&rhs)),
            (lhs, rhs) => lhs.as_f64().partial_cmp(&rhs.as_f64()),
        }
    }

    fn into_literal(self) -> Literal {
        match self {
            Numeric::Integer(value) => Literal::from(value),
            Numeric::Decimal(value) => {
                Literal::new_typed_literal(format_decimal(value), xsd::DECIMAL)
            }
            Numeric::Double(value) => Literal::from(value),
        }
    }
}

fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

fn arithmetic(
    op: ArithmeticOp,
    lhs: &Expression,
    rhs: &Expression,
    context: &RowContext<'_>,
    resolver: &dyn ValueResolver,
) -> EvalResult<ExprValue> {
    let lhs = numeric_operand(lhs, context, resolver)?;
    let rhs = numeric_operand(rhs, context, resolver)?;

    let result = match (lhs, rhs) {
        (Numeric::Integer(lhs), Numeric::Integer(rhs)) => {
            let value = match op {
                ArithmeticOp::Add => lhs.checked_add(rhs),
                ArithmeticOp::Subtract => lhs.checked_sub(rhs),
                ArithmeticOp::Multiply => lhs.checked_mul(rhs),
                ArithmeticOp::Divide => {
                    if rhs == 0 {
                        return Err(EvalError::Expected);
                    }
                    let value = Numeric::Integer(lhs).as_f64() / Numeric::Integer(rhs).as_f64();
                    return Ok(ExprValue::Term(Numeric::Decimal(value).into_literal().into()));
                }
            };
            Numeric::Integer(value.ok_or(EvalError::Expected)?)
        }
        (lhs, rhs) => {
            let is_double =
                matches!(lhs, Numeric::Double(_)) || matches!(rhs, Numeric::Double(_));
            let (lhs, rhs) = (lhs.as_f64(), rhs.as_f64());
            let value = match op {
                ArithmeticOp::Add => lhs + rhs,
                ArithmeticOp::Subtract => lhs - rhs,
                ArithmeticOp::Multiply => lhs * rhs,
                ArithmeticOp::Divide => {
                    if !is_double && rhs == 0.0 {
                        return Err(EvalError::Expected);
                    }
                    lhs / rhs
                }
            };
            if is_double {
                Numeric::Double(value)
            } else {
                Numeric::Decimal(value)
            }
        }
    };
    Ok(ExprValue::Term(result.into_literal().into()))
}

fn numeric_operand(
    expression: &Expression,
    context: &RowContext<'_>,
    resolver: &dyn ValueResolver,
) -> EvalResult<Numeric> {
    match to_term(expression.evaluate(context, resolver)?, resolver)? {
        Term::Literal(literal) => {
            Numeric::from_literal(literal.as_ref())?.ok_or(EvalError::Expected)
        }
        _ => Err(EvalError::Expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_tuples_model::{MemValueResolver, NamedNode, Variable};

    struct Fixture {
        resolver: MemValueResolver,
        variables: Vec<Variable>,
        row: Vec<NodeId>,
    }

    impl Fixture {
        /// Binds ?a to 2, ?b to 3, ?s to an IRI and leaves ?u unbound.
        fn new() -> Self {
            let resolver = MemValueResolver::new();
            let a = resolver.localize(Literal::from(2).as_ref().into()).unwrap();
            let b = resolver.localize(Literal::from(3).as_ref().into()).unwrap();
            let s = resolver
                .localize(NamedNode::new_unchecked("http://example.com/s").as_ref().into())
                .unwrap();
            Self {
                resolver,
                variables: ["a", "b", "s", "u"].into_iter().map(Variable::new).collect(),
                row: vec![a, b, s, NodeId::UNBOUND],
            }
        }

        fn context(&self) -> RowContext<'_> {
            RowContext::new(&self.variables, &self.row)
        }

        fn evaluate(&self, expression: &Expression) -> EvalResult<Term> {
            let value = expression.evaluate(&self.context(), &self.resolver)?;
            to_term(value, &self.resolver)
        }

        fn test(&self, expression: &Expression) -> bool {
            expression.test(&self.context(), &self.resolver).unwrap()
        }
    }

    fn var(name: &str) -> Expression {
        Expression::variable(name)
    }

    fn int(value: i64) -> Expression {
        Expression::constant(Literal::from(value))
    }

    #[test]
    fn test_integer_arithmetic() {
        let fixture = Fixture::new();
        let result = fixture.evaluate(&var("a").add(var("b")).multiply(int(4))).unwrap();
        assert_eq!(result, Term::from(Literal::from(20)));
    }

    #[test]
    fn test_integer_division_yields_decimal() {
        let fixture = Fixture::new();
        let result = fixture.evaluate(&var("b").divide(var("a"))).unwrap();
        assert_eq!(
            result,
            Term::from(Literal::new_typed_literal("1.5", xsd::DECIMAL))
        );
        assert!(matches!(
            fixture.evaluate(&var("b").divide(int(0))),
            Err(EvalError::Expected)
        ));
    }

    #[test]
    fn test_comparisons() {
        let fixture = Fixture::new();
        assert!(fixture.test(&var("a").less(var("b"))));
        assert!(fixture.test(&var("a").less_or_equal(int(2))));
        assert!(!fixture.test(&var("a").greater(var("b"))));
        assert!(fixture.test(&var("a").equal(int(2))));
        assert!(!fixture.test(&var("s").equal(var("a"))));
    }

    #[test]
    fn test_unbound_variable_is_expected_error() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.evaluate(&var("u").add(int(1))),
            Err(EvalError::Expected)
        ));
        assert!(!fixture.test(&var("u").equal(var("u"))));
        assert!(fixture.test(&Expression::bound("u").not()));
    }

    #[test]
    fn test_three_valued_logic() {
        let fixture = Fixture::new();
        let error = var("u").equal(int(1));
        let truth = var("a").equal(int(2));
        let falsity = var("a").equal(int(3));

        assert!(fixture.test(&error.clone().or(truth.clone())));
        assert!(!fixture.test(&error.clone().and(truth)));
        assert!(matches!(
            fixture.evaluate(&error.clone().or(falsity.clone())),
            Err(EvalError::Expected)
        ));
        assert_eq!(
            fixture.evaluate(&error.and(falsity)).unwrap(),
            Term::from(Literal::from(false))
        );
    }

    #[test]
    fn test_term_tests_and_str() {
        let fixture = Fixture::new();
        assert!(fixture.test(&Expression::IsIri(Box::new(var("s")))));
        assert!(fixture.test(&Expression::IsLiteral(Box::new(var("a")))));
        assert!(!fixture.test(&Expression::IsBlank(Box::new(var("a")))));
        assert_eq!(
            fixture.evaluate(&Expression::Str(Box::new(var("s")))).unwrap(),
            Term::from(Literal::new_simple_literal("http://example.com/s"))
        );
    }

    #[test]
    fn test_coalesce_and_if() {
        let fixture = Fixture::new();
        let coalesce = Expression::Coalesce(vec![var("u"), var("b")]);
        assert_eq!(
            fixture.evaluate(&coalesce).unwrap(),
            Term::from(Literal::from(3))
        );

        let condition = Expression::If(
            Box::new(var("a").greater(var("b"))),
            Box::new(var("a")),
            Box::new(var("b")),
        );
        assert_eq!(
            fixture.evaluate(&condition).unwrap(),
            Term::from(Literal::from(3))
        );
    }

    #[test]
    fn test_evaluate_node() {
        let fixture = Fixture::new();
        let context = fixture.context();

        let node = var("a")
            .add(int(1))
            .evaluate_node(&context, &fixture.resolver)
            .unwrap();
        assert_eq!(fixture.resolver.get(Literal::from(3).as_ref().into()), Some(node));

        let node = var("u").evaluate_node(&context, &fixture.resolver).unwrap();
        assert_eq!(node, NodeId::UNBOUND);
    }

    #[test]
    fn test_unknown_node_is_resolution_error() {
        let fixture = Fixture::new();
        let variables = [Variable::new("x")];
        let row = [NodeId::from(999)];
        let context = RowContext::new(&variables, &row);

        let result = var("x").equal(int(1)).test(&context, &fixture.resolver);
        assert!(matches!(result, Err(TuplesError::Resolution(_))));
    }
}
