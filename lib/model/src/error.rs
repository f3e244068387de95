use crate::Variable;
use std::error::Error;
use thiserror::Error;

/// The result type of all tuple operations.
pub type TuplesResult<T> = Result<T, TuplesError>;

/// The error raised while constructing or evaluating tuple sequences.
///
/// Errors are propagated unchanged through the operator tree. Use
/// [TuplesError::is_argument_error] to tell defects of the caller apart from conditions that
/// stem from the evaluated data.
#[derive(Debug, Error)]
pub enum TuplesError {
    #[error("Column {column} is out of range for a sequence with {width} columns.")]
    InvalidColumn { column: usize, width: usize },
    #[error("The variable {0} is not part of the sequence.")]
    NoSuchVariable(Variable),
    #[error("The cursor is not positioned on a row.")]
    CursorNotPositioned,
    #[error("Suffix truncation is not supported (requested {0}).")]
    SuffixTruncationUnsupported(usize),
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("The operands share no variables: {0}")]
    NoSharedVariables(String),
    #[error("The operands are not union-compatible: {0}")]
    NotUnionCompatible(String),
    #[error("The operand has an unsuitable sort order: {0}")]
    UnsortedInput(String),
    #[error("The sequence has already been closed.")]
    AlreadyClosed,
    #[error("Could not plan the operation: {0}")]
    Planning(String),
    #[error("Could not resolve a value: {0}")]
    Resolution(String),
    #[error("Error while evaluating tuples: {message}")]
    Evaluation {
        message: String,
        #[source]
        cause: Option<Box<dyn Error + Send + Sync>>,
    },
    #[error(transparent)]
    Argument(#[from] ArgumentError),
}

impl TuplesError {
    /// Creates a [TuplesError::Evaluation] without a cause.
    pub fn evaluation(message: impl Into<String>) -> Self {
        TuplesError::Evaluation {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a [TuplesError::Evaluation] that wraps `cause`.
    pub fn evaluation_with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        TuplesError::Evaluation {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Returns true if the error indicates a defect in the caller rather than a data condition.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, TuplesError::Argument(_))
    }
}

/// A violation of an argument contract.
///
/// These errors are never caused by the evaluated data. They are fatal for the operation that
/// raised them and should not be handled by the caller except for reporting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("The variable {0} occurs more than once.")]
    DuplicateVariable(Variable),
    #[error("The variable {0} cannot be assigned the unbound value.")]
    UnboundAssignment(Variable),
    #[error("Row {row} has {actual} columns, expected {expected}.")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("The variable {0} is already bound by the operand.")]
    VariableAlreadyBound(Variable),
    #[error("At least {0} operands are required.")]
    TooFewOperands(usize),
    #[error("Invalid argument: {0}")]
    Invalid(String),
}
