//! Error type shared by every stage of a model run

use thiserror::Error;

/// Errors raised while configuring, validating or calculating a model
///
/// Every variant carries enough context to produce a descriptive message.
/// Nothing is recovered silently: the first error aborts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Record set '{set}' has no identifier column '{column}'")]
    MissingIdColumn { set: String, column: String },

    #[error("Record set '{set}' has duplicate identifier '{id}' in column '{column}'")]
    DuplicateId { set: String, column: String, id: String },

    #[error("Record set '{set}' has no column '{column}'")]
    UnknownColumn { set: String, column: String },

    #[error("Record set '{set}' has no record at position {record}")]
    RecordOutOfRange { set: String, record: usize },

    #[error("Run plan has no 'version' column")]
    MissingVersionColumn,

    #[error("Run plan has no version '{0}'")]
    UnknownVersion(String),

    #[error("Run plan has no parameter '{name}' for version '{version}'")]
    UnknownParameter { name: String, version: String },

    #[error("Expected {expected} value, found '{found}'")]
    ValueType { expected: &'static str, found: String },

    #[error("Component '{0}' has no assigned formula")]
    UnboundFormula(String),

    #[error("Component '{name}' is a {kind} and requires a formula with {expected}")]
    FormulaArity { name: String, kind: &'static str, expected: &'static str },

    #[error("Name '{0}' is used more than once in the model")]
    DuplicateName(String),

    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Component '{name}' is not a {expected}")]
    KindMismatch { name: String, expected: &'static str },

    #[error("Record set '{set}' has no record linked to identifier '{id}'")]
    UnlinkedRecord { set: String, id: String },

    #[error("Unknown record set '{0}'")]
    UnknownRecordSet(String),

    #[error("Model has no record sets")]
    NoRecordSets,

    #[error("Model has not been validated")]
    NotValidated,

    #[error("Recursion cycle while evaluating {path} at t={t}")]
    Cycle { path: String, t: i64 },

    #[error("Constant '{0}' was read before it was calculated")]
    ConstantNotCalculated(String),

    #[error("Component '{name}' has no calculated result for record {record}")]
    RecordNotCalculated { name: String, record: usize },

    #[error("Results of other records are not retained; '{0}' was read across records")]
    HistoryNotRetained(String),

    #[error("Recursion depth {depth} exceeded while evaluating '{name}' at t={t}")]
    RecursionDepth { name: String, t: i64, depth: usize },

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Failed to read input: {0}")]
    Input(String),

    #[error("{0}")]
    Formula(String),
}

impl ModelError {
    /// Error raised from inside a user formula
    pub fn formula(message: impl Into<String>) -> Self {
        ModelError::Formula(message.into())
    }
}

impl From<csv::Error> for ModelError {
    fn from(err: csv::Error) -> Self {
        ModelError::Input(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Settings(err.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_descriptive() {
        let err = ModelError::DuplicateId {
            set: "policy".into(),
            column: "POLICY_ID".into(),
            id: "2".into(),
        };
        assert_eq!(
            err.to_string(),
            "Record set 'policy' has duplicate identifier '2' in column 'POLICY_ID'"
        );

        let err = ModelError::formula("negative premium");
        assert_eq!(err.to_string(), "negative premium");
    }
}
