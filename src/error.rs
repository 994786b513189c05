//! Error types for grounding and inference.

use thiserror::Error;

/// Result type alias for MLN operations.
pub type Result<T> = std::result::Result<T, MlnError>;

/// Fatal conditions raised while building a ground model or sampling from it.
///
/// None of these is retried internally: they unwind to the top-level call.
#[derive(Debug, Error)]
pub enum MlnError {
    /// A hard formula cannot be made true by any completion of the evidence
    #[error("unsatisfiable evidence for hard formula: {formula}")]
    UnsatisfiableEvidence { formula: String },

    /// A hard formula evaluates to a non-boolean truth degree
    #[error("hard formula {formula} has fuzzy truth value {truth}")]
    InvalidHardConstraint { formula: String, truth: f64 },

    /// Two evidence assignments disagree within one variable
    #[error("contradictory evidence for {atom}: already {previous}, asserted {value}")]
    ValueConflict {
        atom: String,
        previous: f64,
        value: f64,
    },

    /// An assignment breaks the cardinality invariant of a variable
    #[error("inconsistent assignment for variable {variable}: {reason}")]
    ConsistencyViolation { variable: String, reason: String },

    /// A hard ground formula is false in a sampler state
    #[error("hard constraint violated: {formula}")]
    HardConstraintViolation { formula: String },

    /// All values of a variable have zero (or non-finite) unnormalized weight
    #[error("degenerate conditional distribution for variable {variable}")]
    DegenerateDistribution { variable: String },

    /// The grounding worker pool failed
    #[error("grounding worker failed: {0}")]
    WorkerFailure(String),

    #[error("unknown ground atom: {0}")]
    UnknownAtom(String),

    #[error("unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("predicate {predicate} expects {expected} arguments, got {found}")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },

    /// Malformed ground atom string
    #[error("invalid ground atom syntax: {0}")]
    InvalidAtom(String),

    /// Evidence value not admissible for the atom
    #[error("invalid evidence value {value} for {atom}")]
    InvalidEvidence { atom: String, value: f64 },

    /// Enumerating a fuzzy variable whose evidence is unset
    #[error("cannot enumerate values of fuzzy atom {atom} without evidence")]
    FuzzyEnumeration { atom: String },

    /// A free variable of a template formula has no domain
    #[error("free variable {variable} of {formula} has no domain")]
    UnboundVariable { variable: String, formula: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = MlnError::UnsatisfiableEvidence {
            formula: "p(A)".to_string(),
        };
        assert!(err.to_string().contains("p(A)"));

        let err = MlnError::ValueConflict {
            atom: "color(X,red)".to_string(),
            previous: 0.0,
            value: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "contradictory evidence for color(X,red): already 0, asserted 1"
        );
    }
}
