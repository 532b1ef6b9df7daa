use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotilityError {
    #[error("Malformed trajectory input: {0}")]
    MalformedInput(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Nonlinear fit did not converge after {iterations} iterations: {reason}")]
    FitNonConvergence { iterations: usize, reason: String },

    #[error("Non-physical fit: negative squared velocity term ({0:e})")]
    NegativeSquaredVelocity(f64),

    #[error("Invalid analysis parameter: {0}")]
    InvalidAnalysisParameter(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),
}

impl MotilityError {
    /// `true` for the failures of a nonlinear fit (solver failure or non-physical parameters).
    pub fn is_fit_failure(&self) -> bool {
        matches!(
            self,
            MotilityError::FitNonConvergence { .. } | MotilityError::NegativeSquaredVelocity(_)
        )
    }
}

impl PartialEq for MotilityError {
    fn eq(&self, other: &Self) -> bool {
        use MotilityError::*;
        match (self, other) {
            (MalformedInput(a), MalformedInput(b)) => a == b,
            (InsufficientData(a), InsufficientData(b)) => a == b,
            (
                FitNonConvergence {
                    iterations: a,
                    reason: ra,
                },
                FitNonConvergence {
                    iterations: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (NegativeSquaredVelocity(a), NegativeSquaredVelocity(b)) => a == b,
            (InvalidAnalysisParameter(a), InvalidAnalysisParameter(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,

            // Not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
