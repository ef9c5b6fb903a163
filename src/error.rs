use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraderError>;

/// Failures raised by the comparison engine. A misbehaving candidate program is
/// never one of these; it is penalized instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraderError {
    #[error("reference has {reference} test cases but candidate has {candidate}")]
    MismatchedCaseCount { reference: usize, candidate: usize },

    #[error("test case {index} is out of range ({case_count} test cases)")]
    TestCaseIndex { index: usize, case_count: usize },

    #[error("mask has {actual} entries, expected {expected}")]
    MaskLength { expected: usize, actual: usize },

    #[error("analyze() must be called before grading")]
    NotAnalyzed,

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: String, reason: String },
}

impl GraderError {
    pub fn invalid_setting(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GraderError::MismatchedCaseCount {
            reference: 3,
            candidate: 2,
        };
        assert_eq!(
            err.to_string(),
            "reference has 3 test cases but candidate has 2"
        );

        let err = GraderError::invalid_setting("pass_threshold", "must be within 0..=100");
        assert!(err.to_string().contains("pass_threshold"));
    }
}
