//! errors.rs - Custom error types for the markguard-core library.
//!
//! Every variant here is a configuration-time failure. Content that fails the
//! policy at sanitize time is never an error; it is recorded as a
//! [`crate::violation::Violation`] instead.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// All errors that can prevent a policy from becoming active.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("Unresolved common attribute '{name}' referenced from {context}")]
    UnresolvedAttribute { name: String, context: String },

    #[error("Unknown common regexp '{name}' referenced from {context}")]
    UnknownRegexp { name: String, context: String },

    #[error("Failed to compile pattern '{0}': {1}")]
    PatternCompilation(String, String),

    #[error("Pattern '{0}': length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Unknown {kind} '{value}' in {context}")]
    InvalidKeyword {
        kind: &'static str,
        value: String,
        context: String,
    },

    #[error("Policy validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),

    #[error("Failed to (de)serialize policy document: {0}")]
    SerializationError(String),

    #[error("An unexpected I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_yml::Error> for PolicyError {
    fn from(e: serde_yml::Error) -> Self {
        PolicyError::SerializationError(e.to_string())
    }
}

/// Folds a list of collected errors into one, keeping a lone error as-is.
pub(crate) fn collect_errors(mut errors: Vec<PolicyError>) -> Result<(), PolicyError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(PolicyError::Invalid(
            errors.iter().map(ToString::to_string).collect(),
        )),
    }
}
