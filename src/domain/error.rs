//! Error kinds raised by the harness core.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while declaring, resolving or asserting tests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarnessError {
    // Assertions
    /// Expected and actual values differ
    #[error("expected {expected}, got {actual}")]
    AssertionMismatch { expected: String, actual: String },

    /// A boolean assertion did not hold
    #[error("{0}")]
    AssertionFailed(String),

    /// The expected error kind or message pattern was not raised
    #[error("{0}")]
    RaisesMismatch(String),

    // Mocks
    /// A spec-constrained mock was accessed outside its capability set
    #[error("mock '{mock}' has no attribute '{attribute}'")]
    UnknownAttribute { mock: String, attribute: String },

    /// Patching a path the namespace does not define
    #[error("patch target not found: {0}")]
    PatchTargetNotFound(String),

    /// Effect configured on a mock, raised on invocation
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    // Fixtures
    /// Fixture resolution re-entered a fixture that is still being set up
    #[error("cyclic fixture dependency: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    /// No provider registered under this name
    #[error("fixture not found: {0}")]
    FixtureNotFound(String),

    /// The fixture value is not of the requested type
    #[error("fixture '{name}' is not a {expected}")]
    FixtureType { name: String, expected: &'static str },

    /// A session fixture requested a function fixture
    #[error("session fixture '{fixture}' cannot depend on function fixture '{dependency}'")]
    ScopeMismatch { fixture: String, dependency: String },

    // Parametrize
    /// A value row does not match the declared parameter names
    #[error("parametrize row {row} has {actual} values, expected {expected}")]
    ParametrizeArityMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The test asked for a parameter it was not given
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    // Runner
    /// Test exceeded its configured duration
    #[error("test exceeded timeout of {0:?}")]
    Timeout(Duration),

    /// A test body or fixture hook panicked
    #[error("{0}")]
    Panicked(String),
}

impl HarnessError {
    /// Stable kind name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssertionMismatch { .. } => "AssertionMismatch",
            Self::AssertionFailed(_) => "AssertionFailed",
            Self::RaisesMismatch(_) => "RaisesMismatch",
            Self::UnknownAttribute { .. } => "UnknownAttribute",
            Self::PatchTargetNotFound(_) => "PatchTargetNotFound",
            Self::Raised { .. } => "Raised",
            Self::CyclicDependency { .. } => "CyclicDependency",
            Self::FixtureNotFound(_) => "FixtureNotFound",
            Self::FixtureType { .. } => "FixtureType",
            Self::ScopeMismatch { .. } => "ScopeMismatch",
            Self::ParametrizeArityMismatch { .. } => "ParametrizeArityMismatch",
            Self::UnknownParameter(_) => "UnknownParameter",
            Self::Timeout(_) => "Timeout",
            Self::Panicked(_) => "Panic",
        }
    }

    /// Panic payload as an error. `&str` and `String` payloads keep their text.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panicked with a non-string payload".to_string());
        Self::Panicked(message)
    }

    /// Effect raised by a mock, e.g. `HarnessError::raised("Exception", "DB write failed")`.
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
