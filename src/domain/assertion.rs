//! Assertion helpers. Each returns a [`HarnessError`] so test bodies can use `?`.

use crate::domain::error::{HarnessError, Result};
use regex::Regex;
use std::any::type_name;
use std::fmt::Debug;
use std::marker::PhantomData;

pub fn assert_equal<A, E>(actual: A, expected: E) -> Result<()>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessError::AssertionMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        })
    }
}

pub fn assert_true(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed(message.into()))
    }
}

#[derive(Debug, Clone)]
enum MessageCheck {
    None,
    Pattern(String),
    Contains(String),
}

impl MessageCheck {
    fn check(&self, message: &str) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Pattern(pattern) => {
                let re = Regex::new(pattern).map_err(|e| {
                    HarnessError::RaisesMismatch(format!("invalid pattern '{pattern}': {e}"))
                })?;
                if re.is_match(message) {
                    Ok(())
                } else {
                    Err(HarnessError::RaisesMismatch(format!(
                        "pattern '{pattern}' does not match '{message}'"
                    )))
                }
            }
            Self::Contains(needle) => {
                if message.contains(needle.as_str()) {
                    Ok(())
                } else {
                    Err(HarnessError::RaisesMismatch(format!(
                        "'{needle}' not found in '{message}'"
                    )))
                }
            }
        }
    }
}

/// Expect an operation to fail with error type `E`.
pub fn raises<E>() -> Raises<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Raises {
        message: MessageCheck::None,
        _kind: PhantomData,
    }
}

/// Expect an operation to fail with any error.
pub fn raises_any() -> RaisesAny {
    RaisesAny {
        message: MessageCheck::None,
    }
}

#[derive(Debug)]
pub struct Raises<E> {
    message: MessageCheck,
    _kind: PhantomData<fn() -> E>,
}

impl<E> Raises<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Regex searched for anywhere in the error message.
    #[must_use]
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.message = MessageCheck::Pattern(pattern.into());
        self
    }

    #[must_use]
    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.message = MessageCheck::Contains(needle.into());
        self
    }

    /// Run `op` and return the captured error if it has the expected type
    /// and message.
    pub fn check<T, X, F>(self, op: F) -> Result<E>
    where
        F: FnOnce() -> std::result::Result<T, X>,
        X: Into<anyhow::Error>,
        T: Debug,
    {
        let err: anyhow::Error = match op() {
            Ok(value) => {
                return Err(HarnessError::RaisesMismatch(format!(
                    "expected {} to be raised, got Ok({value:?})",
                    short_type_name::<E>()
                )));
            }
            Err(err) => err.into(),
        };
        let err = err.downcast::<E>().map_err(|other| {
            HarnessError::RaisesMismatch(format!(
                "expected {}, got: {other:#}",
                short_type_name::<E>()
            ))
        })?;
        self.message.check(&err.to_string())?;
        Ok(err)
    }
}

#[derive(Debug)]
pub struct RaisesAny {
    message: MessageCheck,
}

impl RaisesAny {
    #[must_use]
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.message = MessageCheck::Pattern(pattern.into());
        self
    }

    #[must_use]
    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.message = MessageCheck::Contains(needle.into());
        self
    }

    pub fn check<T, X, F>(self, op: F) -> Result<anyhow::Error>
    where
        F: FnOnce() -> std::result::Result<T, X>,
        X: Into<anyhow::Error>,
        T: Debug,
    {
        match op() {
            Ok(value) => Err(HarnessError::RaisesMismatch(format!(
                "expected an error, got Ok({value:?})"
            ))),
            Err(err) => {
                let err: anyhow::Error = err.into();
                self.message.check(&format!("{err:#}"))?;
                Ok(err)
            }
        }
    }
}

fn short_type_name<E>() -> &'static str {
    let full = type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    #[error("Cannot divide by zero")]
    struct DivideByZero;

    #[derive(Debug, Error)]
    #[error("other")]
    struct Other;

    fn divide(a: f64, b: f64) -> std::result::Result<f64, DivideByZero> {
        if b == 0.0 { Err(DivideByZero) } else { Ok(a / b) }
    }

    #[test]
    fn test_assert_equal_reports_both_sides() {
        assert!(assert_equal(3, 3).is_ok());
        assert_eq!(
            assert_equal("a", "b").unwrap_err(),
            HarnessError::AssertionMismatch {
                expected: "\"b\"".into(),
                actual: "\"a\"".into()
            }
        );
    }

    #[test]
    fn test_raises_matches_kind_and_pattern() {
        let err = raises::<DivideByZero>()
            .matching("divide by zero")
            .check(|| divide(10.0, 0.0))
            .unwrap();
        assert_eq!(err, DivideByZero);
    }

    #[test]
    fn test_raises_without_error_is_mismatch() {
        let err = raises::<DivideByZero>().check(|| divide(10.0, 2.0)).unwrap_err();
        assert!(matches!(err, HarnessError::RaisesMismatch(ref m) if m.contains("Ok(5.0)")));
    }

    #[test]
    fn test_raises_wrong_kind_or_message() {
        let wrong_kind = raises::<DivideByZero>().check(|| Err::<(), _>(Other));
        assert!(matches!(wrong_kind, Err(HarnessError::RaisesMismatch(_))));

        let wrong_message = raises::<DivideByZero>()
            .matching("^zero")
            .check(|| divide(1.0, 0.0));
        assert!(matches!(wrong_message, Err(HarnessError::RaisesMismatch(_))));
    }

    #[test]
    fn test_invalid_pattern_is_mismatch() {
        let err = raises_any()
            .matching("(unclosed")
            .check(|| divide(1.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, HarnessError::RaisesMismatch(ref m) if m.contains("invalid pattern")));
    }

    #[test]
    fn test_raises_any_containing() {
        assert!(
            raises_any()
                .containing("Cannot divide")
                .check(|| divide(1.0, 0.0))
                .is_ok()
        );
    }
}
