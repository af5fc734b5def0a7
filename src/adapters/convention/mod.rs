//! Test collection conventions
//!
//! A convention decides which declared suites and functions count as tests.
//! Suites are identified by a path-like label, so the rules follow the file
//! naming habits of the ecosystem the label comes from.

mod pytest;

pub use pytest::PytestConvention;

/// Trait for deciding whether a declared function is collected as a test
pub trait TestConvention: Send + Sync {
    /// Check if a suite path is collected at all
    fn is_test_file(&self, suite_path: &str) -> bool;

    /// Check if a function name inside a collected suite is a test
    fn is_test_name(&self, name: &str) -> bool;

    fn is_test(&self, name: &str, suite_path: &str) -> bool {
        self.is_test_file(suite_path) && self.is_test_name(name)
    }

    /// Get the convention name as logged
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_needs_both_file_and_name() {
        let convention: &dyn TestConvention = &PytestConvention;
        assert!(convention.is_test("test_add", "1-simple/test_main.py"));
        assert!(!convention.is_test("helper", "1-simple/test_main.py"));
        assert!(!convention.is_test("test_add", "src/main.py"));
        assert_eq!(convention.name(), "pytest");
    }
}
