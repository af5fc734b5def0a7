use crate::domain::case::{Failure, Outcome, TestResult};
use serde::{Deserialize, Serialize};

/// Exit status of a run that selected no tests.
pub const NO_TESTS_SELECTED: u8 = 5;

/// Summary of one run, as printed by the CLI and written by `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Teardown errors across all tests plus session teardown.
    pub teardown_errors: usize,
    pub results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_errors: Vec<Failure>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(results: Vec<TestResult>, session_errors: Vec<Failure>, duration_ms: u64) -> Self {
        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let teardown_errors = results
            .iter()
            .map(|r| r.teardown_errors.len())
            .sum::<usize>()
            + session_errors.len();
        Self {
            total: results.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            errored: count(Outcome::Errored),
            teardown_errors,
            session_errors,
            duration_ms,
            results,
        }
    }

    /// Results that did not pass cleanly, in run order.
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.teardown_errors == 0
    }

    /// 0 when everything passed, 1 on any failure, 5 when nothing was selected.
    pub fn exit_code(&self) -> u8 {
        if self.total == 0 && self.session_errors.is_empty() {
            NO_TESTS_SELECTED
        } else if self.success() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::case::Phase;

    fn result(id: &str, outcome: Outcome) -> TestResult {
        TestResult {
            id: id.to_string(),
            outcome,
            failure: None,
            teardown_errors: Vec::new(),
            duration_ms: 0,
        }
    }

    #[test]
    fn test_counts_by_outcome() {
        let report = RunReport::new(
            vec![
                result("a", Outcome::Passed),
                result("b", Outcome::Failed),
                result("c", Outcome::Errored),
                result("d", Outcome::Passed),
            ],
            Vec::new(),
            3,
        );
        assert_eq!(
            (report.total, report.passed, report.failed, report.errored),
            (4, 2, 1, 1)
        );
        let ids: Vec<&str> = report.failures().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_teardown_error_fails_run_without_changing_outcome() {
        let mut passed = result("a", Outcome::Passed);
        passed.teardown_errors.push(Failure {
            phase: Phase::Teardown,
            kind: "Error".into(),
            message: "close failed".into(),
        });
        let report = RunReport::new(vec![passed], Vec::new(), 0);
        assert_eq!(report.passed, 1);
        assert_eq!(report.teardown_errors, 1);
        assert!(!report.success());
    }

    #[test]
    fn test_json_shape() {
        let report = RunReport::new(vec![result("a", Outcome::Passed)], Vec::new(), 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["outcome"], "passed");
        assert!(json.get("session_errors").is_none());
        assert!(json["results"][0].get("teardown_errors").is_none());
    }

    #[test]
    fn test_empty_selection_has_its_own_exit_code() {
        let report = RunReport::new(Vec::new(), Vec::new(), 0);
        assert!(report.success());
        assert_eq!(report.exit_code(), NO_TESTS_SELECTED);
    }
}
