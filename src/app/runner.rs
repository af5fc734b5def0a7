//! Sequential test runner.

use crate::adapters::convention::{PytestConvention, TestConvention};
use crate::app::catalog::{Catalog, Collected};
use crate::app::report::RunReport;
use crate::domain::case::{Failure, Outcome, Phase, TestCase, TestResult};
use crate::domain::context::TestContext;
use crate::domain::error::HarnessError;
use crate::domain::patch::Mocker;
use crate::domain::resolver::{Resolution, Resolver, TeardownFailure};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// Options for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Only suites at or below this path.
    #[serde(default)]
    pub path: Option<String>,
    /// Only tests whose id contains this substring.
    #[serde(default)]
    pub filter: Option<String>,
    /// Stop after the first test that does not pass.
    #[serde(default)]
    pub fail_fast: bool,
    /// Default per-test timeout; a case's own timeout takes precedence.
    ///
    /// Only checked when the body calls `TestContext::check_deadline` or
    /// after it returns. A body that blocks forever without checking hangs
    /// the run.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    fn selects(&self, id: &str) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|pattern| id.contains(pattern))
    }
}

pub struct Runner {
    config: RunConfig,
    convention: Box<dyn TestConvention>,
}

impl Runner {
    /// Runner collecting with the pytest naming rules.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            convention: Box::new(PytestConvention),
        }
    }

    #[must_use]
    pub fn with_convention(mut self, convention: Box<dyn TestConvention>) -> Self {
        self.convention = convention;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Collect without running: everything `run` would execute, in order.
    pub fn collect(&self, catalog: &Catalog) -> Vec<Collected> {
        let convention = self.convention.as_ref();
        catalog
            .discover(self.config.path.as_deref())
            .into_iter()
            .flat_map(|suite| suite.collect(convention))
            .filter(|item| self.config.selects(&item.id()))
            .collect()
    }

    pub fn run(&self, catalog: &Catalog) -> RunReport {
        let started = Instant::now();
        let convention = self.convention.as_ref();
        let suites = catalog.discover(self.config.path.as_deref());
        info!(suites = suites.len(), convention = convention.name(), "starting run");

        let mut results = Vec::new();
        let mut resolvers = Vec::new();
        let mut stopped = false;

        for suite in suites {
            let span = info_span!("suite", path = suite.path());
            let _enter = span.enter();

            match suite.registry().validate() {
                Ok(()) => debug!(fixtures = suite.registry().len(), "fixture graph valid"),
                Err(err) => warn!(error = %err, "fixture graph invalid"),
            }

            let mut resolver = Resolver::new(suite.registry());
            for item in suite.collect(convention) {
                let result = match item {
                    Collected::Case(case) if self.config.selects(&case.id()) => {
                        self.run_case(&case, &mut resolver)
                    }
                    Collected::Error { id, error } if self.config.selects(&id) => {
                        warn!(test = %id, error = %error, "collection failed");
                        TestResult {
                            id,
                            outcome: Outcome::Errored,
                            failure: Some(Failure::from_harness(Phase::Collect, &error)),
                            teardown_errors: Vec::new(),
                            duration_ms: 0,
                        }
                    }
                    _ => continue,
                };
                let passed = result.passed();
                results.push(result);
                if self.config.fail_fast && !passed {
                    info!("stopping after first failure");
                    stopped = true;
                    break;
                }
            }
            resolvers.push(resolver);
            if stopped {
                break;
            }
        }

        let mut session_errors = Vec::new();
        for mut resolver in resolvers.into_iter().rev() {
            session_errors.extend(resolver.finish().iter().map(teardown_failure));
        }

        let report = RunReport::new(results, session_errors, elapsed_ms(started));
        if report.total == 0 {
            warn!("no tests selected");
        }
        info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            errored = report.errored,
            "run finished"
        );
        report
    }

    /// Run one case: set up, call, unwind mocks, tear down.
    fn run_case(&self, case: &TestCase, resolver: &mut Resolver<'_>) -> TestResult {
        let id = case.id();
        let span = info_span!("test", id = %id);
        let _enter = span.enter();
        let started = Instant::now();

        let mut res = Resolution::new();
        let (outcome, failure) = match resolver.resolve(case.fixtures(), &mut res) {
            Err(err) => {
                warn!(error = %format!("{err:#}"), "fixture setup failed");
                (Outcome::Errored, Some(Failure::from_error(Phase::Setup, &err)))
            }
            Ok(()) => {
                let timeout = case.timeout().or(self.config.timeout());
                let mut mocker = Mocker::new();
                let body = case.body();
                let call_started = Instant::now();
                let returned = {
                    let mut ctx = TestContext::new(
                        &id,
                        case.params(),
                        res.values_mut(),
                        resolver.session_mut(),
                        &mut mocker,
                        timeout,
                    );
                    panic::catch_unwind(AssertUnwindSafe(|| (body.as_ref())(&mut ctx)))
                };
                let elapsed = call_started.elapsed();
                let restored = mocker.unwind();
                if restored > 0 {
                    debug!(patches = restored, "restored patches");
                }
                classify(returned, timeout, elapsed)
            }
        };

        let teardown_errors: Vec<Failure> = resolver
            .teardown(&mut res)
            .iter()
            .map(teardown_failure)
            .collect();
        for error in &teardown_errors {
            warn!(error = %error.message, "teardown failed");
        }

        debug!(?outcome, "test finished");
        TestResult {
            id,
            outcome,
            failure,
            teardown_errors,
            duration_ms: elapsed_ms(started),
        }
    }
}

type BodyReturn = std::thread::Result<anyhow::Result<()>>;

fn classify(
    returned: BodyReturn,
    timeout: Option<Duration>,
    elapsed: Duration,
) -> (Outcome, Option<Failure>) {
    if let Some(limit) = timeout
        && elapsed > limit
    {
        let err = HarnessError::Timeout(limit);
        return (Outcome::Failed, Some(Failure::from_harness(Phase::Call, &err)));
    }
    match returned {
        Ok(Ok(())) => (Outcome::Passed, None),
        Ok(Err(err)) => (Outcome::Failed, Some(Failure::from_error(Phase::Call, &err))),
        Err(payload) => (
            Outcome::Failed,
            Some(Failure::from_panic(Phase::Call, payload.as_ref())),
        ),
    }
}

fn teardown_failure(failure: &TeardownFailure) -> Failure {
    let mut reported = Failure::from_error(Phase::Teardown, &failure.error);
    reported.message = format!(
        "teardown of fixture '{}' failed: {}",
        failure.fixture, reported.message
    );
    reported
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::Suite;

    #[test]
    fn test_filter_matches_substring_of_id() {
        let config = RunConfig {
            filter: Some("divide".into()),
            ..RunConfig::default()
        };
        assert!(config.selects("1-simple/test_main.py::test_divide"));
        assert!(!config.selects("1-simple/test_main.py::test_add"));
        assert!(RunConfig::default().selects("anything"));
    }

    #[test]
    fn test_classify_prefers_timeout_once_over_limit() {
        let (outcome, failure) = classify(
            Ok(Ok(())),
            Some(Duration::from_millis(10)),
            Duration::from_millis(20),
        );
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(failure.unwrap().kind, "Timeout");

        let (outcome, failure) = classify(Ok(Ok(())), Some(Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(outcome, Outcome::Passed);
        assert!(failure.is_none());
    }

    #[test]
    fn test_collect_applies_path_and_filter() {
        let catalog = Catalog::new()
            .with_suite(
                Suite::new("a/test_a.py")
                    .test("test_one", &[], |_| Ok(()))
                    .test("test_two", &[], |_| Ok(())),
            )
            .with_suite(Suite::new("b/test_b.py").test("test_one", &[], |_| Ok(())));
        let runner = Runner::new(RunConfig {
            filter: Some("one".into()),
            ..RunConfig::default()
        });
        let ids: Vec<String> = runner.collect(&catalog).iter().map(Collected::id).collect();
        assert_eq!(ids, vec!["a/test_a.py::test_one", "b/test_b.py::test_one"]);

        let runner = Runner::new(RunConfig {
            path: Some("b".into()),
            ..RunConfig::default()
        });
        assert_eq!(runner.collect(&catalog).len(), 1);
    }

    struct CheckPrefix;

    impl TestConvention for CheckPrefix {
        fn is_test_file(&self, _suite_path: &str) -> bool {
            true
        }

        fn is_test_name(&self, name: &str) -> bool {
            name.starts_with("check_")
        }

        fn name(&self) -> &str {
            "check"
        }
    }

    #[test]
    fn test_custom_convention_decides_collection() {
        let catalog = Catalog::new().with_suite(
            Suite::new("suite.txt")
                .test("check_one", &[], |_| Ok(()))
                .test("test_two", &[], |_| Ok(())),
        );
        let report = Runner::new(RunConfig::default())
            .with_convention(Box::new(CheckPrefix))
            .run(&catalog);
        let ids: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["suite.txt::check_one"]);

        assert_eq!(Runner::new(RunConfig::default()).run(&catalog).total, 0);
    }
}
