//! Test cases as discovered, and the results produced by running them.

use crate::domain::context::TestContext;
use crate::domain::error::HarnessError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Body of a test. Errors (including failed assertions) propagate with `?`.
pub type TestBody = Arc<dyn Fn(&mut TestContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Parameter values bound to a case, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.entries.push((name, value));
    }
}

/// One runnable test invocation.
#[derive(Clone)]
pub struct TestCase {
    suite: String,
    name: String,
    body: TestBody,
    fixtures: Vec<String>,
    params: Params,
    id_parts: Vec<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.id())
            .field("fixtures", &self.fixtures)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut TestContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            suite: String::new(),
            name: name.into(),
            body: Arc::new(body),
            fixtures: Vec::new(),
            params: Params::default(),
            id_parts: Vec::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_fixtures<I, S>(mut self, fixtures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixtures.extend(fixtures.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub(crate) fn in_suite(mut self, suite: &str) -> Self {
        self.suite = suite.to_string();
        self
    }

    /// Copy of this case with extra parameters bound and an id part appended.
    pub(crate) fn bind(&self, names: &[String], values: &[Value], id_part: String) -> Self {
        let mut case = self.clone();
        for (name, value) in names.iter().zip(values) {
            case.params.push(name.clone(), value.clone());
        }
        case.id_parts.push(id_part);
        case
    }

    /// `suite::name` or `suite::name[a-b]` for parametrized cases.
    pub fn id(&self) -> String {
        let mut id = if self.suite.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.suite, self.name)
        };
        if !self.id_parts.is_empty() {
            id.push('[');
            id.push_str(&self.id_parts.join("-"));
            id.push(']');
        }
        id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn fixtures(&self) -> &[String] {
        &self.fixtures
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn body(&self) -> &TestBody {
        &self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Errored,
}

/// Where in the test's lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collect,
    Setup,
    Call,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub phase: Phase,
    pub kind: String,
    pub message: String,
}

impl Failure {
    /// Classify an error: harness errors keep their kind, anything else is `Error`.
    pub fn from_error(phase: Phase, err: &anyhow::Error) -> Self {
        let kind = err
            .downcast_ref::<HarnessError>()
            .map(HarnessError::kind)
            .unwrap_or("Error");
        Self {
            phase,
            kind: kind.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn from_harness(phase: Phase, err: &HarnessError) -> Self {
        Self {
            phase,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn from_panic(phase: Phase, payload: &(dyn Any + Send)) -> Self {
        Self::from_harness(phase, &HarnessError::from_panic(payload))
    }
}

/// Outcome of one case. Teardown errors are reported next to the outcome
/// rather than replacing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub outcome: Outcome,
    pub failure: Option<Failure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown_errors: Vec<Failure>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed && self.teardown_errors.is_empty()
    }
}
