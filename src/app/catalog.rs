//! Suite declaration and discovery.

use crate::adapters::convention::TestConvention;
use crate::domain::case::TestCase;
use crate::domain::context::TestContext;
use crate::domain::error::HarnessError;
use crate::domain::fixture::{FixtureProvider, FixtureRegistry};
use crate::domain::parametrize::{Parametrize, expand_all};
use tracing::debug;

/// A declared test function plus the parametrize layers stacked on it.
#[derive(Debug, Clone)]
struct Template {
    case: TestCase,
    layers: Vec<Parametrize>,
}

/// Fixtures and tests declared under one path, the unit of discovery.
#[derive(Debug)]
pub struct Suite {
    path: String,
    registry: FixtureRegistry,
    templates: Vec<Template>,
}

/// A collected item: a runnable case, or a template that failed to expand.
#[derive(Debug, Clone)]
pub enum Collected {
    Case(TestCase),
    Error { id: String, error: HarnessError },
}

impl Collected {
    pub fn id(&self) -> String {
        match self {
            Self::Case(case) => case.id(),
            Self::Error { id, .. } => id.clone(),
        }
    }
}

impl Suite {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            registry: FixtureRegistry::new(),
            templates: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    #[must_use]
    pub fn fixture(mut self, provider: FixtureProvider) -> Self {
        self.registry.register(provider);
        self
    }

    #[must_use]
    pub fn test<F>(self, name: &str, fixtures: &[&str], body: F) -> Self
    where
        F: Fn(&mut TestContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.case(TestCase::new(name, body).with_fixtures(fixtures.iter().copied()))
    }

    #[must_use]
    pub fn parametrized<F>(
        self,
        name: &str,
        fixtures: &[&str],
        parametrize: Parametrize,
        body: F,
    ) -> Self
    where
        F: Fn(&mut TestContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.stacked(
            TestCase::new(name, body).with_fixtures(fixtures.iter().copied()),
            vec![parametrize],
        )
    }

    /// Add a pre-built case, e.g. one carrying its own timeout.
    #[must_use]
    pub fn case(self, case: TestCase) -> Self {
        self.stacked(case, Vec::new())
    }

    /// Add a case expanded by several parametrize layers (cartesian product).
    #[must_use]
    pub fn stacked(mut self, case: TestCase, layers: Vec<Parametrize>) -> Self {
        self.templates.push(Template {
            case: case.in_suite(&self.path),
            layers,
        });
        self
    }

    /// Expand every template the convention accepts, in declaration order.
    pub fn collect(&self, convention: &dyn TestConvention) -> Vec<Collected> {
        let mut collected = Vec::new();
        for template in &self.templates {
            if !convention.is_test(template.case.name(), &self.path) {
                debug!(
                    suite = %self.path,
                    name = template.case.name(),
                    convention = convention.name(),
                    "skipping function not matching convention"
                );
                continue;
            }
            match expand_all(&template.case, &template.layers) {
                Ok(cases) => collected.extend(cases.into_iter().map(Collected::Case)),
                Err(error) => collected.push(Collected::Error {
                    id: template.case.id(),
                    error,
                }),
            }
        }
        collected
    }
}

/// Every suite known to the binary.
#[derive(Debug, Default)]
pub struct Catalog {
    suites: Vec<Suite>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The demo suites shipped with the crate.
    pub fn builtin() -> Self {
        crate::suites::all()
    }

    #[must_use]
    pub fn with_suite(mut self, suite: Suite) -> Self {
        self.add(suite);
        self
    }

    pub fn add(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Suites at or below `path`. `None`, `""` and `"."` select everything.
    pub fn discover(&self, path: Option<&str>) -> Vec<&Suite> {
        let prefix = path
            .map(|p| p.trim_start_matches("./").trim_end_matches('/'))
            .filter(|p| !p.is_empty() && *p != ".");
        let Some(prefix) = prefix else {
            return self.suites.iter().collect();
        };
        self.suites
            .iter()
            .filter(|suite| {
                suite.path == prefix
                    || suite
                        .path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .collect()
    }
}
