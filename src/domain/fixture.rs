//! Fixture providers, the registry that names them, and the typed value store
//! handed to tests.

use crate::domain::error::{HarnessError, Result};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Lifetime of a produced fixture value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Fresh value per requesting test, torn down after that test.
    #[default]
    Function,
    /// One value per run, torn down when the run finishes. Tests share it;
    /// coordinating mutation is up to the fixture's users.
    Session,
}

type BoxedValue = Box<dyn Any + Send>;
type SetupFn = Box<dyn Fn(&FixtureRequest<'_>) -> anyhow::Result<BoxedValue> + Send + Sync>;
type TeardownFn = Box<dyn Fn(&mut (dyn Any + Send)) -> anyhow::Result<()> + Send + Sync>;

/// Named setup/teardown pair producing a value for tests that request it.
pub struct FixtureProvider {
    name: String,
    scope: Scope,
    deps: Vec<String>,
    setup: SetupFn,
    teardown: Option<TeardownFn>,
}

impl fmt::Debug for FixtureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureProvider")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("deps", &self.deps)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

impl FixtureProvider {
    /// Provider whose setup step produces a `T`.
    pub fn new<T, F>(name: impl Into<String>, setup: F) -> Self
    where
        T: Any + Send,
        F: Fn(&FixtureRequest<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope: Scope::Function,
            deps: Vec::new(),
            setup: Box::new(move |req: &FixtureRequest<'_>| {
                Ok(Box::new(setup(req)?) as BoxedValue)
            }),
            teardown: None,
        }
    }

    /// Fixtures that must be ready before this one's setup runs.
    #[must_use]
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Cleanup step; receives the value produced by setup.
    ///
    /// `T` must match the setup's value type, otherwise teardown fails with
    /// [`HarnessError::FixtureType`].
    #[must_use]
    pub fn with_teardown<T, F>(mut self, teardown: F) -> Self
    where
        T: Any + Send,
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.teardown = Some(Box::new(move |value: &mut (dyn Any + Send)| {
            match value.downcast_mut::<T>() {
                Some(value) => teardown(value),
                None => Err(HarnessError::FixtureType {
                    name: name.clone(),
                    expected: type_name::<T>(),
                }
                .into()),
            }
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope_kind(&self) -> Scope {
        self.scope
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub(crate) fn run_setup(&self, req: &FixtureRequest<'_>) -> anyhow::Result<BoxedValue> {
        (self.setup)(req)
    }

    pub(crate) fn run_teardown(&self, value: &mut BoxedValue) -> anyhow::Result<()> {
        match &self.teardown {
            Some(teardown) => teardown(value.as_mut()),
            None => Ok(()),
        }
    }
}

/// Produced fixture values keyed by fixture name.
#[derive(Default)]
pub struct FixtureStore {
    values: HashMap<String, BoxedValue>,
}

impl fmt::Debug for FixtureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("FixtureStore").field("values", &names).finish()
    }
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, value: BoxedValue) {
        self.values.insert(name, value);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<BoxedValue> {
        self.values.remove(name)
    }

    pub fn get<T: Any>(&self, name: &str) -> Result<&T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| HarnessError::FixtureNotFound(name.to_string()))?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| HarnessError::FixtureType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T> {
        let value = self
            .values
            .get_mut(name)
            .ok_or_else(|| HarnessError::FixtureNotFound(name.to_string()))?;
        value
            .downcast_mut::<T>()
            .ok_or_else(|| HarnessError::FixtureType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }
}

/// Read access to already-resolved dependencies during a fixture's setup.
pub struct FixtureRequest<'a> {
    fixture: &'a str,
    function: Option<&'a FixtureStore>,
    session: &'a FixtureStore,
}

impl<'a> FixtureRequest<'a> {
    pub(crate) fn new(
        fixture: &'a str,
        function: Option<&'a FixtureStore>,
        session: &'a FixtureStore,
    ) -> Self {
        Self {
            fixture,
            function,
            session,
        }
    }

    /// Name of the fixture being set up.
    pub fn fixture_name(&self) -> &str {
        self.fixture
    }

    /// Value of a declared dependency.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T> {
        if let Some(function) = self.function
            && function.contains(name)
        {
            return function.get(name);
        }
        self.session.get(name)
    }
}

/// Fixture providers available to one suite, keyed by name.
#[derive(Debug, Default)]
pub struct FixtureRegistry {
    providers: BTreeMap<String, FixtureProvider>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; a later registration under the same name overrides it.
    pub fn register(&mut self, provider: FixtureProvider) {
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&FixtureProvider> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Check the dependency graph before anything runs: every dependency must be
    /// registered, no cycle may exist, and session fixtures may only depend on
    /// session fixtures.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for name in self.providers.keys() {
            index.insert(name.as_str(), graph.add_node(name.as_str()));
        }

        for provider in self.providers.values() {
            let from = index[provider.name.as_str()];
            for dep in &provider.deps {
                let Some(&to) = index.get(dep.as_str()) else {
                    return Err(HarnessError::FixtureNotFound(dep.clone()));
                };
                if provider.scope == Scope::Session && self.providers[dep].scope == Scope::Function
                {
                    return Err(HarnessError::ScopeMismatch {
                        fixture: provider.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                graph.add_edge(from, to, ());
            }
        }

        for component in kosaraju_scc(&graph) {
            let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                let mut chain: Vec<String> =
                    component.iter().map(|&i| graph[i].to_string()).collect();
                chain.sort();
                chain.push(chain[0].clone());
                return Err(HarnessError::CyclicDependency { chain });
            }
        }
        Ok(())
    }
}
