//! Fixture resolution and teardown, driven as an explicit per-test state machine.

use crate::domain::error::HarnessError;
use crate::domain::fixture::{FixtureProvider, FixtureRegistry, FixtureRequest, FixtureStore, Scope};
use anyhow::Context as _;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Lifecycle of one fixture instance within one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    Unresolved,
    SettingUp,
    Ready,
    TearingDown,
    Done,
}

/// A teardown step that returned an error.
#[derive(Debug)]
pub struct TeardownFailure {
    pub fixture: String,
    pub error: anyhow::Error,
}

/// Function-scoped fixture instances of one test invocation.
#[derive(Debug, Default)]
pub struct Resolution {
    values: FixtureStore,
    states: BTreeMap<String, FixtureState>,
    active: Vec<String>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> FixtureState {
        self.states
            .get(name)
            .copied()
            .unwrap_or(FixtureState::Unresolved)
    }

    pub fn values(&self) -> &FixtureStore {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut FixtureStore {
        &mut self.values
    }

    /// Fixtures awaiting teardown, in setup order.
    pub fn pending_teardown(&self) -> &[String] {
        &self.active
    }
}

/// Resolves fixtures against one registry.
///
/// Function fixtures live in the [`Resolution`] of the requesting test.
/// Session fixtures are cached here and only torn down by [`Resolver::finish`].
pub struct Resolver<'r> {
    registry: &'r FixtureRegistry,
    session: FixtureStore,
    session_states: BTreeMap<String, FixtureState>,
    session_order: Vec<String>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r FixtureRegistry) -> Self {
        Self {
            registry,
            session: FixtureStore::new(),
            session_states: BTreeMap::new(),
            session_order: Vec::new(),
        }
    }

    pub fn session(&self) -> &FixtureStore {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut FixtureStore {
        &mut self.session
    }

    /// Set up every requested fixture (dependencies first) into `res`.
    ///
    /// On error, fixtures that did reach `Ready` stay in `res` and must still be
    /// passed to [`Resolver::teardown`].
    pub fn resolve(&mut self, requested: &[String], res: &mut Resolution) -> anyhow::Result<()> {
        for name in requested {
            let mut chain = Vec::new();
            self.resolve_one(name, res, &mut chain)?;
        }
        Ok(())
    }

    fn resolve_one(
        &mut self,
        name: &str,
        res: &mut Resolution,
        chain: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        let registry = self.registry;
        let provider = registry
            .get(name)
            .ok_or_else(|| HarnessError::FixtureNotFound(name.to_string()))?;
        match provider.scope_kind() {
            Scope::Function => self.resolve_function(provider, res, chain),
            Scope::Session => self.resolve_session(provider, res, chain),
        }
    }

    fn resolve_function(
        &mut self,
        provider: &FixtureProvider,
        res: &mut Resolution,
        chain: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        let name = provider.name();
        match res.state(name) {
            FixtureState::Unresolved => {}
            FixtureState::SettingUp => return Err(cycle(chain, name).into()),
            FixtureState::Ready | FixtureState::TearingDown | FixtureState::Done => return Ok(()),
        }

        res.states.insert(name.to_string(), FixtureState::SettingUp);
        chain.push(name.to_string());
        let produced = self.setup_with_deps(provider, res, chain);
        chain.pop();

        match produced {
            Ok(value) => {
                res.values.insert(name.to_string(), value);
                res.states.insert(name.to_string(), FixtureState::Ready);
                res.active.push(name.to_string());
                debug!(fixture = name, "fixture ready");
                Ok(())
            }
            Err(err) => {
                res.states.remove(name);
                Err(err)
            }
        }
    }

    fn setup_with_deps(
        &mut self,
        provider: &FixtureProvider,
        res: &mut Resolution,
        chain: &mut Vec<String>,
    ) -> anyhow::Result<Box<dyn std::any::Any + Send>> {
        for dep in provider.deps() {
            self.resolve_one(dep, res, chain)?;
        }
        let name = provider.name();
        let req = FixtureRequest::new(name, Some(&res.values), &self.session);
        guarded(|| provider.run_setup(&req))
            .with_context(|| format!("setup of fixture '{name}' failed"))
    }

    fn resolve_session(
        &mut self,
        provider: &FixtureProvider,
        res: &mut Resolution,
        chain: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        let name = provider.name();
        match self.session_states.get(name) {
            Some(FixtureState::SettingUp) => return Err(cycle(chain, name).into()),
            Some(FixtureState::Ready) => return Ok(()),
            _ => {}
        }

        for dep in provider.deps() {
            if let Some(dep_provider) = self.registry.get(dep)
                && dep_provider.scope_kind() == Scope::Function
            {
                return Err(HarnessError::ScopeMismatch {
                    fixture: name.to_string(),
                    dependency: dep.clone(),
                }
                .into());
            }
        }

        self.session_states
            .insert(name.to_string(), FixtureState::SettingUp);
        chain.push(name.to_string());
        let produced = self.setup_with_deps(provider, res, chain);
        chain.pop();

        match produced {
            Ok(value) => {
                self.session.insert(name.to_string(), value);
                self.session_states
                    .insert(name.to_string(), FixtureState::Ready);
                self.session_order.push(name.to_string());
                debug!(fixture = name, "session fixture ready");
                Ok(())
            }
            Err(err) => {
                self.session_states.remove(name);
                Err(err)
            }
        }
    }

    /// Tear down the test's fixtures newest first. Each runs exactly once; a
    /// failing teardown does not stop the others.
    pub fn teardown(&mut self, res: &mut Resolution) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        while let Some(name) = res.active.pop() {
            if res.state(&name) != FixtureState::Ready {
                continue;
            }
            res.states.insert(name.clone(), FixtureState::TearingDown);
            if let Some(failure) = run_teardown(self.registry, &name, res.values.remove(&name)) {
                failures.push(failure);
            }
            res.states.insert(name, FixtureState::Done);
        }
        failures
    }

    /// Tear down session fixtures newest first. Called once the run is over.
    pub fn finish(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        while let Some(name) = self.session_order.pop() {
            self.session_states
                .insert(name.clone(), FixtureState::TearingDown);
            if let Some(failure) = run_teardown(self.registry, &name, self.session.remove(&name)) {
                failures.push(failure);
            }
            self.session_states.insert(name, FixtureState::Done);
        }
        failures
    }
}

fn run_teardown(
    registry: &FixtureRegistry,
    name: &str,
    value: Option<Box<dyn std::any::Any + Send>>,
) -> Option<TeardownFailure> {
    let (Some(provider), Some(mut value)) = (registry.get(name), value) else {
        return None;
    };
    debug!(fixture = name, "tearing down");
    match guarded(|| provider.run_teardown(&mut value)) {
        Ok(()) => None,
        Err(error) => {
            warn!(fixture = name, error = %error, "teardown failed");
            Some(TeardownFailure {
                fixture: name.to_string(),
                error,
            })
        }
    }
}

/// Run a fixture hook, turning a panic into a [`HarnessError::Panicked`] error.
fn guarded<T>(hook: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(hook))
        .unwrap_or_else(|payload| Err(HarnessError::from_panic(payload.as_ref()).into()))
}

fn cycle(chain: &[String], name: &str) -> HarnessError {
    let start = chain.iter().position(|n| n == name).unwrap_or(0);
    let mut cycle: Vec<String> = chain[start..].to_vec();
    cycle.push(name.to_string());
    HarnessError::CyclicDependency { chain: cycle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dependencies_resolve_first_and_teardown_reverses() {
        let log = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let mut registry = FixtureRegistry::new();
        for (name, deps) in [("db", vec![]), ("repo", vec!["db"]), ("service", vec!["repo"])] {
            let setup_log = log.clone();
            let teardown_log = log.clone();
            registry.register(
                FixtureProvider::new(name, move |req| {
                    setup_log.lock().unwrap().push(format!("setup {}", req.fixture_name()));
                    Ok(name.to_string())
                })
                .depends_on(deps)
                .with_teardown(move |value: &mut String| {
                    teardown_log.lock().unwrap().push(format!("teardown {value}"));
                    Ok(())
                }),
            );
        }

        let mut resolver = Resolver::new(&registry);
        let mut res = Resolution::new();
        resolver.resolve(&names(&["service", "db"]), &mut res).unwrap();
        assert_eq!(res.state("repo"), FixtureState::Ready);
        assert_eq!(res.pending_teardown(), names(&["db", "repo", "service"]).as_slice());

        assert!(resolver.teardown(&mut res).is_empty());
        assert_eq!(res.state("service"), FixtureState::Done);
        assert_eq!(
            *log.lock().unwrap(),
            names(&[
                "setup db",
                "setup repo",
                "setup service",
                "teardown service",
                "teardown repo",
                "teardown db",
            ])
        );
    }

    #[test]
    fn test_dependency_value_visible_to_dependent() {
        let mut registry = FixtureRegistry::new();
        registry.register(FixtureProvider::new("base", |_| Ok(20_i64)));
        registry.register(
            FixtureProvider::new("derived", |req| Ok(*req.get::<i64>("base")? + 1))
                .depends_on(["base"]),
        );
        let mut resolver = Resolver::new(&registry);
        let mut res = Resolution::new();
        resolver.resolve(&names(&["derived"]), &mut res).unwrap();
        assert_eq!(*res.values().get::<i64>("derived").unwrap(), 21);
    }

    #[test]
    fn test_cycle_is_reported_with_chain() {
        let mut registry = FixtureRegistry::new();
        registry.register(FixtureProvider::new("a", |_| Ok(())).depends_on(["b"]));
        registry.register(FixtureProvider::new("b", |_| Ok(())).depends_on(["a"]));
        let mut resolver = Resolver::new(&registry);
        let mut res = Resolution::new();
        let err = resolver.resolve(&names(&["a"]), &mut res).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HarnessError>(),
            Some(&HarnessError::CyclicDependency {
                chain: names(&["a", "b", "a"])
            })
        );
        assert!(res.pending_teardown().is_empty());
    }

    #[test]
    fn test_partial_setup_is_still_torn_down() {
        let torn = Arc::new(AtomicUsize::new(0));
        let counter = torn.clone();
        let mut registry = FixtureRegistry::new();
        registry.register(
            FixtureProvider::new("ok", |_| Ok(()))
                .with_teardown(move |_: &mut ()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        );
        registry.register(FixtureProvider::new("broken", |_| -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }));

        let mut resolver = Resolver::new(&registry);
        let mut res = Resolution::new();
        let err = resolver
            .resolve(&names(&["ok", "broken"]), &mut res)
            .unwrap_err();
        assert!(format!("{err:#}").contains("connection refused"));
        assert_eq!(res.state("broken"), FixtureState::Unresolved);

        resolver.teardown(&mut res);
        resolver.teardown(&mut res);
        assert_eq!(torn.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_fixture_is_shared_until_finish() {
        let setups = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let (s, t) = (setups.clone(), teardowns.clone());
        let mut registry = FixtureRegistry::new();
        registry.register(
            FixtureProvider::new("store", move |_| {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::<u32>::new())
            })
            .scope(Scope::Session)
            .with_teardown(move |_: &mut Vec<u32>| {
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let mut resolver = Resolver::new(&registry);
        for _ in 0..3 {
            let mut res = Resolution::new();
            resolver.resolve(&names(&["store"]), &mut res).unwrap();
            resolver.session_mut().get_mut::<Vec<u32>>("store").unwrap().push(1);
            assert!(resolver.teardown(&mut res).is_empty());
        }
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.session().get::<Vec<u32>>("store").unwrap().len(), 3);

        assert!(resolver.finish().is_empty());
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_cannot_use_function_fixture() {
        let mut registry = FixtureRegistry::new();
        registry.register(FixtureProvider::new("tmp", |_| Ok(())));
        registry.register(
            FixtureProvider::new("pool", |_| Ok(()))
                .scope(Scope::Session)
                .depends_on(["tmp"]),
        );
        let mut resolver = Resolver::new(&registry);
        let err = resolver
            .resolve(&names(&["pool"]), &mut Resolution::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn test_teardown_error_does_not_stop_others() {
        let mut registry = FixtureRegistry::new();
        registry.register(FixtureProvider::new("first", |_| Ok(())));
        registry.register(
            FixtureProvider::new("second", |_| Ok(()))
                .with_teardown(|_: &mut ()| anyhow::bail!("disk full")),
        );
        let mut resolver = Resolver::new(&registry);
        let mut res = Resolution::new();
        resolver
            .resolve(&names(&["first", "second"]), &mut res)
            .unwrap();
        let failures = resolver.teardown(&mut res);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].fixture, "second");
        assert_eq!(res.state("first"), FixtureState::Done);
    }

    #[test]
    fn test_panicking_hooks_become_errors() {
        let mut registry = FixtureRegistry::new();
        registry.register(FixtureProvider::new("first", |_| Ok(())));
        registry.register(
            FixtureProvider::new("second", |_| Ok(()))
                .with_teardown(|_: &mut ()| -> anyhow::Result<()> { panic!("release exploded") }),
        );
        registry.register(FixtureProvider::new("broken", |_| -> anyhow::Result<()> {
            panic!("setup exploded")
        }));
        let mut resolver = Resolver::new(&registry);

        let mut res = Resolution::new();
        resolver
            .resolve(&names(&["first", "second"]), &mut res)
            .unwrap();
        let failures = resolver.teardown(&mut res);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error.to_string(), "release exploded");
        assert_eq!(res.state("first"), FixtureState::Done);

        let mut res = Resolution::new();
        let err = resolver.resolve(&names(&["broken"]), &mut res).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HarnessError>(),
            Some(&HarnessError::Panicked("setup exploded".into()))
        );
        assert_eq!(res.state("broken"), FixtureState::Unresolved);
    }
}
