//! What a test body sees while it runs.

use crate::domain::case::Params;
use crate::domain::error::{HarnessError, Result};
use crate::domain::fixture::FixtureStore;
use crate::domain::patch::Mocker;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::time::{Duration, Instant};

/// Fixtures, parameters, the per-test mocker and the deadline of one invocation.
pub struct TestContext<'a> {
    id: &'a str,
    params: &'a Params,
    fixtures: &'a mut FixtureStore,
    session: &'a mut FixtureStore,
    mocker: &'a mut Mocker,
    deadline: Option<(Instant, Duration)>,
}

impl<'a> TestContext<'a> {
    pub fn new(
        id: &'a str,
        params: &'a Params,
        fixtures: &'a mut FixtureStore,
        session: &'a mut FixtureStore,
        mocker: &'a mut Mocker,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            params,
            fixtures,
            session,
            mocker,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
        }
    }

    pub fn id(&self) -> &str {
        self.id
    }

    /// Value produced by a requested fixture. Function-scoped values shadow
    /// session-scoped ones of the same name.
    pub fn fixture<T: Any>(&mut self, name: &str) -> Result<&mut T> {
        if self.fixtures.contains(name) {
            return self.fixtures.get_mut(name);
        }
        self.session.get_mut(name)
    }

    pub fn param(&self, name: &str) -> Result<&Value> {
        self.params
            .get(name)
            .ok_or_else(|| HarnessError::UnknownParameter(name.to_string()))
    }

    /// Parameter converted to a concrete type.
    pub fn param_as<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self.param(name)?.clone();
        serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("parameter '{name}' has the wrong type: {e}"))
    }

    pub fn params(&self) -> &Params {
        self.params
    }

    pub fn mocker(&mut self) -> &mut Mocker {
        self.mocker
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`HarnessError::Timeout`] once the deadline has passed.
    /// Long-running bodies call this between steps.
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => Err(HarnessError::Timeout(timeout)),
            _ => Ok(()),
        }
    }
}
