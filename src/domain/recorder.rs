//! Call recorders: stand-ins that record every invocation and answer with a
//! configured return value or effect.

use crate::domain::error::{HarnessError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Positional and named arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Call {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Call {
    pub fn new(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Map::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.args.iter().map(Value::to_string).collect();
        parts.extend(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")));
        write!(f, "({})", parts.join(", "))
    }
}

impl<const N: usize> From<[Value; N]> for Call {
    fn from(args: [Value; N]) -> Self {
        Self::new(args)
    }
}

impl From<Vec<Value>> for Call {
    fn from(args: Vec<Value>) -> Self {
        Self::new(args)
    }
}

impl From<()> for Call {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

/// One recorded invocation. `seq` orders calls across every recorder sharing a clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub seq: u64,
    pub call: Call,
}

/// Result produced by one entry of a side-effect sequence.
pub type Outcome = std::result::Result<Value, HarnessError>;

/// Real implementation a spy forwards to.
pub type Delegate = Arc<dyn Fn(&Call) -> Outcome + Send + Sync>;

#[derive(Clone)]
enum SideEffect {
    Raise(HarnessError),
    Sequence(VecDeque<Outcome>),
    Delegate(Delegate),
}

struct RecorderState {
    name: String,
    spec: Option<BTreeSet<String>>,
    calls: Vec<CallRecord>,
    return_value: Option<Value>,
    side_effect: Option<SideEffect>,
    children: BTreeMap<String, Recorder>,
    return_mock: Option<Recorder>,
}

/// Shared handle to a call recorder.
///
/// Clones point at the same history, so the handle given to the code under
/// test and the one kept by the test observe the same calls.
#[derive(Clone)]
pub struct Recorder {
    inner: Arc<Mutex<RecorderState>>,
    clock: Arc<AtomicU64>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Recorder")
            .field("name", &state.name)
            .field("spec", &state.spec)
            .field("calls", &state.calls.len())
            .finish()
    }
}

impl Recorder {
    /// Unconstrained recorder with its own call clock.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name.into(), None, Arc::new(AtomicU64::new(0)))
    }

    /// Recorder restricted to the given attribute names.
    pub fn with_spec<I, S>(name: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = capabilities.into_iter().map(Into::into).collect();
        Self::with_clock(name.into(), Some(spec), Arc::new(AtomicU64::new(0)))
    }

    pub(crate) fn with_clock(
        name: String,
        spec: Option<BTreeSet<String>>,
        clock: Arc<AtomicU64>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecorderState {
                name,
                spec,
                calls: Vec::new(),
                return_value: None,
                side_effect: None,
                children: BTreeMap::new(),
                return_mock: None,
            })),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, RecorderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    /// Declared capability set, `None` when unconstrained.
    pub fn spec(&self) -> Option<Vec<String>> {
        self.state()
            .spec
            .as_ref()
            .map(|s| s.iter().cloned().collect())
    }

    /// Record the call, then apply the configured behavior.
    pub fn call(&self, call: impl Into<Call>) -> Result<Value> {
        let call = call.into();
        let seq = self.clock.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.push(CallRecord {
            seq,
            call: call.clone(),
        });

        if let Some(SideEffect::Delegate(delegate)) = &state.side_effect {
            let delegate = delegate.clone();
            drop(guard);
            return delegate(&call);
        }

        let name = state.name.clone();
        match &mut state.side_effect {
            Some(SideEffect::Raise(err)) => Err(err.clone()),
            Some(SideEffect::Sequence(outcomes)) => outcomes.pop_front().unwrap_or_else(|| {
                Err(HarnessError::raised(
                    "StopIteration",
                    format!("side effect of '{name}' exhausted"),
                ))
            }),
            Some(SideEffect::Delegate(_)) => unreachable!("delegate handled above"),
            None => Ok(state.return_value.clone().unwrap_or(Value::Null)),
        }
    }

    /// Child recorder reachable as `name`; created on first access.
    ///
    /// On a spec-constrained recorder, names outside the capability set fail
    /// with [`HarnessError::UnknownAttribute`].
    pub fn attr(&self, name: &str) -> Result<Recorder> {
        let mut state = self.state();
        if let Some(spec) = &state.spec
            && !spec.contains(name)
        {
            return Err(HarnessError::UnknownAttribute {
                mock: state.name.clone(),
                attribute: name.to_string(),
            });
        }
        if let Some(child) = state.children.get(name) {
            return Ok(child.clone());
        }
        let child = Recorder::with_clock(
            format!("{}.{}", state.name, name),
            None,
            self.clock.clone(),
        );
        state.children.insert(name.to_string(), child.clone());
        Ok(child)
    }

    /// Invoke the child recorder `name`.
    pub fn call_method(&self, name: &str, call: impl Into<Call>) -> Result<Value> {
        self.attr(name)?.call(call)
    }

    /// Configure the return value of the child recorder `name`.
    pub fn configure(&self, name: &str, value: Value) -> Result<()> {
        self.attr(name)?.return_value(value);
        Ok(())
    }

    /// Recorder standing for the object this one returns, for chained collaborators
    /// (`connect(..).cursor().execute(..)`).
    pub fn return_mock(&self) -> Recorder {
        let mut state = self.state();
        if let Some(mock) = &state.return_mock {
            return mock.clone();
        }
        let mock = Recorder::with_clock(format!("{}()", state.name), None, self.clock.clone());
        state.return_mock = Some(mock.clone());
        mock
    }

    pub fn return_value(&self, value: Value) -> &Self {
        self.state().return_value = Some(value);
        self
    }

    /// Every following call raises `err`.
    pub fn side_effect(&self, err: HarnessError) -> &Self {
        self.state().side_effect = Some(SideEffect::Raise(err));
        self
    }

    /// Each call consumes the next outcome.
    pub fn side_effect_sequence(&self, outcomes: impl IntoIterator<Item = Outcome>) -> &Self {
        self.state().side_effect = Some(SideEffect::Sequence(outcomes.into_iter().collect()));
        self
    }

    /// Forward every call to `delegate` after recording it.
    pub fn delegate_to(&self, delegate: Delegate) -> &Self {
        self.state().side_effect = Some(SideEffect::Delegate(delegate));
        self
    }

    /// Drop the configured side effect; the return value applies again.
    pub fn clear_side_effect(&self) -> &Self {
        self.state().side_effect = None;
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn last_call(&self) -> Option<Call> {
        self.state().calls.last().map(|r| r.call.clone())
    }

    /// Forget recorded calls here and in every descendant. Configuration is kept.
    pub fn reset(&self) {
        let descendants = {
            let mut state = self.state();
            state.calls.clear();
            self.descendants_locked(&state)
        };
        for d in descendants {
            d.reset();
        }
    }

    /// Calls made on this recorder and all its descendants, in global call order.
    pub fn mock_calls(&self) -> Vec<(String, Call)> {
        let mut out: Vec<(u64, String, Call)> = Vec::new();
        self.collect_calls(&mut out);
        out.sort_by_key(|(seq, _, _)| *seq);
        out.into_iter().map(|(_, name, call)| (name, call)).collect()
    }

    fn collect_calls(&self, out: &mut Vec<(u64, String, Call)>) {
        let descendants = {
            let state = self.state();
            out.extend(
                state
                    .calls
                    .iter()
                    .map(|r| (r.seq, state.name.clone(), r.call.clone())),
            );
            self.descendants_locked(&state)
        };
        for d in descendants {
            d.collect_calls(out);
        }
    }

    fn descendants_locked(&self, state: &RecorderState) -> Vec<Recorder> {
        state
            .children
            .values()
            .cloned()
            .chain(state.return_mock.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    pub fn assert_called(&self) -> Result<()> {
        let state = self.state();
        if state.calls.is_empty() {
            return Err(HarnessError::AssertionMismatch {
                expected: format!("'{}' to have been called", state.name),
                actual: "0 calls".to_string(),
            });
        }
        Ok(())
    }

    pub fn assert_not_called(&self) -> Result<()> {
        let state = self.state();
        if !state.calls.is_empty() {
            return Err(HarnessError::AssertionMismatch {
                expected: format!("'{}' not to have been called", state.name),
                actual: render_calls(&state.name, &state.calls),
            });
        }
        Ok(())
    }

    pub fn assert_called_once(&self) -> Result<()> {
        let state = self.state();
        if state.calls.len() != 1 {
            return Err(HarnessError::AssertionMismatch {
                expected: format!("'{}' to have been called once", state.name),
                actual: render_calls(&state.name, &state.calls),
            });
        }
        Ok(())
    }

    /// Exactly one recorded call whose arguments deep-equal `expected`.
    pub fn assert_called_once_with(&self, expected: impl Into<Call>) -> Result<()> {
        let expected = expected.into();
        let state = self.state();
        match state.calls.as_slice() {
            [only] if only.call == expected => Ok(()),
            _ => Err(HarnessError::AssertionMismatch {
                expected: format!("exactly one call {}{}", state.name, expected),
                actual: render_calls(&state.name, &state.calls),
            }),
        }
    }

    /// The most recent call deep-equals `expected`.
    pub fn assert_called_with(&self, expected: impl Into<Call>) -> Result<()> {
        let expected = expected.into();
        let state = self.state();
        match state.calls.last() {
            Some(last) if last.call == expected => Ok(()),
            Some(last) => Err(HarnessError::AssertionMismatch {
                expected: format!("{}{}", state.name, expected),
                actual: format!("{}{}", state.name, last.call),
            }),
            None => Err(HarnessError::AssertionMismatch {
                expected: format!("{}{}", state.name, expected),
                actual: "0 calls".to_string(),
            }),
        }
    }

    /// Some recorded call deep-equals `expected`.
    pub fn assert_any_call(&self, expected: impl Into<Call>) -> Result<()> {
        let expected = expected.into();
        let state = self.state();
        if state.calls.iter().any(|r| r.call == expected) {
            return Ok(());
        }
        Err(HarnessError::AssertionMismatch {
            expected: format!("some call {}{}", state.name, expected),
            actual: render_calls(&state.name, &state.calls),
        })
    }
}

fn render_calls(name: &str, calls: &[CallRecord]) -> String {
    if calls.is_empty() {
        return "0 calls".to_string();
    }
    let rendered: Vec<String> = calls.iter().map(|r| format!("{name}{}", r.call)).collect();
    format!("{} call(s): [{}]", calls.len(), rendered.join(", "))
}
