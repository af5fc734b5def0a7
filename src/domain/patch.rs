//! Scoped patching of named collaborators and the per-test mock builder.

use crate::domain::error::{HarnessError, Result};
use crate::domain::recorder::{Call, Delegate, Outcome, Recorder};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Real implementation bound at a namespace path.
pub type NativeFn = Arc<dyn Fn(&Call) -> anyhow::Result<Value> + Send + Sync>;

/// What a namespace path currently resolves to.
#[derive(Clone)]
pub enum Binding {
    Native(NativeFn),
    Mock(Recorder),
}

impl Binding {
    pub fn invoke(&self, call: Call) -> anyhow::Result<Value> {
        match self {
            Binding::Native(f) => f(&call),
            Binding::Mock(recorder) => Ok(recorder.call(call)?),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Binding::Mock(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Native(_) => f.write_str("Native"),
            Binding::Mock(r) => write!(f, "Mock({})", r.name()),
        }
    }
}

/// Explicitly owned table of collaborators that code under test calls through.
///
/// Clones share the table, so a patch applied through one handle is visible to
/// every holder until it is unwound.
#[derive(Clone, Default)]
pub struct Namespace {
    slots: Arc<Mutex<HashMap<String, Binding>>>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<String> = self.slots().keys().cloned().collect();
        paths.sort();
        f.debug_struct("Namespace").field("paths", &paths).finish()
    }
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Binding>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a real implementation at `path`.
    pub fn define<F>(&self, path: impl Into<String>, f: F) -> &Self
    where
        F: Fn(&Call) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.slots().insert(path.into(), Binding::Native(Arc::new(f)));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.slots().contains_key(path)
    }

    pub fn binding(&self, path: &str) -> Option<Binding> {
        self.slots().get(path).cloned()
    }

    /// Invoke whatever is currently bound at `path`.
    pub fn call(&self, path: &str, call: impl Into<Call>) -> anyhow::Result<Value> {
        let binding = self
            .binding(path)
            .ok_or_else(|| anyhow::anyhow!("{path} is not defined"))?;
        binding.invoke(call.into())
    }

    fn swap(&self, path: &str, binding: Binding) -> Result<Binding> {
        let mut slots = self.slots();
        match slots.get_mut(path) {
            Some(slot) => Ok(std::mem::replace(slot, binding)),
            None => Err(HarnessError::PatchTargetNotFound(path.to_string())),
        }
    }

    fn restore(&self, path: &str, original: Binding) {
        self.slots().insert(path.to_string(), original);
    }
}

/// Holds one applied patch; restores the original binding when dropped.
pub struct PatchGuard {
    namespace: Namespace,
    path: String,
    original: Option<Binding>,
}

impl PatchGuard {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for PatchGuard {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            debug!(path = %self.path, "restoring patched binding");
            self.namespace.restore(&self.path, original);
        }
    }
}

impl fmt::Debug for PatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchGuard").field("path", &self.path).finish()
    }
}

/// Per-test mock builder.
///
/// Every recorder it creates shares one call clock, so `mock_calls` ordering
/// holds across recorders. Patches are unwound in reverse order by
/// [`Mocker::unwind`] or, at the latest, when the mocker is dropped.
#[derive(Debug, Default)]
pub struct Mocker {
    clock: Arc<AtomicU64>,
    patches: Vec<PatchGuard>,
}

impl Mocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the binding at `path` with a fresh recorder for the rest of the test.
    pub fn patch(&mut self, namespace: &Namespace, path: &str) -> Result<Recorder> {
        let recorder = Recorder::with_clock(path.to_string(), None, self.clock.clone());
        let original = namespace.swap(path, Binding::Mock(recorder.clone()))?;
        debug!(path, "patched binding");
        self.patches.push(PatchGuard {
            namespace: namespace.clone(),
            path: path.to_string(),
            original: Some(original),
        });
        Ok(recorder)
    }

    /// Patch `path` with a recorder that forwards to the original binding.
    pub fn spy(&mut self, namespace: &Namespace, path: &str) -> Result<Recorder> {
        let original = namespace
            .binding(path)
            .ok_or_else(|| HarnessError::PatchTargetNotFound(path.to_string()))?;
        let recorder = self.patch(namespace, path)?;
        let kind = path.to_string();
        let delegate: Delegate = Arc::new(move |call: &Call| -> Outcome {
            original
                .invoke(call.clone())
                .map_err(|e| HarnessError::raised(kind.clone(), e.to_string()))
        });
        recorder.delegate_to(delegate);
        Ok(recorder)
    }

    /// Free-standing unconstrained recorder.
    pub fn mock(&self, name: &str) -> Recorder {
        Recorder::with_clock(name.to_string(), None, self.clock.clone())
    }

    /// Recorder restricted to `capabilities`.
    pub fn mock_with_spec<I, S>(&self, name: &str, capabilities: I) -> Recorder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec: BTreeSet<String> = capabilities.into_iter().map(Into::into).collect();
        Recorder::with_clock(name.to_string(), Some(spec), self.clock.clone())
    }

    pub fn active_patches(&self) -> Vec<&str> {
        self.patches.iter().map(PatchGuard::path).collect()
    }

    /// Restore every patched binding, newest first. Returns how many were restored.
    pub fn unwind(&mut self) -> usize {
        let count = self.patches.len();
        while let Some(guard) = self.patches.pop() {
            drop(guard);
        }
        count
    }
}

impl Drop for Mocker {
    fn drop(&mut self) {
        self.unwind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn namespace() -> Namespace {
        let ns = Namespace::new();
        ns.define("math.double", |call: &Call| {
            let n = call.args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(n * 2))
        });
        ns
    }

    #[test]
    fn test_patch_replaces_and_unwind_restores() {
        let ns = namespace();
        let mut mocker = Mocker::new();
        let rec = mocker.patch(&ns, "math.double").unwrap();
        rec.return_value(json!(0));

        assert_eq!(ns.call("math.double", [json!(4)]).unwrap(), json!(0));
        rec.assert_called_once_with([json!(4)]).unwrap();

        assert_eq!(mocker.unwind(), 1);
        assert_eq!(ns.call("math.double", [json!(4)]).unwrap(), json!(8));
        assert_eq!(rec.call_count(), 1);
    }

    #[test]
    fn test_patch_restored_on_panic() {
        let ns = namespace();
        let shared = ns.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut mocker = Mocker::new();
            mocker.patch(&shared, "math.double").unwrap();
            panic!("test body blew up");
        }));
        assert!(outcome.is_err());
        assert!(!ns.binding("math.double").unwrap().is_mock());
    }

    #[test]
    fn test_nested_patches_unwind_in_reverse() {
        let ns = namespace();
        let mut mocker = Mocker::new();
        let first = mocker.patch(&ns, "math.double").unwrap();
        let second = mocker.patch(&ns, "math.double").unwrap();
        second.return_value(json!("second"));
        first.return_value(json!("first"));

        assert_eq!(ns.call("math.double", ()).unwrap(), json!("second"));
        mocker.unwind();
        assert_eq!(ns.call("math.double", [json!(1)]).unwrap(), json!(2));
    }

    #[test]
    fn test_patch_unknown_path_fails() {
        let ns = namespace();
        let mut mocker = Mocker::new();
        let err = mocker.patch(&ns, "math.triple").unwrap_err();
        assert_eq!(err, HarnessError::PatchTargetNotFound("math.triple".into()));
        assert!(mocker.active_patches().is_empty());
    }

    #[test]
    fn test_spy_records_and_forwards() {
        let ns = namespace();
        let mut mocker = Mocker::new();
        let spy = mocker.spy(&ns, "math.double").unwrap();
        assert_eq!(ns.call("math.double", [json!(5)]).unwrap(), json!(10));
        spy.assert_called_once_with([json!(5)]).unwrap();
    }

    #[test]
    fn test_mocker_recorders_share_clock() {
        let mocker = Mocker::new();
        let a = mocker.mock("a");
        let b = mocker.mock("b");
        a.call(()).unwrap();
        b.call(()).unwrap();
        a.call(()).unwrap();
        assert_eq!(a.calls()[0].seq, 0);
        assert_eq!(b.calls()[0].seq, 1);
        assert_eq!(a.calls()[1].seq, 2);
    }
}
