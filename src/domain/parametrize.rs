//! Expansion of one test template into one case per parameter row.

use crate::domain::case::TestCase;
use crate::domain::error::{HarnessError, Result};
use serde_json::Value;

/// Parameter names plus the value rows bound to them.
#[derive(Debug, Clone, Default)]
pub struct Parametrize {
    names: Vec<String>,
    rows: Vec<Vec<Value>>,
    ids: Vec<String>,
}

impl Parametrize {
    /// Comma-separated names, e.g. `"input,expected"`.
    pub fn new(names: &str) -> Self {
        Self::with_names(
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty()),
        )
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn case(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn cases<I, R>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        self.rows
            .extend(rows.into_iter().map(|r| r.into_iter().collect()));
        self
    }

    /// Explicit ids, assigned to rows by position. Rows past the end get
    /// generated ids.
    #[must_use]
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One case per row, in row order. Every row is checked before any case
    /// is produced.
    pub fn expand(&self, template: &TestCase) -> Result<Vec<TestCase>> {
        for (row, values) in self.rows.iter().enumerate() {
            if values.len() != self.names.len() {
                return Err(HarnessError::ParametrizeArityMismatch {
                    row,
                    expected: self.names.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(row, values)| template.bind(&self.names, values, self.row_id(row, values)))
            .collect())
    }

    fn row_id(&self, row: usize, values: &[Value]) -> String {
        if let Some(id) = self.ids.get(row) {
            return id.clone();
        }
        self.names
            .iter()
            .zip(values)
            .map(|(name, value)| id_part(name, value, row))
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Apply stacked parametrizations; the result is their cartesian product.
pub fn expand_all(template: &TestCase, layers: &[Parametrize]) -> Result<Vec<TestCase>> {
    let mut cases = vec![template.clone()];
    for layer in layers {
        let mut next = Vec::with_capacity(cases.len() * layer.len());
        for case in &cases {
            next.extend(layer.expand(case)?);
        }
        cases = next;
    }
    Ok(cases)
}

fn id_part(name: &str, value: &Value, row: usize) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => format!("{name}{row}"),
    }
}
