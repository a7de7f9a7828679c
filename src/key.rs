//! Request identity: parameter sets and cache keys.
//!
//! A [`CacheKey`] is derived from a resource path and a [`Params`] set.
//! Parameters are held in a sorted map and nested JSON objects are written
//! with sorted keys, so two logically identical requests map to the same
//! key no matter what order their parameters were inserted in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HuginnError, Result};

/// Request parameters, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Render parameters as `(name, text)` pairs for a query string.
    ///
    /// Strings are sent bare; every other value is sent as JSON text.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => canonical_json(other),
                };
                (name.clone(), text)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Deterministic identity of a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from a resource path and its parameters.
    ///
    /// Fails with [`HuginnError::InvalidRequest`] when the path or a
    /// parameter name is malformed.
    pub fn new(path: &str, params: &Params) -> Result<Self> {
        validate_path(path)?;
        let mut key = String::from(path);
        for (i, (name, value)) in params.iter().enumerate() {
            if name.is_empty() {
                return Err(HuginnError::InvalidRequest(format!(
                    "empty parameter name for {path}"
                )));
            }
            key.push(if i == 0 { '?' } else { '&' });
            key.push_str(name);
            key.push('=');
            write_canonical(value, &mut key);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource path portion of the key.
    pub fn path(&self) -> &str {
        self.0.split_once('?').map_or(&self.0, |(path, _)| path)
    }

    /// Whether this key addresses `path` itself or a resource nested under it.
    pub fn is_under(&self, path: &str) -> bool {
        let own = self.path();
        let prefix = path.trim_end_matches('/');
        own == prefix
            || own
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(HuginnError::InvalidRequest("empty resource path".into()));
    }
    if !path.starts_with('/') {
        return Err(HuginnError::InvalidRequest(format!(
            "resource path must start with '/': {path}"
        )));
    }
    if let Some(c) = path
        .chars()
        .find(|c| c.is_whitespace() || *c == '?' || *c == '#')
    {
        return Err(HuginnError::InvalidRequest(format!(
            "resource path contains {c:?}; pass query values as params: {path}"
        )));
    }
    Ok(())
}

/// JSON text with object keys in sorted order.
pub(crate) fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
