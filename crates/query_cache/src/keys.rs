//! Hierarchical cache keys.
//!
//! Every key starts with the resource segment, so `Resource::keys().all()` is
//! a prefix of every list, detail and scoped key of that resource:
//!
//! - `all()`           → `["accounts"]`
//! - `list(filters)`   → `["accounts", "list", {filters}]`
//! - `detail(id)`      → `["accounts", "detail", "42"]`
//! - `scoped(name, f)` → `["analytics", "summary", {filters}]`
use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use api_types::Resource;
use serde_json::Value;

/// Filter object embedded in list keys.
///
/// Keys are kept sorted, so two filter sets built in different orders compare
/// and hash equal. `null` values are dropped on insert: an unset filter and a
/// missing filter address the same cached list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, Value>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&key);
            }
            value => {
                self.0.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Query-string pairs for the request this filter set keys.
    ///
    /// Strings are sent raw, arrays repeat the key once per element, other
    /// values use their JSON text.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            match value {
                Value::Array(items) => {
                    for item in items {
                        pairs.push((key.clone(), scalar_text(item)));
                    }
                }
                other => pairs.push((key.clone(), scalar_text(other))),
            }
        }
        pairs
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Hash for Filters {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (key, value) in &self.0 {
            key.hash(state);
            // BTreeMap-backed JSON objects serialize with sorted keys, so the
            // text form is canonical.
            value.to_string().hash(state);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut filters = Filters::new();
        for (key, value) in iter {
            filters.insert(key, value);
        }
        filters
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Text(String),
    Filters(Filters),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Filters(filters) => {
                let object: serde_json::Map<String, Value> = filters
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                write!(f, "{}", Value::Object(object))
            }
        }
    }
}

/// Ordered tuple identifying one cached result set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<Segment>);

impl QueryKey {
    pub fn root(resource: Resource) -> Self {
        Self(vec![Segment::Text(resource.as_str().to_string())])
    }

    fn push(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Resource this key belongs to.
    pub fn resource(&self) -> Option<Resource> {
        match self.0.first() {
            Some(Segment::Text(root)) => root.parse().ok(),
            _ => None,
        }
    }

    /// Prefix match used by invalidation: `["accounts"]` matches every
    /// accounts key, `["accounts", "list"]` only the list keys.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

/// Key factory for one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceKeys(Resource);

impl ResourceKeys {
    pub fn all(self) -> QueryKey {
        QueryKey::root(self.0)
    }

    /// Prefix shared by every list of this resource, whatever the filters.
    pub fn lists(self) -> QueryKey {
        self.all().push(Segment::Text("list".to_string()))
    }

    pub fn list(self, filters: &Filters) -> QueryKey {
        self.lists().push(Segment::Filters(filters.clone()))
    }

    pub fn details(self) -> QueryKey {
        self.all().push(Segment::Text("detail".to_string()))
    }

    pub fn detail(self, id: impl fmt::Display) -> QueryKey {
        self.details().push(Segment::Text(id.to_string()))
    }

    /// Named sub-view, e.g. `analytics.scoped("summary", {period})`.
    pub fn scoped(self, name: &str, filters: &Filters) -> QueryKey {
        self.all()
            .push(Segment::Text(name.to_string()))
            .push(Segment::Filters(filters.clone()))
    }
}

pub trait KeyFactory {
    fn keys(self) -> ResourceKeys;
}

impl KeyFactory for Resource {
    fn keys(self) -> ResourceKeys {
        ResourceKeys(self)
    }
}
