//! Configuration values with deferred leaves
//!
//! A [`Param`] is a JSON-like tree. Any leaf may be a [`Deferred`] value: a
//! closure over the catalog and the resource registry that is evaluated
//! during resolution, so a resource can refer to data another resource only
//! discovers at run time.

use crate::catalog::Catalog;
use crate::registry::ResourceRegistry;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a deferred value
///
/// Returning `None` means "not yet known"; the leaf stays deferred.
pub type DeferredFn = dyn Fn(&Catalog, &ResourceRegistry) -> Option<Param> + Send + Sync;

/// A lazily evaluated configuration leaf
#[derive(Clone)]
pub struct Deferred {
    label: String,
    func: Arc<DeferredFn>,
}

impl Deferred {
    /// Wrap a closure as a deferred value
    ///
    /// The label only shows up in logs and debug output.
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Catalog, &ResourceRegistry) -> Option<Param> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    /// Evaluate against the current run state
    pub fn evaluate(&self, catalog: &Catalog, registry: &ResourceRegistry) -> Option<Param> {
        (self.func)(catalog, registry)
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred({})", self.label)
    }
}

impl PartialEq for Deferred {
    /// Two deferred values are equal only if they share the same closure
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Param {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Param>),
    Map(BTreeMap<String, Param>),
    /// Not evaluated yet, or evaluated to "not yet known"
    Deferred(Deferred),
}

impl Param {
    /// An empty map
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Build a deferred leaf from a closure
    pub fn deferred<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Catalog, &ResourceRegistry) -> Option<Param> + Send + Sync + 'static,
    {
        Self::Deferred(Deferred::new(label, func))
    }

    /// Insert into a map value, turning `Null` into a map first
    ///
    /// Has no effect on other variants.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        if matches!(self, Self::Null) {
            *self = Self::map();
        }
        if let Self::Map(map) = self {
            map.insert(key.into(), value.into());
        }
    }

    /// Builder form of [`Param::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(key, value);
        self
    }

    /// Check if this leaf is still an unevaluated deferred value
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Check if any leaf in the tree is still deferred
    pub fn contains_deferred(&self) -> bool {
        match self {
            Self::Deferred(_) => true,
            Self::List(items) => items.iter().any(Self::contains_deferred),
            Self::Map(map) => map.values().any(Self::contains_deferred),
            _ => false,
        }
    }

    /// Loose truthiness used for `skip` and similar flags
    ///
    /// Null, false, zero, the empty string and unresolved leaves are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null | Self::Deferred(_) => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) => true,
        }
    }

    /// Look up a key in a map value
    ///
    /// Unresolved leaves are reported as absent.
    pub fn get(&self, key: &str) -> Option<&Param> {
        match self {
            Self::Map(map) => map.get(key).filter(|v| !v.is_unresolved()),
            _ => None,
        }
    }

    /// Follow a sequence of map keys and list indices
    pub fn at_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Param> {
        segments.iter().try_fold(self, |current, segment| {
            let segment = segment.as_ref();
            match current {
                Self::Map(map) => map.get(segment),
                Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            Self::Float(f) if f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f) => {
                Some(*f as i64)
            }
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Non-negative integer view, for counts and delays
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_list(&self) -> Option<&[Param]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Param>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Read a list of strings, accepting a single string as a one-item list
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Self::String(s) => vec![s.clone()],
            Self::List(items) => items
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Convert to JSON, dropping unresolved leaves
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null | Self::Deferred(_) => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => items
                .iter()
                .filter(|p| !p.is_unresolved())
                .map(Self::to_json)
                .collect(),
            Self::Map(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_unresolved())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Deferred(d) => write!(f, "<{}>", d.label()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<JsonValue> for Param {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .unwrap_or_else(|| Self::Float(n.as_f64().unwrap_or_default())),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<Param>> for Param {
    fn from(value: Vec<Param>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, Param>> for Param {
    fn from(value: BTreeMap<String, Param>) -> Self {
        Self::Map(value)
    }
}

impl From<Deferred> for Param {
    fn from(value: Deferred) -> Self {
        Self::Deferred(value)
    }
}

/// Reference another resource's data by path
///
/// The path is dotted: the first segment names a resource, the second picks
/// one of its fields (`params`, `_target`, `_currentHost`, `name`,
/// `module`), and the rest walk into maps by key and lists by index. The
/// value is read when the deferred leaf is resolved, not when it is built.
///
/// ```ignore
/// let sg_id = watch("web-sg._target.group_id");
/// ```
pub fn watch(path: impl Into<String>) -> Param {
    let path = path.into();
    Param::deferred(format!("watch({path})"), move |_, registry| {
        registry.lookup(&path)
    })
}

/// Like [`watch`], passing the found value through `transform`
///
/// The transform only runs when the path resolves.
pub fn watch_with<F>(path: impl Into<String>, transform: F) -> Param
where
    F: Fn(Param) -> Option<Param> + Send + Sync + 'static,
{
    let path = path.into();
    Param::deferred(format!("watch({path})"), move |_, registry| {
        registry.lookup(&path).and_then(&transform)
    })
}
