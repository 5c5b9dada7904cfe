//! Variable resolution for templates.
//!
//! Two scopes share one lookup contract:
//!
//! | Scope       | Type          | Backing                                   |
//! |-------------|---------------|-------------------------------------------|
//! | `site`/`page` | [`Context`] | in-memory map                             |
//! | `data`      | [`DataStore`] | `_data/` files, loaded lazily and cached  |
//!
//! `lookup` answers "(value, found)"; `get` applies the strict/lenient policy
//! on top of it. Nested maps reached through either scope are resolved with
//! the same policy as the scope they came from.

mod data;

pub use data::DataStore;

use crate::value::{Map, Value};
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("undefined variable: {0}")]
    Undefined(String),

    #[error("IO error when reading data file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed data file `{0}`: {1}")]
    Malformed(PathBuf, String),
}

/// Apply the strict/lenient policy to a lookup result.
pub fn resolve(found: Option<Value>, key: &str, strict: bool) -> Result<Value, ResolveError> {
    match found {
        Some(value) => Ok(value),
        None if strict => Err(ResolveError::Undefined(key.to_owned())),
        None => Ok(Value::Null),
    }
}

/// Read view over an in-memory map.
///
/// `ctx.foo` and `ctx["foo"]` in templates both land on [`Context::get`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: Arc<Map>,
    strict: bool,
}

impl Context {
    pub fn new(data: Map, strict: bool) -> Self {
        Self::wrap(Arc::new(data), strict)
    }

    /// Wrap an already shared map without copying it.
    pub const fn wrap(data: Arc<Map>, strict: bool) -> Self {
        Self { data, strict }
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<Value, ResolveError> {
        resolve(self.lookup(key).cloned(), key, self.strict)
    }

    /// New context whose map is `self` overridden by `other`.
    /// Strictness stays that of `self`.
    pub fn merge(&self, other: &Map) -> Self {
        let mut data = (*self.data).clone();
        data.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::new(data, self.strict)
    }

    pub fn as_map(&self) -> &Arc<Map> {
        &self.data
    }
}

impl fmt::Display for Context {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}
