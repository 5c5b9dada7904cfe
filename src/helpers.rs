//! Helper functions callable from templates.
//!
//! A helper receives its evaluated positional arguments (keyword arguments
//! arrive as one trailing map) and returns a value:
//!
//! ```ignore
//! helpers.register("shout", |args: &[Value]| {
//!     let text = args.first().map(ToString::to_string).unwrap_or_default();
//!     Ok(Value::from(text.to_uppercase()))
//! });
//! ```
//!
//! `<%= shout page.title %>` then renders the upper-cased title.

use crate::value::Value;
use rustc_hash::FxHashMap;
use std::{fmt, sync::Arc};

pub type HelperFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Helpers {
    table: FxHashMap<String, HelperFn>,
}

impl Helpers {
    /// Registry holding the built-in helpers: `escape_html` (alias `h`),
    /// `upcase` and `downcase`.
    pub fn builtin() -> Self {
        let mut helpers = Self::default();
        helpers.register("escape_html", escape_html);
        helpers.register("h", escape_html);
        helpers.register("upcase", |args: &[Value]| {
            Ok(first_arg(args).to_uppercase().into())
        });
        helpers.register("downcase", |args: &[Value]| {
            Ok(first_arg(args).to_lowercase().into())
        });
        helpers
    }

    /// Register `name`, replacing any helper already registered under it.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(helper));
    }

    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Add every helper of `other`, shadowing existing names.
    pub fn extend(&mut self, other: &Self) {
        self.table
            .extend(other.table.iter().map(|(name, f)| (name.clone(), Arc::clone(f))));
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.table.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

fn first_arg(args: &[Value]) -> String {
    args.first().map(ToString::to_string).unwrap_or_default()
}

fn escape_html(args: &[Value]) -> anyhow::Result<Value> {
    let text = first_arg(args);
    Ok(quick_xml::escape::escape(text.as_str()).into_owned().into())
}
