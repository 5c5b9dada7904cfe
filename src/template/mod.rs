//! Directive template evaluation.
//!
//! A body is lexed into text and tags, parsed into a block tree, then
//! evaluated against a [`RenderScope`] (`site`, `page`, `data`) and the
//! page's [`Captures`].
//!
//! ```text
//! body ──► lexer ──► parser ──► eval ──► String
//!                                 │
//!                                 ├── partial ──► render (nested)
//!                                 └── content_for ──► Captures
//! ```

mod error;
mod eval;
mod expr;
mod lexer;
mod parser;

pub use error::TemplateError;

use crate::{
    context::DataStore,
    frontmatter,
    helpers::Helpers,
    value::Map,
};
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Component, Path},
    sync::Arc,
};

/// Per-page variables visible to templates.
#[derive(Debug, Clone)]
pub struct RenderScope {
    site: Arc<Map>,
    page: Arc<Map>,
    data: Arc<DataStore>,
}

impl RenderScope {
    pub fn new(site: Arc<Map>, page: Map, data: Arc<DataStore>) -> Self {
        Self {
            site,
            page: Arc::new(page),
            data,
        }
    }

    pub fn site(&self) -> &Arc<Map> {
        &self.site
    }

    pub fn page(&self) -> &Arc<Map> {
        &self.page
    }

    /// Mutable page map, copied on write if a partial still shares it.
    pub fn page_mut(&mut self) -> &mut Map {
        Arc::make_mut(&mut self.page)
    }

    pub fn data(&self) -> &Arc<DataStore> {
        &self.data
    }

    /// Strictness follows the data scope, which is built from the site's
    /// `strict_variables` setting.
    pub fn is_strict(&self) -> bool {
        self.data.is_strict()
    }

    /// Same scope with `locals` merged over the page variables.
    fn with_locals(&self, locals: Map) -> Self {
        let mut scope = self.clone();
        if !locals.is_empty() {
            scope.page_mut().extend(locals);
        }
        scope
    }
}

/// Rendered `content_for` blocks of one page render.
#[derive(Debug, Default, Clone)]
pub struct Captures(FxHashMap<String, String>);

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Present and non-empty.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| !s.is_empty())
    }

    /// Store a block, replacing any earlier capture of the same name.
    pub fn insert(&mut self, name: impl Into<String>, content: String) {
        self.0.insert(name.into(), content);
    }
}

/// Renders template bodies for one source root.
pub struct Renderer<'a> {
    root: &'a Path,
    helpers: &'a Helpers,
}

impl<'a> Renderer<'a> {
    pub const fn new(root: &'a Path, helpers: &'a Helpers) -> Self {
        Self { root, helpers }
    }

    pub const fn root(&self) -> &'a Path {
        self.root
    }

    pub fn render(
        &self,
        body: &str,
        scope: &RenderScope,
        captures: &mut Captures,
    ) -> Result<String, TemplateError> {
        let nodes = parser::parse(lexer::lex(body)?)?;
        let mut out = String::with_capacity(body.len());
        eval::Evaluator::new(self, scope, captures).run(&nodes, &mut out)?;
        Ok(out)
    }

    /// Render `name` (relative to the source root) with `locals` visible as
    /// page variables. A missing file renders as the empty string and the
    /// partial's own front matter is ignored. Names climbing out of the
    /// root with `..` are rejected.
    fn partial(
        &self,
        name: &str,
        locals: Map,
        scope: &RenderScope,
        captures: &mut Captures,
    ) -> Result<String, TemplateError> {
        let rel = Path::new(name.trim_start_matches('/'));
        if !rel
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(TemplateError::PartialPath(name.to_owned()));
        }
        let path = self.root.join(rel);
        if !path.is_file() {
            return Ok(String::new());
        }
        let raw = fs::read_to_string(&path).map_err(|err| TemplateError::Io(path.clone(), err))?;
        let (_, body) =
            frontmatter::split(&raw).map_err(|err| TemplateError::FrontMatter(path.clone(), err))?;

        let scope = scope.with_locals(locals);
        self.render(body, &scope, captures)
            .map_err(|err| TemplateError::Partial {
                name: name.to_owned(),
                source: Box::new(err),
            })
    }
}
