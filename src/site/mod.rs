//! Build orchestration.
//!
//! # Pipeline
//!
//! ```text
//! Site::build()
//!     │
//!     ├── BuildSession::new()   hooks, helpers and _site.yml, fresh per build
//!     │
//!     ├── discover()            parse every page, drop drafts
//!     ├── publish()             data.pages + collections
//!     ├── after_parse hooks
//!     │
//!     ├── per page              before_render → evaluate → before_layout
//!     │                         → layouts → after_render → write
//!     │
//!     ├── copy_assets()
//!     └── after_build hooks
//! ```
//!
//! Pages render in discovery order, one at a time. The first error stops the
//! build.

mod assets;
mod collections;
mod page;

pub use page::Page;

use crate::{
    config::{self, SiteConfig},
    helpers::Helpers,
    hooks::{HookRegistry, Plugin},
    layout, log, plugins,
    template::{RenderScope, Renderer},
    value::Value,
};
use anyhow::{Context, Result, bail};
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// Source root used when none is given.
pub const DEFAULT_SRC: &str = "src";

/// Files never treated as pages or assets.
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub pages: usize,
    pub assets: usize,
    /// Absolute output directory written to.
    pub dest: PathBuf,
}

/// A buildable site: source root, build options and registered extensions.
///
/// # Example
///
/// ```ignore
/// let mut site = Site::new("src");
/// site.helper("year", |_| Ok(Value::from(2024)));
/// site.plugin(MyPlugin);
/// let report = site.with_env("production").build()?;
/// ```
pub struct Site {
    src: PathBuf,
    dest: Option<PathBuf>,
    env: Option<String>,
    include_drafts: bool,
    plugins: Vec<Arc<dyn Plugin>>,
    helpers: Helpers,
}

impl Default for Site {
    fn default() -> Self {
        Self::new(DEFAULT_SRC)
    }
}

impl Site {
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: None,
            env: None,
            include_drafts: false,
            plugins: Vec::new(),
            helpers: Helpers::default(),
        }
    }

    /// Write output here instead of the configured `dest`.
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Build for `env` instead of `SHEAF_ENV` / `development`.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Render pages marked `draft: true`.
    pub fn with_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    /// Register a plugin. Plugins install after the built-in ones, in
    /// registration order, at the start of every build.
    pub fn plugin(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Register a helper. A helper may shadow a built-in one.
    pub fn helper<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.helpers.register(name, f);
        self
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn env(&self) -> String {
        config::active_env(self.env.as_deref())
    }

    /// Run one full build.
    pub fn build(&self) -> Result<BuildReport> {
        BuildSession::new(self)?.run()
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("src", &self.src)
            .field("dest", &self.dest)
            .field("env", &self.env)
            .field("include_drafts", &self.include_drafts)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("helpers", &self.helpers)
            .finish()
    }
}

/// State of a single build. Nothing here outlives it.
struct BuildSession {
    config: SiteConfig,
    hooks: HookRegistry,
    helpers: Helpers,
    include_drafts: bool,
}

impl BuildSession {
    fn new(site: &Site) -> Result<Self> {
        let root = config::absolute(&site.src)
            .with_context(|| format!("failed to resolve `{}`", site.src.display()))?;
        if !root.is_dir() {
            bail!("source directory `{}` not found", root.display());
        }

        let env = site.env();
        let config = SiteConfig::load(&root, &env, site.dest.as_deref())?;

        let mut hooks = HookRegistry::new();
        for plugin in plugins::builtin() {
            hooks.install(plugin.as_ref());
        }
        for plugin in &site.plugins {
            hooks.install(plugin.as_ref());
        }

        let mut helpers = Helpers::builtin();
        helpers.extend(&site.helpers);

        Ok(Self {
            config,
            hooks,
            helpers,
            include_drafts: site.include_drafts,
        })
    }

    fn run(self) -> Result<BuildReport> {
        let pages = page::discover(&self.config, self.include_drafts)?;
        collections::publish(&self.config, &pages);
        self.hooks.after_parse(&self.config, &pages)?;

        let renderer = Renderer::new(self.config.root(), &self.helpers);
        for page in &pages {
            self.write_page(&renderer, page)?;
        }

        let assets = assets::copy_assets(&self.config)?;
        self.hooks.after_build(&self.config, self.config.dest())?;

        if assets > 0 {
            log!("build"; "built {} pages, copied {} assets", pages.len(), assets);
        } else {
            log!("build"; "built {} pages", pages.len());
        }

        Ok(BuildReport {
            pages: pages.len(),
            assets,
            dest: self.config.dest().to_path_buf(),
        })
    }

    fn write_page(&self, renderer: &Renderer<'_>, page: &Page) -> Result<()> {
        let mut scope = RenderScope::new(
            Arc::clone(self.config.vars()),
            page.scope(),
            Arc::clone(self.config.data()),
        );
        self.hooks.before_render(&mut scope, &page.rel)?;

        let html = layout::render_page(renderer, &self.hooks, &page.meta, &page.body, &mut scope)
            .with_context(|| format!("failed to render `{}`", page.rel))?;
        let html = self.hooks.after_render(html, &scope, &page.rel)?;

        write_file(&self.config.dest().join(&page.output), html.as_bytes())?;
        if page.is_standalone() {
            log!("build"; "{} (standalone)", page.output);
        } else {
            log!("build"; "{}", page.output);
        }
        Ok(())
    }
}

/// Write `content`, creating parent directories.
pub(crate) fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write `{}`", path.display()))
}

/// Files under `root` as `(relative path, path)`, sorted by relative path.
///
/// Entries whose name starts with `_` are skipped along with everything
/// below them, as is `dest` when it sits inside `root`. Dotfiles are kept
/// only with `hidden`.
fn source_files(root: &Path, dest: &Path, hidden: bool) -> Result<Vec<(String, PathBuf)>> {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !(entry.path() == dest || skipped(entry.file_name(), hidden))
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk `{}`", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative(root, entry.path());
        files.push((rel, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn skipped(name: &OsStr, hidden: bool) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('_')
        || (!hidden && name.starts_with('.'))
        || IGNORED_FILES.contains(&name.as_ref())
}

/// `/`-separated path of `path` below `root`.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
