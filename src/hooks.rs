//! Extension points of the build pipeline.
//!
//! | Stage           | When                                   | Result            |
//! |-----------------|----------------------------------------|-------------------|
//! | `after_parse`   | once, all pages parsed, nothing written | side effects     |
//! | `before_render` | per page, before evaluation            | mutates the scope |
//! | `before_layout` | per page, body rendered, before layouts | replaces body    |
//! | `after_render`  | per page, after the layout chain       | replaces html     |
//! | `after_build`   | once, pages written and assets copied  | side effects      |
//!
//! Extensions implement [`Plugin`] and register typed [`Hook`]s through a
//! [`HookRegistrar`]. Hooks of one stage run in registration order; the
//! first failure aborts the build and names the stage and plugin.

use crate::{
    config::SiteConfig,
    site::Page,
    template::RenderScope,
    value::Map,
};
use anyhow::{Context, Result};
use std::{fmt, path::Path};

pub type AfterParseFn = Box<dyn Fn(&SiteConfig, &[Page]) -> Result<()> + Send + Sync>;
pub type BeforeRenderFn = Box<dyn Fn(&mut RenderScope, &str) -> Result<()> + Send + Sync>;
pub type BeforeLayoutFn = Box<dyn Fn(String, &Map, &RenderScope) -> Result<String> + Send + Sync>;
pub type AfterRenderFn = Box<dyn Fn(String, &RenderScope, &str) -> Result<String> + Send + Sync>;
pub type AfterBuildFn = Box<dyn Fn(&SiteConfig, &Path) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AfterParse,
    BeforeRender,
    BeforeLayout,
    AfterRender,
    AfterBuild,
}

impl Stage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::AfterParse => "after_parse",
            Self::BeforeRender => "before_render",
            Self::BeforeLayout => "before_layout",
            Self::AfterRender => "after_render",
            Self::AfterBuild => "after_build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A callable bound to its stage.
pub enum Hook {
    AfterParse(AfterParseFn),
    BeforeRender(BeforeRenderFn),
    BeforeLayout(BeforeLayoutFn),
    AfterRender(AfterRenderFn),
    AfterBuild(AfterBuildFn),
}

impl Hook {
    pub fn after_parse<F>(f: F) -> Self
    where
        F: Fn(&SiteConfig, &[Page]) -> Result<()> + Send + Sync + 'static,
    {
        Self::AfterParse(Box::new(f))
    }

    pub fn before_render<F>(f: F) -> Self
    where
        F: Fn(&mut RenderScope, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self::BeforeRender(Box::new(f))
    }

    pub fn before_layout<F>(f: F) -> Self
    where
        F: Fn(String, &Map, &RenderScope) -> Result<String> + Send + Sync + 'static,
    {
        Self::BeforeLayout(Box::new(f))
    }

    pub fn after_render<F>(f: F) -> Self
    where
        F: Fn(String, &RenderScope, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self::AfterRender(Box::new(f))
    }

    pub fn after_build<F>(f: F) -> Self
    where
        F: Fn(&SiteConfig, &Path) -> Result<()> + Send + Sync + 'static,
    {
        Self::AfterBuild(Box::new(f))
    }

    pub const fn stage(&self) -> Stage {
        match self {
            Self::AfterParse(_) => Stage::AfterParse,
            Self::BeforeRender(_) => Stage::BeforeRender,
            Self::BeforeLayout(_) => Stage::BeforeLayout,
            Self::AfterRender(_) => Stage::AfterRender,
            Self::AfterBuild(_) => Stage::AfterBuild,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({})", self.stage())
    }
}

/// A build extension.
pub trait Plugin: Send + Sync {
    /// Name reported when one of the plugin's hooks fails.
    fn name(&self) -> &str;

    fn register(&self, hooks: &mut HookRegistrar<'_>);
}

/// Registration handle given to [`Plugin::register`].
pub struct HookRegistrar<'a> {
    plugin: &'a str,
    registry: &'a mut HookRegistry,
}

impl HookRegistrar<'_> {
    pub fn hook(&mut self, hook: Hook) -> &mut Self {
        self.registry.entries.push(Entry {
            plugin: self.plugin.to_owned(),
            hook,
        });
        self
    }
}

#[derive(Debug)]
struct Entry {
    plugin: String,
    hook: Hook,
}

/// Ordered hooks of one build.
#[derive(Debug, Default)]
pub struct HookRegistry {
    entries: Vec<Entry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `plugin` register its hooks after those already present.
    pub fn install(&mut self, plugin: &dyn Plugin) {
        let mut registrar = HookRegistrar {
            plugin: plugin.name(),
            registry: self,
        };
        plugin.register(&mut registrar);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.entries.iter().filter(|e| e.hook.stage() == stage).count()
    }

    /// Plugin names owning hooks of `stage`, in run order.
    pub fn plugins(&self, stage: Stage) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.hook.stage() == stage)
            .map(|e| e.plugin.as_str())
            .collect()
    }

    pub fn after_parse(&self, config: &SiteConfig, pages: &[Page]) -> Result<()> {
        for entry in &self.entries {
            if let Hook::AfterParse(f) = &entry.hook {
                f(config, pages).with_context(|| failure(Stage::AfterParse, &entry.plugin))?;
            }
        }
        Ok(())
    }

    pub fn before_render(&self, scope: &mut RenderScope, rel: &str) -> Result<()> {
        for entry in &self.entries {
            if let Hook::BeforeRender(f) = &entry.hook {
                f(scope, rel).with_context(|| failure(Stage::BeforeRender, &entry.plugin))?;
            }
        }
        Ok(())
    }

    pub fn before_layout(&self, body: String, meta: &Map, scope: &RenderScope) -> Result<String> {
        self.entries.iter().try_fold(body, |body, entry| match &entry.hook {
            Hook::BeforeLayout(f) => {
                f(body, meta, scope).with_context(|| failure(Stage::BeforeLayout, &entry.plugin))
            }
            _ => Ok(body),
        })
    }

    pub fn after_render(&self, html: String, scope: &RenderScope, rel: &str) -> Result<String> {
        self.entries.iter().try_fold(html, |html, entry| match &entry.hook {
            Hook::AfterRender(f) => {
                f(html, scope, rel).with_context(|| failure(Stage::AfterRender, &entry.plugin))
            }
            _ => Ok(html),
        })
    }

    pub fn after_build(&self, config: &SiteConfig, dest: &Path) -> Result<()> {
        for entry in &self.entries {
            if let Hook::AfterBuild(f) = &entry.hook {
                f(config, dest).with_context(|| failure(Stage::AfterBuild, &entry.plugin))?;
            }
        }
        Ok(())
    }
}

fn failure(stage: Stage, plugin: &str) -> String {
    format!("{stage} hook of plugin `{plugin}` failed")
}
