//! Layout chain resolution.
//!
//! A rendered page body is wrapped by `_<layout>.html` from the source root
//! (`layout` when the page does not say), which may itself declare a further
//! layout, and so on:
//!
//! ```text
//! page body ─► before_layout hooks ─► _post.html ─► _base.html ─► html
//!                                     (layout: base)  (no layout)
//! ```
//!
//! Every step sees the previous result as `page.content` and shares the
//! page's captures. The chain ends at a layout that declares none, or at a
//! layout file that does not exist. Revisiting a layout is an error.

use crate::{
    config::defaults,
    frontmatter,
    hooks::HookRegistry,
    template::{Captures, RenderScope, Renderer},
    value::{Map, Value},
};
use anyhow::{Context, Result, bail};
use std::fs;

/// `layout: false` pages skip evaluation and layouts and are written as-is.
pub fn is_standalone(meta: &Map) -> bool {
    meta.get("layout").is_some_and(|layout| layout.to_string() == "false")
}

/// Render a page body and wrap it in its layout chain.
pub fn render_page(
    renderer: &Renderer<'_>,
    hooks: &HookRegistry,
    meta: &Map,
    body: &str,
    scope: &mut RenderScope,
) -> Result<String> {
    if is_standalone(meta) {
        return Ok(body.to_owned());
    }

    let mut captures = Captures::new();
    let content = renderer.render(body, scope, &mut captures)?;
    let mut content = hooks.before_layout(content, meta, scope)?;

    let mut chain: Vec<String> = Vec::new();
    let mut next = first_layout(meta);
    while let Some(name) = next {
        if chain.contains(&name) {
            chain.push(name);
            bail!("layout cycle: {}", chain.join(" -> "));
        }

        let path = renderer.root().join(format!("_{name}.html"));
        if !path.is_file() {
            break;
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read layout `{}`", path.display()))?;
        let (layout_meta, layout_body) = frontmatter::split(&raw)
            .with_context(|| format!("malformed layout `{}`", path.display()))?;

        scope.page_mut().insert("content".into(), content.into());
        content = renderer
            .render(layout_body, scope, &mut captures)
            .with_context(|| format!("failed to render layout `_{name}.html`"))?;

        next = chained_layout(&layout_meta);
        chain.push(name);
    }

    Ok(content)
}

/// The page's own layout: `layout` when unset, none when set to `nil`.
fn first_layout(meta: &Map) -> Option<String> {
    match meta.get("layout") {
        None => Some(defaults::LAYOUT.to_owned()),
        Some(value) => layout_name(value),
    }
}

/// A layout's parent: only when declared explicitly.
fn chained_layout(meta: &Map) -> Option<String> {
    meta.get("layout").and_then(layout_name)
}

fn layout_name(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        other => Some(other.to_string()).filter(|name| name != "false" && !name.is_empty()),
    }
}
