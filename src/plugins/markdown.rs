//! Markdown bodies.
//!
//! With `markdown: true` in `_site.yml`, the rendered body of every `.md`
//! page is converted to HTML before layouts wrap it. Templates inside the
//! body have already been evaluated at that point.

use crate::{
    hooks::{Hook, HookRegistrar, Plugin},
    value::{Map, Value},
};
use pulldown_cmark::{Options, Parser, html::push_html};

#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl Plugin for Markdown {
    fn name(&self) -> &str {
        "markdown"
    }

    fn register(&self, hooks: &mut HookRegistrar<'_>) {
        hooks.hook(Hook::before_layout(|body, meta, scope| {
            let enabled = scope.site().get("markdown").is_some_and(Value::is_truthy);
            Ok(if enabled && is_markdown(meta) {
                render_markdown(&body)
            } else {
                body
            })
        }));
    }
}

fn is_markdown(meta: &Map) -> bool {
    meta.get("format").and_then(Value::as_str) == Some("md")
}

/// CommonMark plus tables, strikethrough and task lists.
pub fn render_markdown(content: &str) -> String {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let parser = Parser::new_ext(content, options);

    let mut html = String::with_capacity(content.len() * 2);
    push_html(&mut html, parser);
    html
}
