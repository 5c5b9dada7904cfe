//! `data.pages` and named collections.

use super::page::Page;
use crate::{
    config::{CollectionConfig, SiteConfig, SortOrder},
    value::Value,
};

/// Every listed page: layout-wrapped and not a draft, in discovery order.
pub fn page_list(pages: &[Page]) -> Vec<Value> {
    pages
        .iter()
        .filter(|page| !page.is_standalone() && !page.is_draft())
        .map(Page::entry)
        .collect()
}

/// Non-draft pages under `<name>/`, sorted as configured.
pub fn collection(pages: &[Page], name: &str, config: &CollectionConfig) -> Vec<Value> {
    let prefix = format!("{name}/");
    let mut items: Vec<Value> = pages
        .iter()
        .filter(|page| page.rel.starts_with(&prefix) && !page.is_draft())
        .map(Page::entry)
        .collect();

    if let Some(field) = &config.sort_by {
        let key = |item: &Value| {
            item.as_map()
                .and_then(|map| map.get(field))
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        match config.order {
            SortOrder::Asc => items.sort_by_cached_key(key),
            SortOrder::Desc => items.sort_by(|a, b| key(b).cmp(&key(a))),
        }
    }
    items
}

/// Publish `pages` and every configured collection into the data scope.
pub fn publish(config: &SiteConfig, pages: &[Page]) {
    let data = config.data();
    data.insert("pages", Value::seq(page_list(pages)));
    for (name, options) in config.collections() {
        data.insert(name, Value::seq(collection(pages, name, &options)));
    }
}
