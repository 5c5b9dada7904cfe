//! Built-in extensions.
//!
//! | Plugin     | Stage           | Output                                  |
//! |------------|-----------------|-----------------------------------------|
//! | `feed`     | `after_build`   | `feed.xml` (RSS 2.0), needs `url`       |
//! | `markdown` | `before_layout` | `.md` bodies as HTML, needs `markdown`  |
//! | `sitemap`  | `after_build`   | `sitemap.xml`, needs `url`              |

mod feed;
mod markdown;
mod sitemap;

pub use feed::Feed;
pub use markdown::Markdown;
pub use sitemap::Sitemap;

use crate::{config::SiteConfig, hooks::Plugin, value::Value};
use anyhow::Result;

/// Built-in plugins in install order (by name).
pub fn builtin() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(Feed), Box::new(Markdown), Box::new(Sitemap)]
}

/// Entries of `data.pages` as published for this build.
fn published_pages(config: &SiteConfig) -> Result<Vec<Value>> {
    Ok(config
        .data()
        .lookup("pages")?
        .and_then(|pages| pages.as_seq().map(|seq| seq.to_vec()))
        .unwrap_or_default())
}

/// String form of `key` in a page entry, empty when absent.
fn field(entry: &Value, key: &str) -> String {
    entry
        .as_map()
        .and_then(|map| map.get(key))
        .map(ToString::to_string)
        .unwrap_or_default()
}
