//! Sitemap generation.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!   </url>
//! </urlset>
//! ```

use super::{field, published_pages};
use crate::{
    config::SiteConfig,
    hooks::{Hook, HookRegistrar, Plugin},
    log,
    site::write_file,
    value::Value,
};
use anyhow::Result;
use quick_xml::escape::escape;
use std::path::Path;

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

pub const FILE: &str = "sitemap.xml";

/// Writes `sitemap.xml` listing every page in `data.pages`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sitemap;

impl Plugin for Sitemap {
    fn name(&self) -> &str {
        "sitemap"
    }

    fn register(&self, hooks: &mut HookRegistrar<'_>) {
        hooks.hook(Hook::after_build(write_sitemap));
    }
}

fn write_sitemap(config: &SiteConfig, dest: &Path) -> Result<()> {
    let Some(base) = config.base_url() else {
        return Ok(());
    };
    let pages = published_pages(config)?;
    write_file(&dest.join(FILE), into_xml(base, &pages).as_bytes())?;
    log!("sitemap"; "{FILE}");
    Ok(())
}

fn into_xml(base: &str, pages: &[Value]) -> String {
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    xml.push('\n');

    for page in pages {
        let loc = format!("{base}{}", field(page, "url"));
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape(loc.as_str())));
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn entry(url: &str) -> Value {
        Value::map(Map::from([("url".to_owned(), Value::from(url))]))
    }

    #[test]
    fn test_into_xml() {
        let xml = into_xml("https://example.com", &[entry("/"), entry("/a&b/")]);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(SITEMAP_NS));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/a&amp;b/</loc>"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[test]
    fn test_empty_sitemap() {
        let xml = into_xml("https://example.com", &[]);
        assert!(xml.ends_with("</urlset>\n"));
        assert!(!xml.contains("<url>"));
    }
}
