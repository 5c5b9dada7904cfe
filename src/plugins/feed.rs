//! RSS feed generation.
//!
//! Dated pages from `data.pages`, newest first, up to [`LIMIT`] items.

use super::{field, published_pages};
use crate::{
    config::SiteConfig,
    hooks::{Hook, HookRegistrar, Plugin},
    log,
    site::write_file,
    value::Value,
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use std::path::Path;

pub const FILE: &str = "feed.xml";

/// Maximum number of items in the feed.
pub const LIMIT: usize = 20;

/// Writes `feed.xml` when the site has a `url`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Feed;

impl Plugin for Feed {
    fn name(&self) -> &str {
        "feed"
    }

    fn register(&self, hooks: &mut HookRegistrar<'_>) {
        hooks.hook(Hook::after_build(write_feed));
    }
}

fn write_feed(config: &SiteConfig, dest: &Path) -> Result<()> {
    let Some(base) = config.base_url() else {
        return Ok(());
    };
    let pages = published_pages(config)?;
    let xml = into_xml(config, base, &pages);
    write_file(&dest.join(FILE), xml.as_bytes())?;
    log!("feed"; "{FILE}");
    Ok(())
}

fn into_xml(config: &SiteConfig, base: &str, pages: &[Value]) -> String {
    let settings = config.settings();
    let items = recent(pages).iter().map(|page| to_item(base, page)).collect::<Vec<_>>();

    let channel = ChannelBuilder::default()
        .title(settings.site_name.clone().unwrap_or_default())
        .link(base.to_owned())
        .description(settings.description.clone().unwrap_or_default())
        .items(items)
        .build();

    channel.to_string()
}

/// Dated pages, newest first by the date's string form. Ties keep page order.
fn recent(pages: &[Value]) -> Vec<&Value> {
    let mut dated: Vec<&Value> = pages
        .iter()
        .filter(|page| {
            page.as_map()
                .and_then(|map| map.get("date"))
                .is_some_and(Value::is_truthy)
        })
        .collect();
    dated.sort_by_cached_key(|page| std::cmp::Reverse(field(page, "date")));
    dated.truncate(LIMIT);
    dated
}

fn to_item(base: &str, page: &Value) -> rss::Item {
    let link = format!("{base}{}", field(page, "url"));
    ItemBuilder::default()
        .title(Some(field(page, "title")))
        .link(Some(link.clone()))
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .pub_date(Some(pub_date(&field(page, "date"))))
        .build()
}

/// RFC 2822 form of a front-matter date, or the raw text when unparseable.
fn pub_date(raw: &str) -> String {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return date.to_rfc2822();
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return date.and_utc().to_rfc2822();
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return midnight.and_utc().to_rfc2822();
    }
    raw.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn entry(title: &str, date: Option<&str>) -> Value {
        let mut map = Map::from([
            ("title".to_owned(), Value::from(title)),
            ("url".to_owned(), Value::from(format!("/{title}/"))),
        ]);
        if let Some(date) = date {
            map.insert("date".into(), date.into());
        }
        Value::map(map)
    }

    fn config() -> SiteConfig {
        SiteConfig::from_str(
            "url: https://example.com/\nsite_name: Blog\ndescription: Notes",
            Path::new("_site.yml"),
            Path::new("/src"),
            "test",
            Some(Path::new("/out")),
        )
        .unwrap()
    }

    #[test]
    fn test_pub_date() {
        assert_eq!(pub_date("2024-01-15"), "Mon, 15 Jan 2024 00:00:00 +0000");
        assert_eq!(pub_date("2024-01-15 08:30:00"), "Mon, 15 Jan 2024 08:30:00 +0000");
        assert_eq!(pub_date("2024-01-15T08:30:00+02:00"), "Mon, 15 Jan 2024 08:30:00 +0200");
        assert_eq!(pub_date("last tuesday"), "last tuesday");
    }

    #[test]
    fn test_recent_sorts_and_limits() {
        let mut pages = vec![entry("undated", None), entry("old", Some("2023-05-01"))];
        for day in 1..=25 {
            pages.push(entry(&format!("p{day}"), Some(&format!("2024-01-{day:02}"))));
        }
        let recent = recent(&pages);
        assert_eq!(recent.len(), LIMIT);
        assert_eq!(field(recent[0], "title"), "p25");
        assert_eq!(field(recent[LIMIT - 1], "title"), "p6");
    }

    #[test]
    fn test_into_xml() {
        let config = config();
        let pages = [entry("hello", Some("2024-02-01")), entry("about", None)];
        let xml = into_xml(&config, config.base_url().unwrap(), &pages);

        assert!(xml.contains("<rss"));
        assert!(xml.contains("<title>Blog</title>"));
        assert!(xml.contains("<link>https://example.com</link>"));
        assert!(xml.contains("<description>Notes</description>"));
        assert!(xml.contains("<link>https://example.com/hello/</link>"));
        assert!(xml.contains("<pubDate>Thu, 1 Feb 2024 00:00:00 +0000</pubDate>"));
        assert!(!xml.contains("about"));
        assert_eq!(xml.matches("<item>").count(), 1);
    }
}
