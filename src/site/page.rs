//! Source pages: discovery, metadata and output paths.

use super::source_files;
use crate::{
    config::SiteConfig,
    frontmatter, layout,
    value::{Map, Value},
};
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{
    fs,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

/// Marker separating a hand-written excerpt from the rest of the body.
const MORE: &str = "<!-- more -->";

/// Three-digit error pages (`404.html`) keep their flat output path.
static ERROR_PAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{3}$").unwrap());

/// A parsed source page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Source path relative to the root, `.md` rewritten to `.html`.
    pub rel: String,
    pub source: PathBuf,
    /// Front matter plus `format` and `excerpt`.
    pub meta: Map,
    /// Body after the front matter, not yet rendered.
    pub body: String,
    /// Output path relative to the destination.
    pub output: String,
    pub url: String,
}

impl Page {
    /// Read and split `source`. `rel` is its root-relative path as found.
    pub fn parse(rel: &str, source: &Path, clean_urls: bool) -> Result<Self> {
        let raw = fs::read_to_string(source)
            .with_context(|| format!("failed to read `{}`", source.display()))?;
        let (mut meta, body) =
            frontmatter::split(&raw).with_context(|| format!("malformed page `{rel}`"))?;

        let format = Path::new(rel)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel = match rel.strip_suffix(".md") {
            Some(stem) => format!("{stem}.html"),
            None => rel.to_owned(),
        };

        if !meta.get("excerpt").is_some_and(Value::is_truthy) {
            meta.insert("excerpt".into(), excerpt(body).into());
        }
        meta.insert("format".into(), format.into());

        let output = output_path(&rel, &meta, clean_urls);
        if !is_contained(&output) {
            bail!("permalink of `{rel}` leaves the output directory: `{output}`");
        }
        let url = url_for(&output);

        Ok(Self {
            rel,
            source: source.to_path_buf(),
            meta,
            body: body.to_owned(),
            output,
            url,
        })
    }

    pub fn is_draft(&self) -> bool {
        self.meta.get("draft").is_some_and(Value::is_truthy)
    }

    pub fn is_standalone(&self) -> bool {
        layout::is_standalone(&self.meta)
    }

    /// Entry in `data.pages` and collections: metadata plus `rel` and `url`.
    pub fn entry(&self) -> Value {
        let mut entry = self.meta.clone();
        entry.insert("rel".into(), self.rel.as_str().into());
        entry.insert("url".into(), self.url.as_str().into());
        Value::map(entry)
    }

    /// The `page` scope: metadata plus `url` and the social-card fallbacks.
    pub fn scope(&self) -> Map {
        let mut page = self.meta.clone();
        page.insert("url".into(), self.url.as_str().into());
        let og_title = fallback(&self.meta, "og_title", "title");
        let og_description = fallback(&self.meta, "og_description", "description");
        page.insert("og_title".into(), og_title);
        page.insert("og_description".into(), og_description);
        page
    }
}

fn fallback(meta: &Map, key: &str, default: &str) -> Value {
    meta.get(key)
        .filter(|value| value.is_truthy())
        .or_else(|| meta.get(default))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Parse every page under the source root in path order.
///
/// Drafts are left out unless `include_drafts` is set.
pub fn discover(config: &SiteConfig, include_drafts: bool) -> Result<Vec<Page>> {
    let clean_urls = config.settings().clean_urls;
    let mut pages = Vec::new();
    for (rel, source) in source_files(config.root(), config.dest(), false)? {
        if !(rel.ends_with(".html") || rel.ends_with(".md")) {
            continue;
        }
        let page = Page::parse(&rel, &source, clean_urls)?;
        if page.is_draft() && !include_drafts {
            continue;
        }
        pages.push(page);
    }
    Ok(pages)
}

/// Output path of a page relative to the destination.
///
/// A `permalink` wins; otherwise clean URLs turn `about.html` into
/// `about/index.html`, leaving index and error pages alone.
pub fn output_path(rel: &str, meta: &Map, clean_urls: bool) -> String {
    if let Some(permalink) = meta.get("permalink").filter(|value| value.is_truthy()) {
        let permalink = permalink.to_string();
        let permalink = permalink.strip_prefix('/').unwrap_or(&permalink);
        return if permalink.is_empty() || permalink.ends_with('/') {
            format!("{permalink}index.html")
        } else {
            permalink.to_owned()
        };
    }

    if !clean_urls {
        return rel.to_owned();
    }
    let name = rel.rsplit('/').next().unwrap_or(rel);
    let stem = name.strip_suffix(".html").unwrap_or(name);
    if name == "index.html" || ERROR_PAGE.is_match(stem) {
        return rel.to_owned();
    }
    match rel.strip_suffix(".html") {
        Some(stem) => format!("{stem}/index.html"),
        None => rel.to_owned(),
    }
}

/// Relative path made only of normal segments (no `..`, no root).
fn is_contained(output: &str) -> bool {
    Path::new(output)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Public URL of an output path.
pub fn url_for(output: &str) -> String {
    let url = format!("/{output}");
    match url.strip_suffix("index.html") {
        Some(dir) => dir.to_owned(),
        None => url,
    }
}

/// Text before `<!-- more -->`, else the first paragraph.
pub fn excerpt(body: &str) -> String {
    match body.split_once(MORE) {
        Some((head, _)) => head.trim().to_owned(),
        None => body.trim().split("\n\n").next().unwrap_or_default().trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, Value)]) -> Map {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn test_output_path_clean_urls() {
        let none = Map::new();
        assert_eq!(output_path("about.html", &none, true), "about/index.html");
        assert_eq!(output_path("blog/post.html", &none, true), "blog/post/index.html");
        assert_eq!(output_path("index.html", &none, true), "index.html");
        assert_eq!(output_path("blog/index.html", &none, true), "blog/index.html");
        assert_eq!(output_path("404.html", &none, true), "404.html");
        assert_eq!(output_path("1234.html", &none, true), "1234/index.html");
        assert_eq!(output_path("٤٠٤.html", &none, true), "٤٠٤/index.html");
        assert_eq!(output_path("about.html", &none, false), "about.html");
    }

    #[test]
    fn test_output_path_permalink() {
        let m = meta(&[("permalink", "/feed/".into())]);
        assert_eq!(output_path("x.html", &m, true), "feed/index.html");
        let m = meta(&[("permalink", "/raw.txt".into())]);
        assert_eq!(output_path("x.html", &m, true), "raw.txt");
        let m = meta(&[("permalink", "/".into())]);
        assert_eq!(output_path("x.html", &m, false), "index.html");
        let m = meta(&[("permalink", Value::Null)]);
        assert_eq!(output_path("x.html", &m, true), "x/index.html");
    }

    #[test]
    fn test_permalink_outside_dest_rejected() {
        let dir = TempDir::new().unwrap();
        for permalink in ["/../escape.html", "//etc/passwd", "a/../../b/"] {
            let source = dir.path().join("x.html");
            fs::write(&source, format!("---\npermalink: \"{permalink}\"\n---\n")).unwrap();
            let err = Page::parse("x.html", &source, true).unwrap_err();
            assert!(err.to_string().contains("leaves the output directory"), "{permalink}");
        }
        assert!(is_contained("feed/index.html"));
        assert!(is_contained("./a.html"));
    }

    #[test]
    fn test_url_for() {
        assert_eq!(url_for("index.html"), "/");
        assert_eq!(url_for("about/index.html"), "/about/");
        assert_eq!(url_for("404.html"), "/404.html");
        assert_eq!(url_for("raw.txt"), "/raw.txt");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("\nFirst para.\n\nSecond."), "First para.");
        assert_eq!(excerpt("Intro\n\nmore intro\n<!-- more -->\nrest"), "Intro\n\nmore intro");
        assert_eq!(excerpt("   "), "");
    }

    #[test]
    fn test_parse_markdown_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("post.md");
        fs::write(&path, "---\ntitle: Hi\n---\nHello\n\nWorld").unwrap();

        let page = Page::parse("blog/post.md", &path, true).unwrap();
        assert_eq!(page.rel, "blog/post.html");
        assert_eq!(page.output, "blog/post/index.html");
        assert_eq!(page.url, "/blog/post/");
        assert_eq!(page.meta["format"], Value::from("md"));
        assert_eq!(page.meta["excerpt"], Value::from("Hello"));
        assert_eq!(page.body, "Hello\n\nWorld");
    }

    #[test]
    fn test_explicit_excerpt_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.html");
        fs::write(&path, "---\nexcerpt: Custom\n---\nBody").unwrap();
        let page = Page::parse("a.html", &path, true).unwrap();
        assert_eq!(page.meta["excerpt"], Value::from("Custom"));
    }

    #[test]
    fn test_scope_fallbacks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.html");
        fs::write(&path, "---\ntitle: T\ndescription: D\nog_title: OG\n---\n").unwrap();
        let page = Page::parse("a.html", &path, true).unwrap();
        let scope = page.scope();
        assert_eq!(scope["og_title"], Value::from("OG"));
        assert_eq!(scope["og_description"], Value::from("D"));
        assert_eq!(scope["url"], Value::from("/a/"));

        let entry = page.entry();
        let entry = entry.as_map().unwrap();
        assert_eq!(entry["rel"], Value::from("a.html"));
        assert_eq!(entry["url"], Value::from("/a/"));
    }

    #[test]
    fn test_malformed_front_matter_names_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.html");
        fs::write(&path, "---\ntitle: [\n---\n").unwrap();
        let err = Page::parse("bad.html", &path, true).unwrap_err();
        assert_eq!(err.to_string(), "malformed page `bad.html`");
    }

    #[test]
    fn test_draft_and_standalone_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.html");
        fs::write(&path, "---\ndraft: true\nlayout: false\n---\n").unwrap();
        let page = Page::parse("d.html", &path, true).unwrap();
        assert!(page.is_draft());
        assert!(page.is_standalone());
    }
}
