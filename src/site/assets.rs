//! Static asset copying.

use super::{source_files, write_file};
use crate::config::SiteConfig;
use anyhow::{Context, Result};
use std::fs;

/// Copy every non-page file to the same relative path under the destination.
///
/// Dotfiles are copied; `_`-prefixed files and directories are not.
pub fn copy_assets(config: &SiteConfig) -> Result<usize> {
    let mut copied = 0;
    for (rel, source) in source_files(config.root(), config.dest(), true)? {
        if rel.ends_with(".html") || rel.ends_with(".md") {
            continue;
        }
        let bytes =
            fs::read(&source).with_context(|| format!("failed to read `{}`", source.display()))?;
        write_file(&config.dest().join(&rel), &bytes)?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_copy_assets() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        touch(src.path(), "css/site.css", "body{}");
        touch(src.path(), ".htaccess", "deny");
        touch(src.path(), "index.html", "page");
        touch(src.path(), "post.md", "page");
        touch(src.path(), "_site.yml", "");
        touch(src.path(), "_partials/nav.css", "x");
        touch(src.path(), "img/_draft.png", "x");

        let config = SiteConfig::load(src.path(), "test", Some(out.path())).unwrap();
        assert_eq!(copy_assets(&config).unwrap(), 2);
        assert_eq!(fs::read_to_string(out.path().join("css/site.css")).unwrap(), "body{}");
        assert!(out.path().join(".htaccess").is_file());
        assert!(!out.path().join("index.html").exists());
        assert!(!out.path().join("_site.yml").exists());
        assert!(!out.path().join("_partials").exists());
        assert!(!out.path().join("img/_draft.png").exists());
    }

    #[test]
    fn test_nested_dest_is_not_copied_into_itself() {
        let src = TempDir::new().unwrap();
        touch(src.path(), "a.txt", "a");
        touch(src.path(), "build/stale.txt", "old");

        let dest = src.path().join("build");
        let config = SiteConfig::load(src.path(), "test", Some(&dest)).unwrap();
        assert_eq!(copy_assets(&config).unwrap(), 1);
        assert!(dest.join("a.txt").is_file());
        assert!(!dest.join("build").exists());
    }
}
