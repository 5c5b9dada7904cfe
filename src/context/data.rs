//! External data scope backed by `_data/`.
//!
//! `data.nav` reads `_data/nav.yml` (or `.yaml`, or `.json`, first match
//! wins). A dotted key maps to nested directories: `data["i18n.en"]` reads
//! `_data/i18n/en.yml`. Each entry is parsed on first access and cached for
//! the rest of the build.

use super::{ResolveError, resolve};
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Candidate extensions in precedence order.
const EXTENSIONS: [&str; 3] = ["yml", "yaml", "json"];

#[derive(Debug)]
pub struct DataStore {
    dir: PathBuf,
    strict: bool,
    cache: Mutex<FxHashMap<String, Value>>,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            dir: dir.into(),
            strict,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Assign an entry. Assigned entries shadow files of the same name.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.cache.lock().insert(key.into(), value);
    }

    /// Find `key`, reading and caching its file on first access.
    ///
    /// A missing file is `Ok(None)`; a file that fails to parse is an error.
    pub fn lookup(&self, key: &str) -> Result<Option<Value>, ResolveError> {
        if let Some(value) = self.cache.lock().get(key) {
            return Ok(Some(value.clone()));
        }
        let Some(path) = self.find_file(key) else {
            return Ok(None);
        };
        let value = parse_file(&path)?;
        self.cache.lock().insert(key.to_owned(), value.clone());
        Ok(Some(value))
    }

    pub fn get(&self, key: &str) -> Result<Value, ResolveError> {
        resolve(self.lookup(key)?, key, self.strict)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.lock().contains_key(key) || self.find_file(key).is_some()
    }

    /// Whether `key` names a directory of data files, i.e. a prefix of
    /// longer dotted keys.
    pub fn is_namespace(&self, key: &str) -> bool {
        key_to_path(&self.dir, key).is_some_and(|base| base.is_dir())
    }

    /// True when there is no data directory or it holds no data files.
    pub fn is_empty(&self) -> bool {
        if !self.dir.is_dir() {
            return true;
        }
        !WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| entry.file_type().is_file() && has_data_extension(entry.path()))
    }

    fn find_file(&self, key: &str) -> Option<PathBuf> {
        let base = key_to_path(&self.dir, key)?;
        EXTENSIONS
            .iter()
            .map(|ext| base.with_file_name(format!("{}.{ext}", last_segment(&base))))
            .find(|path| path.is_file())
    }
}

/// Map `a.b.c` to `<dir>/a/b/c`. Keys with empty or path-like segments do
/// not resolve.
fn key_to_path(dir: &Path, key: &str) -> Option<PathBuf> {
    let mut path = dir.to_path_buf();
    for segment in key.split('.') {
        if segment.is_empty() || segment.contains(['/', '\\']) {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

fn last_segment(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

fn parse_file(path: &Path) -> Result<Value, ResolveError> {
    let content =
        fs::read_to_string(path).map_err(|err| ResolveError::Io(path.to_path_buf(), err))?;
    let malformed = |err: String| ResolveError::Malformed(path.to_path_buf(), err);

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<serde_json::Value>(&content)
            .map(Value::from)
            .map_err(|e| malformed(e.to_string()))
    } else {
        serde_yaml::from_str::<serde_yaml::Value>(&content)
            .map(Value::from)
            .map_err(|e| malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(strict: bool) -> (TempDir, DataStore) {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("_data");
        fs::create_dir_all(&data).unwrap();
        let store = DataStore::new(&data, strict);
        (dir, store)
    }

    fn write(store: &DataStore, name: &str, content: &str) {
        let path = store.dir().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn first_field(value: &Value, field: &str) -> Value {
        value.as_seq().unwrap()[0].as_map().unwrap()[field].clone()
    }

    #[test]
    fn test_loads_yml() {
        let (_dir, store) = store(false);
        write(&store, "nav.yml", "- label: Home\n  url: /");
        let nav = store.get("nav").unwrap();
        assert_eq!(first_field(&nav, "label"), Value::from("Home"));
        assert_eq!(first_field(&nav, "url"), Value::from("/"));
    }

    #[test]
    fn test_loads_yaml_and_json() {
        let (_dir, store) = store(false);
        write(&store, "nav.yaml", "- label: Home");
        write(&store, "social.json", r#"{"github": "someone"}"#);
        assert_eq!(first_field(&store.get("nav").unwrap(), "label"), Value::from("Home"));
        let social = store.get("social").unwrap();
        assert_eq!(social.as_map().unwrap()["github"], Value::from("someone"));
    }

    #[test]
    fn test_extension_precedence() {
        let (_dir, store) = store(false);
        write(&store, "site.json", r#"{"from": "json"}"#);
        write(&store, "site.yml", "from: yml");
        let site = store.get("site").unwrap();
        assert_eq!(site.as_map().unwrap()["from"], Value::from("yml"));
    }

    #[test]
    fn test_dotted_key_maps_to_directory() {
        let (_dir, store) = store(false);
        write(&store, "i18n/en.yml", "hello: Hi");
        let en = store.get("i18n.en").unwrap();
        assert_eq!(en.as_map().unwrap()["hello"], Value::from("Hi"));
        assert!(store.is_namespace("i18n"));
        assert!(!store.contains("i18n"));
    }

    #[test]
    fn test_missing_key_lenient_and_strict() {
        let (_dir, lenient) = store(false);
        assert!(lenient.get("nope").unwrap().is_null());

        let (_dir, strict) = store(true);
        assert!(matches!(strict.get("nope"), Err(ResolveError::Undefined(k)) if k == "nope"));
    }

    #[test]
    fn test_missing_dir_is_empty_and_resolves_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::new(dir.path().join("nonexistent"), false);
        assert!(store.is_empty());
        assert!(store.lookup("anything").unwrap().is_none());
    }

    #[test]
    fn test_empty_without_data_files() {
        let (_dir, store) = store(false);
        assert!(store.is_empty());
        write(&store, "notes.txt", "not data");
        assert!(store.is_empty());
        write(&store, "nav.yml", "- Home");
        assert!(!store.is_empty());
    }

    #[test]
    fn test_cached_after_first_access() {
        let (_dir, store) = store(false);
        write(&store, "nav.yml", "- Home");
        let first = store.get("nav").unwrap();
        write(&store, "nav.yml", "- Changed");
        assert_eq!(store.get("nav").unwrap(), first);
    }

    #[test]
    fn test_contains() {
        let (_dir, store) = store(false);
        write(&store, "nav.yml", "- Home");
        assert!(store.contains("nav"));
        assert!(!store.contains("nope"));
    }

    #[test]
    fn test_inserted_entries_shadow_files() {
        let (_dir, store) = store(false);
        write(&store, "pages.yml", "- from file");
        store.insert("pages", Value::seq(vec!["assigned".into()]));
        assert_eq!(store.get("pages").unwrap(), Value::seq(vec!["assigned".into()]));
    }

    #[test]
    fn test_dates_stay_strings() {
        let (_dir, store) = store(false);
        write(&store, "events.yml", "- name: Launch\n  date: 2024-01-01");
        let events = store.get("events").unwrap();
        assert_eq!(first_field(&events, "date"), Value::from("2024-01-01"));
    }

    #[test]
    fn test_malformed_file_fails() {
        let (_dir, store) = store(false);
        write(&store, "bad.json", "{not json");
        assert!(matches!(store.lookup("bad"), Err(ResolveError::Malformed(..))));
    }

    #[test]
    fn test_path_like_keys_do_not_resolve() {
        let (_dir, store) = store(false);
        assert!(store.lookup("../secret").unwrap().is_none());
        assert!(store.lookup("a..b").unwrap().is_none());
    }
}
