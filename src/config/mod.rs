//! Site configuration management for `_site.yml`.
//!
//! # Keys
//!
//! | Key                | Purpose                                          |
//! |--------------------|--------------------------------------------------|
//! | `dest`             | Output directory (default `build`)               |
//! | `url`              | Absolute base URL, enables feed and sitemap      |
//! | `site_name`        | Feed channel title                               |
//! | `description`      | Feed channel description                         |
//! | `clean_urls`       | `about.html` → `about/index.html` (default on)   |
//! | `strict_variables` | Undefined template variables are errors          |
//! | `collections`      | Named, sorted page subsets                       |
//! | `markdown`         | Convert `.md` bodies to HTML                     |
//! | `environments`     | Per-environment overrides, merged then removed   |
//!
//! Every other key is a free-form site variable, visible as `site.<key>`.
//!
//! # Example
//!
//! ```yaml
//! site_name: My Blog
//! url: http://localhost:4000
//! collections:
//!   posts:
//!     sort_by: date
//!     order: desc
//! environments:
//!   production:
//!     url: https://example.com
//! ```

mod collection;
pub mod defaults;
mod error;

pub use collection::{CollectionConfig, SortOrder};
pub use error::ConfigError;

use crate::{
    context::DataStore,
    value::{Map, Value},
};
use educe::Educe;
use serde::{Deserialize, Deserializer, de};
use serde_yaml::{Mapping, Value as Yaml};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Config file name under the source root.
pub const CONFIG_FILE: &str = "_site.yml";

/// Data directory name under the source root.
pub const DATA_DIR: &str = "_data";

/// Environment variable consulted when no environment is given explicitly.
pub const ENV_VAR: &str = "SHEAF_ENV";

/// Pick the active environment: explicit choice, then `SHEAF_ENV`, then
/// `development`.
pub fn active_env(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_owned)
        .or_else(|| std::env::var(ENV_VAR).ok().filter(|env| !env.is_empty()))
        .unwrap_or_else(|| defaults::ENV.to_owned())
}

// ============================================================================
// Typed Settings
// ============================================================================

/// Typed view of the recognized keys, read after the environment merge.
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
pub struct Settings {
    #[serde(default, deserialize_with = "scalar_text")]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "scalar_text")]
    pub site_name: Option<String>,

    #[serde(default, deserialize_with = "scalar_text")]
    pub description: Option<String>,

    /// Rewrite `name.html` to `name/index.html`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub clean_urls: bool,

    #[serde(default)]
    pub strict_variables: bool,

    /// A collection declared without options (`posts:`) is `None`.
    #[serde(default)]
    pub collections: BTreeMap<String, Option<CollectionConfig>>,

    #[serde(default)]
    pub markdown: bool,
}

/// Read any scalar as text, so `site_name: 2024` is the string `"2024"`.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Yaml>::deserialize(deserializer)? {
        None | Some(Yaml::Null) => None,
        Some(Yaml::String(text)) => Some(text),
        Some(Yaml::Number(number)) => Some(number.to_string()),
        Some(Yaml::Bool(flag)) => Some(flag.to_string()),
        Some(_) => return Err(de::Error::custom("expected a string, number or boolean")),
    })
}

// ============================================================================
// Site Configuration
// ============================================================================

/// Loaded, environment-merged configuration for one build.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    root: PathBuf,
    dest: PathBuf,
    env: String,
    settings: Settings,
    vars: Arc<Map>,
    data: Arc<DataStore>,
}

impl SiteConfig {
    /// Load `_site.yml` under `root`. A missing file is an empty config.
    pub fn load(root: &Path, env: &str, dest_override: Option<&Path>) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let content = if path.is_file() {
            fs::read_to_string(&path).map_err(|err| ConfigError::Io(path.clone(), err))?
        } else {
            String::new()
        };
        Self::from_str(&content, &path, root, env, dest_override)
    }

    /// Build from config text. `path` only labels errors.
    pub fn from_str(
        content: &str,
        path: &Path,
        root: &Path,
        env: &str,
        dest_override: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let yaml_error = |err| ConfigError::Yaml(path.to_path_buf(), err);

        let mut mapping = match serde_yaml::from_str::<Yaml>(content).map_err(yaml_error)? {
            Yaml::Null => Mapping::new(),
            Yaml::Mapping(mapping) => mapping,
            _ => {
                return Err(ConfigError::Validation(format!(
                    "`{}` must be a mapping",
                    path.display()
                )));
            }
        };

        merge_environment(&mut mapping, env)?;

        let dest = match (dest_override, mapping.remove("dest")) {
            (Some(dest), _) => dest.to_path_buf(),
            (None, Some(Yaml::String(dest))) => PathBuf::from(dest),
            (None, Some(Yaml::Null) | None) => PathBuf::from(defaults::DEST),
            (None, Some(_)) => {
                return Err(ConfigError::Validation("`dest` must be a string".into()));
            }
        };
        let dest = absolute(&dest).map_err(|err| ConfigError::Io(dest.clone(), err))?;

        let settings: Settings =
            serde_yaml::from_value(Yaml::Mapping(mapping.clone())).map_err(yaml_error)?;

        let mut vars = match Value::from(Yaml::Mapping(mapping)) {
            Value::Map(map) => Arc::unwrap_or_clone(map),
            _ => Map::new(),
        };
        vars.insert("env".into(), env.into());
        vars.insert("dest".into(), dest.to_string_lossy().into_owned().into());

        let data = DataStore::new(root.join(DATA_DIR), settings.strict_variables);

        Ok(Self {
            root: root.to_path_buf(),
            dest,
            env: env.to_owned(),
            settings,
            vars: Arc::new(vars),
            data: Arc::new(data),
        })
    }

    /// Source root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute output directory.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Site variables exposed to templates as `site`.
    pub fn vars(&self) -> &Arc<Map> {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// External data scope (`data`), shared by every page of the build.
    pub fn data(&self) -> &Arc<DataStore> {
        &self.data
    }

    pub const fn is_strict(&self) -> bool {
        self.settings.strict_variables
    }

    /// Base URL without trailing slash, if configured and non-empty.
    pub fn base_url(&self) -> Option<&str> {
        self.settings
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// Declared collections with their options, defaults filled in.
    pub fn collections(&self) -> impl Iterator<Item = (&str, CollectionConfig)> {
        self.settings
            .collections
            .iter()
            .map(|(name, config)| (name.as_str(), config.clone().unwrap_or_default()))
    }
}

/// Remove `environments` and merge the block for `env` over the top level.
fn merge_environment(mapping: &mut Mapping, env: &str) -> Result<(), ConfigError> {
    let environments = match mapping.remove("environments") {
        None | Some(Yaml::Null) => return Ok(()),
        Some(Yaml::Mapping(environments)) => environments,
        Some(_) => {
            return Err(ConfigError::Validation("`environments` must be a mapping".into()));
        }
    };
    match environments.get(env) {
        None | Some(Yaml::Null) => Ok(()),
        Some(Yaml::Mapping(overrides)) => {
            for (key, value) in overrides {
                mapping.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        Some(_) => Err(ConfigError::Validation(format!(
            "`environments.{env}` must be a mapping"
        ))),
    }
}

pub(crate) fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Tests
// ============================================================================
