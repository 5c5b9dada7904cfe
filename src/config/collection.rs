//! `collections:` entries in `_site.yml`.

use serde::Deserialize;

/// Sort direction of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One named collection.
///
/// # Example
/// ```yaml
/// collections:
///   posts:
///     sort_by: date
///     order: desc
///   notes:
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Metadata field compared (by string form) when sorting.
    /// Unsorted collections keep discovery order.
    #[serde(default)]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CollectionConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, CollectionConfig::default());
        assert_eq!(config.order, SortOrder::Asc);
    }

    #[test]
    fn test_full() {
        let config: CollectionConfig = serde_yaml::from_str("sort_by: date\norder: desc").unwrap();
        assert_eq!(config.sort_by.as_deref(), Some("date"));
        assert_eq!(config.order, SortOrder::Desc);
    }

    #[test]
    fn test_unknown_order_rejected() {
        assert!(serde_yaml::from_str::<CollectionConfig>("order: sideways").is_err());
    }
}
