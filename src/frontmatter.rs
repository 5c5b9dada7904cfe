//! Front matter splitting.
//!
//! A document may start with a `---` line, a YAML mapping and a second `---`
//! line. Everything after the closing delimiter is the body.

use crate::value::{Map, Value};
use thiserror::Error;

const DELIMITER: &str = "---\n";

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("malformed front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Split raw text into `(metadata, body)`.
///
/// Text without a leading delimiter is returned unchanged with empty metadata.
/// A missing closing delimiter makes the whole remainder metadata.
pub fn split(raw: &str) -> Result<(Map, &str), FrontMatterError> {
    let Some(rest) = raw.strip_prefix(DELIMITER) else {
        return Ok((Map::new(), raw));
    };

    let (block, body) = match closing_delimiter(rest) {
        Some((end, body_start)) => (&rest[..end], &rest[body_start..]),
        None => (rest, ""),
    };

    Ok((parse_block(block)?, body))
}

/// Byte range of the first `---` line in `rest`, which may end in `\r\n`
/// or at the end of input.
fn closing_delimiter(rest: &str) -> Option<(usize, usize)> {
    let mut start = 0;
    for line in rest.split_inclusive('\n') {
        let end = start + line.len();
        if line.trim_end_matches(['\n', '\r']) == "---" {
            return Some((start, end));
        }
        start = end;
    }
    None
}

fn parse_block(block: &str) -> Result<Map, FrontMatterError> {
    if block.trim().is_empty() {
        return Ok(Map::new());
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(block)?;
    match Value::from(yaml) {
        Value::Null => Ok(Map::new()),
        Value::Map(map) => Ok(std::sync::Arc::unwrap_or_clone(map)),
        other => Err(FrontMatterError::NotAMapping(other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delimiter_returns_raw() {
        let raw = "Hello\n---\nworld";
        let (meta, body) = split(raw).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_splits_metadata_and_body() {
        let (meta, body) = split("---\ntitle: Hi\nlayout: false\n---\nHello").unwrap();
        assert_eq!(meta["title"], Value::from("Hi"));
        assert_eq!(meta["layout"], Value::Bool(false));
        assert_eq!(body, "Hello");
    }

    #[test]
    fn test_body_keeps_later_delimiters() {
        let (_, body) = split("---\na: 1\n---\none\n---\ntwo").unwrap();
        assert_eq!(body, "one\n---\ntwo");
    }

    #[test]
    fn test_closing_delimiter_at_end_of_input() {
        let (meta, body) = split("---\ntitle: Hi\n---").unwrap();
        assert_eq!(meta["title"], Value::from("Hi"));
        assert_eq!(body, "");
    }

    #[test]
    fn test_crlf_closing_delimiter() {
        let (meta, body) = split("---\ntitle: Hi\r\n---\r\nHello").unwrap();
        assert_eq!(meta["title"], Value::from("Hi"));
        assert_eq!(body, "Hello");
    }

    #[test]
    fn test_empty_block() {
        let (meta, body) = split("---\n---\nbody").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_unterminated_block_is_all_metadata() {
        let (meta, body) = split("---\ntitle: Hi\n").unwrap();
        assert_eq!(meta["title"], Value::from("Hi"));
        assert_eq!(body, "");
    }

    #[test]
    fn test_malformed_yaml_fails() {
        assert!(matches!(
            split("---\ntitle: [unclosed\n---\nbody"),
            Err(FrontMatterError::Yaml(_))
        ));
    }

    #[test]
    fn test_scalar_block_fails() {
        assert!(matches!(
            split("---\njust text\n---\nbody"),
            Err(FrontMatterError::NotAMapping("string"))
        ));
    }
}
