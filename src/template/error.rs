//! Template error types.

use crate::{context::ResolveError, frontmatter::FrontMatterError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed directive markup: unterminated tags or blocks, bad
    /// expressions, stray `else`/`end`.
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("undefined function `{0}`")]
    UnknownFunction(String),

    #[error("undefined method `{method}` for {type_name}")]
    UnknownMethod {
        method: String,
        type_name: &'static str,
    },

    #[error("wrong arguments for `{name}`: {message}")]
    Arguments { name: String, message: String },

    #[error("cannot iterate over {0}")]
    NotIterable(&'static str),

    #[error("cannot index {0}")]
    NotIndexable(&'static str),

    #[error("helper `{name}` failed")]
    Helper {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("partial `{0}` is outside the source root")]
    PartialPath(String),

    #[error("IO error when reading partial `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("partial `{0}`")]
    FrontMatter(PathBuf, #[source] FrontMatterError),

    #[error("in partial `{name}`")]
    Partial {
        name: String,
        #[source]
        source: Box<TemplateError>,
    },
}

impl TemplateError {
    pub(super) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(super) fn arguments(name: &str, message: impl Into<String>) -> Self {
        Self::Arguments {
            name: name.to_owned(),
            message: message.into(),
        }
    }

    /// Whether this failure (or the one it wraps) is an undefined variable.
    pub fn is_undefined_variable(&self) -> bool {
        match self {
            Self::Resolve(ResolveError::Undefined(_)) => true,
            Self::Partial { source, .. } => source.is_undefined_variable(),
            _ => false,
        }
    }
}
