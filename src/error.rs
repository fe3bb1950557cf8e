//! Errors of the loading and generation layers

use std::path::PathBuf;

use thiserror::Error;

use crate::language::{expression::Trail, parsing::ParseError};

/// Code generation result type
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Failures while reading a language, a rule set or a configuration file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule {index} in {path}: {source}")]
    Rule {
        index: usize,
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Failures while compiling rules
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The rule cannot be turned into code; it is skipped
    #[error("{0}")]
    Unsupported(String),

    #[error("anyway comparison with count at `{count_at}` cannot pair operators at `{first}` and `{second}`")]
    MisalignedAnywayTrails {
        count_at: Trail,
        first: Trail,
        second: Trail,
    },

    #[error("invalid configured rule: {0}")]
    ConfiguredRule(#[from] ParseError),
}

impl CodegenError {
    /// Fatal errors abort the whole generation, the others only drop one rule
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}
