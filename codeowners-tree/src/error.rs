use std::{io, path::PathBuf};

/// Errors surfaced by the library. Malformed rule lines and unmatched files
/// are not errors; see [`crate::parser`] and [`crate::RuleSet`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The CODEOWNERS file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A background tree build terminated without producing a tree.
    #[error("tree build for session {session_id} failed: {reason}")]
    BuildFailed { session_id: String, reason: String },
}

/// Reasons a CODEOWNERS pattern can't be compiled into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    /// Negation isn't part of the CODEOWNERS pattern syntax.
    #[error("negated patterns are not supported: {0}")]
    Negation(String),

    #[error("unclosed character class in {0}")]
    UnclosedClass(String),

    #[error("invalid pattern {pattern}: {message}")]
    Regex { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
