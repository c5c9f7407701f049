use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Marker that, when present in a rule's trailing comment, flags the rule's
/// ownership as optional.
pub const OPTIONAL_MARKER: &str = "!required";

/// A single CODEOWNERS rule: a pattern and the owners it assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 1-based line of the rule in the source file.
    pub line_number: usize,
    pub pattern: String,
    /// Owners in declaration order. Never empty for a parsed rule.
    pub owners: Vec<String>,
    /// False when the rule's comment contains [`OPTIONAL_MARKER`]. Matching
    /// ignores this flag.
    pub required: bool,
}

impl Rule {
    pub fn new(line_number: usize, pattern: impl Into<String>, owners: Vec<String>) -> Rule {
        Rule {
            line_number,
            pattern: pattern.into(),
            owners,
            required: true,
        }
    }
}

/// Parse the contents of a CODEOWNERS file into rules, in declaration order.
///
/// Parsing never fails. Blank lines, comment-only lines and lines with a
/// pattern but no owners produce no rule.
pub fn parse(source: &str) -> Vec<Rule> {
    source
        .split('\n')
        .enumerate()
        .filter_map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

/// Read and parse a CODEOWNERS file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&source))
}

fn parse_line(line_number: usize, line: &str) -> Option<Rule> {
    let (declaration, comment) = match line.split_once('#') {
        Some((declaration, comment)) => (declaration.trim(), Some(comment.trim())),
        None => (line.trim(), None),
    };
    if declaration.is_empty() {
        return None;
    }

    let mut tokens = declaration.split_whitespace();
    let pattern = tokens.next()?;
    let owners = tokens.map(str::to_owned).collect::<Vec<_>>();
    if owners.is_empty() {
        debug!(line_number, pattern, "skipping rule without owners");
        return None;
    }

    Some(Rule {
        line_number,
        pattern: pattern.to_owned(),
        owners,
        required: !comment.map_or(false, |c| c.contains(OPTIONAL_MARKER)),
    })
}
