use crate::error::PatternError;

use super::{nfa::Nfa, Builder};

/// A single compiled CODEOWNERS pattern.
///
/// Use this when testing one pattern against many paths. To find which of
/// many patterns match a path use a [`super::Matcher`] instead, which walks
/// a single automaton shared by every pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    nfa: Nfa,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Pattern, PatternError> {
        let mut builder = Builder::new();
        builder.add(pattern)?;
        Ok(Pattern {
            source: pattern.to_owned(),
            nfa: builder.into_nfa(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut states = self.nfa.initial_states();
        for segment in path.split('/') {
            states = self.nfa.step(&states, segment);
            if states.is_empty() {
                return false;
            }
        }
        !self.nfa.accepted_patterns(&states).is_empty()
    }
}

/// Check a single pattern against a single path. A pattern that fails to
/// compile matches nothing.
pub fn matches(pattern: &str, path: &str) -> bool {
    Pattern::compile(pattern)
        .map(|pattern| pattern.matches(path))
        .unwrap_or(false)
}
