use crate::error::PatternError;

use super::{
    nfa::{Nfa, StateId, Transition},
    segment::SegmentMatcher,
    Matcher,
};

/// Builder for a patternset [`Matcher`]. Calling [`Builder::build`] will
/// consume the builder.
#[derive(Clone)]
pub struct Builder {
    nfa: Nfa,
    next_pattern_id: usize,
}

impl Builder {
    /// Create a new `Builder`.
    pub fn new() -> Self {
        Self {
            nfa: Nfa::new(),
            next_pattern_id: 0,
        }
    }

    /// Build the `Matcher` from the patterns added to the builder. This will
    /// consume the builder.
    pub fn build(self) -> Matcher {
        Matcher::new(self.nfa)
    }

    pub(crate) fn into_nfa(self) -> Nfa {
        self.nfa
    }

    /// Number of patterns successfully added so far.
    pub fn len(&self) -> usize {
        self.next_pattern_id
    }

    pub fn is_empty(&self) -> bool {
        self.next_pattern_id == 0
    }

    /// Add a pattern to the builder, returning its id. Ids are assigned
    /// sequentially from zero. A pattern that fails to compile leaves the
    /// builder untouched and doesn't consume an id.
    pub fn add(&mut self, pattern: &str) -> Result<usize, PatternError> {
        if pattern.starts_with('!') {
            return Err(PatternError::Negation(pattern.to_owned()));
        }

        // Remove the leading slash if present. It forces left-anchoring so we
        // need to remember whether it was present or not.
        let (body, leading_slash) = match pattern.strip_prefix('/') {
            Some(body) => (body, true),
            None => (pattern, false),
        };

        // We only ever match files, so a trailing slash means "everything
        // below this directory" and never the path itself.
        let (body, trailing_slash) = match body.strip_suffix('/') {
            Some(body) => (body, true),
            None => (body, false),
        };

        if body.is_empty() {
            return Err(PatternError::Empty);
        }

        // CODEOWNERS files use Unix path separators. Compile every segment
        // before touching the NFA so a bad pattern leaves no dangling states.
        let segments = body
            .split('/')
            .map(|segment| match segment {
                "**" => Ok((segment, None)),
                _ => SegmentMatcher::new(segment, pattern).map(|m| (segment, Some(m))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pattern_id = self.next_pattern_id;
        self.next_pattern_id += 1;

        // All patterns are left-anchored unless they're a single component with
        // no leading slash (but a trailing slash is permitted).
        let mut start_state_id = Nfa::START_STATE;
        if !leading_slash && segments.len() == 1 {
            start_state_id = self.add_epsilon_transition(Nfa::START_STATE);
        }

        let last_is_double_star = matches!(segments.last(), Some(("**", _)));

        let mut end_state_id =
            segments
                .into_iter()
                .fold(start_state_id, |from_id, (segment, matcher)| match matcher {
                    None => self.add_epsilon_transition(from_id),
                    Some(matcher) => self.add_transition(from_id, segment, matcher),
                });

        // A trailing slash or /** matches everything under the directory, but
        // not the directory itself, so we need one more segment.
        if trailing_slash || last_is_double_star {
            end_state_id = self.add_transition(end_state_id, "*", SegmentMatcher::Unconditional);
        }

        // A pattern that matches a directory also matches everything inside
        // it, so every pattern is effectively followed by /**.
        end_state_id = self.add_epsilon_transition(end_state_id);

        self.nfa
            .state_mut(end_state_id)
            .mark_as_terminal(pattern_id);

        Ok(pattern_id)
    }

    // Add a regular (non-epsilon) transition from a given state via the
    // provided path segment.
    fn add_transition(
        &mut self,
        from_id: StateId,
        segment: &str,
        matcher: SegmentMatcher,
    ) -> StateId {
        let existing_transition = self
            .nfa
            .transitions_from(from_id)
            .find(|t| t.path_segment == segment && t.target != from_id);
        if let Some(t) = existing_transition {
            t.target
        } else {
            let state_id = self.nfa.add_state();
            self.nfa.state_mut(from_id).add_transition(Transition::new(
                segment.to_owned(),
                matcher,
                state_id,
            ));
            state_id
        }
    }

    // Add an epsilon transition from a given state to a new state. If an epsilon transition
    // already exists, return the id of that transition.
    fn add_epsilon_transition(&mut self, from_id: StateId) -> StateId {
        // Double star segments match zero or more of anything, so there's never a need to
        // have multiple consecutive double star states.
        let has_self_loop = self
            .nfa
            .transitions_from(from_id)
            .any(|t| t.path_segment == "*" && t.target == from_id);
        if has_self_loop {
            return from_id;
        }

        match self.nfa.state(from_id).epsilon_transition {
            // Multiple epsilon transitions coalesce into one
            Some(to_id) => to_id,
            None => {
                let state_id = self.nfa.add_state();
                self.nfa.state_mut(state_id).add_transition(Transition::new(
                    "*".to_owned(),
                    SegmentMatcher::Unconditional,
                    state_id,
                ));
                self.nfa.state_mut(from_id).epsilon_transition = Some(state_id);
                state_id
            }
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nfa_builder() {
        let mut builder = Builder::new();

        builder.add("/foo/*").unwrap();
        assert_eq!(
            transitions_for(&builder.nfa),
            vec![
                (0, "foo".to_owned(), 1),
                (1, "*".to_owned(), 2),
                (3, "*".to_owned(), 3)
            ]
        );

        builder.add("/foo/bar").unwrap();
        assert_eq!(
            transitions_for(&builder.nfa),
            vec![
                (0, "foo".to_owned(), 1),
                (1, "*".to_owned(), 2),
                (1, "bar".to_owned(), 4),
                (3, "*".to_owned(), 3),
                (5, "*".to_owned(), 5)
            ]
        );
    }

    #[test]
    fn test_shared_prefixes() {
        let mut builder = Builder::new();
        builder.add("/src/a").unwrap();
        let states = builder.nfa.len();
        builder.add("/src/a/").unwrap();
        // Only the extra segment for the trailing slash and its epsilon state
        assert_eq!(builder.nfa.len(), states + 2);
    }

    #[test]
    fn test_invalid_patterns_consume_no_ids() {
        let mut builder = Builder::new();
        assert_eq!(builder.add("a"), Ok(0));
        assert_eq!(
            builder.add("!a"),
            Err(PatternError::Negation("!a".to_owned()))
        );
        assert_eq!(builder.add("/"), Err(PatternError::Empty));
        assert_eq!(
            builder.add("src/[oops"),
            Err(PatternError::UnclosedClass("src/[oops".to_owned()))
        );
        let states = builder.nfa.len();
        assert_eq!(builder.add("b"), Ok(1));
        assert!(builder.nfa.len() > states);
        assert_eq!(builder.len(), 2);
    }

    fn transitions_for(nfa: &Nfa) -> Vec<(usize, String, usize)> {
        nfa.states_iter()
            .enumerate()
            .flat_map(|(idx, s)| {
                s.transitions
                    .iter()
                    .map(|t| (idx, t.path_segment.clone(), t.target.0 as usize))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
