use super::segment::SegmentMatcher;

/// A nondeterministic automaton over path segments. Every pattern in a set
/// shares the same automaton; states that complete a pattern record that
/// pattern's id.
#[derive(Debug, Clone)]
pub(crate) struct Nfa {
    states: Vec<State>,
}

impl Nfa {
    pub(crate) const START_STATE: StateId = StateId(0);

    pub(crate) fn new() -> Self {
        Self {
            states: vec![State::new()],
        }
    }

    pub(crate) fn add_state(&mut self) -> StateId {
        let id = self.states.len();
        self.states.push(State::new());
        StateId(id as u32)
    }

    #[inline]
    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[usize::from(id)]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[usize::from(id)]
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn initial_states(&self) -> Vec<StateId> {
        let mut states = vec![Self::START_STATE];
        if let Some(epsilon_node_id) = self.state(Self::START_STATE).epsilon_transition {
            states.push(epsilon_node_id);
        }
        states
    }

    pub(crate) fn transitions_from(&self, state_id: StateId) -> impl Iterator<Item = &Transition> {
        self.state(state_id).transitions.iter()
    }

    pub(crate) fn epsilon_transition_from(&self, state_id: StateId) -> Option<StateId> {
        self.state(state_id).epsilon_transition
    }

    /// Follow every transition from `from_states` that accepts `segment`,
    /// then any epsilon edges out of the states reached.
    pub(crate) fn step(&self, from_states: &[StateId], segment: &str) -> Vec<StateId> {
        let mut next_states = Vec::new();
        for &state_id in from_states {
            for transition in self.transitions_from(state_id) {
                if transition.is_match(segment) && !next_states.contains(&transition.target) {
                    next_states.push(transition.target);
                }
            }
        }

        let epsilon_states = next_states
            .iter()
            .filter_map(|&state_id| self.epsilon_transition_from(state_id))
            .collect::<Vec<_>>();
        for state_id in epsilon_states {
            if !next_states.contains(&state_id) {
                next_states.push(state_id);
            }
        }
        next_states
    }

    /// Pattern ids accepted by any of `states`, sorted and deduplicated.
    pub(crate) fn accepted_patterns(&self, states: &[StateId]) -> Vec<usize> {
        let mut patterns = states
            .iter()
            .flat_map(|&id| self.state(id).terminal_for_patterns.iter().copied())
            .collect::<Vec<_>>();
        patterns.sort_unstable();
        patterns.dedup();
        patterns
    }

    #[cfg(test)]
    pub(crate) fn states_iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateId(pub(crate) u32);

impl From<StateId> for usize {
    fn from(id: StateId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub(crate) terminal_for_patterns: Vec<usize>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_transition: Option<StateId>,
}

impl State {
    fn new() -> Self {
        Self {
            terminal_for_patterns: Vec::new(),
            transitions: Vec::new(),
            epsilon_transition: None,
        }
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub(crate) fn mark_as_terminal(&mut self, pattern_id: usize) {
        self.terminal_for_patterns.push(pattern_id);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub(crate) path_segment: String,
    matcher: SegmentMatcher,
    pub(crate) target: StateId,
}

impl Transition {
    pub(crate) fn new(path_segment: String, matcher: SegmentMatcher, target: StateId) -> Self {
        Self {
            path_segment,
            matcher,
            target,
        }
    }

    #[inline]
    pub(crate) fn is_match(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }
}
