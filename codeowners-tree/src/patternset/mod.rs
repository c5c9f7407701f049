//! Gitignore-style pattern matching for CODEOWNERS rules.
//!
//! Patterns are split into path segments and compiled into a single NFA
//! whose transitions each match one segment. A [`Matcher`] reports every
//! pattern matching a path in one walk over its segments; a [`Pattern`]
//! wraps the automaton for a single pattern.

mod builder;
mod matcher;
mod nfa;
mod pattern;
mod segment;

pub use self::builder::Builder;
pub use self::matcher::Matcher;
pub use self::pattern::{matches, Pattern};
