//! Resolve CODEOWNERS owners for every file in a repository and roll them up
//! into a directory tree.
//!
//! ```
//! use codeowners_tree::{build_tree, RuleSet};
//!
//! let rule_set = RuleSet::parse("*.ts @frontend\n/docs/ @docs\n");
//! let root = build_tree(&["web/app.ts", "docs/intro.md", "Makefile"], &rule_set);
//!
//! assert_eq!(root.directories[0].owner.as_deref(), Some("@frontend"));
//! assert_eq!(root.files[0].owner, "");
//! ```

pub mod error;
pub mod owners;
pub mod parser;
pub mod patternset;
pub mod progress;
mod ruleset;
pub mod tree;

pub use error::{Error, PatternError, Result};
pub use owners::{join_owners, split_owners, OwnerMap};
pub use parser::{parse, parse_file, Rule};
pub use progress::{Progress, ProgressSender, ProgressSink, ProgressWatcher, Received, SessionId};
pub use ruleset::{resolve_owner, RuleSet};
pub use tree::{
    build_tree, spawn_build, BuildHandle, BuildOptions, BuildOutput, DirectoryOwners, FileOwners,
    OwnerFold, TreeBuilder,
};
