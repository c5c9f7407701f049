//! Directory tree of resolved owners.
//!
//! A build runs in two phases. First every file path is resolved against
//! the rule set exactly once and inserted into an arena of directories.
//! Then a single bottom-up pass folds the owners of each directory's files
//! and subdirectories into one owner for the directory, or none when they
//! disagree.

mod path_tree;
mod query;

use std::{
    any::Any,
    thread::{self, JoinHandle},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::{
    error::{Error, Result},
    progress::{ProgressReporter, ProgressSink, SessionId},
    ruleset::RuleSet,
};

use self::path_tree::PathTree;

pub use self::query::file_extension;

/// Owner of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOwners {
    /// File name, without its directory.
    pub name: String,
    /// Owner display string, empty when no rule matches.
    pub owner: String,
}

/// A directory with its files, subdirectories and rolled-up owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryOwners {
    /// Directory name. Empty for the root.
    pub name: String,
    pub directories: Vec<DirectoryOwners>,
    pub files: Vec<FileOwners>,
    /// The owner shared by every file beneath this directory, which may be
    /// the empty string when all of them are unowned. `None` when they
    /// disagree, and always `None` for the root.
    pub owner: Option<String>,
}

impl DirectoryOwners {
    /// An empty root directory.
    pub fn root() -> Self {
        DirectoryOwners {
            name: String::new(),
            directories: Vec::new(),
            files: Vec::new(),
            owner: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

/// Three-state fold used to roll owners up the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerFold {
    /// Nothing seen yet.
    #[default]
    Unset,
    /// Every owner seen so far is this one.
    Single(String),
    /// At least two different owners were seen.
    Conflicting,
}

impl OwnerFold {
    pub fn push(&mut self, owner: &str) {
        match self {
            OwnerFold::Unset => *self = OwnerFold::Single(owner.to_owned()),
            OwnerFold::Single(current) if current.as_str() != owner => {
                *self = OwnerFold::Conflicting
            }
            OwnerFold::Single(_) | OwnerFold::Conflicting => {}
        }
    }

    pub fn merge(self, other: OwnerFold) -> OwnerFold {
        match (self, other) {
            (OwnerFold::Unset, other) | (other, OwnerFold::Unset) => other,
            (OwnerFold::Single(a), OwnerFold::Single(b)) if a == b => OwnerFold::Single(a),
            _ => OwnerFold::Conflicting,
        }
    }

    pub fn into_owner(self) -> Option<String> {
        match self {
            OwnerFold::Single(owner) => Some(owner),
            OwnerFold::Unset | OwnerFold::Conflicting => None,
        }
    }
}

/// Tuning for tree builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Files resolved between two progress notifications. With the `rayon`
    /// feature, files within one interval are resolved in parallel.
    pub progress_interval: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            progress_interval: 1000,
        }
    }
}

/// Builds a [`DirectoryOwners`] tree from a list of file paths.
pub struct TreeBuilder<'a> {
    rule_set: &'a RuleSet,
    options: BuildOptions,
    progress: Option<(&'a dyn ProgressSink, SessionId)>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(rule_set: &'a RuleSet) -> Self {
        Self {
            rule_set,
            options: BuildOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Report progress to `sink`, tagged with `session_id`.
    pub fn with_progress(mut self, sink: &'a dyn ProgressSink, session_id: SessionId) -> Self {
        self.progress = Some((sink, session_id));
        self
    }

    /// Build the tree. Paths are relative to the repository root, use `/`
    /// separators and must not start with one. Directories and files keep
    /// the order in which they first appear in `paths`. Empty paths are
    /// skipped.
    pub fn build<P>(&self, paths: &[P]) -> DirectoryOwners
    where
        P: AsRef<str> + Sync,
    {
        let _span = info_span!("build_tree", files = paths.len()).entered();
        let started = Instant::now();

        let mut reporter = self
            .progress
            .as_ref()
            .map(|(sink, session_id)| ProgressReporter::new(*sink, session_id.clone(), paths.len()));
        if let Some(reporter) = reporter.as_mut() {
            reporter.advance(0);
        }

        let mut tree = PathTree::new();
        let mut files_handled = 0;
        for chunk in paths.chunks(self.options.progress_interval.max(1)) {
            let owners = resolve_chunk(self.rule_set, chunk);
            for (path, owner) in chunk.iter().zip(owners) {
                if let Some(owner) = owner {
                    tree.insert(path.as_ref(), owner);
                }
            }

            files_handled += chunk.len();
            if let Some(reporter) = reporter.as_mut() {
                reporter.advance(files_handled);
            }
        }

        let directories = tree.len();
        let root = fold(tree);
        debug!(
            files = files_handled,
            directories,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built owners tree"
        );
        root
    }
}

/// Build a tree with default options and no progress reporting.
pub fn build_tree<P>(paths: &[P], rule_set: &RuleSet) -> DirectoryOwners
where
    P: AsRef<str> + Sync,
{
    TreeBuilder::new(rule_set).build(paths)
}

#[cfg(feature = "rayon")]
fn resolve_chunk<P>(rule_set: &RuleSet, chunk: &[P]) -> Vec<Option<String>>
where
    P: AsRef<str> + Sync,
{
    use rayon::prelude::*;

    chunk
        .par_iter()
        .map(|path| resolve_path(rule_set, path.as_ref()))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn resolve_chunk<P>(rule_set: &RuleSet, chunk: &[P]) -> Vec<Option<String>>
where
    P: AsRef<str> + Sync,
{
    chunk
        .iter()
        .map(|path| resolve_path(rule_set, path.as_ref()))
        .collect()
}

fn resolve_path(rule_set: &RuleSet, path: &str) -> Option<String> {
    if path.is_empty() {
        None
    } else {
        Some(rule_set.resolve_owner(path))
    }
}

// Children always have larger ids than their parents, so walking the arena
// backwards visits every directory after all of its descendants. That gives
// a post-order traversal without recursion.
fn fold(tree: PathTree) -> DirectoryOwners {
    let nodes = tree.into_nodes();
    let mut built: Vec<Option<(DirectoryOwners, OwnerFold)>> = Vec::with_capacity(nodes.len());
    built.resize_with(nodes.len(), || None);

    for (id, node) in nodes.into_iter().enumerate().rev() {
        let mut owner = OwnerFold::Unset;
        for file in &node.files {
            owner.push(&file.owner);
        }

        let mut directories = Vec::with_capacity(node.children.len());
        for child in node.children {
            if let Some((directory, child_owner)) = built[child.0].take() {
                owner = owner.merge(child_owner);
                directories.push(directory);
            }
        }

        let directory = DirectoryOwners {
            owner: owner.clone().into_owner(),
            name: node.name,
            directories,
            files: node.files,
        };
        built[id] = Some((directory, owner));
    }

    match built.into_iter().next().flatten() {
        Some((mut root, _)) => {
            root.owner = None;
            root
        }
        None => DirectoryOwners::root(),
    }
}

/// Result of a background build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub session_id: SessionId,
    pub tree: DirectoryOwners,
}

/// Handle to a build running on its own thread.
#[derive(Debug)]
pub struct BuildHandle {
    session_id: SessionId,
    handle: JoinHandle<DirectoryOwners>,
}

impl BuildHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the build. A build that panics yields no tree at all.
    pub fn join(self) -> Result<BuildOutput> {
        let session_id = self.session_id;
        match self.handle.join() {
            Ok(tree) => Ok(BuildOutput { session_id, tree }),
            Err(panic) => Err(Error::BuildFailed {
                session_id: session_id.to_string(),
                reason: panic_message(panic.as_ref()),
            }),
        }
    }
}

/// Build a tree on a new thread, reporting progress to `sink` under
/// `session_id`. Superseded builds aren't stopped; callers discard their
/// progress and output by comparing session ids.
pub fn spawn_build<S>(
    paths: Vec<String>,
    rule_set: RuleSet,
    session_id: SessionId,
    sink: S,
    options: BuildOptions,
) -> Result<BuildHandle>
where
    S: ProgressSink + 'static,
{
    let thread_session_id = session_id.clone();
    let handle = thread::Builder::new()
        .name(format!("owners-tree-{}", session_id))
        .spawn(move || {
            TreeBuilder::new(&rule_set)
                .with_options(options)
                .with_progress(&sink, thread_session_id)
                .build(&paths)
        })
        .map_err(|err| Error::BuildFailed {
            session_id: session_id.to_string(),
            reason: err.to_string(),
        })?;

    Ok(BuildHandle { session_id, handle })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "build thread panicked".to_owned()
    }
}
