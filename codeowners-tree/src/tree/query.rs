use std::collections::{BTreeSet, HashSet};

use crate::owners::{split_owners, OwnerMap};

use super::{DirectoryOwners, FileOwners};

/// The extension of a file name, starting at its first dot, so
/// `app.test.ts` has the extension `.test.ts`. Empty when the name has no
/// dot.
pub fn file_extension(file_name: &str) -> &str {
    file_name
        .find('.')
        .map_or("", |idx| &file_name[idx..])
}

impl DirectoryOwners {
    /// Visit every directory in pre-order, passing its path relative to the
    /// root (empty for the root itself).
    pub fn visit<'a>(&'a self, mut visitor: impl FnMut(&str, &'a DirectoryOwners)) {
        let mut stack = vec![(String::new(), self)];
        while let Some((path, dir)) = stack.pop() {
            visitor(&path, dir);
            for child in dir.directories.iter().rev() {
                stack.push((join_path(&path, &child.name), child));
            }
        }
    }

    /// Number of files anywhere under this directory.
    pub fn file_count(&self) -> usize {
        let mut count = 0;
        self.visit(|_, dir| count += dir.files.len());
        count
    }

    /// Group every file under this directory by owner. Each directory's files
    /// come before those of its subdirectories.
    pub fn owner_map(&self) -> OwnerMap {
        let mut map = OwnerMap::new();
        self.visit(|path, dir| {
            for file in &dir.files {
                map.insert(file.owner.as_str(), join_path(path, &file.name));
            }
        });
        map
    }

    /// Every distinct owner token used by a file or directory, sorted.
    pub fn all_owners(&self) -> BTreeSet<String> {
        let mut owners = BTreeSet::new();
        self.visit(|_, dir| {
            let dir_owner = dir.owner.as_deref().unwrap_or_default();
            let file_owners = dir.files.iter().map(|f| f.owner.as_str());
            for owner in std::iter::once(dir_owner).chain(file_owners) {
                owners.extend(split_owners(owner).map(str::to_owned));
            }
        });
        owners
    }

    /// Every distinct file extension, sorted. Files without one contribute
    /// the empty string.
    pub fn all_extensions(&self) -> BTreeSet<String> {
        let mut extensions = BTreeSet::new();
        self.visit(|_, dir| {
            extensions.extend(dir.files.iter().map(|f| file_extension(&f.name).to_owned()));
        });
        extensions
    }

    /// Keep only files for which `keep` returns true, dropping directories
    /// left without files or subdirectories. The root is always kept.
    /// Directory owners are those of the unfiltered tree.
    pub fn filter_files(&self, keep: impl Fn(&FileOwners) -> bool) -> DirectoryOwners {
        filter_dir(self, &keep).unwrap_or_else(|| DirectoryOwners {
            name: self.name.clone(),
            directories: Vec::new(),
            files: Vec::new(),
            owner: self.owner.clone(),
        })
    }

    /// Keep files with at least one owner token in `owners`.
    pub fn filter_by_owners<S: AsRef<str>>(&self, owners: &[S]) -> DirectoryOwners {
        let owners = owners.iter().map(AsRef::as_ref).collect::<HashSet<&str>>();
        self.filter_files(|file| split_owners(&file.owner).any(|o| owners.contains(o)))
    }

    /// Keep files whose [`file_extension`] is in `extensions`.
    pub fn filter_by_extensions<S: AsRef<str>>(&self, extensions: &[S]) -> DirectoryOwners {
        let extensions = extensions
            .iter()
            .map(AsRef::as_ref)
            .collect::<HashSet<&str>>();
        self.filter_files(|file| extensions.contains(file_extension(&file.name)))
    }
}

struct FilterFrame<'a> {
    dir: &'a DirectoryOwners,
    next_child: usize,
    directories: Vec<DirectoryOwners>,
}

impl<'a> FilterFrame<'a> {
    fn new(dir: &'a DirectoryOwners) -> Self {
        Self {
            dir,
            next_child: 0,
            directories: Vec::new(),
        }
    }
}

// Post-order walk with an explicit stack: a directory is rebuilt once every
// subdirectory has been, and dropped when nothing survived in or below it.
fn filter_dir(
    root: &DirectoryOwners,
    keep: &dyn Fn(&FileOwners) -> bool,
) -> Option<DirectoryOwners> {
    let mut stack = vec![FilterFrame::new(root)];
    while let Some(frame) = stack.last_mut() {
        let dir = frame.dir;
        if let Some(child) = dir.directories.get(frame.next_child) {
            frame.next_child += 1;
            stack.push(FilterFrame::new(child));
            continue;
        }

        let directories = std::mem::take(&mut frame.directories);
        stack.pop();
        let files = dir
            .files
            .iter()
            .filter(|file| keep(file))
            .cloned()
            .collect::<Vec<_>>();
        let filtered = if files.is_empty() && directories.is_empty() {
            None
        } else {
            Some(DirectoryOwners {
                name: dir.name.clone(),
                directories,
                files,
                owner: dir.owner.clone(),
            })
        };

        match stack.last_mut() {
            Some(parent) => parent.directories.extend(filtered),
            None => return filtered,
        }
    }
    None
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", parent, name)
    }
}
