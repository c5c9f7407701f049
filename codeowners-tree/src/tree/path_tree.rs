use std::collections::HashMap;

use super::FileOwners;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(pub(crate) usize);

/// A directory in the arena. Children keep the order in which they were
/// first seen.
#[derive(Debug, Default)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) children: Vec<NodeId>,
    child_index: HashMap<String, NodeId>,
    pub(crate) files: Vec<FileOwners>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// Arena-backed directory tree. A node is always created after its parent,
/// so every child id is greater than its parent's id.
#[derive(Debug)]
pub(crate) struct PathTree {
    nodes: Vec<Node>,
}

impl PathTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node::new(String::new())],
        }
    }

    pub(crate) fn root_id() -> NodeId {
        NodeId(0)
    }

    #[cfg(test)]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Insert a file, creating its parent directories as needed.
    pub(crate) fn insert(&mut self, path: &str, owner: String) {
        let (dir, file_name) = match path.rsplit_once('/') {
            Some((dir, file_name)) => (Some(dir), file_name),
            None => (None, path),
        };

        let mut current_node = Self::root_id();
        for segment in dir.into_iter().flat_map(|dir| dir.split('/')) {
            let child = self.nodes[current_node.0].child_index.get(segment);
            if let Some(&node_id) = child {
                current_node = node_id;
            } else {
                let node_id = NodeId(self.nodes.len());
                self.nodes.push(Node::new(segment.to_owned()));
                let parent = &mut self.nodes[current_node.0];
                parent.child_index.insert(segment.to_owned(), node_id);
                parent.children.push(node_id);
                current_node = node_id;
            }
        }

        self.nodes[current_node.0].files.push(FileOwners {
            name: file_name.to_owned(),
            owner,
        });
    }

    pub(crate) fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_and_ids() {
        let mut tree = PathTree::new();
        tree.insert("foo/bar", "a".to_owned());
        tree.insert("foo/bar/baz", "b".to_owned());
        tree.insert("zed", "c".to_owned());
        tree.insert("a/b/c/d", "d".to_owned());
        tree.insert("foo/qux", "e".to_owned());

        let root = tree.node(PathTree::root_id());
        assert_eq!(root.files.len(), 1);
        assert_eq!(root.files[0].name, "zed");
        let names = root
            .children
            .iter()
            .map(|&id| tree.node(id).name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["foo", "a"]);

        let foo = tree.node(root.children[0]);
        let files = foo.files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(files, vec!["bar", "qux"]);
        assert_eq!(tree.node(foo.children[0]).name, "bar");

        for (idx, node) in tree.nodes.iter().enumerate() {
            assert!(node.children.iter().all(|child| child.0 > idx));
        }
        assert_eq!(tree.len(), 6);
    }
}
