//! Per-node reports and spanning-tree aggregation.
//!
//! Each node publishes a [`TreeReport`] when it terminates. Nothing is shared
//! between nodes while the traversal runs; whoever orchestrates the nodes
//! collects the reports and assembles them with
//! [`SpanningTree::from_reports`].

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

use crate::{NodeAddr, error::TreeError};

/// A node's permanent contribution to the spanning tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReport {
    /// Reporting node
    pub node: NodeAddr,
    /// Whether the node was the traversal root
    pub is_root: bool,
    /// Upstream neighbour; `None` for the root
    pub parent: Option<NodeAddr>,
    /// Neighbours that chose this node as parent (F)
    pub children: BTreeSet<NodeAddr>,
    /// Neighbours whose edge is outside the tree (NF)
    pub rejected: BTreeSet<NodeAddr>,
}

impl fmt::Display for TreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |set: &BTreeSet<NodeAddr>| {
            set.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };

        match self.parent {
            Some(parent) => write!(f, "[{}] parent = {}", self.node, parent)?,
            None => write!(f, "[{}] root", self.node)?,
        }
        write!(f, ", children = [{}], rejected = [{}]", list(&self.children), list(&self.rejected))
    }
}

/// A verified spanning tree assembled from node reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    root: NodeAddr,
    parents: BTreeMap<NodeAddr, NodeAddr>,
    children: BTreeMap<NodeAddr, BTreeSet<NodeAddr>>,
}

impl SpanningTree {
    /// Assemble and verify reports.
    ///
    /// Checks that there is exactly one root, that every other node has a
    /// parent that reported, that parents and children agree on every edge,
    /// and that every node is reachable from the root (which also rules out
    /// cycles).
    ///
    /// # Errors
    ///
    /// Returns the first [`TreeError`] found.
    pub fn from_reports(reports: impl IntoIterator<Item = TreeReport>) -> Result<Self, TreeError> {
        let mut by_node = BTreeMap::new();
        let mut root = None;

        for report in reports {
            if report.is_root {
                if let Some(existing) = root {
                    return Err(TreeError::MultipleRoots(existing, report.node));
                }
                root = Some(report.node);
            }
            let node = report.node;
            if by_node.insert(node, report).is_some() {
                return Err(TreeError::DuplicateReport(node));
            }
        }

        let root = root.ok_or(TreeError::NoRoot)?;
        let mut parents = BTreeMap::new();
        let mut children = BTreeMap::new();

        for (node, report) in &by_node {
            if !report.is_root {
                let parent = report.parent.ok_or(TreeError::MissingParent(*node))?;
                let parent_report = by_node
                    .get(&parent)
                    .ok_or(TreeError::UnknownNode { node: *node, unknown: parent })?;
                if !parent_report.children.contains(node) {
                    return Err(TreeError::ParentMismatch { parent, child: *node });
                }
                parents.insert(*node, parent);
            }

            for child in &report.children {
                let child_report = by_node
                    .get(child)
                    .ok_or(TreeError::UnknownNode { node: *node, unknown: *child })?;
                if child_report.parent != Some(*node) {
                    return Err(TreeError::ParentMismatch { parent: *node, child: *child });
                }
            }
            children.insert(*node, report.children.clone());
        }

        let tree = Self { root, parents, children };

        let reached = tree.bfs().count();
        if reached != by_node.len() {
            let unreachable = by_node
                .keys()
                .find(|node| **node != root && !tree.is_reachable(node))
                .copied()
                .unwrap_or(root);
            return Err(TreeError::Unreachable(unreachable));
        }

        Ok(tree)
    }

    /// Check that the tree covers every node in `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MissingNode`] for the first absent node.
    pub fn verify_covers(
        &self,
        expected: impl IntoIterator<Item = NodeAddr>,
    ) -> Result<(), TreeError> {
        match expected.into_iter().find(|node| !self.children.contains_key(node)) {
            Some(missing) => Err(TreeError::MissingNode(missing)),
            None => Ok(()),
        }
    }

    /// The traversal root.
    #[must_use]
    pub fn root(&self) -> NodeAddr {
        self.root
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Always false: a verified tree contains at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Parent of `node`, `None` for the root or unknown nodes.
    #[must_use]
    pub fn parent_of(&self, node: &NodeAddr) -> Option<NodeAddr> {
        self.parents.get(node).copied()
    }

    /// Children of `node`.
    pub fn children_of(&self, node: &NodeAddr) -> impl Iterator<Item = NodeAddr> + '_ {
        self.children.get(node).into_iter().flatten().copied()
    }

    /// All `(parent, child)` edges, ordered by child.
    pub fn edges(&self) -> impl Iterator<Item = (NodeAddr, NodeAddr)> + '_ {
        self.parents.iter().map(|(child, parent)| (*parent, *child))
    }

    /// Height of the tree: edges on the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.bfs().map(|(_, depth)| depth).max().unwrap_or(0)
    }

    fn is_reachable(&self, node: &NodeAddr) -> bool {
        self.bfs().any(|(reached, _)| reached == *node)
    }

    /// Breadth-first walk from the root yielding `(node, depth)`.
    fn bfs(&self) -> impl Iterator<Item = (NodeAddr, usize)> + '_ {
        let mut queue = VecDeque::from([(self.root, 0)]);
        let mut visited = BTreeSet::new();

        std::iter::from_fn(move || {
            while let Some((node, depth)) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                queue.extend(self.children_of(&node).map(|child| (child, depth + 1)));
                return Some((node, depth));
            }
            None
        })
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, node: NodeAddr, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", node, indent = indent * 2)?;
        for child in self.children_of(&node) {
            self.render(f, child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for SpanningTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, self.root, 0)
    }
}
