use std::num::NonZero;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};

use crate::task_node::{NodeId, TaskNode};

/// A forest of task nodes stored in a single arena.
///
/// Root names are unique, as are child names under the same parent. The same name may
/// appear any number of times in different places of the tree.
#[derive(Clone, Debug, Default)]
pub(crate) struct TaskTree {
    nodes: Vec<TaskNode>,

    // Insertion order.
    roots: Vec<NodeId>,
    roots_by_name: HashMap<String, NodeId>,
}

impl TaskTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            roots_by_name: HashMap::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub(crate) fn node(&self, id: NodeId) -> &TaskNode {
        self.nodes
            .get(id)
            .expect("node IDs are only issued by the tree that owns the node")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TaskNode {
        self.nodes
            .get_mut(id)
            .expect("node IDs are only issued by the tree that owns the node")
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut TaskNode> {
        self.nodes.iter_mut()
    }

    /// Finds the child of `parent` with the given name, or the root with that name
    /// if `parent` is `None`.
    pub(crate) fn find_child(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        match parent {
            Some(parent) => self.node(parent).child(name),
            None => self.roots_by_name.get(name).copied(),
        }
    }

    /// Finds the child of `parent` with the given name, creating it if it does not exist yet.
    pub(crate) fn get_or_insert_child(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        block_size: NonZero<usize>,
    ) -> NodeId {
        if let Some(existing) = self.find_child(parent, name) {
            return existing;
        }

        let depth = self.depth_below(parent);
        self.insert(TaskNode::new(name.to_string(), parent, depth, block_size))
    }

    /// Adds a node to the arena and links it to its parent (or to the roots).
    ///
    /// The node must not have any children yet and its name must be free under its parent.
    pub(crate) fn insert(&mut self, node: TaskNode) -> NodeId {
        debug_assert!(node.children().is_empty());

        let id = self.nodes.len();
        let name = node.name().to_string();

        match node.parent() {
            Some(parent) => self.node_mut(parent).attach_child(name, id),
            None => {
                debug_assert!(!self.roots_by_name.contains_key(&name));
                self.roots.push(id);
                self.roots_by_name.insert(name, id);
            }
        }

        self.nodes.push(node);
        id
    }

    /// The depth a child of `parent` would have.
    pub(crate) fn depth_below(&self, parent: Option<NodeId>) -> usize {
        parent.map_or(0, |parent| {
            self.node(parent)
                .depth()
                .checked_add(1)
                .expect("tree depth overflows usize - this indicates an unrealistic scenario")
        })
    }

    /// Decomposes the tree into its arena and its root list, for grafting into another tree.
    pub(crate) fn into_parts(self) -> (Vec<TaskNode>, Vec<NodeId>) {
        (self.nodes, self.roots)
    }

    /// The sum of the total times of all roots.
    ///
    /// Descendants are never added because their time is already contained in their
    /// ancestors' samples.
    pub(crate) fn total_time(&self) -> Duration {
        self.roots
            .iter()
            .map(|&root| self.node(root).total_time())
            .sum()
    }

    /// The sum of the total times of the immediate children of a node.
    pub(crate) fn subtask_time(&self, id: NodeId) -> Duration {
        self.node(id)
            .children()
            .iter()
            .map(|&child| self.node(child).total_time())
            .sum()
    }

    /// The time a node spent outside of its children.
    ///
    /// Clamped at zero: misuse such as stopping a parent before its children can make the
    /// children appear to take longer than the parent.
    pub(crate) fn self_time(&self, id: NodeId) -> Duration {
        self.node(id)
            .total_time()
            .saturating_sub(self.subtask_time(id))
    }

    pub(crate) fn is_any_running(&self) -> bool {
        self.nodes.iter().any(TaskNode::is_running)
    }

    /// All node IDs in depth-first pre-order, following insertion order among siblings.
    pub(crate) fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut pending = self.roots.iter().rev().copied().collect::<Vec<_>>();

        while let Some(id) = pending.pop() {
            order.push(id);
            pending.extend(self.node(id).children().iter().rev().copied());
        }

        order
    }
}
