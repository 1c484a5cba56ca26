//! Combines independently recorded task trees.
//!
//! Nodes are matched by the path of names leading to them. Matched nodes pool their samples,
//! everything else is carried over unchanged. The left tree decides the order of nodes that
//! exist in both; nodes only found on the right are appended after them.

use tracing::debug;

use crate::task_node::{NodeId, TaskNode};
use crate::task_tree::TaskTree;

/// Merges `right` into `left`, consuming both.
///
/// Subtrees that exist only in `right` are moved into the result without copying their
/// samples. No samples are ever discarded.
pub(crate) fn merge(mut left: TaskTree, right: TaskTree) -> TaskTree {
    let left_len = left.len();
    let right_len = right.len();

    let (right_nodes, right_roots) = right.into_parts();
    let mut right_nodes = right_nodes.into_iter().map(Some).collect::<Vec<_>>();

    for right_root in right_roots {
        merge_or_graft(&mut left, None, &mut right_nodes, right_root);
    }

    debug!(
        left_len,
        right_len,
        merged_len = left.len(),
        "merged task trees"
    );

    left
}

/// Merges `right_id` into the same-named child of `parent` in `left`,
/// or grafts it under `parent` if there is no such child.
fn merge_or_graft(
    left: &mut TaskTree,
    parent: Option<NodeId>,
    right_nodes: &mut [Option<TaskNode>],
    right_id: NodeId,
) {
    let name = peek(right_nodes, right_id).name();

    match left.find_child(parent, name) {
        Some(left_id) => merge_node(left, left_id, right_nodes, right_id),
        None => {
            graft(left, parent, right_nodes, right_id);
        }
    }
}

fn merge_node(
    left: &mut TaskTree,
    left_id: NodeId,
    right_nodes: &mut [Option<TaskNode>],
    right_id: NodeId,
) {
    let mut right_node = take(right_nodes, right_id);

    left.node_mut(left_id)
        .samples_mut()
        .extend_from(right_node.samples());

    for right_child in right_node.take_children() {
        merge_or_graft(left, Some(left_id), right_nodes, right_child);
    }
}

/// Moves the subtree rooted at `right_id` under `parent` in `left`.
fn graft(
    left: &mut TaskTree,
    parent: Option<NodeId>,
    right_nodes: &mut [Option<TaskNode>],
    right_id: NodeId,
) -> NodeId {
    let mut node = take(right_nodes, right_id);
    let children = node.take_children();

    node.relocate(parent, left.depth_below(parent));
    let id = left.insert(node);

    for child in children {
        graft(left, Some(id), right_nodes, child);
    }

    id
}

fn peek(nodes: &[Option<TaskNode>], id: NodeId) -> &TaskNode {
    nodes
        .get(id)
        .and_then(Option::as_ref)
        .expect("every node of the right tree is visited exactly once, via its parent")
}

fn take(nodes: &mut [Option<TaskNode>], id: NodeId) -> TaskNode {
    nodes
        .get_mut(id)
        .and_then(Option::take)
        .expect("every node of the right tree is visited exactly once, via its parent")
}
