use std::mem;
use std::num::NonZero;
use std::time::{Duration, Instant};

use foldhash::{HashMap, HashMapExt};

use crate::SampleSeries;

/// Identifies a node within the arena of a [`TaskTree`][crate::task_tree::TaskTree].
pub(crate) type NodeId = usize;

/// One task in the hierarchy: its identity, its samples and its position in the tree.
///
/// Nodes never own each other directly. The tree owns all nodes and the links between them
/// are arena indexes, so the parent link is a plain back-reference.
#[derive(Clone, Debug)]
pub(crate) struct TaskNode {
    name: String,
    parent: Option<NodeId>,
    depth: usize,

    // Insertion order, one per distinct child name.
    children: Vec<NodeId>,
    children_by_name: HashMap<String, NodeId>,

    // Elapsed nanoseconds, one per completed start/stop cycle.
    samples: SampleSeries<u64>,

    // Some while the task is running.
    started_at: Option<Instant>,
}

impl TaskNode {
    pub(crate) fn new(
        name: String,
        parent: Option<NodeId>,
        depth: usize,
        block_size: NonZero<usize>,
    ) -> Self {
        Self {
            name,
            parent,
            depth,
            children: Vec::new(),
            children_by_name: HashMap::new(),
            samples: SampleSeries::with_block_size(block_size),
            started_at: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn child(&self, name: &str) -> Option<NodeId> {
        self.children_by_name.get(name).copied()
    }

    pub(crate) fn samples(&self) -> &SampleSeries<u64> {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut SampleSeries<u64> {
        &mut self.samples
    }

    pub(crate) fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Registers a child. The caller guarantees the name is not yet taken under this node.
    pub(crate) fn attach_child(&mut self, name: String, id: NodeId) {
        debug_assert!(
            !self.children_by_name.contains_key(&name),
            "child names are unique among siblings"
        );

        self.children.push(id);
        self.children_by_name.insert(name, id);
    }

    /// Moves this node under a new parent at a new depth, as done when grafting subtrees.
    pub(crate) fn relocate(&mut self, parent: Option<NodeId>, depth: usize) {
        self.parent = parent;
        self.depth = depth;
    }

    /// Replaces the child links, as done when grafting subtrees into another arena.
    pub(crate) fn take_children(&mut self) -> Vec<NodeId> {
        self.children_by_name.clear();
        mem::take(&mut self.children)
    }

    /// Marks the task as running from `now`.
    ///
    /// Returns `false` without changing anything if the task is already running.
    pub(crate) fn start(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }

        self.started_at = Some(now);
        true
    }

    /// Marks the task as stopped at `now` and records the elapsed time as a sample.
    ///
    /// Returns the elapsed time, or `None` if the task was not running.
    pub(crate) fn stop(&mut self, now: Instant) -> Option<Duration> {
        let started_at = self.started_at.take()?;
        let elapsed = now.saturating_duration_since(started_at);

        self.samples.add(
            elapsed
                .as_nanos()
                .try_into()
                .expect("task ran for more than 584 years - this indicates an unrealistic scenario"),
        );

        Some(elapsed)
    }

    /// Forgets that the task is running without recording a sample.
    pub(crate) fn abandon(&mut self) {
        self.started_at = None;
    }

    /// The sum of this task's own samples. Time of children is already part of these samples
    /// and is never added again.
    pub(crate) fn total_time(&self) -> Duration {
        nanos_to_duration(self.samples.sum())
    }
}

pub(crate) fn nanos_to_duration(nanos: i128) -> Duration {
    let nanos = u64::try_from(nanos)
        .expect("total time exceeds 584 years - this indicates an unrealistic scenario");

    Duration::from_nanos(nanos)
}
