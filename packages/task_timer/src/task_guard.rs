use std::ops::{Deref, DerefMut};

use crate::Recorder;
use crate::task_node::NodeId;

/// Stops a task when dropped.
///
/// Created by [`Recorder::enter()`]. The guard borrows the recorder and dereferences to it,
/// so subtasks are started through the guard of their parent.
///
/// If the task is stopped by other means before the guard is dropped, the guard does nothing.
#[derive(Debug)]
#[must_use = "the task is stopped as soon as the guard is dropped"]
pub struct TaskGuard<'a> {
    recorder: &'a mut Recorder,

    // Recorder generation and task. None if the start was a no-op because the task was
    // already open.
    task: Option<(u64, NodeId)>,
}

impl<'a> TaskGuard<'a> {
    pub(crate) fn new(recorder: &'a mut Recorder, task: Option<(u64, NodeId)>) -> Self {
        Self { recorder, task }
    }

    /// Whether this guard started its task and will stop it on drop.
    ///
    /// A guard is inactive if the task was already open when the guard was created.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl Deref for TaskGuard<'_> {
    type Target = Recorder;

    fn deref(&self) -> &Self::Target {
        self.recorder
    }
}

impl DerefMut for TaskGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.recorder
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if let Some((generation, task)) = self.task {
            self.recorder.stop_guarded(generation, task);
        }
    }
}
