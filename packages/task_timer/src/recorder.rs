use std::iter;
use std::num::NonZero;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::pal::{Platform, PlatformFacade};
use crate::task_node::NodeId;
use crate::task_tree::TaskTree;
use crate::{Error, RecorderBuilder, Report, Result, TaskGuard};

/// Records the elapsed time of nested, named tasks on a single thread.
///
/// The recorder models a call stack. Starting a task while another task is open makes the new
/// task a subtask of the open one; stopping a task makes its parent the open task again.
/// Every completed start/stop cycle adds one sample to the task, and repeated cycles of the same
/// task at the same position in the hierarchy accumulate in the same place.
///
/// A recorder is not meant to be shared between threads. To measure work on multiple threads,
/// use one recorder per thread and combine their reports with [`Report::merge_all()`].
///
/// # Examples
///
/// ```
/// use task_timer::Recorder;
///
/// let mut recorder = Recorder::new();
///
/// recorder.start("request")?;
///
/// for _ in 0..3 {
///     recorder.start("query")?;
///     std::hint::black_box(42);
///     recorder.stop();
/// }
///
/// recorder.stop();
///
/// let report = recorder.to_report();
/// let request = report.roots().next().unwrap();
/// let query = request.children().next().unwrap();
///
/// assert_eq!(request.count(), 1);
/// assert_eq!(query.count(), 3);
/// assert!(request.total_time() >= query.total_time());
/// # Ok::<(), task_timer::Error>(())
/// ```
#[derive(Debug)]
pub struct Recorder {
    tree: TaskTree,

    // The innermost running task that new tasks attach under. All of its ancestors are
    // running as well.
    open: Option<NodeId>,

    // Incremented on every reset, so guards created before a reset leave the new tree alone.
    generation: u64,

    block_size: NonZero<usize>,
    platform: PlatformFacade,
}

impl Recorder {
    /// Creates a recorder with the default configuration.
    ///
    /// Use [`builder()`](Self::builder) to customize the configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a recorder with a custom configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use new_zealand::nz;
    /// use task_timer::Recorder;
    ///
    /// let recorder = Recorder::builder().sample_block_size(nz!(65_536)).build();
    /// ```
    pub fn builder() -> RecorderBuilder {
        RecorderBuilder::new()
    }

    pub(crate) fn from_parts(block_size: NonZero<usize>, platform: PlatformFacade) -> Self {
        Self {
            tree: TaskTree::new(),
            open: None,
            generation: 0,
            block_size,
            platform,
        }
    }

    /// Creates a recorder with a specific platform, typically a fake clock in tests.
    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self::from_parts(crate::DEFAULT_BLOCK_SIZE, platform)
    }

    /// Starts a task as a subtask of the currently open task, or as a top-level task if
    /// no task is open.
    ///
    /// Returns `Ok(true)` if the task was started. Returns `Ok(false)` and changes nothing if a
    /// task with the same name is already open, either as the innermost task or further out -
    /// the hierarchy models a call stack, so a task cannot be nested inside itself. Callers may
    /// treat this as a bug or simply ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTaskName`] if `name` is empty or consists only of whitespace.
    pub fn start(&mut self, name: &str) -> Result<bool> {
        validate_name(name)?;

        if self.find_open(name).is_some() {
            trace!(task = name, "task is already open, ignoring start");
            return Ok(false);
        }

        let id = match self.tree.find_child(self.open, name) {
            Some(existing) => existing,
            None => {
                let created = self
                    .tree
                    .get_or_insert_child(self.open, name, self.block_size);

                debug!(
                    task = name,
                    depth = self.tree.node(created).depth(),
                    "created task node"
                );

                created
            }
        };

        let now = self.platform.now();

        // A task that is not on the open stack can still be running if an outer task was
        // stopped by name before it.
        if !self.tree.node_mut(id).start(now) {
            trace!(task = name, "task is still running, ignoring start");
            return Ok(false);
        }

        self.open = Some(id);
        trace!(task = name, "task started");

        Ok(true)
    }

    /// Stops the innermost open task and records its elapsed time.
    ///
    /// Returns `false` if no task is open, so that callers can stop defensively.
    pub fn stop(&mut self) -> bool {
        let Some(id) = self.open else {
            return false;
        };

        self.close(id);
        true
    }

    /// Stops the innermost open task with the given name and records its elapsed time.
    ///
    /// The parent of the stopped task becomes the open task. If the stopped task had open
    /// subtasks, those remain running and are no longer reachable through the open stack.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTaskName`] if `name` is empty or blank and
    /// [`Error::NotRunning`] if no task with that name is open.
    pub fn stop_named(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;

        let id = self.find_open(name).ok_or_else(|| Error::NotRunning {
            name: name.to_string(),
        })?;

        if self.open != Some(id) {
            warn!(
                task = name,
                "stopping task while subtasks are still open; the subtasks remain running"
            );
        }

        self.close(id);
        Ok(())
    }

    /// Starts a task and returns a guard that stops it when dropped.
    ///
    /// The guard dereferences to the recorder, so subtasks can be started through it.
    /// If the task was already open, the guard is inactive and stops nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTaskName`] if `name` is empty or blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use task_timer::Recorder;
    ///
    /// let mut recorder = Recorder::new();
    ///
    /// {
    ///     let mut outer = recorder.enter("outer")?;
    ///     let _inner = outer.enter("inner")?;
    /// }
    ///
    /// assert!(!recorder.is_any_running());
    /// assert_eq!(recorder.to_report().tasks().count(), 2);
    /// # Ok::<(), task_timer::Error>(())
    /// ```
    pub fn enter(&mut self, name: &str) -> Result<TaskGuard<'_>> {
        let task = if self.start(name)? {
            self.open.map(|id| (self.generation, id))
        } else {
            None
        };

        Ok(TaskGuard::new(self, task))
    }

    /// Runs `f` as a task with the given name.
    ///
    /// `f` receives the recorder, so it can record subtasks of its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTaskName`] if `name` is empty or blank, in which case `f` is
    /// not called.
    ///
    /// # Examples
    ///
    /// ```
    /// use task_timer::Recorder;
    ///
    /// let mut recorder = Recorder::new();
    ///
    /// let sum = recorder.measure("sum", |recorder| {
    ///     recorder.measure("prepare", |_| ())?;
    ///     Ok::<_, task_timer::Error>((1..=10).sum::<u32>())
    /// })??;
    ///
    /// assert_eq!(sum, 55);
    /// # Ok::<(), task_timer::Error>(())
    /// ```
    pub fn measure<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> Result<R> {
        let mut guard = self.enter(name)?;
        Ok(f(&mut guard))
    }

    /// Whether any task in the hierarchy is running.
    #[must_use]
    pub fn is_any_running(&self) -> bool {
        self.tree.is_any_running()
    }

    /// The name of the innermost open task, if any.
    #[must_use]
    pub fn current_task(&self) -> Option<&str> {
        self.open.map(|id| self.tree.node(id).name())
    }

    /// The total elapsed time of all completed cycles of all top-level tasks.
    ///
    /// Subtasks are not added again, as their time is already part of their ancestors.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.tree.total_time()
    }

    /// Whether the recorder has not seen any task yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Discards all tasks and samples, including any running tasks.
    pub fn reset(&mut self) {
        debug!(tasks = self.tree.len(), "resetting recorder");

        self.tree = TaskTree::new();
        self.open = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Creates a report from the samples recorded so far.
    ///
    /// The recorder can continue recording afterwards. Running tasks contribute only
    /// their completed cycles to the report.
    #[must_use]
    pub fn to_report(&self) -> Report {
        Report::from_tree(self.tree.clone())
    }

    /// Converts the recorder into a report without copying the samples.
    #[must_use]
    pub fn into_report(self) -> Report {
        Report::from_tree(self.tree)
    }

    /// Stops a task on behalf of a guard, unless it has already been stopped.
    pub(crate) fn stop_guarded(&mut self, generation: u64, id: NodeId) {
        if generation != self.generation || !self.tree.node(id).is_running() {
            return;
        }

        if self.open == Some(id) {
            self.close(id);
        } else if self.is_open(id) {
            warn!(
                task = self.tree.node(id).name(),
                "task guard dropped while subtasks are still open; the subtasks remain running"
            );

            self.close(id);
        } else {
            // Detached from the open stack when an outer task was stopped by name. The open
            // stack is left where it is.
            let now = self.platform.now();
            let node = self.tree.node_mut(id);

            let elapsed = node
                .stop(now)
                .expect("checked above that the task is running");

            trace!(task = node.name(), ?elapsed, "detached task stopped by its guard");
        }
    }

    fn close(&mut self, id: NodeId) {
        let now = self.platform.now();
        let node = self.tree.node_mut(id);

        let elapsed = node
            .stop(now)
            .expect("only running tasks are closed, as guaranteed by the open stack");

        trace!(task = node.name(), ?elapsed, "task stopped");

        self.open = node.parent();
    }

    fn is_open(&self, id: NodeId) -> bool {
        iter::successors(self.open, |&open| self.tree.node(open).parent()).any(|open| open == id)
    }

    /// Finds the innermost task with the given name on the open stack.
    fn find_open(&self, name: &str) -> Option<NodeId> {
        iter::successors(self.open, |&id| self.tree.node(id).parent())
            .find(|&id| self.tree.node(id).name() == name)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::EmptyTaskName);
    }

    Ok(())
}
