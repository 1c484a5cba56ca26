//! Task timing reports.

use std::fmt;
use std::time::Duration;

use crate::merge::merge;
use crate::task_node::{NodeId, TaskNode};
use crate::task_tree::TaskTree;
use crate::{SampleSeries, Statistics};

/// A read-only snapshot of the task hierarchy captured by a [`Recorder`][crate::Recorder].
///
/// Only completed start/stop cycles are part of a report; tasks that were still running when
/// the snapshot was taken contribute their earlier samples only.
///
/// Reports are plain data and can be sent to other threads, which makes them the unit of
/// combining measurements from multiple threads: record on each thread with its own
/// recorder, then merge the reports.
///
/// # Examples
///
/// ```
/// use task_timer::Recorder;
///
/// let mut recorder = Recorder::new();
///
/// recorder.measure("load", |_| {
///     std::hint::black_box(42);
/// })?;
///
/// let report = recorder.to_report();
///
/// for task in report.tasks() {
///     println!(
///         "{}{}: {} calls, {:?} total, {:?} self",
///         "  ".repeat(task.depth()),
///         task.name(),
///         task.count(),
///         task.total_time(),
///         task.self_time()
///     );
/// }
/// # Ok::<(), task_timer::Error>(())
/// ```
///
/// # Merging reports
///
/// ```
/// use std::thread;
///
/// use task_timer::{Recorder, Report};
///
/// let workers = (0..4)
///     .map(|_| {
///         thread::spawn(|| {
///             let mut recorder = Recorder::new();
///             recorder.measure("work", |_| std::hint::black_box(42)).unwrap();
///             recorder.into_report()
///         })
///     })
///     .collect::<Vec<_>>();
///
/// let reports = workers.into_iter().map(|worker| worker.join().unwrap());
/// let merged = Report::merge_all(reports, Some("all workers"));
///
/// let work = merged.tasks().next().unwrap();
/// assert_eq!(work.count(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct Report {
    title: Option<String>,

    // Every sample series is sorted and no node is running.
    tree: TaskTree,
}

impl Report {
    pub(crate) fn from_tree(mut tree: TaskTree) -> Self {
        for node in tree.nodes_mut() {
            node.abandon();
            node.samples_mut().sort();
        }

        Self { title: None, tree }
    }

    /// The display name of the report, if one was assigned.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Assigns a display name to the report.
    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Whether there is any recorded activity in this report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.nodes().all(|node| node.samples().is_empty())
    }

    /// The total elapsed time of all top-level tasks.
    ///
    /// Nested tasks are not added again, as their time is already part of their ancestors.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.tree.total_time()
    }

    /// Iterates over the top-level tasks, in the order they were first started.
    pub fn roots(&self) -> impl Iterator<Item = TaskReport<'_>> {
        self.tree.roots().iter().map(|&id| self.task(id))
    }

    /// Iterates over all tasks depth-first, each task followed by its subtasks.
    ///
    /// Siblings are visited in the order they were first started.
    pub fn tasks(&self) -> impl Iterator<Item = TaskReport<'_>> {
        self.tree.pre_order().into_iter().map(|id| self.task(id))
    }

    /// Merges two reports into a new report.
    ///
    /// Tasks are matched by the path of names from the top-level task down to them. Matched
    /// tasks pool their samples, as if they had been recorded by a single recorder; unmatched
    /// tasks are carried over. Tasks from `a` come first, followed by tasks only found in `b`.
    ///
    /// The merged report keeps the title of `a`, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use task_timer::{Recorder, Report};
    ///
    /// let mut recorder1 = Recorder::new();
    /// recorder1.measure("common", |_| {})?;
    ///
    /// let mut recorder2 = Recorder::new();
    /// recorder2.measure("common", |_| {})?;
    /// recorder2.measure("unique", |_| {})?;
    ///
    /// let merged = Report::merge(&recorder1.to_report(), &recorder2.to_report());
    ///
    /// let names = merged.tasks().map(|task| task.name().to_string()).collect::<Vec<_>>();
    /// assert_eq!(names, ["common", "unique"]);
    /// assert_eq!(merged.tasks().next().unwrap().count(), 2);
    /// # Ok::<(), task_timer::Error>(())
    /// ```
    #[must_use]
    pub fn merge(a: &Self, b: &Self) -> Self {
        Self {
            title: a.title.clone(),
            ..Self::from_tree(merge(a.tree.clone(), b.tree.clone()))
        }
    }

    /// Merges any number of reports, in order, into a new report with an optional title.
    ///
    /// This is equivalent to repeatedly applying [`merge()`](Self::merge) from left to right,
    /// except that the inputs are consumed instead of copied. Merging no reports yields an
    /// empty report.
    #[must_use]
    pub fn merge_all(reports: impl IntoIterator<Item = Self>, title: Option<&str>) -> Self {
        let tree = reports
            .into_iter()
            .map(|report| report.tree)
            .reduce(merge)
            .unwrap_or_default();

        Self {
            title: title.map(str::to_string),
            ..Self::from_tree(tree)
        }
    }

    /// Prints the report to stdout.
    ///
    /// Prints nothing, not even an empty line, if no task completed a cycle.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        if self.is_empty() {
            return;
        }

        println!("{self}");
    }

    fn task(&self, id: NodeId) -> TaskReport<'_> {
        TaskReport { report: self, id }
    }

    fn node(&self, id: NodeId) -> &TaskNode {
        self.tree.node(id)
    }
}

/// The measurements of a single task in a [`Report`].
///
/// Sample values are elapsed nanoseconds.
#[derive(Clone, Copy, Debug)]
pub struct TaskReport<'a> {
    report: &'a Report,
    id: NodeId,
}

impl<'a> TaskReport<'a> {
    /// The name of the task. Unique among its siblings.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.node().name()
    }

    /// How many ancestors the task has. Top-level tasks have a depth of 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.node().depth()
    }

    /// The number of completed start/stop cycles of the task.
    #[must_use]
    pub fn count(&self) -> usize {
        self.node().samples().len()
    }

    /// The elapsed time of all cycles of the task, including time spent in subtasks.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.node().total_time()
    }

    /// The elapsed time of the immediate subtasks of this task.
    #[must_use]
    pub fn subtask_time(&self) -> Duration {
        self.report.tree.subtask_time(self.id)
    }

    /// The elapsed time of the task that was not spent in its subtasks.
    ///
    /// This is never negative. If subtasks appear to take longer than the task itself,
    /// which can only result from misuse such as stopping a task before its subtasks,
    /// the self time is zero.
    #[must_use]
    pub fn self_time(&self) -> Duration {
        self.report.tree.self_time(self.id)
    }

    /// The elapsed nanoseconds of each completed cycle, in ascending order.
    #[must_use]
    pub fn samples(&self) -> &'a SampleSeries<u64> {
        self.node().samples()
    }

    /// Order statistics over the elapsed nanoseconds of the task's cycles.
    ///
    /// Only available when the task completed more than one cycle; a single sample
    /// is fully described by [`total_time()`](Self::total_time).
    #[must_use]
    pub fn statistics(&self) -> Option<Statistics<'a, u64>> {
        let samples = self.samples();

        if samples.len() > 1 {
            Statistics::from_sorted(samples)
        } else {
            None
        }
    }

    /// Iterates over the immediate subtasks, in the order they were first started.
    pub fn children(&self) -> impl Iterator<Item = TaskReport<'a>> + use<'a> {
        let report = self.report;

        self.node()
            .children()
            .iter()
            .map(move |&id| report.task(id))
    }

    fn node(&self) -> &'a TaskNode {
        self.report.node(self.id)
    }
}

impl fmt::Display for TaskReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count();

        write!(
            f,
            "{name}: {count} {calls}, total {total:?}, self {self_time:?}",
            name = self.name(),
            calls = if count == 1 { "call" } else { "calls" },
            total = self.total_time(),
            self_time = self.self_time(),
        )?;

        if let Some(statistics) = self.statistics() {
            write!(
                f,
                ", mean {:?}, median {:?}, p90 {:?}, p99 {:?}, stddev {:?}",
                Duration::from_nanos(statistics.average()),
                Duration::from_nanos(statistics.median()),
                Duration::from_nanos(
                    statistics
                        .percentile(90.0)
                        .map_err(|_error| fmt::Error)?
                ),
                Duration::from_nanos(
                    statistics
                        .percentile(99.0)
                        .map_err(|_error| fmt::Error)?
                ),
                fractional_nanos_to_duration(statistics.standard_deviation()),
            )?;
        }

        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No task timings captured.");
        }

        let title = self.title().unwrap_or("Task timings");
        writeln!(f, "{title} (total {:?}):", self.total_time())?;

        for task in self.tasks() {
            let indent = task.depth().saturating_add(1).saturating_mul(2);
            writeln!(f, "{:indent$}{task}", "")?;
        }

        Ok(())
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "float to int casts saturate, which is the desired outcome for a display value"
)]
fn fractional_nanos_to_duration(nanos: f64) -> Duration {
    Duration::from_nanos(nanos.round() as u64)
}
