#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Hierarchical task timing with order statistics and mergeable reports.
//!
//! This package measures the elapsed wall-clock time of named tasks that nest like function
//! calls. Every completed run of a task adds one sample to that task, so tasks that run
//! millions of times can be analyzed statistically afterwards: minimum, maximum, average,
//! median, any percentile and standard deviation.
//!
//! The core types are:
//!
//! - [`Recorder`] - records start/stop calls of nested tasks on one thread.
//! - [`Report`] - an immutable snapshot of a recorder, combinable with other reports.
//! - [`SampleSeries`] - a block-allocated, lazily sorted series of integer samples.
//! - [`Statistics`] - order statistics over a sorted series.
//! - [`RateLimitedSampler`] - throttles progress callbacks of high-frequency work.
//!
//! # Recording tasks
//!
//! A task started while another task is open becomes its subtask. The same name may be used
//! in different places of the hierarchy without the places affecting each other.
//!
//! ```
//! use task_timer::Recorder;
//!
//! let mut recorder = Recorder::new();
//!
//! for _ in 0..10 {
//!     recorder.start("frame")?;
//!
//!     recorder.start("update")?;
//!     std::hint::black_box((1..1000).sum::<u64>());
//!     recorder.stop();
//!
//!     recorder.start("render")?;
//!     std::hint::black_box((1..2000).sum::<u64>());
//!     recorder.stop();
//!
//!     recorder.stop();
//! }
//!
//! let report = recorder.into_report();
//!
//! for task in report.tasks() {
//!     println!("{}{}: {} samples", "  ".repeat(task.depth()), task.name(), task.count());
//! }
//!
//! // Prints nothing at all if no tasks were recorded.
//! report.print_to_stdout();
//! # Ok::<(), task_timer::Error>(())
//! ```
//!
//! Scoped recording is also available through [`Recorder::enter()`], which returns a guard
//! that stops the task when dropped, and [`Recorder::measure()`], which times a closure.
//!
//! # Statistics
//!
//! ```
//! use task_timer::SampleSeries;
//!
//! let mut series = [454_u64, 604, 499, 566, 504]
//!     .into_iter()
//!     .collect::<SampleSeries>();
//!
//! let statistics = series.statistics().unwrap();
//!
//! assert_eq!(statistics.min(), 454);
//! assert_eq!(statistics.max(), 604);
//! assert_eq!(statistics.median(), 504);
//! assert_eq!(statistics.average(), 525);
//! assert_eq!(statistics.percentile(90.0)?, 604);
//! # Ok::<(), task_timer::Error>(())
//! ```
//!
//! Averages and medians are rounded half-up to the unit of the samples. Percentiles use the
//! nearest-rank method and always return one of the samples.
//!
//! # Threading
//!
//! A [`Recorder`] models the call stack of a single thread. To measure work on several
//! threads, give each thread its own recorder, send the reports back and combine them:
//!
//! ```
//! use std::thread;
//!
//! use task_timer::{Recorder, Report};
//!
//! let reports = (0..4)
//!     .map(|_| {
//!         thread::spawn(|| {
//!             let mut recorder = Recorder::new();
//!             recorder.measure("work", |_| std::hint::black_box(42))?;
//!             Ok::<_, task_timer::Error>(recorder.into_report())
//!         })
//!     })
//!     .collect::<Vec<_>>()
//!     .into_iter()
//!     .map(|handle| handle.join().unwrap())
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let combined = Report::merge_all(reports, Some("all threads"));
//!
//! assert_eq!(combined.tasks().next().unwrap().count(), 4);
//! # Ok::<(), task_timer::Error>(())
//! ```
//!
//! # Logging
//!
//! The package emits [`tracing`](https://docs.rs/tracing) events: `debug` when task nodes are
//! created or reports are merged, `trace` for every start and stop and `warn` when a task is
//! stopped while its subtasks are still open. No subscriber is installed by the package.

mod error;
mod merge;
mod pal;
mod rate_limited_sampler;
mod recorder;
mod recorder_builder;
mod report;
mod sample_series;
mod statistics;
mod task_guard;
mod task_node;
mod task_tree;

pub use error::Error;
pub(crate) use error::Result;
pub use rate_limited_sampler::*;
pub use recorder::*;
pub use recorder_builder::*;
pub use report::*;
pub use sample_series::{DEFAULT_BLOCK_SIZE, Iter, SampleSeries};
pub use statistics::*;
pub use task_guard::*;
