use thiserror::Error;

/// Errors that can occur when recording tasks or querying their samples.
///
/// All of these are contract violations by the caller. None of them leave the recorder or
/// series in an inconsistent state and none of them are worth retrying.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A task was identified by an empty or whitespace-only name.
    #[error("task name must not be empty or blank")]
    EmptyTaskName,

    /// A task was stopped by name but no task with that name is currently open.
    #[error("task '{name}' is not running")]
    NotRunning {
        /// The name the caller tried to stop.
        name: String,
    },

    /// A sample was accessed at a position outside the bounds of the series.
    #[error("sample index {index} is out of range for a series of {len} samples")]
    IndexOutOfRange {
        /// The requested position.
        index: usize,

        /// The number of samples in the series at the time of the access.
        len: usize,
    },

    /// A percentile outside of the `(0, 100]` range was requested.
    #[error("percentile {percentile} is outside of the valid range (0, 100]")]
    InvalidPercentile {
        /// The requested percentile.
        percentile: f64,
    },
}

/// A specialized `Result` type for task timing operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
