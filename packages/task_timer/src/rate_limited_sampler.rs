//! Throttling of progress callbacks for high-frequency tasks.

use std::any::type_name;
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::pal::{Platform, PlatformFacade};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_THREAD_NAME: &str = "task-timer-sampler";

type Callback<V> = Box<dyn FnMut(&V, &V, Duration) + Send>;

/// Forwards progress updates to a callback at most once per interval.
///
/// A background thread re-arms the sampler once per interval. The first [`update()`] after
/// re-arming invokes the callback with the value of the previous emission, the new value and
/// the time elapsed since the previous emission. All other updates are dropped without blocking.
///
/// Rate limiting is best-effort: an update racing with the re-arm can cause one extra
/// emission in an interval. Intervals without updates produce no emission, so the callback
/// reports progress since the last report rather than acting as a heartbeat.
///
/// Dropping the sampler stops and joins the background thread.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use task_timer::RateLimitedSampler;
///
/// let sampler = RateLimitedSampler::builder()
///     .interval(Duration::from_millis(100))
///     .build(0_u64, |previous, current, elapsed| {
///         println!("processed {} items in {elapsed:?}", current - previous);
///     });
///
/// for processed in 1..=1000_u64 {
///     sampler.update(processed);
/// }
/// ```
///
/// [`update()`]: Self::update
pub struct RateLimitedSampler<V> {
    ready: Arc<AtomicBool>,
    state: Mutex<EmissionState<V>>,
    platform: PlatformFacade,
    interval: Duration,

    // Dropping the sender wakes up and stops the re-arm thread.
    shutdown_tx: Option<Sender<()>>,
    rearm_thread: Option<JoinHandle<()>>,
}

struct EmissionState<V> {
    previous: V,
    last_emission: Instant,
    callback: Callback<V>,
}

impl RateLimitedSampler<()> {
    /// Starts building a sampler.
    ///
    /// The value type is chosen when calling [`build()`](RateLimitedSamplerBuilder::build).
    pub fn builder() -> RateLimitedSamplerBuilder {
        RateLimitedSamplerBuilder::new()
    }
}

impl<V> RateLimitedSampler<V>
where
    V: Send + 'static,
{
    fn start(
        initial: V,
        callback: Callback<V>,
        interval: Duration,
        thread_name: String,
        platform: PlatformFacade,
    ) -> Self {
        let ready = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let thread_ready = Arc::clone(&ready);
        let rearm_thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                debug!(?interval, "sampler thread started");
                rearm_loop(&thread_ready, &shutdown_rx, interval);
                debug!("sampler thread exiting");
            })
            .expect("failed to spawn sampler thread: thread spawning failure is not supported");

        let state = EmissionState {
            previous: initial,
            last_emission: platform.now(),
            callback,
        };

        Self {
            ready,
            state: Mutex::new(state),
            platform,
            interval,
            shutdown_tx: Some(shutdown_tx),
            rearm_thread: Some(rearm_thread),
        }
    }

    /// Reports a new value.
    ///
    /// Invokes the callback if the sampler has been re-armed since the last emission and
    /// returns whether it did. Never waits for the next interval.
    pub fn update(&self, value: V) -> bool {
        if !self.ready.load(Ordering::Acquire) {
            return false;
        }

        // A separate store instead of a swap: a re-arm landing in between is simply consumed
        // by the next update.
        self.ready.store(false, Ordering::Relaxed);

        // Another thread is emitting right now, which already satisfies this interval.
        let Some(mut state) = self.state.try_lock() else {
            return false;
        };

        let now = self.platform.now();
        let elapsed = now.saturating_duration_since(state.last_emission);

        let EmissionState {
            previous, callback, ..
        } = &mut *state;
        callback(previous, &value, elapsed);

        state.previous = value;
        state.last_emission = now;

        true
    }

    /// The minimum time between two emissions.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[cfg(test)]
    pub(crate) fn rearm(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

impl<V> fmt::Debug for RateLimitedSampler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("interval", &self.interval)
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<V> Drop for RateLimitedSampler<V> {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());

        let Some(handle) = self.rearm_thread.take() else {
            return;
        };

        if let Err(payload) = handle.join() {
            // The re-arm loop has no reason to panic. If it did, do not hide it.
            panic::resume_unwind(payload);
        }
    }
}

fn rearm_loop(ready: &AtomicBool, shutdown_rx: &Receiver<()>, interval: Duration) {
    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                ready.store(true, Ordering::Release);
                trace!("sampler re-armed");
            }
            // Nothing is ever sent. Disconnection means the sampler was dropped.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Configures and creates a [`RateLimitedSampler`].
///
/// Obtained via [`RateLimitedSampler::builder()`].
#[derive(Debug)]
#[must_use]
pub struct RateLimitedSamplerBuilder {
    interval: Duration,
    thread_name: String,
    platform: PlatformFacade,
}

impl RateLimitedSamplerBuilder {
    fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            platform: PlatformFacade::real(),
        }
    }

    /// Sets the minimum time between two emissions. Defaults to one second.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "sampler interval cannot be zero");

        self.interval = interval;
        self
    }

    /// Sets the name of the background thread that re-arms the sampler.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[cfg(test)]
    pub(crate) fn platform(mut self, platform: PlatformFacade) -> Self {
        self.platform = platform;
        self
    }

    /// Creates the sampler and starts its background thread.
    ///
    /// `callback` receives the value of the previous emission (`initial` for the first one),
    /// the current value and the time since the previous emission (or since `build()`).
    ///
    /// # Panics
    ///
    /// Panics if the background thread cannot be spawned.
    #[must_use]
    pub fn build<V, F>(self, initial: V, callback: F) -> RateLimitedSampler<V>
    where
        V: Send + 'static,
        F: FnMut(&V, &V, Duration) + Send + 'static,
    {
        RateLimitedSampler::start(
            initial,
            Box::new(callback),
            self.interval,
            self.thread_name,
            self.platform,
        )
    }
}
