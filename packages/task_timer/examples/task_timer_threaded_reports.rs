//! Recording on multiple threads with one recorder per thread and merging the reports,
//! while a rate-limited sampler reports overall progress.
//!
//! Run with: `cargo run --example task_timer_threaded_reports`

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use task_timer::{RateLimitedSampler, Recorder, Report};

const ITEMS_PER_THREAD: u64 = 200;

fn main() {
    let processed = Arc::new(AtomicU64::new(0));

    let sampler = Arc::new(
        RateLimitedSampler::builder()
            .interval(Duration::from_millis(50))
            .thread_name("progress")
            .build(0_u64, |previous, current, elapsed| {
                println!(
                    "progress: {current} items ({} since last report, {elapsed:?} ago)",
                    current.saturating_sub(*previous)
                );
            }),
    );

    let handles = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(|thread_name| {
            let processed = Arc::clone(&processed);
            let sampler = Arc::clone(&sampler);

            thread::Builder::new()
                .name(thread_name.to_string())
                .spawn(move || worker(thread_name, &processed, &sampler))
                .expect("failed to spawn worker thread")
        })
        .collect::<Vec<_>>();

    let reports = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread panicked"))
        .collect::<Vec<_>>();

    for report in &reports {
        report.print_to_stdout();
        println!();
    }

    let merged = Report::merge_all(reports, Some("All workers"));
    merged.print_to_stdout();
}

fn worker(thread_name: &str, processed: &AtomicU64, sampler: &RateLimitedSampler<u64>) -> Report {
    let mut recorder = Recorder::new();

    for item in 0..ITEMS_PER_THREAD {
        recorder
            .measure("item", |recorder| {
                recorder
                    .measure("decode", |_| black_box((0..item).sum::<u64>()))
                    .expect("task name is valid");

                // Only this thread's items go through here, so the merged report shows it
                // separately from the other threads' tasks.
                recorder
                    .measure(thread_name, |_| thread::sleep(Duration::from_micros(300)))
                    .expect("task name is valid");
            })
            .expect("task name is valid");

        let total = processed.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        sampler.update(total);
    }

    recorder.into_report().with_title(thread_name)
}
