//! Basic usage of `task_timer`: nested tasks, guards and the printed report.
//!
//! Run with: `cargo run --example task_timer_basic`

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use task_timer::{Error, Recorder};

fn main() -> Result<(), Error> {
    let mut recorder = Recorder::new();

    for frame in 0..20_u64 {
        let mut frame_task = recorder.enter("frame")?;

        frame_task.start("update")?;
        black_box((0..frame.wrapping_mul(1000)).sum::<u64>());
        frame_task.stop();

        frame_task.measure("render", |recorder| -> Result<(), Error> {
            recorder.measure("upload", |_| thread::sleep(Duration::from_micros(200)))?;
            thread::sleep(Duration::from_micros(500));
            Ok(())
        })??;
    }

    let report = recorder.into_report().with_title("Game loop");
    report.print_to_stdout();

    for task in report.tasks() {
        if let Some(statistics) = task.statistics() {
            println!(
                "{}: p50 {:?}, p99 {:?}",
                task.name(),
                Duration::from_nanos(statistics.median()),
                Duration::from_nanos(statistics.percentile(99.0)?)
            );
        }
    }

    Ok(())
}
