//! End-to-end tests of recording with the real clock and inspecting the resulting reports.

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use task_timer::{Error, Recorder, Report};

fn busy_work(rounds: u64) -> u64 {
    (0..rounds).fold(0_u64, |acc, value| black_box(acc.wrapping_add(value)))
}

#[test]
fn sample_count_matches_completed_cycles() {
    let mut recorder = Recorder::new();

    for _ in 0..250 {
        recorder.start("cycle").unwrap();
        busy_work(10);
        recorder.stop();
    }

    let report = recorder.into_report();
    let cycle = report.tasks().next().unwrap();

    assert_eq!(cycle.count(), 250);

    let sample_sum = cycle.samples().iter().map(u128::from).sum::<u128>();
    assert_eq!(sample_sum, cycle.total_time().as_nanos());
}

#[test]
fn parents_include_children_and_totals_include_roots_only() {
    let mut recorder = Recorder::new();

    recorder
        .measure("outer", |recorder| {
            for _ in 0..5 {
                recorder.measure("inner", |_| busy_work(1000)).unwrap();
            }
        })
        .unwrap();

    recorder
        .measure("second", |_| {
            thread::sleep(Duration::from_millis(1));
        })
        .unwrap();

    let report = recorder.to_report();
    let roots = report.roots().collect::<Vec<_>>();
    assert_eq!(roots.len(), 2);

    let outer = roots.first().unwrap();
    let inner = outer.children().next().unwrap();

    assert_eq!(inner.count(), 5);
    assert!(outer.total_time() >= inner.total_time());
    assert_eq!(outer.self_time(), outer.total_time() - inner.total_time());

    let expected_total = roots.iter().map(|root| root.total_time()).sum::<Duration>();
    assert_eq!(report.total_time(), expected_total);
    assert_eq!(recorder.total_time(), expected_total);
}

#[test]
fn statistics_are_consistent_with_samples() {
    let mut recorder = Recorder::new();

    for rounds in [100, 1_000, 10_000, 100, 1_000] {
        recorder.measure("work", |_| busy_work(rounds)).unwrap();
    }

    let report = recorder.into_report();
    let work = report.tasks().next().unwrap();
    let statistics = work.statistics().unwrap();

    assert_eq!(statistics.count(), 5);
    assert!(statistics.min() <= statistics.median());
    assert!(statistics.median() <= statistics.max());
    assert!(statistics.min() <= statistics.average());
    assert!(statistics.average() <= statistics.max());
    assert_eq!(statistics.percentile(100.0).unwrap(), statistics.max());
    assert!(statistics.standard_deviation() >= 0.0);

    // Report samples are always sorted.
    let samples = work.samples().iter().collect::<Vec<_>>();
    assert!(samples.is_sorted());
}

#[test]
fn guards_and_explicit_calls_can_be_mixed() {
    let mut recorder = Recorder::new();

    {
        let mut request = recorder.enter("request").unwrap();

        request.start("parse").unwrap();
        busy_work(100);
        request.stop();

        let mut respond = request.enter("respond").unwrap();
        respond.measure("serialize", |_| busy_work(100)).unwrap();
    }

    assert!(!recorder.is_any_running());

    let names = recorder
        .to_report()
        .tasks()
        .map(|task| (task.depth(), task.name().to_string()))
        .collect::<Vec<_>>();

    assert_eq!(
        names,
        vec![
            (0, "request".to_string()),
            (1, "parse".to_string()),
            (1, "respond".to_string()),
            (2, "serialize".to_string()),
        ]
    );
}

#[test]
fn errors_leave_recorder_usable() {
    let mut recorder = Recorder::new();

    assert!(matches!(recorder.start(""), Err(Error::EmptyTaskName)));
    assert!(matches!(
        recorder.stop_named("missing"),
        Err(Error::NotRunning { .. })
    ));
    assert!(!recorder.stop());

    recorder.measure("after_errors", |_| ()).unwrap();

    assert_eq!(recorder.to_report().tasks().count(), 1);
}

#[test]
fn display_lists_every_task() {
    let mut recorder = Recorder::new();

    for _ in 0..3 {
        recorder
            .measure("frame", |recorder| {
                recorder.measure("update", |_| busy_work(100)).unwrap();
                recorder.measure("render", |_| busy_work(100)).unwrap();
            })
            .unwrap();
    }

    let rendered = recorder.into_report().with_title("Frames").to_string();
    let lines = rendered.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 4);
    assert!(lines.first().unwrap().starts_with("Frames (total "));
    assert!(lines.get(1).unwrap().starts_with("  frame: 3 calls, total "));
    assert!(lines.get(2).unwrap().starts_with("    update: 3 calls"));
    assert!(lines.get(3).unwrap().starts_with("    render: 3 calls"));
    assert!(lines.get(1).unwrap().contains("median"));
}

#[test]
fn empty_report_displays_placeholder() {
    let report = Recorder::new().into_report();

    assert!(report.is_empty());
    assert_eq!(report.to_string(), "No task timings captured.\n");

    // Prints nothing, which cannot be asserted here, but must not panic.
    report.print_to_stdout();

    let merged = Report::merge(&report, &report);
    assert!(merged.is_empty());
}
