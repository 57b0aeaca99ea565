//! Behavioural tests for windowed counters and averages.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use winmetrics_core::{Metric, Mode, WindowedAverage, WindowedCounter};

#[tokio::test]
async fn cumulative_never_resets() {
    let c = WindowedCounter::new(Duration::from_millis(100), 1);
    assert_eq!(c.mode(), Mode::Cumulative);
    for _ in 0..37 {
        c.add(1);
    }
    assert_eq!(c.rate(), 37);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(c.rate(), 37);
}

#[tokio::test]
async fn zero_interval_is_cumulative() {
    let c = WindowedCounter::new(Duration::ZERO, 32);
    assert_eq!(c.mode(), Mode::Cumulative);
    c.add(5);
    assert_eq!(c.rate(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_are_conserved() {
    let c = Arc::new(WindowedCounter::windowed(Duration::from_secs(3600)));
    assert!(matches!(c.mode(), Mode::Windowed { granularity: 32, .. }));

    let producers = (0..10).map(|_| {
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            for _ in 0..1000 {
                c.add(1);
            }
        })
    });
    for r in join_all(producers).await {
        r.unwrap();
    }

    assert_eq!(c.rate(), 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_events_decay_out_of_window() {
    let c = WindowedCounter::new(Duration::from_secs(1), 4);
    assert_eq!(
        c.mode(),
        Mode::Windowed {
            interval: Duration::from_secs(1),
            granularity: 4
        }
    );
    c.add(1);
    assert_eq!(c.rate(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(c.rate(), 1, "still inside the window");

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(c.rate(), 0);
}

#[tokio::test]
async fn average_of_samples() {
    let a = WindowedAverage::windowed(Duration::from_secs(3600));
    a.add(10);
    a.add(20);
    a.add(30);
    assert_eq!(a.average(), 20);
    assert_eq!(a.tally().sum, 60);
    assert_eq!(a.tally().count, 3);
}

#[tokio::test]
async fn average_truncates() {
    let a = WindowedAverage::cumulative();
    a.add(1);
    a.add(2);
    assert_eq!(a.average(), 1);
}

#[tokio::test]
async fn empty_average_is_zero() {
    let a = WindowedAverage::windowed(Duration::from_secs(60));
    assert_eq!(a.average(), 0);
    assert_eq!(a.as_text(), "0");

    let b = WindowedAverage::cumulative();
    assert_eq!(b.average(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn average_decays_to_zero() {
    let a = WindowedAverage::new(Duration::from_millis(400), 4);
    a.add(100);
    assert_eq!(a.average(), 100);
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(a.average(), 0);
}

#[tokio::test]
async fn text_parses_back_to_value() {
    let c = WindowedCounter::cumulative();
    for n in [0, 1, 9, 1_000, -4, i64::MAX / 2] {
        c.add(n);
        let text = c.as_text();
        assert!(!text.is_empty());
        assert_eq!(text.parse::<i64>().unwrap(), c.rate());
        assert_eq!(c.to_string(), text);
    }

    let a = WindowedAverage::cumulative();
    a.add(-7);
    a.add(3);
    assert_eq!(a.as_text().parse::<i64>().unwrap(), a.average());
    assert_eq!(a.as_text(), "-2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_counter_stops_decaying() {
    let c = WindowedCounter::new(Duration::from_millis(200), 4);
    c.add(3);
    c.close();
    // two full windows: an open counter would have decayed to zero
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(c.rate(), 3);
    c.add(1);
    assert_eq!(c.rate(), 4);
}

#[test]
fn without_runtime_still_decays() {
    let c = WindowedCounter::new(Duration::from_millis(200), 4);
    assert!(matches!(c.mode(), Mode::Windowed { granularity: 4, .. }));
    c.add(1);
    assert_eq!(c.rate(), 1);

    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(c.rate(), 0);

    c.add(2);
    c.close();
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(c.rate(), 2);
}

/// Eight OS threads adding as fast as they can into a window that rotates
/// every 10ms but never evicts. Returns the number of events added.
fn hammer(c: &WindowedCounter) -> i64 {
    let deadline = Instant::now() + Duration::from_millis(400);
    std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let mut n = 0i64;
                    while Instant::now() < deadline {
                        for _ in 0..64 {
                            c.add(1);
                        }
                        n += 64;
                    }
                    n
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    })
}

#[test]
fn writes_racing_rotation_are_visible_after_one_tick() {
    let c = WindowedCounter::new(Duration::from_secs(30), 3000);
    let total = hammer(&c);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(c.rate(), total);
    c.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writes_racing_task_rotation_are_visible_after_one_tick() {
    let c = WindowedCounter::new(Duration::from_secs(30), 3000);
    let total = tokio::task::block_in_place(|| hammer(&c));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.rate(), total);
    c.close();
}

#[test]
fn average_without_runtime_decays() {
    let a = WindowedAverage::new(Duration::from_millis(200), 4);
    a.add(40);
    a.add(60);
    assert_eq!(a.average(), 50);
    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(a.tally().count, 0);
    assert_eq!(a.average(), 0);
}
