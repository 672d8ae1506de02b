use std::{thread, time::Duration};

use crossbeam::channel;
use statebench::{LatencyHistogram, LatencyStats, Result};

fn within_bucket(actual: Duration, exact: Duration) -> bool {
    actual >= exact && actual <= exact + exact / 32
}

#[test]
fn test_histogram_mean_and_percentiles() -> Result<()> {
    let mut histogram = LatencyHistogram::new();
    for us in (1..=1_000).rev() {
        histogram.record(Duration::from_micros(us));
    }

    let stats = histogram.stats();
    assert_eq!(stats.count, 1_000);
    assert_eq!(stats.total, Duration::from_micros(500_500));
    assert_eq!(stats.mean, Duration::from_nanos(500_500));
    assert_eq!(stats.min, Duration::from_micros(1));
    assert_eq!(stats.max, Duration::from_micros(1_000));
    assert!(within_bucket(stats.p50, Duration::from_micros(500)), "{:?}", stats.p50);
    assert!(within_bucket(stats.p95, Duration::from_micros(950)), "{:?}", stats.p95);
    assert!(within_bucket(stats.p99, Duration::from_micros(990)), "{:?}", stats.p99);
    assert!(stats.p99 <= stats.max);
    assert_eq!(histogram.percentile(1.0), stats.max);
    assert!(within_bucket(histogram.percentile(0.0), stats.min));
    Ok(())
}

#[test]
fn test_small_latencies_are_exact() -> Result<()> {
    let mut histogram = LatencyHistogram::new();
    for ns in 1..=20 {
        histogram.record(Duration::from_nanos(ns));
    }
    assert_eq!(histogram.percentile(0.5), Duration::from_nanos(10));
    assert_eq!(histogram.percentile(0.25), Duration::from_nanos(5));
    assert_eq!(histogram.stats().mean, Duration::from_nanos(10));
    Ok(())
}

#[test]
fn test_extreme_latencies_do_not_overflow() -> Result<()> {
    let mut histogram = LatencyHistogram::new();
    histogram.record(Duration::MAX);
    histogram.record(Duration::ZERO);
    let stats = histogram.stats();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.max, Duration::from_nanos(u64::MAX));
    assert_eq!(stats.mean, Duration::from_nanos(u64::MAX / 2));
    assert_eq!(stats.p99, stats.max);
    Ok(())
}

#[test]
fn test_collect_streams_until_senders_drop() -> Result<()> {
    let (tx, rx) = channel::bounded(4);
    let senders: Vec<_> = (0..4)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                for ms in 1..=250 {
                    tx.send(Duration::from_millis(ms)).expect("aggregator");
                }
            })
        })
        .collect();
    drop(tx);

    let stats = LatencyStats::collect(rx);
    for sender in senders {
        sender.join().expect("sender thread");
    }
    assert_eq!(stats.count, 1_000);
    assert_eq!(stats.mean, Duration::from_micros(125_500));
    assert!(within_bucket(stats.p50, Duration::from_millis(125)), "{:?}", stats.p50);

    let (tx, rx) = channel::unbounded::<Duration>();
    drop(tx);
    assert_eq!(LatencyStats::collect(rx), LatencyStats::default());
    Ok(())
}
