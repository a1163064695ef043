// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Aggregated download progress.
//!
//! [`ProgressAggregator`] is the only owner of the byte counters. Fetchers
//! hold a cloned [`ProgressReporter`] and send it the size of every write;
//! the aggregator task drains those reports and, on a fixed cadence, hands a
//! [`ProgressSnapshot`] to a [`ProgressObserver`]. Both duties run in one
//! `select!` loop, so no lock is ever taken on the counters.

use std::{fmt, sync::Arc, time::Duration};

use rangefetch_base::readable_size::ReadableSize;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{info, trace, warn};

/// Shortest accepted reporting interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Point-in-time view of the download, emitted once per interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_so_far:   u64,
    pub expected_total: u64,
    /// Throughput since the previous snapshot, in MiB/s
    pub rate_mib:       f64,
}

impl ProgressSnapshot {
    /// Completion in percent, 100 for an empty resource.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.expected_total == 0 {
            return 100.0;
        }
        self.bytes_so_far as f64 * 100.0 / self.expected_total as f64
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Downloading... {:.2} MiB of {:.2} MiB ({:.1}%) at {:.2} MiB/s",
            ReadableSize(self.bytes_so_far).as_mib_f64(),
            ReadableSize(self.expected_total).as_mib_f64(),
            self.percent(),
            self.rate_mib
        )
    }
}

/// Final counters, returned when the aggregator task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub bytes_so_far:   u64,
    pub expected_total: u64,
    pub completed:      bool,
}

/// Receives progress from the aggregator task.
///
/// Called from inside the aggregator loop, so implementations should not
/// block.
pub trait ProgressObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &ProgressSnapshot);

    /// Called exactly once, when the last expected byte has been reported.
    fn on_complete(&self, _total: u64) {}
}

/// Logs every snapshot at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_snapshot(&self, snapshot: &ProgressSnapshot) {
        info!(
            bytes = snapshot.bytes_so_far,
            total = snapshot.expected_total,
            rate_mib = snapshot.rate_mib,
            "{snapshot}"
        );
    }

    fn on_complete(&self, total: u64) {
        info!(total, "all bytes received");
    }
}

/// Sending half handed to each fetcher.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<u64>,
}

impl ProgressReporter {
    /// Report `bytes` freshly written to a part file.
    pub fn report(&self, bytes: u64) {
        // Fails only if the aggregator task is gone.
        let _ = self.tx.send(bytes);
    }
}

struct ProgressState {
    bytes_so_far:      u64,
    expected_total:    u64,
    last_sample_bytes: u64,
    last_sample_time:  Instant,
    completed:         bool,
}

/// Single owner of the progress counters.
pub struct ProgressAggregator {
    state:    ProgressState,
    interval: Duration,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressAggregator {
    pub fn new(
        expected_total: u64,
        interval: Duration,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            state: ProgressState {
                bytes_so_far: 0,
                expected_total,
                last_sample_bytes: 0,
                last_sample_time: Instant::now(),
                completed: false,
            },
            interval: interval.max(MIN_INTERVAL),
            observer,
        }
    }

    /// Start the aggregator task.
    ///
    /// The task runs until every clone of the returned reporter is dropped.
    pub fn spawn(self) -> (ProgressReporter, JoinHandle<ProgressSummary>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (ProgressReporter { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<u64>) -> ProgressSummary {
        if self.state.expected_total == 0 {
            self.finish();
        }

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                report = rx.recv() => match report {
                    Some(bytes) => self.record(bytes),
                    None => break,
                },
                _ = ticker.tick(), if !self.state.completed => self.sample(),
            }
        }

        ProgressSummary {
            bytes_so_far:   self.state.bytes_so_far,
            expected_total: self.state.expected_total,
            completed:      self.state.completed,
        }
    }

    fn record(&mut self, bytes: u64) {
        if self.state.completed {
            trace!(bytes, "progress report after completion ignored");
            return;
        }

        let remaining = self.state.expected_total - self.state.bytes_so_far;
        if bytes > remaining {
            warn!(bytes, remaining, "progress report exceeds expected total, clamping");
        }
        self.state.bytes_so_far += bytes.min(remaining);

        if self.state.bytes_so_far == self.state.expected_total {
            self.finish();
        }
    }

    fn sample(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.state.last_sample_time);
        let delta = self.state.bytes_so_far - self.state.last_sample_bytes;
        let rate_mib = if elapsed.is_zero() {
            0.0
        } else {
            ReadableSize(delta).as_mib_f64() / elapsed.as_secs_f64()
        };

        self.state.last_sample_bytes = self.state.bytes_so_far;
        self.state.last_sample_time = now;

        self.observer.on_snapshot(&ProgressSnapshot {
            bytes_so_far: self.state.bytes_so_far,
            expected_total: self.state.expected_total,
            rate_mib,
        });
    }

    fn finish(&mut self) {
        self.state.completed = true;
        self.sample();
        self.observer.on_complete(self.state.expected_total);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[derive(Default)]
    struct RecordingObserver {
        snapshots: Mutex<Vec<ProgressSnapshot>>,
        completed: AtomicUsize,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_snapshot(&self, snapshot: &ProgressSnapshot) {
            self.snapshots.lock().unwrap().push(*snapshot);
        }

        fn on_complete(&self, _total: u64) { self.completed.fetch_add(1, Ordering::SeqCst); }
    }

    #[tokio::test]
    async fn test_completes_exactly_once() {
        let observer = Arc::new(RecordingObserver::default());
        let (reporter, handle) =
            ProgressAggregator::new(1000, Duration::from_secs(1), observer.clone()).spawn();

        let other = reporter.clone();
        reporter.report(400);
        other.report(600);
        // Late report after completion is a no-op.
        other.report(100);
        drop(reporter);
        drop(other);

        let summary = handle.await.unwrap();
        assert_eq!(
            summary,
            ProgressSummary {
                bytes_so_far:   1000,
                expected_total: 1000,
                completed:      true,
            }
        );
        assert_eq!(observer.completed.load(Ordering::SeqCst), 1);

        let snapshots = observer.snapshots.lock().unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(last.bytes_so_far, 1000);
        assert!(snapshots.iter().all(|s| s.bytes_so_far <= 1000));
    }

    #[tokio::test]
    async fn test_never_exceeds_expected_total() {
        let observer = Arc::new(RecordingObserver::default());
        let (reporter, handle) =
            ProgressAggregator::new(100, Duration::from_secs(1), observer.clone()).spawn();

        reporter.report(60);
        reporter.report(60);
        drop(reporter);

        let summary = handle.await.unwrap();
        assert_eq!(summary.bytes_so_far, 100);
        assert!(summary.completed);
        assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incomplete_when_reporters_dropped_early() {
        let observer = Arc::new(RecordingObserver::default());
        let (reporter, handle) =
            ProgressAggregator::new(100, Duration::from_secs(1), observer.clone()).spawn();

        reporter.report(30);
        drop(reporter);

        let summary = handle.await.unwrap();
        assert_eq!(summary.bytes_so_far, 30);
        assert!(!summary.completed);
        assert_eq!(observer.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_resource_is_complete_immediately() {
        let observer = Arc::new(RecordingObserver::default());
        let (reporter, handle) =
            ProgressAggregator::new(0, Duration::from_secs(1), observer.clone()).spawn();
        drop(reporter);

        let summary = handle.await.unwrap();
        assert!(summary.completed);
        assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_snapshot_reports_rate() {
        let observer = Arc::new(RecordingObserver::default());
        let total = ReadableSize::mb(4).as_bytes();
        let (reporter, handle) =
            ProgressAggregator::new(total, Duration::from_secs(1), observer.clone()).spawn();

        reporter.report(ReadableSize::kb(512).as_bytes());
        time::sleep(Duration::from_millis(1500)).await;

        {
            let snapshots = observer.snapshots.lock().unwrap();
            assert_eq!(snapshots.len(), 1);
            let snapshot = snapshots[0];
            assert_eq!(snapshot.bytes_so_far, ReadableSize::kb(512).as_bytes());
            assert!((snapshot.rate_mib - 0.5).abs() < 1e-9);
            assert!((snapshot.percent() - 12.5).abs() < 1e-9);
        }

        // Nothing new arrived: the next sample reports a zero rate.
        time::sleep(Duration::from_secs(1)).await;
        {
            let snapshots = observer.snapshots.lock().unwrap();
            assert_eq!(snapshots.len(), 2);
            assert!(snapshots[1].rate_mib.abs() < 1e-9);
        }

        drop(reporter);
        let summary = handle.await.unwrap();
        assert!(!summary.completed);
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = ProgressSnapshot {
            bytes_so_far:   ReadableSize::mb(1).as_bytes() + ReadableSize::kb(256).as_bytes(),
            expected_total: ReadableSize::mb(8).as_bytes(),
            rate_mib:       0.75,
        };
        assert_eq!(
            snapshot.to_string(),
            "Downloading... 1.25 MiB of 8.00 MiB (15.6%) at 0.75 MiB/s"
        );
    }
}
