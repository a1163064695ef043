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

use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    error::SegmentError,
    progress::ProgressReporter,
    segment_fetcher::SegmentFetcher,
    types::{DownloadJob, Segment, SegmentOutcome, SegmentResult},
};

/// Runs one fetcher task per segment and waits for all of them to report.
pub struct ParallelFetchManager {
    client:       reqwest::Client,
    write_buffer: usize,
}

impl ParallelFetchManager {
    pub const fn new(client: reqwest::Client, write_buffer: usize) -> Self {
        Self {
            client,
            write_buffer,
        }
    }

    /// Fetch every segment concurrently.
    ///
    /// Returns one result per segment, ordered by index. The first segment
    /// failure cancels `cancel`, which aborts every fetcher still running.
    pub async fn fetch_all(
        &self,
        job: &DownloadJob,
        segments: &[Segment],
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Vec<SegmentResult> {
        let (tx, mut rx) = mpsc::channel(segments.len().max(1));
        let mut tasks = self.spawn_workers(job, segments, &progress, &cancel, &tx);
        drop(tx);
        drop(progress);

        let mut results: Vec<Option<SegmentResult>> = segments.iter().map(|_| None).collect();
        while let Some(result) = rx.recv().await {
            if let SegmentOutcome::Failure(ref e) = result.outcome
                && !matches!(e, SegmentError::Aborted)
                && !cancel.is_cancelled()
            {
                warn!(
                    segment = result.index,
                    error = %e,
                    "aborting remaining segments"
                );
                cancel.cancel();
            }
            let index = result.index;
            results[index] = Some(result);
        }

        Self::reap_workers(&mut tasks).await;

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.unwrap_or(SegmentResult {
                    index,
                    outcome: SegmentOutcome::Failure(SegmentError::Panicked),
                })
            })
            .collect()
    }

    fn spawn_workers(
        &self,
        job: &DownloadJob,
        segments: &[Segment],
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        results: &mpsc::Sender<SegmentResult>,
    ) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for segment in segments.iter().copied() {
            let fetcher = SegmentFetcher::new(
                self.client.clone(),
                job.url.clone(),
                job.range_unit.clone(),
                self.write_buffer,
                progress.clone(),
                cancel.clone(),
            );
            let part_path = job.part_path(segment.index);
            let results = results.clone();

            tasks.spawn(async move {
                let result = fetcher.fetch(&segment, &part_path).await;
                // The receiver outlives every sender.
                let _ = results.send(result).await;
            });
        }
        tasks
    }

    /// Wait for every worker task to exit. A panicked worker never sent its
    /// result; the caller fills that gap.
    async fn reap_workers(tasks: &mut JoinSet<()>) {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined
                && e.is_panic()
            {
                error!(error = %e, "segment task panicked");
            }
        }
    }
}
