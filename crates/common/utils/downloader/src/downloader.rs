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

use std::{path::PathBuf, sync::Arc};

use jiff::Timestamp;
use snafu::{ResultExt, ensure};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    chunk_merger::ChunkMerger,
    config::DownloaderConfig,
    error::{
        AggregateFailureSnafu, CancelledSnafu, DownloadError, FileWriteSnafu, HttpClientSnafu,
        SegmentFailure, TaskPanicSnafu,
    },
    file_info::{FileInfoFetcher, derive_output_name, sanitize_file_name},
    parallel_manager::ParallelFetchManager,
    progress::{ProgressAggregator, ProgressObserver, TracingObserver},
    range::calculate_segments,
    types::{DownloadJob, DownloadRequest, DownloadResult, Segment, SegmentOutcome, SegmentResult},
};

/// Parallel range downloader.
///
/// Components:
/// - `FileInfoFetcher`: validates the resource with a HEAD request
/// - `calculate_segments`: splits the resource into contiguous byte ranges
/// - `ProgressAggregator`: owns the byte counters and reports progress
/// - `ParallelFetchManager`: runs one fetcher per segment and collects results
/// - `ChunkMerger`: concatenates the part files into the final file
pub struct Downloader {
    config:    DownloaderConfig,
    file_info: FileInfoFetcher,
    parallel:  ParallelFetchManager,
    observer:  Arc<dyn ProgressObserver>,
}

impl Downloader {
    /// Create a new downloader with the given configuration.
    ///
    /// Progress is logged through [`TracingObserver`] unless another observer
    /// is set with [`Downloader::with_observer`].
    pub fn new(config: DownloaderConfig) -> Result<Self, DownloadError> {
        let client = Self::build_client(&config)?;
        let file_info = FileInfoFetcher::new(client.clone());
        let parallel = ParallelFetchManager::new(client, config.write_buffer.as_usize());

        Ok(Self {
            config,
            file_info,
            parallel,
            observer: Arc::new(TracingObserver),
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &DownloaderConfig { &self.config }

    /// Validate the resource and split it into segments without downloading
    /// anything.
    pub async fn plan(
        &self,
        request: &DownloadRequest,
    ) -> Result<(DownloadJob, Vec<Segment>), DownloadError> {
        let info = self.file_info.fetch(&request.url).await?;
        let segments = calculate_segments(info.size, self.config.part_count)?;

        // Explicit names are reduced to their final component as well.
        let output_name = request
            .file_name
            .as_deref()
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| derive_output_name(&request.url, info.file_name.as_deref()));

        let job = DownloadJob {
            url: request.url.clone(),
            total_size: info.size,
            part_count: segments.len(),
            output_name,
            output_dir: request.output_dir.clone(),
            range_unit: info.range_unit,
        };
        Ok((job, segments))
    }

    /// Download a file from the given URL
    pub async fn download(
        &self,
        request: DownloadRequest,
    ) -> Result<DownloadResult, DownloadError> {
        self.download_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Download a file, aborting every in-flight segment once `cancel` fires.
    ///
    /// This method will:
    /// 1. Validate the resource with a HEAD request
    /// 2. Derive the output name and compute the segments
    /// 3. Fetch all segments concurrently into part files
    /// 4. Wait until every segment has reported its result
    /// 5. Merge the part files in order, or clean them up on failure
    pub async fn download_with_cancellation(
        &self,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> Result<DownloadResult, DownloadError> {
        let start_time = Timestamp::now();

        let (job, segments) = tokio::select! {
            biased;
            () = cancel.cancelled() => return CancelledSnafu.fail(),
            planned = self.plan(&request) => planned?,
        };

        fs::create_dir_all(&job.output_dir)
            .await
            .context(FileWriteSnafu {
                path: &job.output_dir,
            })?;

        info!(
            url = %job.url,
            size = job.total_size,
            parts = job.part_count,
            output = %job.output_path().display(),
            "starting download"
        );

        let aggregator = ProgressAggregator::new(
            job.total_size,
            self.config.progress_interval(),
            self.observer.clone(),
        );
        let (reporter, progress_task) = aggregator.spawn();

        let results = self
            .parallel
            .fetch_all(&job, &segments, reporter, cancel.child_token())
            .await;

        let summary = progress_task.await.map_err(|e| {
            TaskPanicSnafu {
                message: e.to_string(),
            }
            .build()
        })?;

        let parts: Vec<PathBuf> = segments.iter().map(|s| job.part_path(s.index)).collect();
        let failures = Self::collect_failures(results);

        if !failures.is_empty() {
            self.discard_parts(&parts).await;
            ensure!(!cancel.is_cancelled(), CancelledSnafu);
            return AggregateFailureSnafu { failures }.fail();
        }

        if !summary.completed {
            warn!(
                received = summary.bytes_so_far,
                expected = summary.expected_total,
                "progress incomplete although every segment succeeded"
            );
        }

        let output_path = job.output_path();
        let size =
            match ChunkMerger::merge(&output_path, &parts, self.config.write_buffer.as_usize())
                .await
            {
                Ok(size) => size,
                Err(e) => {
                    self.discard_parts(&parts).await;
                    return Err(e);
                }
            };

        let duration = start_time.until(Timestamp::now()).unwrap_or_default();
        info!(
            path = %output_path.display(),
            size,
            %duration,
            "download completed"
        );

        Ok(DownloadResult {
            path: output_path,
            size,
            parts: job.part_count,
            duration,
        })
    }

    fn collect_failures(results: Vec<SegmentResult>) -> Vec<SegmentFailure> {
        results
            .into_iter()
            .filter_map(|result| match result.outcome {
                SegmentOutcome::Success { .. } => None,
                SegmentOutcome::Failure(error) => Some(SegmentFailure {
                    index: result.index,
                    error,
                }),
            })
            .collect()
    }

    async fn discard_parts(&self, parts: &[PathBuf]) {
        if self.config.keep_parts_on_failure {
            info!(count = parts.len(), "keeping part files of failed download");
        } else {
            ChunkMerger::remove_parts(parts).await;
        }
    }

    fn build_client(config: &DownloaderConfig) -> Result<reqwest::Client, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.timeout());

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        builder.build().context(HttpClientSnafu)
    }
}
