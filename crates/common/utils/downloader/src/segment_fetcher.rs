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

use std::path::Path;

use futures::StreamExt;
use reqwest::{StatusCode, header};
use snafu::{ResultExt, ensure};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{
        AbortedSnafu, OverrunSnafu, PartFileSnafu, RangeMismatchSnafu, SegmentError,
        ShortBodySnafu, TransportSnafu, UnexpectedStatusSnafu,
    },
    progress::ProgressReporter,
    types::{Segment, SegmentOutcome, SegmentResult},
};

/// Downloads one segment into its part file.
///
/// There is no retry: the first error is the segment's terminal result.
pub struct SegmentFetcher {
    client:       reqwest::Client,
    url:          String,
    range_unit:   String,
    write_buffer: usize,
    progress:     ProgressReporter,
    cancel:       CancellationToken,
}

impl SegmentFetcher {
    pub const fn new(
        client: reqwest::Client,
        url: String,
        range_unit: String,
        write_buffer: usize,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            url,
            range_unit,
            write_buffer,
            progress,
            cancel,
        }
    }

    /// Fetch `segment` into `part_path`.
    ///
    /// Never fails: every outcome, including cancellation, is folded into
    /// the returned [`SegmentResult`].
    pub async fn fetch(&self, segment: &Segment, part_path: &Path) -> SegmentResult {
        let outcome = match self.try_fetch(segment, part_path).await {
            Ok(bytes) => SegmentOutcome::Success { bytes },
            Err(e) => SegmentOutcome::Failure(e),
        };
        let result = SegmentResult {
            index: segment.index,
            outcome,
        };

        let status = result.status();
        match &result.outcome {
            SegmentOutcome::Success { bytes } => {
                debug!(segment = segment.index, %status, bytes, "segment finished");
            }
            SegmentOutcome::Failure(SegmentError::Aborted) => {
                debug!(segment = segment.index, %status, "segment aborted");
            }
            SegmentOutcome::Failure(e) => {
                warn!(segment = segment.index, %status, error = %e, "segment failed");
            }
        }
        result
    }

    async fn try_fetch(&self, segment: &Segment, part_path: &Path) -> Result<u64, SegmentError> {
        ensure!(!self.cancel.is_cancelled(), AbortedSnafu);

        let file = File::create(part_path)
            .await
            .context(PartFileSnafu { path: part_path })?;
        let mut writer = BufWriter::with_capacity(self.write_buffer, file);

        // An empty resource has nothing to request; its part file stays empty.
        if !segment.is_empty() {
            let range_header = segment.range_header(&self.range_unit);
            let request = self
                .client
                .get(&self.url)
                .header(header::RANGE, &range_header)
                .send();

            let response = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return AbortedSnafu.fail(),
                response = request => response.context(TransportSnafu)?,
            };

            let status = response.status();
            ensure!(
                status == StatusCode::PARTIAL_CONTENT,
                UnexpectedStatusSnafu {
                    status: status.as_u16(),
                }
            );
            self.check_content_range(segment, response.headers())?;

            let expected = segment.len();
            let mut written = 0u64;
            let mut stream = response.bytes_stream();

            loop {
                let next = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return AbortedSnafu.fail(),
                    next = stream.next() => next,
                };
                let Some(chunk) = next else { break };
                let chunk = chunk.context(TransportSnafu)?;

                let len = chunk.len() as u64;
                ensure!(written + len <= expected, OverrunSnafu { expected });
                writer
                    .write_all(&chunk)
                    .await
                    .context(PartFileSnafu { path: part_path })?;
                written += len;
                self.progress.report(len);
            }

            ensure!(
                written == expected,
                ShortBodySnafu {
                    expected,
                    received: written,
                }
            );
        }

        writer
            .flush()
            .await
            .context(PartFileSnafu { path: part_path })?;
        writer
            .get_mut()
            .sync_all()
            .await
            .context(PartFileSnafu { path: part_path })?;

        Ok(segment.len())
    }

    /// A `Content-Range` header, when present, must describe exactly the
    /// requested range.
    fn check_content_range(
        &self,
        segment: &Segment,
        headers: &header::HeaderMap,
    ) -> Result<(), SegmentError> {
        let Some(actual) = headers
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(());
        };

        let expected = format!("{} {}-{}", self.range_unit, segment.start, segment.end());
        let range = actual.split('/').next().unwrap_or_default().trim();
        ensure!(
            range == expected,
            RangeMismatchSnafu {
                expected,
                actual: actual.to_string(),
            }
        );
        Ok(())
    }
}
