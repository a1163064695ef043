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

use std::path::PathBuf;

use bon::Builder;
use jiff::Span;
use strum_macros::Display;

use crate::error::SegmentError;

/// A request to download a file
#[derive(Debug, Clone, Builder)]
pub struct DownloadRequest {
    /// URL to download from
    #[builder(into)]
    pub url:        String,
    /// Directory the merged file (and its part files) are written to
    #[builder(into, default = PathBuf::from("."))]
    pub output_dir: PathBuf,
    /// Overrides the file name derived from the server response
    #[builder(into)]
    pub file_name:  Option<String>,
}

/// A validated download, fixed once the HEAD request succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url:         String,
    pub total_size:  u64,
    pub part_count:  usize,
    pub output_name: String,
    pub output_dir:  PathBuf,
    /// Range unit advertised by the server, `bytes` unless told otherwise
    pub range_unit:  String,
}

impl DownloadJob {
    /// Path of the merged file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf { self.output_dir.join(&self.output_name) }

    /// Path of the part file for segment `index`: `<output_name>_<index>`.
    #[must_use]
    pub fn part_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("{}_{index}", self.output_name))
    }
}

/// One contiguous byte range of the resource, with inclusive bounds.
///
/// The single segment of an empty resource has `start == 0`, `len == 0`; its
/// `end` is meaningless and never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub start: u64,
    len:       u64,
}

impl Segment {
    pub(crate) const fn new(index: usize, start: u64, len: u64) -> Self {
        Self { index, start, len }
    }

    /// Last byte offset covered by this segment (inclusive).
    #[must_use]
    pub const fn end(&self) -> u64 { (self.start + self.len).saturating_sub(1) }

    #[must_use]
    pub const fn len(&self) -> u64 { self.len }

    #[must_use]
    pub const fn is_empty(&self) -> bool { self.len == 0 }

    /// Value of the `Range` header requesting this segment, e.g.
    /// `bytes=0-124`.
    #[must_use]
    pub fn range_header(&self, unit: &str) -> String {
        format!("{unit}={}-{}", self.start, self.end())
    }
}

/// Terminal status of a segment fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SegmentStatus {
    /// All bytes of the segment are in its part file
    Completed,
    /// The segment failed or was aborted
    Failed,
}

#[derive(Debug)]
pub enum SegmentOutcome {
    Success { bytes: u64 },
    Failure(SegmentError),
}

/// Exactly one of these is produced per segment, on every exit path of its
/// fetcher.
#[derive(Debug)]
pub struct SegmentResult {
    pub index:   usize,
    pub outcome: SegmentOutcome,
}

impl SegmentResult {
    #[must_use]
    pub const fn status(&self) -> SegmentStatus {
        match self.outcome {
            SegmentOutcome::Success { .. } => SegmentStatus::Completed,
            SegmentOutcome::Failure(_) => SegmentStatus::Failed,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool { matches!(self.outcome, SegmentOutcome::Success { .. }) }
}

/// Result of a successful download
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Path where the merged file was saved
    pub path:     PathBuf,
    /// Size of the downloaded file in bytes
    pub size:     u64,
    /// Number of segments fetched in parallel
    pub parts:    usize,
    /// Total duration of the download operation
    pub duration: Span,
}
