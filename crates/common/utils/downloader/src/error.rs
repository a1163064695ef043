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

use std::{fmt::Write as _, path::PathBuf};

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DownloadError {
    #[snafu(display("Invalid URL: {url}"))]
    InvalidUrl { url: String },

    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },

    #[snafu(display("Network error while validating {url}: {source}"))]
    Network { url: String, source: reqwest::Error },

    #[snafu(display("HTTP error {status} for URL: {url}"))]
    Http { status: u16, url: String },

    #[snafu(display("Server does not support Range requests for URL: {url}"))]
    RangeNotSupported { url: String },

    #[snafu(display("Failed to get file size from server"))]
    FileSizeUnknown,

    #[snafu(display("Cannot split {total_size} bytes into {part_count} parts"))]
    InvalidPartition { total_size: u64, part_count: usize },

    #[snafu(display("{}", describe_failures(failures)))]
    AggregateFailure { failures: Vec<SegmentFailure> },

    #[snafu(display("File write error at {}: {source}", path.display()))]
    FileWrite {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("File read error at {}: {source}", path.display()))]
    FileRead {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Download cancelled"))]
    Cancelled,

    #[snafu(display("Task panicked: {message}"))]
    TaskPanic { message: String },
}

impl DownloadError {
    /// Indexes of the segments that failed on their own, excluding those that
    /// were only aborted because another segment failed first.
    #[must_use]
    pub fn failed_segments(&self) -> Vec<usize> {
        match self {
            Self::AggregateFailure { failures } => failures
                .iter()
                .filter(|f| !f.is_abort())
                .map(|f| f.index)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Terminal error of a single segment.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SegmentError {
    #[snafu(display("network error: {source}"))]
    Transport { source: reqwest::Error },

    #[snafu(display("expected 206 Partial Content, got {status}"))]
    UnexpectedStatus { status: u16 },

    #[snafu(display("part file {} I/O error: {source}", path.display()))]
    PartFile {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("asked for {expected}, server answered with {actual}"))]
    RangeMismatch { expected: String, actual: String },

    #[snafu(display("server sent more than the {expected} bytes requested"))]
    Overrun { expected: u64 },

    #[snafu(display("body ended after {received} of {expected} bytes"))]
    ShortBody { expected: u64, received: u64 },

    #[snafu(display("aborted"))]
    Aborted,

    #[snafu(display("task exited without reporting a result"))]
    Panicked,
}

/// A failed segment and its cause, as collected at the barrier.
#[derive(Debug)]
pub struct SegmentFailure {
    pub index: usize,
    pub error: SegmentError,
}

impl SegmentFailure {
    /// Whether this segment stopped only because the job was cancelled.
    #[must_use]
    pub const fn is_abort(&self) -> bool { matches!(self.error, SegmentError::Aborted) }
}

fn describe_failures(failures: &[SegmentFailure]) -> String {
    let (aborted, failed): (Vec<_>, Vec<_>) = failures.iter().partition(|f| f.is_abort());

    let mut msg = String::from("Download failed:");
    if failed.is_empty() {
        msg.push_str(" all segments aborted");
    }
    for (i, failure) in failed.iter().enumerate() {
        let sep = if i == 0 { " " } else { "; " };
        let _ = write!(msg, "{sep}segment {} ({})", failure.index, failure.error);
    }
    if !aborted.is_empty() && !failed.is_empty() {
        let _ = write!(msg, "; {} other segment(s) aborted", aborted.len());
    }
    msg
}
