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

mod chunk_merger;
mod config;
mod downloader;
mod error;
mod file_info;
mod parallel_manager;
pub mod progress;
mod range;
mod segment_fetcher;
mod types;

pub use config::DownloaderConfig;
pub use downloader::Downloader;
pub use error::{DownloadError, SegmentError, SegmentFailure};
pub use file_info::{FileInfo, derive_output_name, parse_content_disposition};
pub use progress::{ProgressObserver, ProgressSnapshot, TracingObserver};
pub use range::calculate_segments;
pub use types::{
    DownloadJob, DownloadRequest, DownloadResult, Segment, SegmentOutcome, SegmentResult,
    SegmentStatus,
};
