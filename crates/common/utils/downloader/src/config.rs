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

use std::time::Duration;

use bon::Builder;
use jiff::SignedDuration;
use rangefetch_base::readable_size::ReadableSize;
use smart_default::SmartDefault;

/// Configuration for the downloader
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct DownloaderConfig {
    /// Number of segments fetched in parallel (default: 8)
    #[default = 8]
    #[builder(default = 8)]
    pub part_count: usize,

    /// How often progress snapshots are emitted (default: 1s)
    #[default(SignedDuration::from_secs(1))]
    #[builder(default = SignedDuration::from_secs(1))]
    pub progress_interval: SignedDuration,

    /// Longest wait for the next piece of a response (default: 30s)
    #[default(SignedDuration::from_secs(30))]
    #[builder(default = SignedDuration::from_secs(30))]
    pub timeout: SignedDuration,

    /// Timeout for establishing a connection (default: 10s)
    #[default(SignedDuration::from_secs(10))]
    #[builder(default = SignedDuration::from_secs(10))]
    pub connect_timeout: SignedDuration,

    /// Buffer size of the part file and output writers (default: 512KiB)
    #[default(ReadableSize::kb(512))]
    #[builder(default = ReadableSize::kb(512))]
    pub write_buffer: ReadableSize,

    /// Keep part files on disk when the download fails
    #[builder(default)]
    pub keep_parts_on_failure: bool,

    /// Custom User-Agent header
    #[builder(into)]
    pub user_agent: Option<String>,
}

impl DownloaderConfig {
    /// Read timeout as a std duration. Negative values count as their
    /// magnitude.
    #[must_use]
    pub fn timeout(&self) -> Duration { self.timeout.unsigned_abs() }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration { self.connect_timeout.unsigned_abs() }

    #[must_use]
    pub fn progress_interval(&self) -> Duration { self.progress_interval.unsigned_abs() }
}
