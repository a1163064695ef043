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

use indicatif::{ProgressBar, ProgressStyle};
use rangefetch_downloader::{ProgressObserver, ProgressSnapshot};

const BAR_TEMPLATE: &str =
    "{wide_bar:.cyan/blue} {bytes}/{total_bytes} ({percent}%) [{elapsed_precise}] {msg}";

/// Renders download progress as a terminal progress bar on stderr.
pub struct ConsoleObserver {
    pb: ProgressBar,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        let pb = match ProgressStyle::with_template(BAR_TEMPLATE) {
            Ok(style) => pb.with_style(style),
            Err(_) => pb,
        };
        Self::with_bar(pb)
    }

    pub const fn with_bar(pb: ProgressBar) -> Self { Self { pb } }
}

impl Default for ConsoleObserver {
    fn default() -> Self { Self::new() }
}

impl ProgressObserver for ConsoleObserver {
    fn on_snapshot(&self, snapshot: &ProgressSnapshot) {
        self.pb.set_length(snapshot.expected_total);
        self.pb.set_position(snapshot.bytes_so_far);
        self.pb.set_message(format!("{:.2} MiB/s", snapshot.rate_mib));
    }

    fn on_complete(&self, total: u64) {
        self.pb.set_length(total);
        self.pb.set_position(total);
        self.pb.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_moves_the_bar() {
        let observer = ConsoleObserver::with_bar(ProgressBar::hidden());
        observer.on_snapshot(&ProgressSnapshot {
            bytes_so_far:   300,
            expected_total: 1000,
            rate_mib:       1.5,
        });

        assert_eq!(observer.pb.length(), Some(1000));
        assert_eq!(observer.pb.position(), 300);
        assert_eq!(observer.pb.message(), "1.50 MiB/s");
        assert!(!observer.pb.is_finished());
    }

    #[test]
    fn test_complete_finishes_the_bar() {
        let observer = ConsoleObserver::with_bar(ProgressBar::hidden());
        observer.on_snapshot(&ProgressSnapshot {
            bytes_so_far:   10,
            expected_total: 1000,
            rate_mib:       0.0,
        });
        observer.on_complete(1000);

        assert_eq!(observer.pb.position(), 1000);
        assert!(observer.pb.is_finished());
    }
}
