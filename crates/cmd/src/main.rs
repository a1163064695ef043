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

use std::{io::Write as _, path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use jiff::{SignedDuration, Unit};
use rangefetch_base::readable_size::ReadableSize;
use rangefetch_common_telemetry::{LoggingOptions, init_global_logging, set_panic_hook};
use rangefetch_downloader::{DownloadRequest, Downloader, DownloaderConfig};
use snafu::{ResultExt, Whatever, ensure_whatever};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::filter::Targets;

mod build_info;
mod console;

use console::ConsoleObserver;

#[derive(Debug, Parser)]
#[clap(
name = "rangefetch",
about = "Download a file over HTTP in parallel byte ranges",
author = build_info::AUTHOR,
version = build_info::VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    /// Log filter, e.g. "info" or "warn,rangefetch_downloader=debug"
    #[arg(long, global = true, default_value = "warn", value_parser = parse_log_level)]
    log_level: String,

    /// Also write rotated log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    commands: Commands,
}

/// Reject filters that the logging setup would not accept.
fn parse_log_level(value: &str) -> Result<String, String> {
    value
        .parse::<Targets>()
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

#[derive(Debug, Subcommand)]
enum Commands {
    Get(GetArgs),
    Plan(PlanArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Download a file by fetching byte ranges concurrently and merging them.
The URL is read from stdin when omitted. Ctrl-C aborts the download.
Examples:

rangefetch get https://example.com/image.iso -n 16
rangefetch get https://example.com/data.bin -o downloads --file-name data.bin

")]
struct GetArgs {
    /// URL to download
    url: Option<String>,

    /// Number of parts fetched in parallel
    #[arg(short = 'n', long, default_value_t = 8)]
    parts: usize,

    /// Directory for the downloaded file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Name of the downloaded file, instead of the server-provided one
    #[arg(long)]
    file_name: Option<String>,

    /// Keep part files when the download fails
    #[arg(long)]
    keep_parts: bool,

    /// Seconds to wait for the server before giving up on a request
    #[arg(long, default_value_t = 30)]
    timeout_secs: u32,

    /// Buffer size for writing part files and the merged file, e.g. "1MiB"
    #[arg(long, default_value = "512KiB")]
    write_buffer: ReadableSize,
}

impl GetArgs {
    async fn run(self) -> Result<(), Whatever> {
        let url = match self.url {
            Some(url) => url,
            None => prompt_url().await?,
        };

        let config = DownloaderConfig::builder()
            .part_count(self.parts)
            .timeout(SignedDuration::from_secs(i64::from(self.timeout_secs)))
            .keep_parts_on_failure(self.keep_parts)
            .write_buffer(self.write_buffer)
            .build();
        let downloader = Downloader::new(config)
            .whatever_context("Failed to create downloader")?
            .with_observer(Arc::new(ConsoleObserver::new()));

        let request = DownloadRequest::builder()
            .url(url.clone())
            .output_dir(self.output_dir)
            .maybe_file_name(self.file_name)
            .build();

        let cancel = CancellationToken::new();
        let signals = tokio::spawn(cancel_on_signal(cancel.clone()));
        let result = downloader
            .download_with_cancellation(request, cancel)
            .await;
        signals.abort();

        let result = result.with_whatever_context(|_| format!("Could not download {url}"))?;
        let secs = result.duration.total(Unit::Second).unwrap_or_default();
        println!(
            "Saved {} ({}) in {secs:.2}s",
            result.path.display(),
            ReadableSize(result.size)
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Check that a URL supports range requests and show how it would be split,
without downloading it.
Examples:

rangefetch plan https://example.com/image.iso -n 4

")]
struct PlanArgs {
    /// URL to inspect
    url: String,

    /// Number of parts to split the file into
    #[arg(short = 'n', long, default_value_t = 8)]
    parts: usize,
}

impl PlanArgs {
    async fn run(self) -> Result<(), Whatever> {
        let config = DownloaderConfig::builder().part_count(self.parts).build();
        let downloader = Downloader::new(config).whatever_context("Failed to create downloader")?;
        let request = DownloadRequest::builder().url(self.url.clone()).build();

        let (job, segments) = downloader
            .plan(&request)
            .await
            .with_whatever_context(|_| format!("Could not plan {}", self.url))?;

        println!(
            "{} ({}, {} parts, unit {})",
            job.output_name,
            ReadableSize(job.total_size),
            job.part_count,
            job.range_unit
        );
        for segment in &segments {
            if segment.is_empty() {
                println!("  part {:>3}: (empty)", segment.index);
            } else {
                println!(
                    "  part {:>3}: {} ({} bytes)",
                    segment.index,
                    segment.range_header(&job.range_unit),
                    segment.len()
                );
            }
        }
        Ok(())
    }
}

/// Ask for the URL on stdin.
async fn prompt_url() -> Result<String, Whatever> {
    print!("URL: ");
    std::io::stdout()
        .flush()
        .whatever_context("Failed to write prompt")?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .whatever_context("Failed to read URL from stdin")?;

    let url = line.trim().to_string();
    ensure_whatever!(!url.is_empty(), "No URL given");
    Ok(url)
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();

    let opts = LoggingOptions {
        dir: cli
            .log_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default(),
        level: Some(cli.log_level.clone()),
        ..LoggingOptions::default()
    };
    let _guards = init_global_logging("rangefetch", &opts);
    set_panic_hook();

    match cli.commands {
        Commands::Get(args) => args.run().await,
        Commands::Plan(args) => args.run().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_defaults() {
        let cli = Cli::try_parse_from(["rangefetch", "get", "https://example.com/a.iso"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        let Commands::Get(args) = cli.commands else {
            panic!("expected get");
        };
        assert_eq!(args.url.as_deref(), Some("https://example.com/a.iso"));
        assert_eq!(args.parts, 8);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert!(!args.keep_parts);
        assert_eq!(args.timeout_secs, 30);
        assert_eq!(args.write_buffer, ReadableSize::kb(512));
    }

    #[test]
    fn test_get_write_buffer() {
        let cli = Cli::try_parse_from(["rangefetch", "get", "u", "--write-buffer", "1MiB"]).unwrap();
        let Commands::Get(args) = cli.commands else {
            panic!("expected get");
        };
        assert_eq!(args.write_buffer, ReadableSize::mb(1));

        assert!(Cli::try_parse_from(["rangefetch", "get", "u", "--write-buffer", "lots"]).is_err());
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        assert!(
            Cli::try_parse_from(["rangefetch", "--log-level", "info,foo=loud", "plan", "u"])
                .is_err()
        );
        let cli = Cli::try_parse_from([
            "rangefetch",
            "--log-level",
            "warn,rangefetch_downloader=debug",
            "plan",
            "u",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "warn,rangefetch_downloader=debug");
    }

    #[test]
    fn test_get_without_url_and_with_flags() {
        let cli = Cli::try_parse_from([
            "rangefetch",
            "get",
            "-n",
            "16",
            "-o",
            "downloads",
            "--file-name",
            "x.bin",
            "--keep-parts",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Commands::Get(args) = cli.commands else {
            panic!("expected get");
        };
        assert!(args.url.is_none());
        assert_eq!(args.parts, 16);
        assert_eq!(args.output_dir, PathBuf::from("downloads"));
        assert_eq!(args.file_name.as_deref(), Some("x.bin"));
        assert!(args.keep_parts);
    }

    #[test]
    fn test_plan_requires_url() {
        assert!(Cli::try_parse_from(["rangefetch", "plan"]).is_err());
        let cli = Cli::try_parse_from(["rangefetch", "plan", "https://example.com/a", "-n", "4"])
            .unwrap();
        let Commands::Plan(args) = cli.commands else {
            panic!("expected plan");
        };
        assert_eq!(args.parts, 4);
    }
}
