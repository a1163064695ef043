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

use reqwest::{StatusCode, Url, header::HeaderMap};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::error::{
    DownloadError, HttpSnafu, InvalidUrlSnafu, NetworkSnafu, RangeNotSupportedSnafu,
};

/// Range unit assumed when the server does not advertise one.
pub const DEFAULT_RANGE_UNIT: &str = "bytes";

/// Name used when neither the server nor the URL provide one.
const FALLBACK_FILE_NAME: &str = "download";

/// Information about a file from HEAD request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size:       u64,
    /// Unit to use in `Range` headers, from `Accept-Ranges`
    pub range_unit: String,
    /// File name from `Content-Disposition`, if the server sent one
    pub file_name:  Option<String>,
}

/// Fetches file information from server
pub struct FileInfoFetcher {
    client: reqwest::Client,
}

impl FileInfoFetcher {
    pub const fn new(client: reqwest::Client) -> Self { Self { client } }

    /// Validate the resource with a HEAD request.
    ///
    /// Anything but `200 OK` is rejected, as is a server that explicitly
    /// answers `Accept-Ranges: none`.
    pub async fn fetch(&self, url: &str) -> Result<FileInfo, DownloadError> {
        let parsed = Url::parse(url).ok().context(InvalidUrlSnafu { url })?;
        let response = self
            .client
            .head(parsed)
            .send()
            .await
            .context(NetworkSnafu { url })?;

        ensure!(
            response.status() == StatusCode::OK,
            HttpSnafu {
                status: response.status().as_u16(),
                url,
            }
        );

        let headers = response.headers();
        let size = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .ok_or(DownloadError::FileSizeUnknown)?;

        let range_unit = Self::range_unit(headers);
        ensure!(
            !range_unit.eq_ignore_ascii_case("none"),
            RangeNotSupportedSnafu { url }
        );

        let file_name = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);

        debug!(url, size, %range_unit, ?file_name, "validated resource");

        Ok(FileInfo {
            size,
            range_unit,
            file_name,
        })
    }

    /// First unit listed in `Accept-Ranges`, or `bytes` when absent.
    fn range_unit(headers: &HeaderMap) -> String {
        headers
            .get(reqwest::header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').map(str::trim).find(|unit| !unit.is_empty()))
            .unwrap_or(DEFAULT_RANGE_UNIT)
            .to_string()
    }
}

/// Extract the `filename` parameter of a `Content-Disposition` value.
///
/// Surrounding quotes are stripped and only the final path component is
/// kept, so a hostile header cannot point outside the output directory.
#[must_use]
pub fn parse_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .and_then(|(_, name)| sanitize_file_name(strip_quotes(name.trim())))
}

/// Pick the output file name: an explicit `Content-Disposition` name wins,
/// otherwise the last path segment of the URL.
#[must_use]
pub fn derive_output_name(url: &str, disposition_name: Option<&str>) -> String {
    if let Some(name) = disposition_name.and_then(|n| sanitize_file_name(strip_quotes(n))) {
        return name;
    }

    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|segment| sanitize_file_name(strip_quotes(&segment)))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn strip_quotes(name: &str) -> &str {
    let name = name.strip_prefix('"').unwrap_or(name);
    name.strip_suffix('"').unwrap_or(name)
}

pub(crate) fn sanitize_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_quoted() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="report.pdf""#),
            Some("report.pdf".to_string())
        );
    }

    #[test]
    fn test_content_disposition_unquoted() {
        assert_eq!(
            parse_content_disposition("attachment; filename=archive.tar.gz"),
            Some("archive.tar.gz".to_string())
        );
    }

    #[test]
    fn test_content_disposition_without_filename() {
        assert_eq!(parse_content_disposition("inline"), None);
        assert_eq!(parse_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_content_disposition_path_is_reduced_to_file_name() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
    }

    #[test]
    fn test_output_name_from_url() {
        assert_eq!(
            derive_output_name("https://example.com/pub/files/image.iso", None),
            "image.iso"
        );
        assert_eq!(
            derive_output_name("https://example.com/pub/image.iso?token=abc", None),
            "image.iso"
        );
    }

    #[test]
    fn test_output_name_prefers_disposition() {
        assert_eq!(
            derive_output_name("https://example.com/dl?id=3", Some("\"real-name.zip\"")),
            "real-name.zip"
        );
    }

    #[test]
    fn test_output_name_fallback() {
        assert_eq!(derive_output_name("https://example.com/", None), "download");
        assert_eq!(derive_output_name("not a url", None), "download");
    }

    fn accept_ranges(value: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(
                reqwest::header::ACCEPT_RANGES,
                reqwest::header::HeaderValue::from_static(value),
            );
        }
        headers
    }

    #[test]
    fn test_range_unit_defaults_to_bytes() {
        assert_eq!(FileInfoFetcher::range_unit(&accept_ranges(None)), "bytes");
        assert_eq!(FileInfoFetcher::range_unit(&accept_ranges(Some(""))), "bytes");
        assert_eq!(FileInfoFetcher::range_unit(&accept_ranges(Some(" , "))), "bytes");
    }

    #[test]
    fn test_range_unit_takes_first_listed_unit() {
        assert_eq!(FileInfoFetcher::range_unit(&accept_ranges(Some("bytes"))), "bytes");
        assert_eq!(
            FileInfoFetcher::range_unit(&accept_ranges(Some("items, bytes"))),
            "items"
        );
        assert_eq!(FileInfoFetcher::range_unit(&accept_ranges(Some("none"))), "none");
    }
}
