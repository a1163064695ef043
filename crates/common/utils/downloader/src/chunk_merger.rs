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

use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt, BufReader, BufWriter},
};
use tracing::{debug, warn};

use crate::error::{DownloadError, FileReadSnafu, FileWriteSnafu};

/// Handles merging downloaded part files into a single file
pub struct ChunkMerger;

impl ChunkMerger {
    /// Concatenate `parts`, in the given order, into `output_path`.
    ///
    /// Each part file is deleted as soon as it has been copied. If the merge
    /// fails, the partially written output is removed. Returns the number of
    /// bytes written.
    pub async fn merge(
        output_path: &Path,
        parts: &[PathBuf],
        buffer: usize,
    ) -> Result<u64, DownloadError> {
        match Self::merge_inner(output_path, parts, buffer).await {
            Ok(size) => Ok(size),
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(output_path).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(
                        path = %output_path.display(),
                        error = %remove_err,
                        "failed to remove partial output"
                    );
                }
                Err(e)
            }
        }
    }

    async fn merge_inner(
        output_path: &Path,
        parts: &[PathBuf],
        buffer: usize,
    ) -> Result<u64, DownloadError> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context(FileWriteSnafu { path: parent })?;
        }

        let output_file = File::create(output_path)
            .await
            .context(FileWriteSnafu { path: output_path })?;
        let mut writer = BufWriter::with_capacity(buffer, output_file);
        let mut total_size = 0u64;

        for part in parts {
            let part_file = File::open(part)
                .await
                .context(FileReadSnafu { path: part })?;
            let mut reader = BufReader::with_capacity(buffer, part_file);

            // `io::copy` does not tell read errors from write errors apart;
            // the output path is the one worth reporting.
            let copied = io::copy(&mut reader, &mut writer)
                .await
                .context(FileWriteSnafu { path: output_path })?;
            total_size += copied;
            drop(reader);

            if let Err(e) = fs::remove_file(part).await {
                warn!(path = %part.display(), error = %e, "failed to remove part file");
            }
            debug!(part = %part.display(), bytes = copied, "merged part");
        }

        writer
            .flush()
            .await
            .context(FileWriteSnafu { path: output_path })?;
        writer
            .get_mut()
            .sync_all()
            .await
            .context(FileWriteSnafu { path: output_path })?;

        Ok(total_size)
    }

    /// Best-effort removal of part files after a failed download.
    pub async fn remove_parts(parts: &[PathBuf]) {
        for part in parts {
            match fs::remove_file(part).await {
                Ok(()) => debug!(path = %part.display(), "removed part file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %part.display(), error = %e, "failed to remove part file"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merges_in_order_and_removes_parts() {
        let dir = tempfile::tempdir().unwrap();
        let parts: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("f_{i}"))).collect();
        fs::write(&parts[0], b"hello ").await.unwrap();
        fs::write(&parts[1], b"").await.unwrap();
        fs::write(&parts[2], b"world").await.unwrap();

        let output = dir.path().join("f");
        let size = ChunkMerger::merge(&output, &parts, 4).await.unwrap();

        assert_eq!(size, 11);
        assert_eq!(fs::read(&output).await.unwrap(), b"hello world");
        for part in &parts {
            assert!(!fs::try_exists(part).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_part_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![dir.path().join("f_0"), dir.path().join("f_1")];
        fs::write(&parts[0], b"abc").await.unwrap();

        let output = dir.path().join("f");
        let err = ChunkMerger::merge(&output, &parts, 1024).await.unwrap_err();

        assert!(matches!(err, DownloadError::FileRead { .. }));
        assert!(!fs::try_exists(&output).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_parts_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![dir.path().join("f_0"), dir.path().join("f_1")];
        fs::write(&parts[1], b"x").await.unwrap();

        ChunkMerger::remove_parts(&parts).await;

        assert!(!fs::try_exists(&parts[1]).await.unwrap());
    }
}
