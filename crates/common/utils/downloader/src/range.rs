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

use snafu::ensure;

use crate::{
    error::{DownloadError, InvalidPartitionSnafu},
    types::Segment,
};

/// Split `total_size` bytes into `part_count` contiguous segments.
///
/// Every segment but the last has length `total_size / part_count`; the last
/// one absorbs the remainder. An empty resource always yields one empty
/// segment. Asking for more parts than there are bytes is an error, since it
/// would produce empty segments.
pub fn calculate_segments(
    total_size: u64,
    part_count: usize,
) -> Result<Vec<Segment>, DownloadError> {
    ensure!(
        part_count > 0,
        InvalidPartitionSnafu {
            total_size,
            part_count,
        }
    );

    if total_size == 0 {
        return Ok(vec![Segment::new(0, 0, 0)]);
    }

    let parts = part_count as u64;
    ensure!(
        parts <= total_size,
        InvalidPartitionSnafu {
            total_size,
            part_count,
        }
    );

    let base = total_size / parts;
    let mut segments = Vec::with_capacity(part_count);
    let mut offset = 0u64;

    for index in 0..part_count {
        let len = if index == part_count - 1 {
            total_size - offset
        } else {
            base
        };
        segments.push(Segment::new(index, offset, len));
        offset += len;
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(total_size: u64, segments: &[Segment]) {
        let mut expected_start = 0;
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert_eq!(segment.start, expected_start, "segment {i} is not contiguous");
            assert!(total_size == 0 || !segment.is_empty());
            expected_start += segment.len();
        }
        assert_eq!(expected_start, total_size);
        if total_size > 0 {
            assert_eq!(segments.last().unwrap().end(), total_size - 1);
        }
    }

    #[test]
    fn test_even_split() {
        let segments = calculate_segments(1000, 8).unwrap();
        assert_eq!(segments.len(), 8);
        for (i, segment) in segments.iter().enumerate() {
            let i = i as u64;
            assert_eq!(segment.len(), 125);
            assert_eq!(segment.start, 125 * i);
            assert_eq!(segment.end(), 125 * i + 124);
        }
    }

    #[test]
    fn test_last_segment_absorbs_remainder() {
        let segments = calculate_segments(1003, 8).unwrap();
        let lens: Vec<u64> = segments.iter().map(Segment::len).collect();
        assert_eq!(lens, vec![125, 125, 125, 125, 125, 125, 125, 128]);
        assert_eq!(segments[7].start, 875);
        assert_eq!(segments[7].end(), 1002);
    }

    #[test]
    fn test_single_part() {
        let segments = calculate_segments(1000, 1).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end()), (0, 999));
    }

    #[test]
    fn test_one_byte_per_part() {
        let segments = calculate_segments(16, 16).unwrap();
        assert_eq!(segments.len(), 16);
        assert!(segments.iter().all(|s| s.len() == 1));
        assert_partition(16, &segments);
    }

    #[test]
    fn test_empty_resource_yields_single_empty_segment() {
        for parts in [1, 8, 100] {
            let segments = calculate_segments(0, parts).unwrap();
            assert_eq!(segments.len(), 1);
            assert!(segments[0].is_empty());
            assert_eq!(segments[0].start, 0);
        }
    }

    #[test]
    fn test_more_parts_than_bytes_is_rejected() {
        let err = calculate_segments(5, 8).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::InvalidPartition {
                total_size: 5,
                part_count: 8,
            }
        ));
    }

    #[test]
    fn test_zero_parts_is_rejected() {
        assert!(matches!(
            calculate_segments(100, 0),
            Err(DownloadError::InvalidPartition { .. })
        ));
    }

    #[test]
    fn test_partition_covers_every_byte() {
        for total_size in [1u64, 2, 7, 64, 999, 1000, 1003, 65_537] {
            for parts in [1usize, 2, 3, 7, 8, 16] {
                if parts as u64 > total_size {
                    continue;
                }
                let segments = calculate_segments(total_size, parts).unwrap();
                assert_eq!(segments.len(), parts);
                assert_partition(total_size, &segments);
            }
        }
    }
}
