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

//! Human readable byte sizes.
//!
//! Sizes are always binary multiples: `1KB`, `1K` and `1KiB` all mean 1024
//! bytes.

use std::{fmt, str::FromStr};

use snafu::{OptionExt, ResultExt, Snafu};

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;

#[derive(Debug, Snafu)]
pub enum ParseSizeError {
    #[snafu(display("empty size string"))]
    Empty,

    #[snafu(display("invalid number in size {input:?}"))]
    InvalidNumber {
        input:  String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("unknown size unit {unit:?}"))]
    UnknownUnit { unit: String },

    #[snafu(display("size {input:?} overflows u64"))]
    Overflow { input: String },
}

/// A byte count that parses from and displays as `512KiB`, `8MiB`, ...
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    #[must_use]
    pub const fn kb(count: u64) -> Self { Self(count * KIB) }

    #[must_use]
    pub const fn mb(count: u64) -> Self { Self(count * MIB) }

    #[must_use]
    pub const fn gb(count: u64) -> Self { Self(count * GIB) }

    #[must_use]
    pub const fn as_bytes(self) -> u64 { self.0 }

    /// Size as a `usize`, saturating on 32-bit targets.
    #[must_use]
    pub fn as_usize(self) -> usize { usize::try_from(self.0).unwrap_or(usize::MAX) }

    /// Size in mebibytes, for progress and rate display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_mib_f64(self) -> f64 { self.0 as f64 / MIB as f64 }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.0;
        if size == 0 {
            write!(f, "0B")
        } else if size % GIB == 0 {
            write!(f, "{}GiB", size / GIB)
        } else if size % MIB == 0 {
            write!(f, "{}MiB", size / MIB)
        } else if size % KIB == 0 {
            write!(f, "{}KiB", size / KIB)
        } else {
            write!(f, "{size}B")
        }
    }
}

impl FromStr for ReadableSize {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return EmptySnafu.fail();
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let number: u64 = number.parse().context(InvalidNumberSnafu { input: s })?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            other => return UnknownUnitSnafu { unit: other }.fail(),
        };

        number
            .checked_mul(multiplier)
            .map(Self)
            .context(OverflowSnafu { input: s })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(ReadableSize::kb(512).as_bytes(), 512 * 1024);
        assert_eq!(ReadableSize::mb(5).as_bytes(), 5 * 1024 * 1024);
        assert_eq!(ReadableSize::gb(1).as_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_display_picks_largest_exact_unit() {
        assert_eq!(ReadableSize(0).to_string(), "0B");
        assert_eq!(ReadableSize(1000).to_string(), "1000B");
        assert_eq!(ReadableSize::kb(512).to_string(), "512KiB");
        assert_eq!(ReadableSize::kb(2048).to_string(), "2MiB");
        assert_eq!(ReadableSize::gb(3).to_string(), "3GiB");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("1024".parse::<ReadableSize>().unwrap(), ReadableSize(1024));
        assert_eq!("512KiB".parse::<ReadableSize>().unwrap(), ReadableSize::kb(512));
        assert_eq!("8MB".parse::<ReadableSize>().unwrap(), ReadableSize::mb(8));
        assert_eq!(" 2 g ".parse::<ReadableSize>().unwrap(), ReadableSize::gb(2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("".parse::<ReadableSize>(), Err(ParseSizeError::Empty)));
        assert!(matches!(
            "12parsecs".parse::<ReadableSize>(),
            Err(ParseSizeError::UnknownUnit { .. })
        ));
        assert!(matches!(
            "MiB".parse::<ReadableSize>(),
            Err(ParseSizeError::InvalidNumber { .. })
        ));
        assert!(matches!(
            "99999999999999999GiB".parse::<ReadableSize>(),
            Err(ParseSizeError::Overflow { .. })
        ));
    }

    #[test]
    fn test_mib_conversion() {
        let size = ReadableSize(3 * MIB / 2);
        assert!((size.as_mib_f64() - 1.5).abs() < f64::EPSILON);
    }
}
