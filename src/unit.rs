//! # Unit
//!
//! CloudWatch StandardUnit values attached to every submitted data point
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/APIReference/API_MetricDatum.html>

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Unit of the configured metric value, defaults to [Unit::None]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Unit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesPerSecond,
    KilobytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerSecond,
    TerabytesPerSecond,
    BitsPerSecond,
    KilobitsPerSecond,
    MegabitsPerSecond,
    GigabitsPerSecond,
    TerabitsPerSecond,
    CountPerSecond,
    #[default]
    None,
}

const ALL_UNITS: [Unit; 27] = [
    Unit::Seconds,
    Unit::Microseconds,
    Unit::Milliseconds,
    Unit::Bytes,
    Unit::Kilobytes,
    Unit::Megabytes,
    Unit::Gigabytes,
    Unit::Terabytes,
    Unit::Bits,
    Unit::Kilobits,
    Unit::Megabits,
    Unit::Gigabits,
    Unit::Terabits,
    Unit::Percent,
    Unit::Count,
    Unit::BytesPerSecond,
    Unit::KilobytesPerSecond,
    Unit::MegabytesPerSecond,
    Unit::GigabytesPerSecond,
    Unit::TerabytesPerSecond,
    Unit::BitsPerSecond,
    Unit::KilobitsPerSecond,
    Unit::MegabitsPerSecond,
    Unit::GigabitsPerSecond,
    Unit::TerabitsPerSecond,
    Unit::CountPerSecond,
    Unit::None,
];

impl Unit {
    /// The CloudWatch wire name of the unit
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Seconds => "Seconds",
            Unit::Microseconds => "Microseconds",
            Unit::Milliseconds => "Milliseconds",
            Unit::Bytes => "Bytes",
            Unit::Kilobytes => "Kilobytes",
            Unit::Megabytes => "Megabytes",
            Unit::Gigabytes => "Gigabytes",
            Unit::Terabytes => "Terabytes",
            Unit::Bits => "Bits",
            Unit::Kilobits => "Kilobits",
            Unit::Megabits => "Megabits",
            Unit::Gigabits => "Gigabits",
            Unit::Terabits => "Terabits",
            Unit::Percent => "Percent",
            Unit::Count => "Count",
            Unit::BytesPerSecond => "Bytes/Second",
            Unit::KilobytesPerSecond => "Kilobytes/Second",
            Unit::MegabytesPerSecond => "Megabytes/Second",
            Unit::GigabytesPerSecond => "Gigabytes/Second",
            Unit::TerabytesPerSecond => "Terabytes/Second",
            Unit::BitsPerSecond => "Bits/Second",
            Unit::KilobitsPerSecond => "Kilobits/Second",
            Unit::MegabitsPerSecond => "Megabits/Second",
            Unit::GigabitsPerSecond => "Gigabits/Second",
            Unit::TerabitsPerSecond => "Terabits/Second",
            Unit::CountPerSecond => "Count/Second",
            Unit::None => "None",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse failure for an unknown unit name
#[derive(Debug, thiserror::Error)]
#[error("unknown CloudWatch unit {0:?}")]
pub struct ParseUnitError(String);

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_UNITS
            .iter()
            .copied()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseUnitError(s.to_owned()))
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Map the metrics crate units onto CloudWatch, binary prefixes land on the nearest CloudWatch unit
impl From<metrics::Unit> for Unit {
    fn from(unit: metrics::Unit) -> Self {
        match unit {
            metrics::Unit::Count => Unit::Count,
            metrics::Unit::Percent => Unit::Percent,
            metrics::Unit::Seconds => Unit::Seconds,
            metrics::Unit::Milliseconds => Unit::Milliseconds,
            metrics::Unit::Microseconds => Unit::Microseconds,
            // CloudWatch has no sub-microsecond unit
            metrics::Unit::Nanoseconds => Unit::None,
            metrics::Unit::Tebibytes => Unit::Terabytes,
            metrics::Unit::Gibibytes => Unit::Gigabytes,
            metrics::Unit::Mebibytes => Unit::Megabytes,
            metrics::Unit::Kibibytes => Unit::Kilobytes,
            metrics::Unit::Bytes => Unit::Bytes,
            metrics::Unit::TerabitsPerSecond => Unit::TerabitsPerSecond,
            metrics::Unit::GigabitsPerSecond => Unit::GigabitsPerSecond,
            metrics::Unit::MegabitsPerSecond => Unit::MegabitsPerSecond,
            metrics::Unit::KilobitsPerSecond => Unit::KilobitsPerSecond,
            metrics::Unit::BitsPerSecond => Unit::BitsPerSecond,
            metrics::Unit::CountPerSecond => Unit::CountPerSecond,
        }
    }
}
