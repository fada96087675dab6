//! Timeframes and bucketing
//!
//! Every series is placed on a fixed-width grid before it is merged. A bucket
//! is identified by the start of its interval in epoch seconds.

use serde::{Deserialize, Serialize};

use crate::error::{TimeMachineError, TimeMachineResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Supported bucket widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl Timeframe {
    /// Width of one bucket in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1_800,
            Timeframe::Hour1 => 3_600,
            Timeframe::Hour4 => 14_400,
            Timeframe::Day1 => SECONDS_PER_DAY,
            Timeframe::Week1 => 604_800,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
        }
    }

    /// Finest timeframe that candle files are stored at for this view.
    ///
    /// Coarser views are re-aggregated from the source candles.
    pub fn source(&self) -> Timeframe {
        match self {
            Timeframe::Minute1 => Timeframe::Minute1,
            Timeframe::Minute5 | Timeframe::Minute15 | Timeframe::Minute30 => Timeframe::Minute5,
            Timeframe::Hour1 | Timeframe::Hour4 => Timeframe::Hour1,
            Timeframe::Day1 | Timeframe::Week1 => Timeframe::Day1,
        }
    }

    /// Trailing window applied when the caller gives neither a range nor a window.
    pub fn default_window_days(&self) -> Option<i64> {
        match self {
            Timeframe::Minute1 => Some(30),
            Timeframe::Minute5 => Some(60),
            _ => None,
        }
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Minute1,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Minute30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
            Timeframe::Week1,
        ]
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = TimeMachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::all()
            .iter()
            .copied()
            .find(|tf| tf.label() == s.trim())
            .ok_or_else(|| TimeMachineError::UnknownTimeframe(s.to_string()))
    }
}

/// Start of the bucket enclosing `timestamp` (seconds).
///
/// Uses floor division so pre-epoch timestamps land in the bucket below them.
pub fn bucket_of(timestamp: i64, timeframe: Timeframe) -> i64 {
    let width = timeframe.seconds();
    timestamp.div_euclid(width) * width
}

/// Validating variant of [`bucket_of`] for timeframe strings coming off the wire.
pub fn bucket_of_str(timestamp: i64, timeframe: &str) -> TimeMachineResult<i64> {
    let timeframe: Timeframe = timeframe.parse()?;
    Ok(bucket_of(timestamp, timeframe))
}

pub(crate) fn days_to_seconds(days: i64) -> i64 {
    days.saturating_mul(SECONDS_PER_DAY)
}
