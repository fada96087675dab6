//! Timeline data model
//!
//! Raw records as supplied by loaders, and the merged points handed to playback.

use serde::{Deserialize, Serialize};

/// Unit of an epoch timestamp supplied by a loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochUnit {
    Seconds,
    Millis,
}

impl EpochUnit {
    pub fn to_seconds(&self, value: i64) -> i64 {
        match self {
            EpochUnit::Seconds => value,
            EpochUnit::Millis => value.div_euclid(1_000),
        }
    }
}

/// Aggregated OHLCV record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Candle as it comes off a candle file, keyed by its own start time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl CandleRecord {
    pub fn candle(&self) -> Candle {
        Candle {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.candle().is_finite()
    }
}

/// A raw price print (trade tick or quote) used to build candles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub time: i64,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Sign applied to quantity when accumulating net exposure
    pub fn sign(&self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }
}

impl std::str::FromStr for TradeSide {
    type Err = crate::TimeMachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            _ => Err(crate::TimeMachineError::MalformedRecord(format!(
                "invalid trade side: {}",
                s
            ))),
        }
    }
}

/// An executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    /// Seconds since epoch
    pub time: i64,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
}

impl TradeRecord {
    pub fn is_finite(&self) -> bool {
        self.price.is_finite() && self.quantity.is_finite()
    }
}

/// Wallet balance observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalletSample {
    pub time: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl std::str::FromStr for PositionSide {
    type Err = crate::TimeMachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            _ => Err(crate::TimeMachineError::MalformedRecord(format!(
                "invalid position side: {}",
                s
            ))),
        }
    }
}

/// A position session; open until `close_time` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub id: String,
    pub side: PositionSide,
    pub open_time: i64,
    pub close_time: Option<i64>,
    pub max_size: f64,
}

/// One raw record of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Candle(CandleRecord),
    Trade(TradeRecord),
    WalletBalance(WalletSample),
    PositionMarker(PositionRecord),
}

impl RawRecord {
    /// Earliest timestamp carried by the record
    pub fn time(&self) -> i64 {
        match self {
            RawRecord::Candle(c) => c.time,
            RawRecord::Trade(t) => t.time,
            RawRecord::WalletBalance(w) => w.time,
            RawRecord::PositionMarker(p) => p.open_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Opened,
    Closed,
}

/// Position open/close event attached to a timeline point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEvent {
    pub position_id: String,
    pub kind: MarkerKind,
    pub side: PositionSide,
    /// Exact event time, not the bucket
    pub time: i64,
    pub size: f64,
}

/// One bucket's merged view across all sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candle: Option<Candle>,
    pub trades: Vec<TradeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_exposure: Option<f64>,
    pub markers: Vec<MarkerEvent>,
    pub is_future: bool,
}

impl TimelinePoint {
    pub fn empty(time: i64) -> Self {
        Self {
            time,
            candle: None,
            trades: Vec::new(),
            equity: None,
            wallet_balance: None,
            net_exposure: None,
            markers: Vec::new(),
            is_future: false,
        }
    }
}

/// Inclusive time span covered by a slice of points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// `None` for an empty slice
    pub fn of(points: &[TimelinePoint]) -> Option<Self> {
        match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some(TimeRange {
                start: first.time,
                end: last.time,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_unit_normalization() {
        assert_eq!(EpochUnit::Millis.to_seconds(1_700_000_000_999), 1_700_000_000);
        assert_eq!(EpochUnit::Seconds.to_seconds(1_700_000_000), 1_700_000_000);
    }

    #[test]
    fn test_point_serializes_camel_case() {
        let mut point = TimelinePoint::empty(60);
        point.wallet_balance = Some(1.5);
        point.is_future = true;
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["walletBalance"], 1.5);
        assert_eq!(json["isFuture"], true);
        assert!(json.get("candle").is_none());
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("Buy".parse::<TradeSide>().unwrap(), TradeSide::Buy);
        assert_eq!("SHORT".parse::<PositionSide>().unwrap(), PositionSide::Short);
        assert!("hold".parse::<TradeSide>().is_err());
    }

    #[test]
    fn test_range_of_points() {
        assert_eq!(TimeRange::of(&[]), None);
        let points = vec![TimelinePoint::empty(10), TimelinePoint::empty(30)];
        assert_eq!(TimeRange::of(&points), Some(TimeRange { start: 10, end: 30 }));
    }
}
