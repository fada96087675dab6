//! CSV-backed timeline source
//!
//! Reads the data directory layout:
//!
//! ```text
//! {data_dir}/ohlcv/{EXCHANGE_SYMBOL}_{tf}.csv   timestamp,open,high,low,close,volume
//! {data_dir}/trades.csv                         id,datetime,symbol,side,price,amount
//! {data_dir}/wallet.csv                         timestamp,walletBalance
//! {data_dir}/positions.csv                      id,symbol,side,openTime,closeTime,maxSize
//! ```
//!
//! Timestamps may be RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), a bare date, or an
//! integer epoch in the configured unit.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time_machine::symbols::{exchange_symbol, same_instrument};
use time_machine::{
    CandleRecord, EpochUnit, PositionRecord, PositionSide, TimeMachineError, TimeMachineResult,
    Timeframe, TimelineSource, TradeRecord, TradeSide, WalletSample,
};

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TradeRow {
    id: String,
    datetime: String,
    symbol: String,
    side: String,
    price: f64,
    amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletRow {
    timestamp: String,
    wallet_balance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRow {
    id: String,
    symbol: String,
    side: String,
    open_time: String,
    close_time: Option<String>,
    max_size: f64,
}

#[derive(Debug, Clone)]
pub struct CsvTimelineSource {
    data_dir: PathBuf,
    epoch_unit: EpochUnit,
}

impl CsvTimelineSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            epoch_unit: EpochUnit::Seconds,
        }
    }

    /// Unit for integer timestamps (default seconds)
    pub fn with_epoch_unit(mut self, unit: EpochUnit) -> Self {
        self.epoch_unit = unit;
        self
    }

    pub fn candle_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join("ohlcv")
            .join(format!("{}_{}.csv", exchange_symbol(symbol), timeframe.label()))
    }

    fn parse_time(&self, raw: &str) -> Option<i64> {
        parse_timestamp(raw, self.epoch_unit)
    }

    async fn read_rows<T: DeserializeOwned>(&self, name: &str, path: &Path) -> TimeMachineResult<Vec<T>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TimeMachineError::source_unavailable(name, format!("{}: {}", path.display(), e)))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for result in reader.deserialize::<T>() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!("Skipping {} row in {}: {}", name, path.display(), e);
                }
            }
        }

        tracing::debug!(
            "Read {} {} rows from {} ({} skipped)",
            rows.len(),
            name,
            path.display(),
            skipped
        );
        Ok(rows)
    }
}

/// Parse a CSV timestamp into epoch seconds
pub fn parse_timestamp(raw: &str, unit: EpochUnit) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        return Some(unit.to_seconds(epoch));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[async_trait]
impl TimelineSource for CsvTimelineSource {
    async fn load_candles(&self, symbol: &str, timeframe: Timeframe) -> TimeMachineResult<Vec<CandleRecord>> {
        let path = self.candle_path(symbol, timeframe);
        let rows: Vec<CandleRow> = self.read_rows("candles", &path).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let Some(time) = self.parse_time(&row.timestamp) else {
                    tracing::debug!("Skipping candle with bad timestamp: {}", row.timestamp);
                    return None;
                };
                Some(CandleRecord {
                    time,
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume,
                })
            })
            .collect())
    }

    async fn load_trades(&self, symbol: &str) -> TimeMachineResult<Vec<TradeRecord>> {
        let path = self.data_dir.join("trades.csv");
        let rows: Vec<TradeRow> = self.read_rows("trades", &path).await?;

        Ok(rows
            .into_iter()
            .filter(|row| same_instrument(&row.symbol, symbol))
            .filter_map(|row| {
                let time = self.parse_time(&row.datetime)?;
                let side: TradeSide = match row.side.parse() {
                    Ok(side) => side,
                    Err(e) => {
                        tracing::debug!("Skipping trade {}: {}", row.id, e);
                        return None;
                    }
                };
                Some(TradeRecord {
                    id: row.id,
                    time,
                    side,
                    price: row.price,
                    quantity: row.amount,
                })
            })
            .collect())
    }

    async fn load_wallet(&self) -> TimeMachineResult<Vec<WalletSample>> {
        let path = self.data_dir.join("wallet.csv");
        let rows: Vec<WalletRow> = self.read_rows("wallet", &path).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(WalletSample {
                    time: self.parse_time(&row.timestamp)?,
                    balance: row.wallet_balance,
                })
            })
            .collect())
    }

    async fn load_positions(&self, symbol: &str) -> TimeMachineResult<Vec<PositionRecord>> {
        let path = self.data_dir.join("positions.csv");
        let rows: Vec<PositionRow> = self.read_rows("positions", &path).await?;

        Ok(rows
            .into_iter()
            .filter(|row| same_instrument(&row.symbol, symbol))
            .filter_map(|row| {
                let open_time = self.parse_time(&row.open_time)?;
                let side: PositionSide = match row.side.parse() {
                    Ok(side) => side,
                    Err(e) => {
                        tracing::debug!("Skipping position {}: {}", row.id, e);
                        return None;
                    }
                };
                let close_time = row.close_time.as_deref().and_then(|t| self.parse_time(t));
                Some(PositionRecord {
                    id: row.id,
                    side,
                    open_time,
                    close_time,
                    max_size: row.max_size,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ohlcv")).unwrap();
        fs::write(
            dir.path().join("ohlcv/XBTUSD_1h.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-01T00:00:00Z,100,110,95,105,12\n\
             1704070800,105,106,101,102,8\n\
             not-a-time,1,1,1,1,1\n\
             2024-01-01T02:00:00Z,abc,1,1,1,1\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("trades.csv"),
            "id,datetime,symbol,side,price,amount\n\
             t1,2024-01-01T00:30:00Z,XBTUSD,Buy,101.5,2\n\
             t2,2024-01-01 01:15:00,BTCUSD,sell,103,1\n\
             t3,2024-01-01T00:45:00Z,ETHUSD,buy,2200,5\n\
             t4,2024-01-01T00:50:00Z,XBTUSD,hold,100,1\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("wallet.csv"),
            "timestamp,walletBalance\n2024-01-01,1.5\n2024-01-01T01:00:00Z,1.6\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("positions.csv"),
            "id,symbol,side,openTime,closeTime,maxSize\n\
             p1,XBTUSD,long,2024-01-01T00:30:00Z,2024-01-01T01:15:00Z,2\n\
             p2,XBTUSD,short,2024-01-01T01:30:00Z,,1\n\
             p3,ETHUSD,long,2024-01-01T00:30:00Z,,1\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("1704067200", EpochUnit::Seconds), Some(1_704_067_200));
        assert_eq!(parse_timestamp("1704067200000", EpochUnit::Millis), Some(1_704_067_200));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z", EpochUnit::Seconds), Some(1_704_067_200));
        assert_eq!(parse_timestamp("2024-01-01T08:00:00+08:00", EpochUnit::Seconds), Some(1_704_067_200));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00", EpochUnit::Seconds), Some(1_704_067_200));
        assert_eq!(parse_timestamp("2024-01-01", EpochUnit::Seconds), Some(1_704_067_200));
        assert_eq!(parse_timestamp("", EpochUnit::Seconds), None);
        assert_eq!(parse_timestamp("yesterday", EpochUnit::Seconds), None);
    }

    #[test]
    fn test_candle_path_uses_exchange_symbol() {
        let source = CsvTimelineSource::new("/data");
        assert_eq!(
            source.candle_path("btcusd", Timeframe::Minute5),
            PathBuf::from("/data/ohlcv/XBTUSD_5m.csv")
        );
    }

    #[tokio::test]
    async fn test_load_candles_skips_bad_rows() {
        let dir = fixture();
        let source = CsvTimelineSource::new(dir.path());

        let candles = source.load_candles("BTCUSD", Timeframe::Hour1).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_704_067_200);
        assert_eq!(candles[1].time, 1_704_070_800);
        assert_eq!(candles[1].close, 102.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let dir = fixture();
        let source = CsvTimelineSource::new(dir.path());

        let err = source.load_candles("BTCUSD", Timeframe::Day1).await.unwrap_err();
        assert!(matches!(err, TimeMachineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_trades_filtered_to_instrument() {
        let dir = fixture();
        let source = CsvTimelineSource::new(dir.path());

        let trades = source.load_trades("BTCUSD").await.unwrap();
        let ids: Vec<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[1].side, TradeSide::Sell);
        assert_eq!(trades[0].quantity, 2.0);
    }

    #[tokio::test]
    async fn test_wallet_and_positions() {
        let dir = fixture();
        let source = CsvTimelineSource::new(dir.path());

        let wallet = source.load_wallet().await.unwrap();
        assert_eq!(wallet.len(), 2);
        assert_eq!(wallet[1].balance, 1.6);

        let positions = source.load_positions("XBTUSD").await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].close_time, Some(1_704_071_700));
        assert_eq!(positions[1].side, PositionSide::Short);
        assert_eq!(positions[1].close_time, None);
    }
}
