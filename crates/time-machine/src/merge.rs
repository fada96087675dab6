//! Timeline Merger
//!
//! Folds every source into one bucket-keyed map and emits the points in time
//! order. Field ownership per source:
//!
//! - candles set `candle` (latest record for a bucket wins)
//! - projected candles fill `candle` only where no historical candle exists
//! - trades append to `trades`, ordered by `(time, id)`
//! - wallet samples set `equity` and `wallet_balance` (latest sample wins,
//!   equal times resolved by input order)
//! - positions append `Opened`/`Closed` markers
//!
//! `is_future` is decided once at the end against the latest raw timestamp of
//! every historical record.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{
    CandleRecord, MarkerEvent, MarkerKind, PositionRecord, RawRecord, TimelinePoint,
    TradeRecord, WalletSample,
};
use crate::timeframe::{bucket_of, Timeframe};

/// Everything the merger consumes, already normalised to epoch seconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeInputs {
    pub candles: Vec<CandleRecord>,
    /// Forecast candles; they never move the historical horizon
    pub projected_candles: Vec<CandleRecord>,
    pub trades: Vec<TradeRecord>,
    pub wallet: Vec<WalletSample>,
    pub positions: Vec<PositionRecord>,
}

impl MergeInputs {
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
            && self.projected_candles.is_empty()
            && self.trades.is_empty()
            && self.wallet.is_empty()
            && self.positions.is_empty()
    }

    /// Route one raw record to its series
    pub fn push(&mut self, record: RawRecord) {
        match record {
            RawRecord::Candle(c) => self.candles.push(c),
            RawRecord::Trade(t) => self.trades.push(t),
            RawRecord::WalletBalance(w) => self.wallet.push(w),
            RawRecord::PositionMarker(p) => self.positions.push(p),
        }
    }
}

impl FromIterator<RawRecord> for MergeInputs {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        let mut inputs = MergeInputs::default();
        for record in iter {
            inputs.push(record);
        }
        inputs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedTimeline {
    pub points: Vec<TimelinePoint>,
    /// Latest raw timestamp across historical records
    pub last_historical_time: Option<i64>,
    /// Records discarded for non-finite fields
    pub dropped: usize,
}

struct Merger {
    timeframe: Timeframe,
    points: BTreeMap<i64, TimelinePoint>,
    last_historical_time: Option<i64>,
    dropped: usize,
}

impl Merger {
    fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            points: BTreeMap::new(),
            last_historical_time: None,
            dropped: 0,
        }
    }

    fn observe(&mut self, time: i64) {
        self.last_historical_time = Some(self.last_historical_time.map_or(time, |t| t.max(time)));
    }

    fn point_mut(&mut self, time: i64) -> &mut TimelinePoint {
        let bucket = bucket_of(time, self.timeframe);
        self.points
            .entry(bucket)
            .or_insert_with(|| TimelinePoint::empty(bucket))
    }

    fn fold_candles(&mut self, candles: &[CandleRecord]) -> HashSet<i64> {
        let mut ordered: Vec<&CandleRecord> = candles.iter().filter(|c| c.is_finite()).collect();
        self.dropped += candles.len() - ordered.len();
        ordered.sort_by_key(|c| c.time);

        let mut filled = HashSet::new();
        for record in ordered {
            self.observe(record.time);
            let point = self.point_mut(record.time);
            point.candle = Some(record.candle());
            filled.insert(point.time);
        }
        filled
    }

    fn fold_projected(&mut self, candles: &[CandleRecord], historical: &HashSet<i64>) {
        let mut ordered: Vec<&CandleRecord> = candles.iter().filter(|c| c.is_finite()).collect();
        self.dropped += candles.len() - ordered.len();
        ordered.sort_by_key(|c| c.time);

        for record in ordered {
            if historical.contains(&bucket_of(record.time, self.timeframe)) {
                continue;
            }
            self.point_mut(record.time).candle = Some(record.candle());
        }
    }

    fn fold_trades(&mut self, trades: &[TradeRecord]) {
        let mut ordered: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_finite()).collect();
        self.dropped += trades.len() - ordered.len();
        ordered.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));

        for trade in ordered {
            self.observe(trade.time);
            self.point_mut(trade.time).trades.push(trade.clone());
        }
    }

    fn fold_wallet(&mut self, samples: &[WalletSample]) {
        let mut ordered: Vec<&WalletSample> =
            samples.iter().filter(|s| s.balance.is_finite()).collect();
        self.dropped += samples.len() - ordered.len();
        ordered.sort_by_key(|s| s.time);

        for sample in ordered {
            self.observe(sample.time);
            let point = self.point_mut(sample.time);
            point.equity = Some(sample.balance);
            point.wallet_balance = Some(sample.balance);
        }
    }

    fn fold_positions(&mut self, positions: &[PositionRecord]) {
        for position in positions {
            let closes_before_open = position.close_time.is_some_and(|t| t < position.open_time);
            if !position.max_size.is_finite() || closes_before_open {
                self.dropped += 1;
                continue;
            }

            self.observe(position.open_time);
            self.point_mut(position.open_time).markers.push(MarkerEvent {
                position_id: position.id.clone(),
                kind: MarkerKind::Opened,
                side: position.side,
                time: position.open_time,
                size: position.max_size,
            });

            if let Some(close_time) = position.close_time {
                self.observe(close_time);
                self.point_mut(close_time).markers.push(MarkerEvent {
                    position_id: position.id.clone(),
                    kind: MarkerKind::Closed,
                    side: position.side,
                    time: close_time,
                    size: position.max_size,
                });
            }
        }
    }

    fn finish(self) -> MergedTimeline {
        let last_historical_time = self.last_historical_time;
        let mut running: Option<f64> = None;

        let points = self
            .points
            .into_values()
            .map(|mut point| {
                point.markers.sort_by(|a, b| {
                    a.time
                        .cmp(&b.time)
                        .then_with(|| a.kind.cmp(&b.kind))
                        .then_with(|| a.position_id.cmp(&b.position_id))
                });

                for trade in &point.trades {
                    running = Some(running.unwrap_or(0.0) + trade.side.sign() * trade.quantity);
                }
                point.net_exposure = running;

                point.is_future = match last_historical_time {
                    Some(horizon) => point.time > horizon,
                    None => true,
                };
                point
            })
            .collect();

        MergedTimeline {
            points,
            last_historical_time,
            dropped: self.dropped,
        }
    }
}

/// Merge all sources onto the `timeframe` grid.
pub fn merge(inputs: &MergeInputs, timeframe: Timeframe) -> MergedTimeline {
    let mut merger = Merger::new(timeframe);

    let historical = merger.fold_candles(&inputs.candles);
    merger.fold_projected(&inputs.projected_candles, &historical);
    merger.fold_trades(&inputs.trades);
    merger.fold_wallet(&inputs.wallet);
    merger.fold_positions(&inputs.positions);

    let merged = merger.finish();
    if merged.dropped > 0 {
        tracing::debug!("Merge dropped {} malformed records", merged.dropped);
    }
    tracing::debug!(
        "Merged {} points at {} (horizon {:?})",
        merged.points.len(),
        timeframe,
        merged.last_historical_time
    );
    merged
}
