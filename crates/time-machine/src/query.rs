//! Timeline query service
//!
//! Loads every series through a [`TimelineSource`], rolls candles up to the
//! requested timeframe, merges, windows and pages the result.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::aggregate::reaggregate;
use crate::cache::{Clock, TtlCache};
use crate::error::{TimeMachineError, TimeMachineResult};
use crate::merge::{merge, MergeInputs};
use crate::models::{CandleRecord, TimeRange, TimelinePoint};
use crate::source::TimelineSource;
use crate::symbols::display_symbol;
use crate::timeframe::Timeframe;
use crate::window::{apply_window, paginate, WindowRequest, DEFAULT_PAGE_LIMIT};

pub const DEFAULT_SYMBOL: &str = "BTCUSD";
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// A validated timeline request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineQuery {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub window: WindowRequest,
    pub page: usize,
    pub limit: usize,
}

impl Default for TimelineQuery {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            timeframe: Timeframe::Hour1,
            window: WindowRequest::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub points: Vec<TimelinePoint>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
    pub window_applied: bool,
    /// `None` exactly when `points` is empty
    pub range: Option<TimeRange>,
    /// Sources that could not be loaded
    pub warnings: Vec<String>,
}

/// Full merged timeline before windowing
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTimeline {
    pub points: Vec<TimelinePoint>,
    pub last_historical_time: Option<i64>,
    pub warnings: Vec<String>,
}

pub struct TimelineService<S> {
    source: Arc<S>,
    candle_cache: TtlCache<(String, Timeframe), Vec<CandleRecord>>,
    cache_ttl: Duration,
}

impl<S: TimelineSource> TimelineService<S> {
    pub fn new(source: Arc<S>, clock: Arc<dyn Clock>, cache_ttl: Duration) -> Self {
        Self {
            source,
            candle_cache: TtlCache::new(clock),
            cache_ttl,
        }
    }

    /// Merge every available series for `symbol` onto `timeframe`.
    ///
    /// Fails with `NotFound` only when no series could be loaded or all of
    /// them were empty.
    pub async fn build_timeline(&self, symbol: &str, timeframe: Timeframe) -> TimeMachineResult<BuiltTimeline> {
        let mut warnings = Vec::new();
        let mut inputs = MergeInputs::default();
        let mut usable = 0usize;

        let source_timeframe = timeframe.source();
        let cache_key = (display_symbol(symbol), source_timeframe);
        let candles = self
            .candle_cache
            .get_or_load(cache_key, self.cache_ttl, || {
                self.source.load_candles(symbol, source_timeframe)
            })
            .await;
        if let Some(candles) = collect(candles, &mut warnings, &mut usable) {
            inputs.candles = if source_timeframe != timeframe {
                reaggregate(&candles, source_timeframe, timeframe)
            } else {
                candles
            };
        }

        let projected = self.source.load_projected_candles(symbol, timeframe).await;
        if let Some(projected) = collect(projected, &mut warnings, &mut usable) {
            inputs.projected_candles = projected;
        }

        let trades = self.source.load_trades(symbol).await;
        if let Some(trades) = collect(trades, &mut warnings, &mut usable) {
            inputs.trades = trades;
        }

        let wallet = self.source.load_wallet().await;
        if let Some(wallet) = collect(wallet, &mut warnings, &mut usable) {
            inputs.wallet = wallet;
        }

        let positions = self.source.load_positions(symbol).await;
        if let Some(positions) = collect(positions, &mut warnings, &mut usable) {
            inputs.positions = positions;
        }

        if usable == 0 || inputs.is_empty() {
            return Err(TimeMachineError::NotFound(format!(
                "No timeline data found for {} {}",
                symbol, timeframe
            )));
        }

        let merged = merge(&inputs, timeframe);
        tracing::info!(
            "Built {} {} timeline: {} points, {} warnings",
            symbol,
            timeframe,
            merged.points.len(),
            warnings.len()
        );

        Ok(BuiltTimeline {
            points: merged.points,
            last_historical_time: merged.last_historical_time,
            warnings,
        })
    }

    pub async fn query(&self, query: &TimelineQuery) -> TimeMachineResult<TimelineResponse> {
        let built = self.build_timeline(&query.symbol, query.timeframe).await?;
        let windowed = apply_window(built.points, query.timeframe, &query.window);
        let page = paginate(&windowed.points, query.page, query.limit);
        let range = TimeRange::of(&page.points);

        Ok(TimelineResponse {
            symbol: query.symbol.clone(),
            timeframe: query.timeframe,
            points: page.points,
            page: page.page,
            limit: page.limit,
            total: page.total,
            has_more: page.has_more,
            window_applied: windowed.window_applied,
            range,
            warnings: built.warnings,
        })
    }
}

/// Keep a loaded series, or turn its failure into a warning
fn collect<T>(
    result: TimeMachineResult<Vec<T>>,
    warnings: &mut Vec<String>,
    usable: &mut usize,
) -> Option<Vec<T>> {
    match result {
        Ok(data) => {
            *usable += 1;
            Some(data)
        }
        Err(e) => {
            tracing::warn!("Timeline source skipped: {}", e);
            warnings.push(e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::models::{TradeRecord, TradeSide, WalletSample};
    use crate::source::StaticSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candle(time: i64, close: f64) -> CandleRecord {
        CandleRecord {
            time,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 10.0,
        }
    }

    fn hourly(count: i64) -> Vec<CandleRecord> {
        (0..count).map(|i| candle(i * 3_600, 100.0 + i as f64)).collect()
    }

    fn service(source: StaticSource) -> TimelineService<StaticSource> {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        TimelineService::new(Arc::new(source), clock, Duration::seconds(DEFAULT_CACHE_TTL_SECS))
    }

    #[tokio::test]
    async fn test_missing_sources_become_warnings() {
        let svc = service(StaticSource {
            candles: Some(hourly(4)),
            ..Default::default()
        });

        let response = svc.query(&TimelineQuery::default()).await.unwrap();
        assert_eq!(response.total, 4);
        assert_eq!(response.warnings.len(), 3);
        assert_eq!(response.range, Some(TimeRange { start: 0, end: 3 * 3_600 }));
    }

    #[tokio::test]
    async fn test_no_usable_source_is_not_found() {
        let svc = service(StaticSource::default());
        let err = svc.query(&TimelineQuery::default()).await.unwrap_err();
        assert!(matches!(err, TimeMachineError::NotFound(_)));

        let empty = service(StaticSource {
            candles: Some(Vec::new()),
            ..Default::default()
        });
        assert!(matches!(
            empty.query(&TimelineQuery::default()).await,
            Err(TimeMachineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filtered_to_empty_is_ok_with_null_range() {
        let svc = service(StaticSource {
            candles: Some(hourly(4)),
            ..Default::default()
        });
        let query = TimelineQuery {
            window: WindowRequest {
                start: Some(1_000_000),
                ..Default::default()
            },
            ..Default::default()
        };

        let response = svc.query(&query).await.unwrap();
        assert!(response.points.is_empty());
        assert_eq!(response.range, None);
        assert_eq!(response.total, 0);
        assert!(!response.has_more);
    }

    #[tokio::test]
    async fn test_four_hour_view_rolls_up_hourly_candles() {
        let svc = service(StaticSource {
            candles: Some(hourly(8)),
            trades: Some(vec![TradeRecord {
                id: "t".to_string(),
                time: 5 * 3_600 + 10,
                side: TradeSide::Buy,
                price: 104.0,
                quantity: 1.0,
            }]),
            wallet: Some(vec![WalletSample { time: 60, balance: 2.0 }]),
            positions: Some(Vec::new()),
            ..Default::default()
        });
        let query = TimelineQuery {
            timeframe: Timeframe::Hour4,
            ..Default::default()
        };

        let response = svc.query(&query).await.unwrap();
        assert!(response.warnings.is_empty());
        assert_eq!(response.points.len(), 2);

        let first = &response.points[0];
        let c = first.candle.unwrap();
        assert_eq!(c.open, 99.0);
        assert_eq!(c.close, 103.0);
        assert_eq!(c.volume, 40.0);
        assert_eq!(first.equity, Some(2.0));

        assert_eq!(response.points[1].trades.len(), 1);
        assert_eq!(response.points[1].net_exposure, Some(1.0));
    }

    #[tokio::test]
    async fn test_pages_over_windowed_points() {
        let svc = service(StaticSource {
            candles: Some(hourly(10)),
            ..Default::default()
        });
        let mut query = TimelineQuery {
            limit: 4,
            ..Default::default()
        };

        let first = svc.query(&query).await.unwrap();
        assert_eq!(first.points.first().unwrap().time, 6 * 3_600);
        assert!(first.has_more);

        query.page = 3;
        let last = svc.query(&query).await.unwrap();
        assert_eq!(last.points.len(), 2);
        assert!(!last.has_more);
        assert!(!last.window_applied);
    }

    struct CountingSource {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl TimelineSource for CountingSource {
        async fn load_candles(&self, _symbol: &str, _timeframe: Timeframe) -> TimeMachineResult<Vec<CandleRecord>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(hourly(2))
        }

        async fn load_trades(&self, _symbol: &str) -> TimeMachineResult<Vec<TradeRecord>> {
            Ok(Vec::new())
        }

        async fn load_wallet(&self) -> TimeMachineResult<Vec<WalletSample>> {
            Ok(Vec::new())
        }

        async fn load_positions(&self, _symbol: &str) -> TimeMachineResult<Vec<crate::models::PositionRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_candle_loads_are_cached_until_expiry() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let svc = TimelineService::new(source.clone(), clock.clone(), Duration::seconds(300));

        svc.build_timeline("XBTUSD", Timeframe::Hour1).await.unwrap();
        svc.build_timeline("BTCUSD", Timeframe::Hour4).await.unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        clock.advance(Duration::seconds(301));
        svc.build_timeline("BTCUSD", Timeframe::Hour1).await.unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
