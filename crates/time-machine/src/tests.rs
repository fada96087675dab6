use crate::merge::{merge, MergeInputs};
use crate::models::*;
use crate::playback::{PlaybackConfig, PlaybackEngine, PlaybackPhase};
use crate::timeframe::{bucket_of, Timeframe};
use crate::window::{apply_window, paginate, WindowRequest};

/// Helper: flat candle at `time`.
fn candle(time: i64, close: f64) -> CandleRecord {
    CandleRecord {
        time,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 3.0,
    }
}

/// Helper: trade with a fixed price.
fn trade(id: &str, time: i64, side: TradeSide, quantity: f64) -> TradeRecord {
    TradeRecord {
        id: id.to_string(),
        time,
        side,
        price: 25_000.0,
        quantity,
    }
}

fn position(id: &str, open_time: i64, close_time: Option<i64>) -> PositionRecord {
    PositionRecord {
        id: id.to_string(),
        side: PositionSide::Long,
        open_time,
        close_time,
        max_size: 1.0,
    }
}

/// A day of mixed history on the hourly grid plus two forecast hours.
fn history() -> MergeInputs {
    MergeInputs {
        candles: (0..24).map(|h| candle(h * 3_600, 100.0 + h as f64)).collect(),
        projected_candles: vec![candle(24 * 3_600, 130.0), candle(25 * 3_600, 131.0)],
        trades: vec![
            trade("a", 1_800, TradeSide::Buy, 2.0),
            trade("b", 1_800, TradeSide::Buy, 1.0),
            trade("c", 5 * 3_600 + 59, TradeSide::Sell, 0.5),
            trade("d", 20 * 3_600, TradeSide::Sell, 2.5),
        ],
        wallet: vec![
            WalletSample { time: 3_599, balance: 1.0 },
            WalletSample { time: 12 * 3_600, balance: 1.2 },
            WalletSample { time: 12 * 3_600 + 30, balance: 1.25 },
        ],
        positions: vec![
            position("p1", 1_800, Some(20 * 3_600)),
            position("p2", 22 * 3_600, None),
        ],
    }
}

fn reversed(inputs: &MergeInputs) -> MergeInputs {
    let mut out = inputs.clone();
    out.candles.reverse();
    out.projected_candles.reverse();
    out.trades.reverse();
    out.wallet.reverse();
    out.positions.reverse();
    out
}

// ---- Merge ----

#[test]
fn test_merge_is_deterministic() {
    let inputs = history();
    assert_eq!(merge(&inputs, Timeframe::Hour1), merge(&inputs, Timeframe::Hour1));
}

#[test]
fn test_merge_ignores_input_order() {
    let inputs = history();
    for tf in [Timeframe::Minute15, Timeframe::Hour1, Timeframe::Hour4, Timeframe::Day1] {
        assert_eq!(merge(&inputs, tf), merge(&reversed(&inputs), tf), "timeframe {}", tf);
    }
}

#[test]
fn test_points_sit_on_bucket_boundaries() {
    let mut inputs = history();
    inputs.trades.push(trade("neg", -90_001, TradeSide::Buy, 1.0));

    for tf in Timeframe::all() {
        let merged = merge(&inputs, *tf);
        let times: Vec<i64> = merged.points.iter().map(|p| p.time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{} not strictly ascending", tf);
        for t in times {
            assert_eq!(bucket_of(t, *tf), t);
        }
    }
}

#[test]
fn test_future_flag_matches_horizon() {
    let merged = merge(&history(), Timeframe::Hour1);
    let horizon = merged.last_historical_time.unwrap();
    assert_eq!(horizon, 23 * 3_600);

    for point in &merged.points {
        assert_eq!(point.is_future, point.time > horizon, "point {}", point.time);
    }
    assert_eq!(merged.points.iter().filter(|p| p.is_future).count(), 2);
}

#[test]
fn test_day_view_accumulates_exposure_and_markers() {
    let merged = merge(&history(), Timeframe::Day1);
    assert_eq!(merged.points.len(), 2);

    let day = &merged.points[0];
    assert_eq!(day.trades.len(), 4);
    assert_eq!(day.net_exposure, Some(0.0));
    assert_eq!(day.equity, Some(1.25));
    let kinds: Vec<(&str, MarkerKind)> = day
        .markers
        .iter()
        .map(|m| (m.position_id.as_str(), m.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![("p1", MarkerKind::Opened), ("p1", MarkerKind::Closed), ("p2", MarkerKind::Opened)]
    );
}

#[test]
fn test_raw_records_route_to_series() {
    let records = vec![
        RawRecord::Candle(candle(0, 1.0)),
        RawRecord::Trade(trade("x", 10, TradeSide::Buy, 1.0)),
        RawRecord::WalletBalance(WalletSample { time: 20, balance: 3.0 }),
        RawRecord::PositionMarker(position("p", 30, None)),
    ];
    assert_eq!(records.iter().map(RawRecord::time).max(), Some(30));

    let inputs: MergeInputs = records.into_iter().collect();
    let merged = merge(&inputs, Timeframe::Minute1);
    assert_eq!(merged.points.len(), 1);
    let point = &merged.points[0];
    assert!(point.candle.is_some());
    assert_eq!(point.trades.len(), 1);
    assert_eq!(point.wallet_balance, Some(3.0));
    assert_eq!(point.markers.len(), 1);
}

// ---- Windowing and paging ----

#[test]
fn test_pages_partition_timeline() {
    let merged = merge(&history(), Timeframe::Hour1);
    let all = merged.points;
    let n = all.len() / 2;
    assert_eq!(all.len(), 2 * n);

    let first = paginate(&all, 1, n);
    let second = paginate(&all, 2, n);
    let third = paginate(&all, 3, n);

    assert!(first.has_more);
    assert!(!second.has_more);
    assert!(third.points.is_empty());

    let mut stitched = second.points.clone();
    stitched.extend(first.points.clone());
    assert_eq!(stitched, all);
}

#[test]
fn test_window_then_range() {
    let merged = merge(&history(), Timeframe::Hour1);
    let request = WindowRequest {
        start: Some(10 * 3_600),
        end: Some(12 * 3_600),
        window_days: None,
    };
    let windowed = apply_window(merged.points, Timeframe::Hour1, &request);
    assert_eq!(
        TimeRange::of(&windowed.points),
        Some(TimeRange { start: 10 * 3_600, end: 12 * 3_600 })
    );
    assert_eq!(windowed.points.len(), 3);
}

// ---- Playback over a merged timeline ----

#[test]
fn test_playback_over_merged_timeline() {
    let merged = merge(&history(), Timeframe::Hour1);
    let config = PlaybackConfig {
        time_scale: 3_600.0,
        ..Default::default()
    };
    let mut engine = PlaybackEngine::new(merged.points, config);
    assert_eq!(engine.len(), 26);

    engine.play();
    engine.on_frame(12.5);
    assert_eq!(engine.current_point().unwrap().time, 12 * 3_600);
    assert!(engine.is_playing());

    engine.on_frame(1_000.0);
    assert_eq!(engine.phase(), PlaybackPhase::Paused);
    assert!(engine.current_point().unwrap().is_future);

    engine.set_show_future(false);
    assert_eq!(engine.len(), 24);
    assert_eq!(engine.current_point().unwrap().time, 23 * 3_600);
    assert_eq!(engine.progress(), 1.0);
}
