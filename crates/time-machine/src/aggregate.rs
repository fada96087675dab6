use std::collections::BTreeMap;

use crate::models::{Candle, CandleRecord, PriceSample};
use crate::timeframe::{bucket_of, Timeframe};

/// Reduce the samples of one bucket into a single candle.
///
/// Samples are sorted by time here (stable, so equal timestamps keep input
/// order). Non-finite samples are dropped. Returns `None` when nothing usable
/// remains.
///
/// - open = first sample's price
/// - high = max price
/// - low = min price
/// - close = last sample's price
/// - volume = sum of sizes
pub fn aggregate_samples(samples: &[PriceSample]) -> Option<Candle> {
    let mut ordered: Vec<&PriceSample> = samples
        .iter()
        .filter(|s| s.price.is_finite() && s.size.is_finite())
        .collect();

    let dropped = samples.len() - ordered.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} malformed price samples", dropped);
    }

    ordered.sort_by_key(|s| s.time);

    let first = ordered.first()?;
    let last = ordered.last()?;

    let high = ordered.iter().map(|s| s.price).fold(f64::MIN, f64::max);
    let low = ordered.iter().map(|s| s.price).fold(f64::MAX, f64::min);
    let volume: f64 = ordered.iter().map(|s| s.size).sum();

    Some(Candle {
        open: first.price,
        high,
        low,
        close: last.price,
        volume,
    })
}

/// Bucket raw samples onto `timeframe` and build one candle per bucket.
pub fn candles_from_samples(samples: &[PriceSample], timeframe: Timeframe) -> Vec<CandleRecord> {
    let mut buckets: BTreeMap<i64, Vec<PriceSample>> = BTreeMap::new();
    for sample in samples {
        buckets
            .entry(bucket_of(sample.time, timeframe))
            .or_default()
            .push(*sample);
    }

    buckets
        .into_iter()
        .filter_map(|(time, bucket)| {
            aggregate_samples(&bucket).map(|c| CandleRecord {
                time,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            })
        })
        .collect()
}

/// Roll candles up from `source` to a coarser `target` timeframe.
///
/// The width ratio must be a whole number of at least 2; otherwise the
/// candles are returned unchanged. Each source candle contributes its own
/// OHLCV rather than a single price.
pub fn reaggregate(candles: &[CandleRecord], source: Timeframe, target: Timeframe) -> Vec<CandleRecord> {
    let source_width = source.seconds();
    let target_width = target.seconds();

    if target_width % source_width != 0 || target_width / source_width < 2 {
        return candles.to_vec();
    }

    let mut buckets: BTreeMap<i64, Vec<&CandleRecord>> = BTreeMap::new();
    for candle in candles.iter().filter(|c| c.is_finite()) {
        buckets
            .entry(bucket_of(candle.time, target))
            .or_default()
            .push(candle);
    }

    buckets
        .into_iter()
        .filter_map(|(time, mut group)| {
            group.sort_by_key(|c| c.time);
            make_bucket_candle(time, &group)
        })
        .collect()
}

fn make_bucket_candle(time: i64, group: &[&CandleRecord]) -> Option<CandleRecord> {
    let first = group.first()?;
    let last = group.last()?;

    Some(CandleRecord {
        time,
        open: first.open,
        high: group.iter().map(|c| c.high).fold(f64::MIN, f64::max),
        low: group.iter().map(|c| c.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: group.iter().map(|c| c.volume).sum(),
    })
}
