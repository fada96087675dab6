//! Data-loading collaborator interface.

use async_trait::async_trait;

use crate::error::{TimeMachineError, TimeMachineResult};
use crate::models::{CandleRecord, PositionRecord, TradeRecord, WalletSample};
use crate::timeframe::Timeframe;

/// Supplies the raw series for one symbol. All times are epoch seconds.
///
/// A failing method makes only that series unavailable; the timeline is still
/// built from the others.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Candles stored at `timeframe` (already the file's native resolution)
    async fn load_candles(&self, symbol: &str, timeframe: Timeframe) -> TimeMachineResult<Vec<CandleRecord>>;

    /// Forecast candles beyond the recorded history
    async fn load_projected_candles(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
    ) -> TimeMachineResult<Vec<CandleRecord>> {
        Ok(Vec::new())
    }

    /// Executions for `symbol` only
    async fn load_trades(&self, symbol: &str) -> TimeMachineResult<Vec<TradeRecord>>;

    async fn load_wallet(&self) -> TimeMachineResult<Vec<WalletSample>>;

    async fn load_positions(&self, symbol: &str) -> TimeMachineResult<Vec<PositionRecord>>;
}

/// Fixed in-memory series; a `None` series reports itself unavailable
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub candles: Option<Vec<CandleRecord>>,
    pub projected_candles: Option<Vec<CandleRecord>>,
    pub trades: Option<Vec<TradeRecord>>,
    pub wallet: Option<Vec<WalletSample>>,
    pub positions: Option<Vec<PositionRecord>>,
}

fn series<T: Clone>(name: &str, data: &Option<Vec<T>>) -> TimeMachineResult<Vec<T>> {
    data.clone()
        .ok_or_else(|| TimeMachineError::source_unavailable(name, "no data loaded"))
}

#[async_trait]
impl TimelineSource for StaticSource {
    async fn load_candles(&self, _symbol: &str, _timeframe: Timeframe) -> TimeMachineResult<Vec<CandleRecord>> {
        series("candles", &self.candles)
    }

    async fn load_projected_candles(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
    ) -> TimeMachineResult<Vec<CandleRecord>> {
        Ok(self.projected_candles.clone().unwrap_or_default())
    }

    async fn load_trades(&self, _symbol: &str) -> TimeMachineResult<Vec<TradeRecord>> {
        series("trades", &self.trades)
    }

    async fn load_wallet(&self) -> TimeMachineResult<Vec<WalletSample>> {
        series("wallet", &self.wallet)
    }

    async fn load_positions(&self, _symbol: &str) -> TimeMachineResult<Vec<PositionRecord>> {
        series("positions", &self.positions)
    }
}
