//! Time Machine
//!
//! Rebuilds a trading history as a single chronological timeline and plays
//! it back. Candles, executions, wallet balances and position lifecycles are
//! bucketed onto one timeframe grid, merged, windowed and paged for the API,
//! and driven through a simulation clock for replay.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod merge;
pub mod models;
pub mod playback;
pub mod prefs;
pub mod query;
pub mod source;
pub mod symbols;
pub mod timeframe;
pub mod window;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate_samples, candles_from_samples, reaggregate};
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use error::{TimeMachineError, TimeMachineResult};
pub use merge::{merge, MergeInputs, MergedTimeline};
pub use models::{
    Candle, CandleRecord, EpochUnit, MarkerEvent, MarkerKind, PositionRecord, PositionSide,
    PriceSample, RawRecord, TimeRange, TimelinePoint, TradeRecord, TradeSide, WalletSample,
};
pub use playback::{
    AdvancementStrategy, CommandTable, PlaybackCommand, PlaybackConfig, PlaybackEngine,
    PlaybackPhase, PlaybackSession, PlaybackSnapshot, Playable,
};
pub use prefs::{BooleanPreference, JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use query::{BuiltTimeline, TimelineQuery, TimelineResponse, TimelineService};
pub use source::{StaticSource, TimelineSource};
pub use timeframe::{bucket_of, Timeframe};
pub use window::{apply_window, paginate, Page, WindowRequest, Windowed};
