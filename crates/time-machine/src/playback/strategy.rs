use serde::{Deserialize, Serialize};

/// How elapsed real time turns into index movement.
///
/// The two pace differently when points are unevenly spaced: `TimestampGap`
/// spends longer on wide gaps, `FixedTick` moves at a constant index rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AdvancementStrategy {
    /// Advance once the scaled elapsed time covers the gap to the next point
    TimestampGap,
    /// Advance `step` points every `base_interval_ms / speed` of real time
    #[serde(rename_all = "camelCase")]
    FixedTick { step: usize, base_interval_ms: f64 },
}

impl AdvancementStrategy {
    /// One point per second at 1x
    pub fn fixed_tick() -> Self {
        AdvancementStrategy::FixedTick {
            step: 1,
            base_interval_ms: 1_000.0,
        }
    }
}

impl Default for AdvancementStrategy {
    fn default() -> Self {
        AdvancementStrategy::TimestampGap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfig {
    pub strategy: AdvancementStrategy,
    pub initial_index: usize,
    pub initial_speed: f64,
    pub show_future: bool,
    /// Timeline units covered per real millisecond at 1x (gap strategy only)
    pub time_scale: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            strategy: AdvancementStrategy::default(),
            initial_index: 0,
            initial_speed: 1.0,
            show_future: true,
            time_scale: 1.0,
        }
    }
}
