//! Timeline playback
//!
//! A simulation clock over an ordered point sequence. The engine itself is
//! synchronous and never blocks; [`PlaybackSession`] connects it to a frame
//! clock and owns the running frame subscription.

pub mod commands;
pub mod driver;
pub mod engine;
pub mod strategy;

pub use commands::{CommandTable, PlaybackCommand, SPEED_PRESETS};
pub use driver::{FrameClock, FrameClockFactory, IntervalFrameClock, PlaybackSession};
pub use engine::{PlaybackEngine, PlaybackPhase, PlaybackSnapshot};
pub use strategy::{AdvancementStrategy, PlaybackConfig};

use crate::models::TimelinePoint;

/// Anything that can be placed on the playback clock
pub trait Playable {
    /// Position on the timeline, in timeline units
    fn timestamp(&self) -> i64;

    /// Hidden while future data is switched off
    fn is_future(&self) -> bool {
        false
    }
}

impl Playable for TimelinePoint {
    fn timestamp(&self) -> i64 {
        self.time
    }

    fn is_future(&self) -> bool {
        self.is_future
    }
}
