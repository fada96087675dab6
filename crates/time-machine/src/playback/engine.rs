//! Playback state machine
//!
//! `Idle` (nothing to play) → `Paused` ⇄ `Playing`. Scrubbing is a separate
//! flag that never moves the clock. Every operation clamps its input instead
//! of failing, and every state change is published to subscribers before the
//! call returns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::strategy::{AdvancementStrategy, PlaybackConfig};
use super::Playable;

/// Relative slack when comparing accumulated frame time against a gap, so
/// the same total elapsed time lands on the same index however it is chopped.
const ACCUMULATOR_TOLERANCE: f64 = 1e-9;

fn reaches(accumulated: f64, threshold: f64) -> bool {
    accumulated >= threshold - threshold.abs() * ACCUMULATOR_TOLERANCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    Idle,
    Paused,
    Playing,
}

/// Observable playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub phase: PlaybackPhase,
    pub current_index: usize,
    pub current_time: Option<i64>,
    pub point_count: usize,
    pub is_playing: bool,
    pub speed_multiplier: f64,
    pub show_future: bool,
    pub progress: f64,
    pub is_scrubbing: bool,
}

pub struct PlaybackEngine<P> {
    points: Arc<[P]>,
    /// Indices into `points` that are currently playable, ascending by time
    visible: Vec<usize>,
    strategy: AdvancementStrategy,
    time_scale: f64,
    phase: PlaybackPhase,
    current_index: usize,
    speed: f64,
    show_future: bool,
    is_scrubbing: bool,
    progress: f64,
    /// Scaled time (gap strategy) or real ms (tick strategy) not yet spent
    accumulator: f64,
    last_frame_at: Option<f64>,
    notifier: watch::Sender<PlaybackSnapshot>,
}

impl<P: Playable> PlaybackEngine<P> {
    pub fn new(points: impl Into<Arc<[P]>>, config: PlaybackConfig) -> Self {
        let speed = if config.initial_speed.is_finite() && config.initial_speed > 0.0 {
            config.initial_speed
        } else {
            1.0
        };
        let time_scale = if config.time_scale.is_finite() && config.time_scale > 0.0 {
            config.time_scale
        } else {
            1.0
        };

        let initial = PlaybackSnapshot {
            phase: PlaybackPhase::Idle,
            current_index: 0,
            current_time: None,
            point_count: 0,
            is_playing: false,
            speed_multiplier: speed,
            show_future: config.show_future,
            progress: 0.0,
            is_scrubbing: false,
        };
        let (notifier, _) = watch::channel(initial);

        let mut engine = Self {
            points: points.into(),
            visible: Vec::new(),
            strategy: config.strategy,
            time_scale,
            phase: PlaybackPhase::Idle,
            current_index: config.initial_index,
            speed,
            show_future: config.show_future,
            is_scrubbing: false,
            progress: 0.0,
            accumulator: 0.0,
            last_frame_at: None,
            notifier,
        };
        engine.refilter();
        engine.publish();
        engine
    }

    // --- observation ---

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.notifier.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            phase: self.phase,
            current_index: self.current_index,
            current_time: self.time_at(self.current_index),
            point_count: self.visible.len(),
            is_playing: self.is_playing(),
            speed_multiplier: self.speed,
            show_future: self.show_future,
            progress: self.progress,
            is_scrubbing: self.is_scrubbing,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn show_future(&self) -> bool {
        self.show_future
    }

    pub fn is_scrubbing(&self) -> bool {
        self.is_scrubbing
    }

    pub fn strategy(&self) -> AdvancementStrategy {
        self.strategy
    }

    /// Number of playable points after the future filter
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Playable point at `index`
    pub fn point(&self, index: usize) -> Option<&P> {
        self.visible.get(index).map(|&i| &self.points[i])
    }

    pub fn current_point(&self) -> Option<&P> {
        self.point(self.current_index)
    }

    pub fn visible_points(&self) -> impl Iterator<Item = &P> + '_ {
        self.visible.iter().map(move |&i| &self.points[i])
    }

    // --- transport ---

    /// Start playing; needs at least two playable points
    pub fn play(&mut self) {
        if self.visible.len() < 2 || self.is_playing() {
            return;
        }
        self.phase = PlaybackPhase::Playing;
        self.last_frame_at = None;
        self.publish();
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.phase = PlaybackPhase::Paused;
        self.last_frame_at = None;
        self.publish();
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() || speed <= 0.0 {
            return;
        }
        self.speed = speed;
        self.publish();
    }

    pub fn set_strategy(&mut self, strategy: AdvancementStrategy) {
        self.strategy = strategy;
        self.accumulator = 0.0;
        self.update_progress();
        self.publish();
    }

    pub fn begin_scrub(&mut self) {
        self.is_scrubbing = true;
        self.publish();
    }

    pub fn end_scrub(&mut self) {
        self.is_scrubbing = false;
        self.publish();
    }

    // --- seeking ---

    pub fn seek_to_index(&mut self, index: usize) {
        self.current_index = index.min(self.visible.len().saturating_sub(1));
        self.accumulator = 0.0;
        self.update_progress();
        self.publish();
    }

    /// Seek to the point nearest `progress` of the time span (earliest on ties)
    pub fn seek_to_progress(&mut self, progress: f64) {
        let (Some(first), Some(last)) = (self.time_at(0), self.last_time()) else {
            return;
        };

        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        if progress >= 1.0 {
            self.seek_to_index(self.visible.len() - 1);
            return;
        }

        let target = first as f64 + progress * (last - first) as f64;
        let mut nearest = 0;
        let mut nearest_delta = f64::INFINITY;
        for (index, point) in self.visible_points().enumerate() {
            let delta = (point.timestamp() as f64 - target).abs();
            if delta < nearest_delta {
                nearest = index;
                nearest_delta = delta;
            }
        }
        self.seek_to_index(nearest);
    }

    /// Seek to the first point at or after `timestamp`; no-op if there is none
    pub fn jump_to_time(&mut self, timestamp: i64) {
        let found = self.visible_points().position(|p| p.timestamp() >= timestamp);
        if let Some(index) = found {
            self.seek_to_index(index);
        }
    }

    pub fn step_forward(&mut self) {
        self.seek_to_index(self.current_index.saturating_add(1));
    }

    pub fn step_backward(&mut self) {
        self.seek_to_index(self.current_index.saturating_sub(1));
    }

    // --- sequence changes ---

    pub fn set_show_future(&mut self, show_future: bool) {
        if self.show_future == show_future {
            return;
        }
        self.show_future = show_future;
        self.refilter();
        self.publish();
    }

    /// Swap in a new point sequence; position is clamped into it
    pub fn replace_points(&mut self, points: impl Into<Arc<[P]>>) {
        self.points = points.into();
        self.refilter();
        self.publish();
    }

    // --- clock ---

    /// Feed a frame timestamp (monotonic ms). The first frame after play only
    /// sets the reference point.
    pub fn on_frame_at(&mut self, timestamp_ms: f64) {
        if !self.is_playing() {
            self.last_frame_at = None;
            return;
        }
        if let Some(previous) = self.last_frame_at.replace(timestamp_ms) {
            self.on_frame(timestamp_ms - previous);
        }
    }

    /// Advance by `elapsed_ms` of real time
    pub fn on_frame(&mut self, elapsed_ms: f64) {
        if !self.is_playing() {
            return;
        }
        let last = self.visible.len().saturating_sub(1);
        if self.current_index >= last {
            self.finish();
            return;
        }
        if !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return;
        }

        match self.strategy {
            AdvancementStrategy::TimestampGap => {
                self.accumulator += elapsed_ms * self.speed * self.time_scale;
                while self.current_index < last {
                    let gap = self.gap_after(self.current_index);
                    if !reaches(self.accumulator, gap) {
                        break;
                    }
                    self.accumulator = (self.accumulator - gap).max(0.0);
                    self.current_index += 1;
                }
            }
            AdvancementStrategy::FixedTick {
                step,
                base_interval_ms,
            } => {
                let interval = base_interval_ms.max(1.0) / self.speed;
                self.accumulator += elapsed_ms;
                while self.current_index < last && reaches(self.accumulator, interval) {
                    self.accumulator = (self.accumulator - interval).max(0.0);
                    self.current_index = (self.current_index + step.max(1)).min(last);
                }
            }
        }

        if self.current_index >= last {
            self.finish();
        } else {
            self.update_progress();
            self.publish();
        }
    }

    // --- internals ---

    fn finish(&mut self) {
        self.phase = PlaybackPhase::Paused;
        self.accumulator = 0.0;
        self.last_frame_at = None;
        self.update_progress();
        self.publish();
    }

    fn refilter(&mut self) {
        let points = &self.points;
        let show_future = self.show_future;
        let mut visible: Vec<usize> = (0..points.len())
            .filter(|&i| show_future || !points[i].is_future())
            .collect();
        visible.sort_by_key(|&i| points[i].timestamp());
        self.visible = visible;

        self.current_index = self.current_index.min(self.visible.len().saturating_sub(1));
        self.accumulator = 0.0;

        match (self.visible.len(), self.phase) {
            (0, _) => self.phase = PlaybackPhase::Idle,
            (1, PlaybackPhase::Playing) => self.phase = PlaybackPhase::Paused,
            (_, PlaybackPhase::Idle) => self.phase = PlaybackPhase::Paused,
            _ => {}
        }
        self.update_progress();
    }

    fn time_at(&self, index: usize) -> Option<i64> {
        self.point(index).map(|p| p.timestamp())
    }

    fn last_time(&self) -> Option<i64> {
        self.visible.len().checked_sub(1).and_then(|i| self.time_at(i))
    }

    /// Gap to the next point, at least one timeline unit
    fn gap_after(&self, index: usize) -> f64 {
        match (self.time_at(index), self.time_at(index + 1)) {
            (Some(a), Some(b)) => ((b - a) as f64).max(1.0),
            _ => 1.0,
        }
    }

    fn update_progress(&mut self) {
        let count = self.visible.len();
        if count < 2 {
            self.progress = 0.0;
            return;
        }

        let ratio = match self.strategy {
            AdvancementStrategy::TimestampGap => {
                let (Some(first), Some(last), Some(current)) =
                    (self.time_at(0), self.last_time(), self.time_at(self.current_index))
                else {
                    self.progress = 0.0;
                    return;
                };
                let span = if last > first {
                    (last - first) as f64
                } else {
                    (count - 1) as f64
                };
                (current as f64 + self.accumulator - first as f64) / span
            }
            AdvancementStrategy::FixedTick { .. } => self.current_index as f64 / (count - 1) as f64,
        };
        self.progress = ratio.clamp(0.0, 1.0);
    }

    fn publish(&self) {
        self.notifier.send_replace(self.snapshot());
    }
}
