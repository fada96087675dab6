//! Frame-clock driver
//!
//! A [`PlaybackSession`] holds the engine behind a mutex and runs one frame
//! task while the engine is playing. The task is aborted on pause, on stop
//! and when the session is dropped, so no frame is ever applied to a session
//! that has gone away.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::commands::CommandTable;
use super::engine::{PlaybackEngine, PlaybackSnapshot};
use super::Playable;
use crate::prefs::{BooleanPreference, PreferenceStore};

/// Default frame period, roughly one display refresh
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Source of frame timestamps in monotonic milliseconds
#[async_trait]
pub trait FrameClock: Send {
    async fn next_frame(&mut self) -> f64;
}

pub type FrameClockFactory = Arc<dyn Fn() -> Box<dyn FrameClock> + Send + Sync>;

/// Ticks on a tokio interval. Must be created inside a runtime.
pub struct IntervalFrameClock {
    interval: Interval,
    origin: Instant,
}

impl IntervalFrameClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            origin: Instant::now(),
        }
    }

    pub fn factory(period: Duration) -> FrameClockFactory {
        Arc::new(move || Box::new(IntervalFrameClock::new(period)) as Box<dyn FrameClock>)
    }
}

#[async_trait]
impl FrameClock for IntervalFrameClock {
    async fn next_frame(&mut self) -> f64 {
        let tick = self.interval.tick().await;
        tick.duration_since(self.origin).as_secs_f64() * 1_000.0
    }
}

/// A playback engine plus the frame task that drives it
pub struct PlaybackSession<P> {
    engine: Arc<Mutex<PlaybackEngine<P>>>,
    clocks: FrameClockFactory,
    task: Option<JoinHandle<()>>,
    show_candles: bool,
    candle_pref: Option<(Arc<dyn PreferenceStore>, BooleanPreference)>,
}

impl<P> PlaybackSession<P>
where
    P: Playable + Send + Sync + 'static,
{
    pub fn new(engine: PlaybackEngine<P>, clocks: FrameClockFactory) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            clocks,
            task: None,
            show_candles: true,
            candle_pref: None,
        }
    }

    /// Session ticking at [`DEFAULT_FRAME_PERIOD`]
    pub fn with_interval_clock(engine: PlaybackEngine<P>) -> Self {
        Self::new(engine, IntervalFrameClock::factory(DEFAULT_FRAME_PERIOD))
    }

    /// Back the candle toggle with a persisted preference, read once here
    pub fn with_candle_preference(mut self, store: Arc<dyn PreferenceStore>, pref: BooleanPreference) -> Self {
        self.show_candles = pref.load(store.as_ref());
        self.candle_pref = Some((store, pref));
        self
    }

    pub fn show_candles(&self) -> bool {
        self.show_candles
    }

    pub fn set_show_candles(&mut self, show: bool) {
        self.show_candles = show;
        if let Some((store, pref)) = &self.candle_pref {
            pref.store(store.as_ref(), show);
        }
    }

    fn engine(&self) -> MutexGuard<'_, PlaybackEngine<P>> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read-only access to the engine. Mutations go through [`Self::update`].
    pub fn inspect<R>(&self, f: impl FnOnce(&PlaybackEngine<P>) -> R) -> R {
        f(&self.engine())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.engine().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.engine().subscribe()
    }

    /// Run `f` against the engine, then start or stop the frame task to match
    pub fn update<R>(&mut self, f: impl FnOnce(&mut PlaybackEngine<P>) -> R) -> R {
        let result = f(&mut *self.engine());
        self.sync_driver();
        result
    }

    pub fn play(&mut self) {
        self.update(|e| e.play());
    }

    pub fn pause(&mut self) {
        self.update(|e| e.pause());
    }

    pub fn toggle_play(&mut self) {
        self.update(|e| e.toggle_play());
    }

    pub fn dispatch(&mut self, table: &CommandTable, key: &str) -> bool {
        self.update(|e| table.dispatch(key, e).is_some())
    }

    /// Whether a frame task is currently running
    pub fn is_driving(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the frame task to end on its own (playback reached the end)
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("Playback frame task failed: {}", e);
                }
            }
        }
    }

    /// Pause and cancel the frame subscription
    pub fn stop(&mut self) {
        self.engine().pause();
        self.cancel();
    }

    fn sync_driver(&mut self) {
        let playing = self.engine().is_playing();
        if playing && !self.is_driving() {
            let engine = Arc::clone(&self.engine);
            let clock = (self.clocks)();
            self.task = Some(tokio::spawn(drive(engine, clock)));
            tracing::debug!("Playback frame task started");
        } else if !playing {
            self.cancel();
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Playback frame task cancelled");
        }
    }
}

impl<P> Drop for PlaybackSession<P> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn drive<P: Playable>(engine: Arc<Mutex<PlaybackEngine<P>>>, mut clock: Box<dyn FrameClock>) {
    loop {
        let now = clock.next_frame().await;
        let still_playing = {
            let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
            engine.on_frame_at(now);
            engine.is_playing()
        };
        if !still_playing {
            break;
        }
    }
}
