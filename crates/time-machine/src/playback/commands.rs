//! Keyboard-style playback commands

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::engine::PlaybackEngine;
use super::Playable;

/// Speed multipliers selectable with keys "1" through "5"
pub const SPEED_PRESETS: [f64; 5] = [0.5, 1.0, 2.0, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "preset", rename_all = "camelCase")]
pub enum PlaybackCommand {
    NextFrame,
    PreviousFrame,
    TogglePlay,
    /// 1-based index into [`SPEED_PRESETS`]
    SelectSpeed(usize),
}

impl PlaybackCommand {
    pub fn apply<P: Playable>(self, engine: &mut PlaybackEngine<P>) {
        match self {
            PlaybackCommand::NextFrame => engine.step_forward(),
            PlaybackCommand::PreviousFrame => engine.step_backward(),
            PlaybackCommand::TogglePlay => engine.toggle_play(),
            PlaybackCommand::SelectSpeed(preset) => {
                match preset.checked_sub(1).and_then(|i| SPEED_PRESETS.get(i)) {
                    Some(&speed) => engine.set_speed(speed),
                    None => tracing::debug!("Ignoring unknown speed preset {}", preset),
                }
            }
        }
    }
}

/// Key → command bindings
#[derive(Debug, Clone)]
pub struct CommandTable {
    bindings: HashMap<String, PlaybackCommand>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.bind("ArrowRight", PlaybackCommand::NextFrame);
        table.bind("ArrowLeft", PlaybackCommand::PreviousFrame);
        table.bind(" ", PlaybackCommand::TogglePlay);
        table.bind("Space", PlaybackCommand::TogglePlay);
        for preset in 1..=SPEED_PRESETS.len() {
            table.bind(preset.to_string(), PlaybackCommand::SelectSpeed(preset));
        }
        table
    }
}

impl CommandTable {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind `key`, replacing any previous binding
    pub fn bind(&mut self, key: impl Into<String>, command: PlaybackCommand) {
        self.bindings.insert(key.into(), command);
    }

    pub fn unbind(&mut self, key: &str) -> Option<PlaybackCommand> {
        self.bindings.remove(key)
    }

    pub fn resolve(&self, key: &str) -> Option<PlaybackCommand> {
        self.bindings.get(key).copied()
    }

    /// Apply the command bound to `key`; returns it, or `None` for unbound keys
    pub fn dispatch<P: Playable>(&self, key: &str, engine: &mut PlaybackEngine<P>) -> Option<PlaybackCommand> {
        let command = self.resolve(key)?;
        command.apply(engine);
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimelinePoint;
    use crate::playback::PlaybackConfig;

    fn engine() -> PlaybackEngine<TimelinePoint> {
        let points: Vec<TimelinePoint> = [0, 60, 120].iter().map(|&t| TimelinePoint::empty(t)).collect();
        PlaybackEngine::new(points, PlaybackConfig::default())
    }

    #[test]
    fn test_default_bindings() {
        let table = CommandTable::default();
        let mut e = engine();

        assert_eq!(table.dispatch("ArrowRight", &mut e), Some(PlaybackCommand::NextFrame));
        assert_eq!(e.current_index(), 1);
        table.dispatch("ArrowLeft", &mut e);
        assert_eq!(e.current_index(), 0);

        table.dispatch(" ", &mut e);
        assert!(e.is_playing());
        table.dispatch("Space", &mut e);
        assert!(!e.is_playing());
    }

    #[test]
    fn test_speed_presets() {
        let table = CommandTable::default();
        let mut e = engine();

        table.dispatch("4", &mut e);
        assert_eq!(e.speed(), 5.0);
        table.dispatch("1", &mut e);
        assert_eq!(e.speed(), 0.5);

        PlaybackCommand::SelectSpeed(0).apply(&mut e);
        PlaybackCommand::SelectSpeed(6).apply(&mut e);
        assert_eq!(e.speed(), 0.5);
    }

    #[test]
    fn test_unbound_key_is_ignored() {
        let mut table = CommandTable::default();
        let mut e = engine();
        assert_eq!(table.dispatch("q", &mut e), None);

        table.bind("l", PlaybackCommand::NextFrame);
        assert_eq!(table.unbind("ArrowRight"), Some(PlaybackCommand::NextFrame));
        assert_eq!(table.dispatch("ArrowRight", &mut e), None);
        table.dispatch("l", &mut e);
        assert_eq!(e.current_index(), 1);
    }

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_string(&PlaybackCommand::SelectSpeed(3)).unwrap();
        assert_eq!(json, r#"{"command":"selectSpeed","preset":3}"#);
        let parsed: PlaybackCommand = serde_json::from_str(r#"{"command":"togglePlay"}"#).unwrap();
        assert_eq!(parsed, PlaybackCommand::TogglePlay);
    }
}
