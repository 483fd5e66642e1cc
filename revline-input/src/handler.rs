//! Keyboard to driver intents

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::commands::{Command, Held};

/// Volume step for `+` / `-`
const VOLUME_STEP: f32 = 0.1;

/// Handles keyboard input and converts to commands
///
/// Held controls map key presses (and auto-repeats) to [`Command::Press`]
/// and key releases to [`Command::Release`]. Terminals that never report
/// releases are covered by the hold timeout in [`crate::PedalSpring`].
/// Everything else fires once per physical press; repeats are ignored so a
/// held key can't flicker the ignition.
#[derive(Debug, Default)]
pub struct InputHandler;

impl InputHandler {
    pub fn new() -> Self {
        Self
    }

    /// Handle a key event and return a command if applicable
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Command::Quit);
        }

        if let Some(held) = Self::held_for(key.code) {
            return match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => Some(Command::Press(held)),
                KeyEventKind::Release => Some(Command::Release(held)),
            };
        }

        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Char('i') | KeyCode::Char('I') | KeyCode::Enter => Some(Command::ToggleIgnition),
            KeyCode::Char('l') | KeyCode::Char('L') => Some(Command::ToggleLights),
            KeyCode::Char('m') | KeyCode::Char('M') => Some(Command::ToggleMute),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::AdjustVolume(VOLUME_STEP)),
            KeyCode::Char('-') | KeyCode::Char('_') => Some(Command::AdjustVolume(-VOLUME_STEP)),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Reset),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }

    fn held_for(code: KeyCode) -> Option<Held> {
        match code {
            KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Held::Gas),
            KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Held::Brake),
            KeyCode::Char(' ') | KeyCode::Char('n') | KeyCode::Char('N') => Some(Held::Nitro),
            _ => None,
        }
    }
}
