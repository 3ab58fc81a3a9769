/// Keyboard decoder.
///
/// Two kinds of input come out of here:
///   - `FrameInput`: continuous, level-triggered (held arrows / space)
///   - `Command`:   discrete, edge-triggered (undo, redo, restart, ...)
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{FrameInput, Horizontal};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const LEFT_KEYS: [KeyCode; 2] = [KeyCode::Left, KeyCode::Char('a')];
const RIGHT_KEYS: [KeyCode; 2] = [KeyCode::Right, KeyCode::Char('d')];
const JUMP_KEYS: [KeyCode; 3] = [KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('w')];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Undo,
    Redo,
    Restart,
    Pause,
    NextStage,
    Quit,
}

impl Command {
    fn from_key(key: &KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::Quit),
                KeyCode::Char('z') => Some(Command::Undo),
                KeyCode::Char('y') => Some(Command::Redo),
                _ => None,
            };
        }
        match key.code {
            KeyCode::Char('z') | KeyCode::Char('u') => Some(Command::Undo),
            KeyCode::Char('y') => Some(Command::Redo),
            KeyCode::Char('r') => Some(Command::Restart),
            KeyCode::Char('p') => Some(Command::Pause),
            KeyCode::Char('n') | KeyCode::Enter => Some(Command::NextStage),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Discrete commands pressed since the last drain.
    commands: Vec<Command>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            commands: Vec::with_capacity(4),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events. Call once per frame.
    pub fn drain_events(&mut self) {
        self.commands.clear();
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.handle_key(key, Instant::now());
            }
        }
        self.expire(Instant::now());
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            KeyEventKind::Press => {
                // Auto-repeat arrives as Press without enhancement: fire once per hold.
                let was_held = self.last_active.get(&key.code)
                    .map_or(false, |t| now.duration_since(*t) < HOLD_TIMEOUT);
                if !was_held {
                    if let Some(cmd) = Command::from_key(&key) {
                        self.commands.push(cmd);
                    }
                }
                self.last_active.insert(key.code, now);
            }
            _ => {
                self.last_active.insert(key.code, now);
            }
        }
    }

    /// Forget keys that have not been seen for `HOLD_TIMEOUT`.
    fn expire(&mut self, now: Instant) {
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| {
            self.last_active.get(c).map_or(false, |t| t.elapsed() < HOLD_TIMEOUT)
        })
    }

    /// Held movement keys for this frame. Opposite directions cancel.
    pub fn frame_input(&self) -> FrameInput {
        let horizontal = match (self.any_held(&LEFT_KEYS), self.any_held(&RIGHT_KEYS)) {
            (true, false) => Horizontal::Left,
            (false, true) => Horizontal::Right,
            _ => Horizontal::None,
        };
        FrameInput { horizontal, jump: self.any_held(&JUMP_KEYS) }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent { kind: KeyEventKind::Release, ..press(code) }
    }

    #[test]
    fn held_keys_map_to_frame_input() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_key(press(KeyCode::Right), now);
        input.handle_key(press(KeyCode::Char(' ')), now);
        let f = input.frame_input();
        assert_eq!(f.horizontal, Horizontal::Right);
        assert!(f.jump);
    }

    #[test]
    fn opposite_directions_cancel() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_key(press(KeyCode::Left), now);
        input.handle_key(press(KeyCode::Right), now);
        assert_eq!(input.frame_input().horizontal, Horizontal::None);
    }

    #[test]
    fn release_only_counts_when_honored() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_key(press(KeyCode::Left), now);
        input.handle_key(release(KeyCode::Left), now);
        assert_eq!(input.frame_input().horizontal, Horizontal::Left);

        input.honor_release = true;
        input.handle_key(release(KeyCode::Left), now);
        assert_eq!(input.frame_input().horizontal, Horizontal::None);
    }

    #[test]
    fn stale_keys_expire() {
        let mut input = InputState::new();
        let then = Instant::now();
        input.handle_key(press(KeyCode::Right), then);
        input.expire(then + HOLD_TIMEOUT * 2);
        assert_eq!(input.frame_input().horizontal, Horizontal::None);
    }

    #[test]
    fn held_command_fires_once() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.handle_key(press(KeyCode::Char('z')), now);
        input.handle_key(press(KeyCode::Char('z')), now + Duration::from_millis(30));
        assert_eq!(input.commands(), &[Command::Undo]);
    }

    #[test]
    fn meta_keys_become_commands() {
        let mut input = InputState::new();
        let now = Instant::now();
        for c in ['z', 'y', 'r', 'p', 'n', 'q'] {
            input.handle_key(press(KeyCode::Char(c)), now);
        }
        let ctrl_c = KeyEvent { modifiers: KeyModifiers::CONTROL, ..press(KeyCode::Char('c')) };
        input.handle_key(ctrl_c, now);
        assert_eq!(
            input.commands(),
            &[
                Command::Undo,
                Command::Redo,
                Command::Restart,
                Command::Pause,
                Command::NextStage,
                Command::Quit,
                Command::Quit,
            ]
        );
    }
}
