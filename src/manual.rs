//! # Keyboard control
//!
//! The manual flow flies the Crazyflie from the keyboard:
//!
//! | Key | Motion |
//! |-----|--------|
//! | `w` / `s` | forward / back |
//! | `a` / `d` | left / right |
//! | `space` / `shift` | up / down |
//! | `q` / `e` | turn left / right |
//! | `esc` | stop, land and exit |
//!
//! Input is event driven: a [KeySource] yields a [KeyState], the set of keys held, every time it changes. For each
//! state the [ManualDriver] sends one continuous motion per held key, in the order of the table above, or a stop
//! when no movement key is held. Holding two opposite keys sends both commands and the last one wins.
//!
//! [TerminalKeys] reads the keys from the terminal with crossterm. Terminals reporting key releases give exact
//! held-key tracking; on the others a key counts as held while it auto-repeats, and as released when no repeat
//! comes within [HOLD_TIMEOUT].

use crate::motion::{Direction, Motion, Turn};
use crate::{Error, Result};
use async_trait::async_trait;
use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    ModifierKeyCode, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::io::stdout;
use std::time::Duration;

/// Time without auto-repeat after which a key is considered released, on terminals without release events
pub const HOLD_TIMEOUT: Duration = Duration::from_millis(600);

/// Landing velocity when exiting (m/s)
pub const LANDING_VELOCITY: f32 = 0.5;

/// Keys of the control surface, in command order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Forward
    W,
    /// Back
    S,
    /// Left
    A,
    /// Right
    D,
    /// Up
    Space,
    /// Down
    Shift,
    /// Turn left
    Q,
    /// Turn right
    E,
    /// Stop, land and exit
    Esc,
}

/// What a key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Continuous translation
    Move(Direction),
    /// Continuous rotation
    Turn(Turn),
    /// End of the manual flight
    Exit,
}

impl Key {
    /// Action bound to the key
    pub fn action(self) -> KeyAction {
        match self {
            Key::W => KeyAction::Move(Direction::Forward),
            Key::S => KeyAction::Move(Direction::Back),
            Key::A => KeyAction::Move(Direction::Left),
            Key::D => KeyAction::Move(Direction::Right),
            Key::Space => KeyAction::Move(Direction::Up),
            Key::Shift => KeyAction::Move(Direction::Down),
            Key::Q => KeyAction::Turn(Turn::Left),
            Key::E => KeyAction::Turn(Turn::Right),
            Key::Esc => KeyAction::Exit,
        }
    }

    /// Key of a crossterm key code, if it is part of the control surface
    pub fn from_code(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                'w' => Some(Key::W),
                's' => Some(Key::S),
                'a' => Some(Key::A),
                'd' => Some(Key::D),
                ' ' => Some(Key::Space),
                'q' => Some(Key::Q),
                'e' => Some(Key::E),
                _ => None,
            },
            KeyCode::Esc => Some(Key::Esc),
            KeyCode::Modifier(ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift) => Some(Key::Shift),
            _ => None,
        }
    }
}

/// Set of held keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    held: BTreeSet<Key>,
}

impl KeyState {
    /// State with the given keys held
    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            held: keys.into_iter().collect(),
        }
    }

    /// Mark `key` as held
    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }

    /// Mark `key` as released
    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    /// True if `key` is held
    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// True if no key is held
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Held keys, in command order
    pub fn held(&self) -> impl Iterator<Item = Key> + '_ {
        self.held.iter().copied()
    }
}

/// Source of keyboard states
#[async_trait]
pub trait KeySource: Send {
    /// Wait for the next state, `None` once the input is closed
    async fn next_state(&mut self) -> Result<Option<KeyState>>;
}

/// # Keyboard to motion translation
///
/// See the [module documentation](crate::manual) for the key bindings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualDriver {
    speed: f32,
    turn_rate: f32,
    landing_velocity: f32,
}

impl ManualDriver {
    /// Driver moving at `speed` (m/s) and turning at `turn_rate` (deg/s)
    pub fn new(speed: f32, turn_rate: f32) -> Self {
        Self {
            speed,
            turn_rate,
            landing_velocity: LANDING_VELOCITY,
        }
    }

    /// Send the commands for one keyboard state
    ///
    /// Returns `false` if `esc` is held, without sending anything: the caller has to stop and land.
    pub async fn apply<M: Motion + ?Sized>(&self, motion: &mut M, state: &KeyState) -> Result<bool> {
        if state.is_held(Key::Esc) {
            return Ok(false);
        }

        let mut moving = false;
        for key in state.held() {
            match key.action() {
                KeyAction::Move(direction) => motion.start_move(direction, self.speed).await?,
                KeyAction::Turn(turn) => motion.start_turn(turn, self.turn_rate).await?,
                KeyAction::Exit => continue,
            }
            moving = true;
        }

        if !moving {
            motion.stop().await?;
        }
        Ok(true)
    }

    /// Fly from the keyboard until `esc` is pressed or the input closes, then stop and land
    pub async fn run<M, K>(&self, motion: &mut M, keys: &mut K) -> Result<()>
    where
        M: Motion + ?Sized,
        K: KeySource + ?Sized,
    {
        log::info!("Speed set to {} m/s", self.speed);

        while let Some(state) = keys.next_state().await? {
            if !self.apply(motion, &state).await? {
                log::info!("Exit requested");
                break;
            }
        }

        motion.stop().await?;
        motion.land(self.landing_velocity).await
    }
}

/// Key bindings, printed before the manual flight starts
pub const HELP: &str = "Press W,A,S,D for horizontal\nShift,Space for vertical\nQ,E for turning\nESC to quit";

/// Held-key tracking from terminal key events
#[derive(Debug, Clone, Default)]
pub struct KeyTracker {
    state: KeyState,
    release_events: bool,
}

impl KeyTracker {
    /// Tracker for a terminal that does, or does not, report key releases
    pub fn new(release_events: bool) -> Self {
        Self {
            state: KeyState::default(),
            release_events,
        }
    }

    /// Update the state with one key event
    ///
    /// Returns the new state, or `None` if the event is not part of the control surface. Ctrl-C counts as `esc`
    /// since the terminal is in raw mode.
    pub fn on_event(&mut self, event: &KeyEvent) -> Option<KeyState> {
        if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
            self.state.press(Key::Esc);
            return Some(self.state.clone());
        }

        let key = Key::from_code(event.code)?;

        if self.release_events {
            match event.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => self.state.press(key),
                KeyEventKind::Release => self.state.release(key),
            }
        } else {
            if event.kind == KeyEventKind::Release {
                return None;
            }
            // Only the auto-repeating key is known to be held
            self.state = KeyState::with_keys([key]);
            if event.modifiers.contains(KeyModifiers::SHIFT) {
                self.state.press(Key::Shift);
            }
        }

        Some(self.state.clone())
    }

    /// No event came within [HOLD_TIMEOUT]
    ///
    /// Without release events this releases everything, returns the empty state if something was held.
    pub fn on_idle(&mut self) -> Option<KeyState> {
        if self.release_events || self.state.is_empty() {
            None
        } else {
            self.state = KeyState::default();
            Some(self.state.clone())
        }
    }

    /// True when the tracker needs [KeyTracker::on_idle()] calls
    pub fn needs_idle(&self) -> bool {
        !self.release_events && !self.state.is_empty()
    }
}

/// Terminal raw mode, restored on drop
struct RawMode {
    enhanced: bool,
}

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut raw = Self { enhanced: false };

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                        | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                )
            )?;
            raw.enhanced = true;
        }

        Ok(raw)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("Cannot restore the terminal: {}", e);
        }
    }
}

/// [KeySource] reading the terminal
///
/// The terminal is in raw mode as long as this object lives.
pub struct TerminalKeys {
    events: EventStream,
    tracker: KeyTracker,
    _raw: RawMode,
}

impl TerminalKeys {
    /// Put the terminal in raw mode and start reading key events
    pub fn open() -> Result<Self> {
        let raw = RawMode::enable()?;
        if !raw.enhanced {
            log::warn!("Terminal does not report key releases, keys are released {:?} after the last repeat", HOLD_TIMEOUT);
        }

        Ok(Self {
            events: EventStream::new(),
            tracker: KeyTracker::new(raw.enhanced),
            _raw: raw,
        })
    }
}

#[async_trait]
impl KeySource for TerminalKeys {
    async fn next_state(&mut self) -> Result<Option<KeyState>> {
        loop {
            let event = if self.tracker.needs_idle() {
                match tokio::time::timeout(HOLD_TIMEOUT, self.events.next()).await {
                    Ok(event) => event,
                    Err(_) => match self.tracker.on_idle() {
                        Some(state) => return Ok(Some(state)),
                        None => continue,
                    },
                }
            } else {
                self.events.next().await
            };

            let Some(event) = event else {
                return Ok(None);
            };
            let event = event.map_err(|e| Error::Input(e.to_string()))?;

            if let Event::Key(key_event) = event {
                if let Some(state) = self.tracker.on_event(&key_event) {
                    return Ok(Some(state));
                }
            }
        }
    }
}
